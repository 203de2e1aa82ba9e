use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use super::timing::{self, TimerDomain};
use crate::error::{Error, Result};

/// Bulk OUT endpoint for eye changes and reads.
pub const EYE_ENDPOINT: u8 = 1;
/// Bulk OUT endpoint for register writes.
pub const CONFIG_ENDPOINT: u8 = 2;
/// Bulk IN endpoint answering reads.
pub const STATUS_ENDPOINT: u8 = 0x84;

pub const FRAME_HEADER_LEN: usize = 4;

// Offsets into the firmware's register block at 0x2007.
pub const REG_TIMINGS: u8 = 0x00;
pub const REG_KEYS: u8 = 0x18;
pub const REG_SYNC_COUNTER: u8 = 0x1c;
pub const REG_IDLE_TIMEOUT: u8 = 0x1e;
pub const REG_MODE: u8 = 0x1b;

pub const KEYS_LEN: u16 = 3;
pub const KEYS_REPLY_LEN: usize = 7;

pub const EYE_SELECTED: u8 = 0xff;
pub const EYE_UNSELECTED: u8 = 0xfe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Write = 0x01,
    Read = 0x02,
    /// Flag OR-ed onto `Read` to clear what was read.
    Clear = 0x40,
    SetEye = 0xaa,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Write => "write",
            Command::Read => "read",
            Command::Clear => "clear",
            Command::SetEye => "set_eye",
        };
        f.write_str(name)
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "write" => Ok(Command::Write),
            "read" => Ok(Command::Read),
            "clear" => Ok(Command::Clear),
            "set_eye" => Ok(Command::SetEye),
            other => Err(Error::InvalidParameter(format!("unknown command {:?}", other))),
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(Command::Write),
            0x02 => Ok(Command::Read),
            0x40 => Ok(Command::Clear),
            0xaa => Ok(Command::SetEye),
            other => Err(Error::InvalidParameter(format!(
                "unknown command code {:#04x}",
                other
            ))),
        }
    }
}

fn header(code: u8, address: u8, length: u16, capacity: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + capacity);
    buf.put_u8(code);
    buf.put_u8(address);
    buf.put_u16_le(length);
    buf
}

/// `[code][address][payload length: u16 LE][payload]`
pub fn frame(command: Command, address: u8, payload: &[u8]) -> Bytes {
    let mut buf = header(command.code(), address, payload.len() as u16, payload.len());
    buf.put_slice(payload);
    buf.freeze()
}

pub fn write(address: u8, payload: &[u8]) -> Bytes {
    frame(Command::Write, address, payload)
}

/// The shutter timing block. 28 bytes including the frame header.
pub fn timings(rate: f64) -> Bytes {
    let mut payload = BytesMut::with_capacity(24);
    payload.put_slice(&timing::count_le(TimerDomain::T2, 4568.50));
    payload.put_slice(&timing::count_le(TimerDomain::T0, 4774.25));
    payload.put_slice(&timing::count_le(TimerDomain::T0, 2080.0));
    payload.put_slice(&[0x30, 0x28, 0x24, 0x22]);
    payload.put_slice(&[0x0a, 0x08, 0x05, 0x04]);
    payload.put_slice(&timing::count_le(
        TimerDomain::T2,
        timing::frame_period_us(rate),
    ));

    write(REG_TIMINGS, &payload)
}

/// Frames for a rate change, in the order the emitter expects them.
pub fn rate_frames(rate: f64) -> [Bytes; 4] {
    // Idle after about four seconds without an eye change.
    let idle_frames = (rate * 4.0) as u16;

    [
        timings(rate),
        write(REG_SYNC_COUNTER, &0x0002u16.to_le_bytes()),
        write(REG_IDLE_TIMEOUT, &idle_frames.to_le_bytes()),
        write(REG_MODE, &[0x07]),
    ]
}

/// Selector byte of an eye frame.
///
/// The invert flag only applies to the right eye; left is always `0xfe`.
pub fn eye_selector(right: bool, invert: bool) -> u8 {
    if right && (1 ^ invert as u8) != 0 {
        EYE_SELECTED
    } else {
        EYE_UNSELECTED
    }
}

/// `[0xaa][selector][0x0000][shutter ticks: u32 LE]`. The length field is
/// left at zero.
pub fn set_eye(right: bool, invert: bool, rate: f64) -> Bytes {
    let mut buf = header(Command::SetEye.code(), eye_selector(right, invert), 0, 4);
    buf.put_slice(&timing::count_le(
        TimerDomain::T2,
        timing::frame_period_us(rate) / 1.8,
    ));
    buf.freeze()
}

/// Read and clear the three key bytes.
pub fn read_keys() -> Bytes {
    header(
        Command::Read.code() | Command::Clear.code(),
        REG_KEYS,
        KEYS_LEN,
        0,
    )
    .freeze()
}

/// Button and wheel state since the last read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keys {
    pub toggled_3d: bool,
    pub delta_wheel: i8,
    pub pressed_delta_wheel: i8,
}

impl Keys {
    pub fn parse(reply: &[u8]) -> Result<Self> {
        if reply.len() < KEYS_REPLY_LEN {
            return Err(Error::ShortRead {
                expected: KEYS_REPLY_LEN,
                actual: reply.len(),
            });
        }

        Ok(Keys {
            toggled_3d: reply[4] & 0x01 != 0,
            delta_wheel: reply[5] as i8,
            pressed_delta_wheel: reply[6] as i8,
        })
    }
}
