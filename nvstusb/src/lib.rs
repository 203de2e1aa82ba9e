pub mod emitter;
mod error;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use emitter::command::{self, Keys};
use emitter::firmware::FirmwareSource;
use emitter::loader::{self, ReconnectPolicy};

pub use emitter::{LibusbBus, UsbBus, UsbHandle};
pub use error::{Error, Result};

pub const MIN_RATE: f64 = 60.0;
pub const MAX_RATE: f64 = 120.0;
pub const DEFAULT_RATE: f64 = 100.0;

const BULK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
    /// Left then right, back to back.
    Quad,
}

impl FromStr for Eye {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Eye::Left),
            "right" => Ok(Eye::Right),
            "quad" => Ok(Eye::Quad),
            other => Err(Error::InvalidParameter(format!("unknown eye {:?}", other))),
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Eye::Left => "left",
            Eye::Right => "right",
            Eye::Quad => "quad",
        })
    }
}

/// A freshly opened emitter, before or after its firmware is running.
pub enum DeviceState<H> {
    Unflashed(H),
    Active(H),
}

impl<H: UsbHandle> DeviceState<H> {
    pub fn classify(handle: H) -> Result<Self> {
        let endpoints = handle.endpoint_count().map_err(Error::Usb)?;

        if endpoints == 0 {
            Ok(DeviceState::Unflashed(handle))
        } else {
            Ok(DeviceState::Active(handle))
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, DeviceState::Active(_))
    }

    /// Returns a handle to a running emitter, uploading firmware if needed.
    ///
    /// The firmware source is only read for an unflashed emitter.
    pub fn activate<B>(
        self,
        bus: &mut B,
        firmware: &FirmwareSource,
        policy: &ReconnectPolicy,
    ) -> Result<H>
    where
        B: UsbBus<Handle = H>,
    {
        match self {
            DeviceState::Active(handle) => Ok(handle),
            DeviceState::Unflashed(handle) => {
                log::info!("Emitter has no firmware running");
                let blob = firmware.load()?;
                loader::load(bus, handle, &blob, policy)
            }
        }
    }
}

/// An open, claimed emitter and the state last sent to it.
///
/// Not meant to be shared between threads; every call blocks on USB.
pub struct Session<H: UsbHandle> {
    handle: H,
    rate: f64,
    eye: Eye,
    invert_eyes: bool,
}

impl<H: UsbHandle> Session<H> {
    /// Finds the emitter, flashes it if needed and claims it.
    pub fn connect<B>(
        bus: &mut B,
        firmware: &FirmwareSource,
        policy: &ReconnectPolicy,
    ) -> Result<Self>
    where
        B: UsbBus<Handle = H>,
    {
        let handle = bus
            .open(emitter::VENDOR_ID, emitter::PRODUCT_ID)
            .map_err(Error::Usb)?
            .ok_or(Error::DeviceNotFound {
                vendor_id: emitter::VENDOR_ID,
                product_id: emitter::PRODUCT_ID,
            })?;

        let handle = DeviceState::classify(handle)?.activate(bus, firmware, policy)?;

        Self::new(handle)
    }

    /// Claims an emitter whose firmware is already running.
    pub fn new(mut handle: H) -> Result<Self> {
        handle
            .set_active_configuration(emitter::CONFIGURATION)
            .map_err(Error::Usb)?;

        handle
            .claim_interface(emitter::INTERFACE)
            .map_err(|source| Error::Claim {
                interface: emitter::INTERFACE,
                source,
            })?;

        Ok(Self {
            handle,
            rate: DEFAULT_RATE,
            eye: Eye::Left,
            invert_eyes: false,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn eye(&self) -> Eye {
        self.eye
    }

    pub fn invert_eyes(&self) -> bool {
        self.invert_eyes
    }

    pub fn set_invert_eyes(&mut self, invert: bool) {
        self.invert_eyes = invert;
    }

    /// Programs the shutter timings for `rate` Hz.
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(Error::InvalidParameter(format!(
                "rate {} Hz outside {}..={}",
                rate, MIN_RATE, MAX_RATE
            )));
        }

        self.rate = rate;
        log::debug!("Setting rate to {} Hz", rate);

        for frame in command::rate_frames(rate) {
            self.send(command::CONFIG_ENDPOINT, &frame)?;
        }

        Ok(())
    }

    pub fn set_eye(&mut self, eye: Eye) -> Result<()> {
        let right = match eye {
            Eye::Quad => {
                self.set_eye(Eye::Left)?;
                self.set_eye(Eye::Right)?;
                self.eye = Eye::Quad;
                return Ok(());
            }
            Eye::Left => false,
            Eye::Right => true,
        };

        let frame = command::set_eye(right, self.invert_eyes, self.rate);
        self.send(command::EYE_ENDPOINT, &frame)?;
        self.eye = eye;

        Ok(())
    }

    /// Reads and clears the button and wheel state.
    pub fn read_keys(&mut self) -> Result<Keys> {
        self.send(command::EYE_ENDPOINT, &command::read_keys())?;

        let mut reply = [0u8; command::KEYS_REPLY_LEN];
        let len = self
            .handle
            .read_bulk(command::STATUS_ENDPOINT, &mut reply, BULK_TIMEOUT)
            .map_err(Error::Transfer)?;

        Keys::parse(&reply[..len])
    }

    /// Releases the interface and drops the handle.
    pub fn close(mut self) -> Result<()> {
        self.handle
            .release_interface(emitter::INTERFACE)
            .map_err(Error::Usb)
    }

    fn send(&self, endpoint: u8, frame: &[u8]) -> Result<()> {
        log::trace!("ep{} <- {}", endpoint, hex::encode(frame));

        self.handle
            .write_bulk(endpoint, frame, BULK_TIMEOUT)
            .map_err(Error::Transfer)?;

        Ok(())
    }
}
