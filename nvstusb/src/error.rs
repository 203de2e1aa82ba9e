use std::io;
use std::path::PathBuf;

/// The error type for emitter operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// libusb failed outside of a data transfer (context, enumeration, descriptors).
    #[error("USB error: {0}")]
    Usb(rusb::Error),

    #[error("emitter {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// A module header or payload runs past the end of the firmware blob.
    #[error("malformed firmware: module at offset {offset} needs {needed} bytes, {remaining} remain")]
    MalformedFirmware {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("USB transfer error: {0}")]
    Transfer(rusb::Error),

    #[error("unable to claim interface {interface}: {source}")]
    Claim {
        interface: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("firmware uploaded but the emitter exposes no endpoints")]
    FirmwareNotActive,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("firmware unavailable: {0}")]
    FirmwareUnavailable(String),

    #[error("could not read firmware from {path}: {source}")]
    FirmwareRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
