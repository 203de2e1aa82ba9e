use std::thread;
use std::time::Duration;

use rusb::{Direction, Recipient, RequestType};

use super::firmware;
use super::{UsbBus, UsbHandle, PRODUCT_ID, VENDOR_ID};
use crate::error::{Error, Result};

/// Vendor request that writes into the emitter's RAM.
pub const FIRMWARE_LOAD: u8 = 0xa0;

/// How long to wait for the emitter to come back after the post-upload reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Slept before every discovery attempt.
    pub settle_delay: Duration,
    pub attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(50),
            attempts: 1,
        }
    }
}

pub fn request_type() -> u8 {
    rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device)
}

/// Uploads `blob`, resets the emitter and returns the re-enumerated handle.
///
/// The old handle is consumed. A transfer failure part way through leaves the
/// emitter half-flashed; it needs a replug or another load.
pub fn load<B: UsbBus>(
    bus: &mut B,
    mut handle: B::Handle,
    blob: &[u8],
    policy: &ReconnectPolicy,
) -> Result<B::Handle> {
    let count = firmware::validate(blob)?;
    log::info!("Uploading {} firmware modules ({} bytes)", count, blob.len());

    let request_type = request_type();

    for module in firmware::modules(blob) {
        let module = module?;
        log::debug!(
            "Module at {:#06x}, {} bytes",
            module.load_address,
            module.payload.len()
        );

        let written = handle
            .write_control(
                request_type,
                FIRMWARE_LOAD,
                0x0000,
                module.load_address,
                module.payload,
                Duration::ZERO,
            )
            .map_err(Error::Transfer)?;

        if written != module.payload.len() {
            log::error!(
                "Short firmware write at {:#06x}: {} of {} bytes",
                module.load_address,
                written,
                module.payload.len()
            );
            return Err(Error::Transfer(rusb::Error::Io));
        }
    }

    log::info!("Firmware uploaded, resetting emitter");

    match handle.reset() {
        Ok(()) => {}
        // libusb reports the device as gone once it starts re-enumerating
        Err(rusb::Error::NotFound) => log::debug!("Emitter left the bus during reset"),
        Err(err) => return Err(Error::Transfer(err)),
    }
    drop(handle);

    let handle = reconnect(bus, policy)?;

    let endpoints = handle.endpoint_count().map_err(Error::Usb)?;
    if endpoints == 0 {
        return Err(Error::FirmwareNotActive);
    }

    log::info!("Emitter re-enumerated with {} endpoints", endpoints);

    Ok(handle)
}

fn reconnect<B: UsbBus>(bus: &mut B, policy: &ReconnectPolicy) -> Result<B::Handle> {
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        thread::sleep(policy.settle_delay);

        if let Some(handle) = bus.open(VENDOR_ID, PRODUCT_ID).map_err(Error::Usb)? {
            return Ok(handle);
        }

        log::debug!("Emitter not back yet (attempt {}/{})", attempt, attempts);
    }

    Err(Error::DeviceNotFound {
        vendor_id: VENDOR_ID,
        product_id: PRODUCT_ID,
    })
}
