pub mod command;
pub mod firmware;
pub mod loader;
pub mod timing;

use std::time::Duration;

use rusb::{DeviceHandle, UsbContext};

pub const VENDOR_ID: u16 = 0x0955;
pub const PRODUCT_ID: u16 = 0x0007;

pub const CONFIGURATION: u8 = 1;
pub const INTERFACE: u8 = 0;

/// The per-device USB primitives the emitter protocol is built on.
pub trait UsbHandle {
    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize>;

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize>;

    fn reset(&mut self) -> rusb::Result<()>;

    fn set_active_configuration(&mut self, config: u8) -> rusb::Result<()>;

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;

    /// Endpoints on the first setting of the first interface of the first
    /// configuration. Zero until the firmware is running.
    fn endpoint_count(&self) -> rusb::Result<u8>;
}

/// Device discovery.
pub trait UsbBus {
    type Handle: UsbHandle;

    fn open(&mut self, vendor_id: u16, product_id: u16) -> rusb::Result<Option<Self::Handle>>;
}

/// Discovery over a libusb context.
pub struct LibusbBus<T: UsbContext> {
    context: T,
}

impl<T: UsbContext> LibusbBus<T> {
    pub fn new(context: T) -> Self {
        Self { context }
    }
}

impl<T: UsbContext> UsbBus for LibusbBus<T> {
    type Handle = DeviceHandle<T>;

    fn open(&mut self, vendor_id: u16, product_id: u16) -> rusb::Result<Option<Self::Handle>> {
        let devices = self.context.devices()?;

        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };

            if device_desc.vendor_id() == vendor_id && device_desc.product_id() == product_id {
                log::info!(
                    "Opened {:04x}:{:04x} on bus {} address {}",
                    vendor_id,
                    product_id,
                    device.bus_number(),
                    device.address()
                );
                return device.open().map(Some);
            }
        }

        Ok(None)
    }
}

impl<T: UsbContext> UsbHandle for DeviceHandle<T> {
    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::write_control(self, request_type, request, value, index, data, timeout)
    }

    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        DeviceHandle::write_bulk(self, endpoint, data, timeout)
    }

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        DeviceHandle::read_bulk(self, endpoint, buf, timeout)
    }

    fn reset(&mut self) -> rusb::Result<()> {
        DeviceHandle::reset(self)
    }

    fn set_active_configuration(&mut self, config: u8) -> rusb::Result<()> {
        DeviceHandle::set_active_configuration(self, config)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::claim_interface(self, interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::release_interface(self, interface)
    }

    fn endpoint_count(&self) -> rusb::Result<u8> {
        let config = self.device().config_descriptor(0)?;

        let count = match config.interfaces().next() {
            Some(interface) => interface
                .descriptors()
                .next()
                .map(|setting| setting.num_endpoints()),
            None => None,
        };

        Ok(count.unwrap_or(0))
    }
}
