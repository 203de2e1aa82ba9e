#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use nvstusb::{UsbBus, UsbHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open { found: bool },
    Control {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
        timeout: Duration,
    },
    Bulk { endpoint: u8, data: Vec<u8> },
    Read { endpoint: u8 },
    Reset,
    Configure(u8),
    Claim(u8),
    Release(u8),
}

pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Records every call into a log shared with the bus and sibling handles.
pub struct MockHandle {
    log: Log,
    endpoints: u8,
    controls: Cell<usize>,
    fail_control_at: Option<usize>,
    short_control_at: Option<usize>,
    fail_bulk: bool,
    claim_busy: bool,
    reset_result: rusb::Result<()>,
    reply: Vec<u8>,
}

impl MockHandle {
    pub fn new(log: &Log, endpoints: u8) -> Self {
        Self {
            log: Rc::clone(log),
            endpoints,
            controls: Cell::new(0),
            fail_control_at: None,
            short_control_at: None,
            fail_bulk: false,
            claim_busy: false,
            reset_result: Ok(()),
            reply: Vec::new(),
        }
    }

    /// The nth control transfer (zero based) fails with a pipe error.
    pub fn failing_control_at(mut self, n: usize) -> Self {
        self.fail_control_at = Some(n);
        self
    }

    /// The nth control transfer (zero based) accepts one byte less than sent.
    pub fn short_control_at(mut self, n: usize) -> Self {
        self.short_control_at = Some(n);
        self
    }

    pub fn failing_bulk(mut self) -> Self {
        self.fail_bulk = true;
        self
    }

    pub fn busy(mut self) -> Self {
        self.claim_busy = true;
        self
    }

    pub fn reset_result(mut self, result: rusb::Result<()>) -> Self {
        self.reset_result = result;
        self
    }

    pub fn with_reply(mut self, reply: &[u8]) -> Self {
        self.reply = reply.to_vec();
        self
    }

    fn push(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }
}

impl UsbHandle for MockHandle {
    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        let n = self.controls.get();
        self.controls.set(n + 1);

        if self.fail_control_at == Some(n) {
            return Err(rusb::Error::Pipe);
        }

        self.push(Event::Control {
            request_type,
            request,
            value,
            index,
            data: data.to_vec(),
            timeout,
        });

        if self.short_control_at == Some(n) {
            return Ok(data.len().saturating_sub(1));
        }
        Ok(data.len())
    }

    fn write_bulk(&self, endpoint: u8, data: &[u8], _timeout: Duration) -> rusb::Result<usize> {
        if self.fail_bulk {
            return Err(rusb::Error::Timeout);
        }

        self.push(Event::Bulk {
            endpoint,
            data: data.to_vec(),
        });
        Ok(data.len())
    }

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], _timeout: Duration) -> rusb::Result<usize> {
        self.push(Event::Read { endpoint });

        let len = self.reply.len().min(buf.len());
        buf[..len].copy_from_slice(&self.reply[..len]);
        Ok(len)
    }

    fn reset(&mut self) -> rusb::Result<()> {
        self.push(Event::Reset);
        self.reset_result
    }

    fn set_active_configuration(&mut self, config: u8) -> rusb::Result<()> {
        self.push(Event::Configure(config));
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        if self.claim_busy {
            return Err(rusb::Error::Busy);
        }

        self.push(Event::Claim(interface));
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.push(Event::Release(interface));
        Ok(())
    }

    fn endpoint_count(&self) -> rusb::Result<u8> {
        Ok(self.endpoints)
    }
}

/// Hands out queued handles, one per `open`. `None` entries and an empty
/// queue both mean "not on the bus".
pub struct MockBus {
    log: Log,
    devices: VecDeque<Option<MockHandle>>,
}

impl MockBus {
    pub fn new(log: &Log) -> Self {
        Self {
            log: Rc::clone(log),
            devices: VecDeque::new(),
        }
    }

    pub fn with(mut self, device: MockHandle) -> Self {
        self.devices.push_back(Some(device));
        self
    }

    pub fn with_absent(mut self) -> Self {
        self.devices.push_back(None);
        self
    }
}

impl UsbBus for MockBus {
    type Handle = MockHandle;

    fn open(&mut self, vendor_id: u16, product_id: u16) -> rusb::Result<Option<MockHandle>> {
        assert_eq!((vendor_id, product_id), (0x0955, 0x0007));

        let device = self.devices.pop_front().flatten();
        self.log.borrow_mut().push(Event::Open {
            found: device.is_some(),
        });
        Ok(device)
    }
}

pub fn events(log: &Log) -> Vec<Event> {
    log.borrow().clone()
}

pub fn controls(log: &Log) -> Vec<Event> {
    events(log)
        .into_iter()
        .filter(|event| matches!(event, Event::Control { .. }))
        .collect()
}

pub fn bulk_writes(log: &Log) -> Vec<(u8, Vec<u8>)> {
    events(log)
        .into_iter()
        .filter_map(|event| match event {
            Event::Bulk { endpoint, data } => Some((endpoint, data)),
            _ => None,
        })
        .collect()
}

/// `[len BE][addr BE][payload]` per module.
pub fn firmware_blob(modules: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut blob = Vec::new();
    for (address, payload) in modules {
        blob.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        blob.extend_from_slice(&address.to_be_bytes());
        blob.extend_from_slice(payload);
    }
    blob
}
