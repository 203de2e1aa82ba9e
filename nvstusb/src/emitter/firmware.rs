use std::borrow::Cow;
use std::iter::FusedIterator;
use std::path::PathBuf;

use bytes::{Buf, BufMut};
use rust_embed::RustEmbed;

use crate::error::{Error, Result};

#[derive(RustEmbed)]
#[folder = "resources/"]
struct EmitterResources;

pub const EMBEDDED_NAME: &str = "nvstusb.fw";

/// Length and load address, both big-endian u16.
pub const HEADER_LEN: usize = 4;

/// One record of the firmware stream.
///
/// ```text
/// [length: u16 BE][load address: u16 BE][payload: length bytes]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Module<'a> {
    pub load_address: u16,
    pub payload: &'a [u8],
}

impl<'a> Module<'a> {
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(self.payload.len() as u16);
        buf.put_u16(self.load_address);
        buf.put_slice(self.payload);
    }
}

/// Walks the module stream of a firmware blob.
///
/// Yields an error once and then stops if a header or payload is cut short.
/// Clone it to start over.
#[derive(Debug, Clone)]
pub struct Modules<'a> {
    rest: &'a [u8],
    offset: usize,
    failed: bool,
}

pub fn modules(blob: &[u8]) -> Modules<'_> {
    Modules {
        rest: blob,
        offset: 0,
        failed: false,
    }
}

/// Checks that `blob` splits cleanly into modules and returns how many.
pub fn validate(blob: &[u8]) -> Result<usize> {
    modules(blob).try_fold(0, |count, module| module.map(|_| count + 1))
}

impl<'a> Modules<'a> {
    fn malformed(&mut self, needed: usize) -> Error {
        self.failed = true;
        Error::MalformedFirmware {
            offset: self.offset,
            needed,
            remaining: self.rest.len(),
        }
    }
}

impl<'a> Iterator for Modules<'a> {
    type Item = Result<Module<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }

        if self.rest.len() < HEADER_LEN {
            return Some(Err(self.malformed(HEADER_LEN)));
        }

        let mut header = &self.rest[..HEADER_LEN];
        let length = header.get_u16() as usize;
        let load_address = header.get_u16();

        let needed = HEADER_LEN + length;
        if self.rest.len() < needed {
            return Some(Err(self.malformed(needed)));
        }

        let payload = &self.rest[HEADER_LEN..needed];
        self.rest = &self.rest[needed..];
        self.offset += needed;

        Some(Ok(Module {
            load_address,
            payload,
        }))
    }
}

impl<'a> FusedIterator for Modules<'a> {}

/// Where the firmware blob comes from.
#[derive(Debug, Clone)]
pub enum FirmwareSource {
    File(PathBuf),
    Bytes(Vec<u8>),
    /// `resources/nvstusb.fw`, compiled in when present.
    Embedded,
}

impl FirmwareSource {
    pub fn load(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            FirmwareSource::File(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| Error::FirmwareRead {
                    path: path.clone(),
                    source,
                }),
            FirmwareSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            FirmwareSource::Embedded => EmitterResources::get(EMBEDDED_NAME)
                .map(|file| file.data)
                .ok_or_else(|| {
                    Error::FirmwareUnavailable(format!(
                        "{} is not embedded, supply a firmware file",
                        EMBEDDED_NAME
                    ))
                }),
        }
    }
}
