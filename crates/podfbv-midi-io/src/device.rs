//! The device contract the bridge core is written against.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;

/// `/dev/snd/by-id` name of the FBV Express Mk II.
pub const DEFAULT_FBV_ID: &str = "usb-Line_6_FBV_Express_Mk_II-00";

/// `/dev/snd/by-id` name of the Pocket POD.
pub const DEFAULT_POD_ID: &str = "usb-Line_6_Line_6_Pocket_POD-00";

/// An opened, bidirectional MIDI byte stream.
///
/// One reader thread and one writer thread use the same handle
/// concurrently, hence `&self` on both directions.
pub trait MidiDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Blocks until at least one byte is available. Short reads are allowed.
    /// `Ok(0)` means the device went away.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    fn write_all(&self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole message",
                    ))
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Stop using the device. Pending and later reads/writes fail promptly.
    /// Idempotent.
    fn close(&self);
}

pub type DeviceHandle = Arc<dyn MidiDevice>;

/// Knows how to (re)open one particular device.
pub trait Connector: Send {
    /// Human-readable target, for logs.
    fn describe(&self) -> String;

    fn open(&mut self) -> Result<DeviceHandle>;
}

impl<C: Connector + ?Sized> Connector for Box<C> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn open(&mut self) -> Result<DeviceHandle> {
        (**self).open()
    }
}

/// How a device is identified on the command line or in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceId {
    /// Stable name under `/dev/snd/by-id` (raw backend) or port name
    /// prefix (midir backend).
    Id(String),
    /// Device node used as-is, e.g. `/dev/snd/midiC1D0`.
    Path(PathBuf),
}

impl DeviceId {
    pub fn fbv() -> Self {
        DeviceId::Id(DEFAULT_FBV_ID.to_string())
    }

    pub fn pod() -> Self {
        DeviceId::Id(DEFAULT_POD_ID.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Id(id) => write!(f, "{}", id),
            DeviceId::Path(path) => write!(f, "{}", path.display()),
        }
    }
}
