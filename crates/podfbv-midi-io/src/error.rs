//! Error types for the device layer.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to open MIDI device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("MIDI device not found: {0}")]
    DeviceNotFound(String),

    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    /// The device opened but never accepted output.
    #[error("MIDI device {device} rejected output after {attempts} attempts: {source}")]
    Probe {
        device: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("MIDI backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Fatal errors mean retrying the open cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Probe { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
