//! Centralized error type for the bridge.
//!
//! Wraps the device layer's errors so `?` propagates naturally from the
//! connectors up to the process entry point.

use thiserror::Error;

use crate::role::Role;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Device: {0}")]
    Device(#[from] podfbv_midi_io::Error),

    #[error("failed to start {role} thread: {source}")]
    Spawn {
        role: Role,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
