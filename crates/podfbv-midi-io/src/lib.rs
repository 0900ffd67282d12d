//! Device layer for the FBV/POD bridge.
//!
//! The bridge core only needs blocking byte reads and writes on an opened
//! handle plus a way to (re)open it. This crate provides that contract
//! ([`MidiDevice`], [`Connector`]) and its backends:
//!
//! - **raw** (unix): ALSA raw MIDI nodes under `/dev/snd`, resolved from the
//!   stable `/dev/snd/by-id` names
//! - **midir** (feature `midir`): hardware ports matched by name
//! - **virtual**: in-memory device pairs for tests and demos

pub mod error;
pub use error::{Error, Result};

mod device;
pub use device::{Connector, DeviceHandle, DeviceId, MidiDevice, DEFAULT_FBV_ID, DEFAULT_POD_ID};

#[cfg(unix)]
pub mod raw;
#[cfg(unix)]
pub use raw::{resolve_by_id, RawMidiConnector, RawMidiDevice};

pub mod virtual_port;
pub use virtual_port::{VirtualConnector, VirtualDevice, VirtualPeer, VirtualPlug};

#[cfg(feature = "midir")]
pub mod midir_port;
#[cfg(feature = "midir")]
pub use midir_port::{list_ports, MidirConnector};
