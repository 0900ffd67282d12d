//! # podfbv - FBV/POD MIDI Bridge
//!
//! Lets a Line 6 FBV foot controller drive a Line 6 POD over two USB MIDI
//! connections, translating and filtering the traffic in between.
//!
//! ## Architecture
//!
//! podfbv is an umbrella crate over:
//! - **podfbv-midi** - Wire types (Message, Framer, Tic)
//! - **podfbv-midi-io** - Devices (raw MIDI, midir, virtual) and connectors
//!
//! and runs five roles on their own threads, coordinated by one mutex:
//!
//! ```text
//! FBV ─► fbv-input ─► [fbv_in] ─► control ─► [pod_out] ─► pod-output ─► POD
//! FBV ◄─ fbv-output ◄─ [fbv_out] ◄─ control ◄─ [pod_in] ◄─ pod-input ◄─ POD
//! ```
//!
//! When any role stops (device unplugged, I/O error, stop request) the
//! [`Supervisor`] stops them all, closes both devices, and, if retrying,
//! reopens them with backoff.
//!
//! ## Quick Start
//!
//! ```ignore
//! use podfbv::prelude::*;
//!
//! let supervisor = Supervisor::builder()
//!     .retry(true)
//!     .build()?;
//!
//! let handle = supervisor.handle();
//! ctrlc::set_handler(move || handle.request_stop())?;
//! supervisor.run()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Raw MIDI devices (unix)
//! - `midir` - Hardware ports through midir

/// Re-export of podfbv-midi for direct access
pub use podfbv_midi as midi;

/// Re-export of podfbv-midi-io for direct access
pub use podfbv_midi_io as io;

pub use podfbv_midi::{FrameStatus, Framer, Message, ShortMessage, Tic};
pub use podfbv_midi_io::{
    Connector, DeviceHandle, DeviceId, MidiDevice, VirtualConnector, VirtualDevice, VirtualPeer,
    VirtualPlug,
};

mod error;
pub use error::{Error, Result};

pub mod slot;
pub use slot::{Slot, SlotBusy, Slots};

pub mod role;
pub use role::{Endpoint, Pipeline, Role, RoleHandle, RoleTable, Shared};

pub mod io_role;
pub use io_role::{read_message, run_reader, run_writer};

pub mod translator;
pub use translator::{run_control, Button, ControllerState, PEDAL_THRESHOLD};

pub mod config;
pub use config::{Backend, Backoff, BridgeConfig};

mod builder;
pub use builder::BridgeBuilder;

mod supervisor;
pub use supervisor::{Snapshot, Supervisor, SupervisorHandle};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{BridgeBuilder, Supervisor, SupervisorHandle};

    pub use crate::{Backend, Backoff, BridgeConfig, DeviceId};

    pub use crate::{Button, ControllerState, Message};
}
