//! MIDI wire types for the FBV/POD bridge.
//!
//! Only the two message classes the bridge understands are modelled:
//! Control Change (`0xB0 cc vv`) and Program Change (`0xC0 pp`).
//! Everything here is `Copy` and allocation-free so it can move between
//! threads on the hot path.

pub mod clock;
pub use clock::Tic;

pub mod message;
pub use message::{Message, MessageTooLong, ShortMessage, MAX_MESSAGE_LEN};

pub mod frame;
pub use frame::{bytes_needed, FrameStatus, Framer};

/// Status byte of a Control Change on channel 1.
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Status byte of a Program Change on channel 1.
pub const PROGRAM_CHANGE: u8 = 0xC0;
