//! Fixed-size short MIDI messages.

use std::fmt;

use thiserror::Error;

use crate::{Tic, CONTROL_CHANGE, PROGRAM_CHANGE};

/// Bytes reserved per message. The longest handled message is 3 bytes.
pub const MAX_MESSAGE_LEN: usize = 4;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("message of {len} bytes exceeds the {MAX_MESSAGE_LEN}-byte buffer")]
pub struct MessageTooLong {
    pub len: usize,
}

/// One framed MIDI message plus the time its first byte arrived.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Message {
    bytes: [u8; MAX_MESSAGE_LEN],
    len: u8,
    tic: Tic,
}

/// Typed view of a well-formed message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShortMessage {
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
}

impl Message {
    pub fn from_bytes(bytes: &[u8], tic: Tic) -> Result<Self, MessageTooLong> {
        if bytes.len() > MAX_MESSAGE_LEN {
            return Err(MessageTooLong { len: bytes.len() });
        }
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: buf,
            len: bytes.len() as u8,
            tic,
        })
    }

    #[inline]
    pub(crate) fn framed(bytes: [u8; MAX_MESSAGE_LEN], len: usize, tic: Tic) -> Self {
        debug_assert!(len <= MAX_MESSAGE_LEN);
        Self {
            bytes,
            len: len as u8,
            tic,
        }
    }

    /// Control Change on channel 1. Data bytes are masked to 7 bits.
    #[inline]
    pub fn control_change(controller: u8, value: u8) -> Self {
        Self {
            bytes: [CONTROL_CHANGE, controller & 0x7F, value & 0x7F, 0],
            len: 3,
            tic: Tic::ZERO,
        }
    }

    /// Program Change on channel 1. The program is masked to 7 bits.
    #[inline]
    pub fn program_change(program: u8) -> Self {
        Self {
            bytes: [PROGRAM_CHANGE, program & 0x7F, 0, 0],
            len: 2,
            tic: Tic::ZERO,
        }
    }

    #[inline]
    pub fn with_tic(mut self, tic: Tic) -> Self {
        self.tic = tic;
        self
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn status(&self) -> Option<u8> {
        self.as_bytes().first().copied()
    }

    #[inline]
    pub fn tic(&self) -> Tic {
        self.tic
    }

    /// `None` unless the message is a complete CC (3 bytes) or PC (2 bytes).
    pub fn kind(&self) -> Option<ShortMessage> {
        match *self.as_bytes() {
            [CONTROL_CHANGE, controller, value] => {
                Some(ShortMessage::ControlChange { controller, value })
            }
            [PROGRAM_CHANGE, program] => Some(ShortMessage::ProgramChange { program }),
            _ => None,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message[")?;
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "0x{:02x}", byte)?;
        }
        write!(f, " @{}us]", self.tic.as_micros())
    }
}
