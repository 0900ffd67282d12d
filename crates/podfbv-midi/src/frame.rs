//! Incremental framing of a raw MIDI byte stream.
//!
//! The stream carries no delimiters, so message boundaries come from the
//! status byte alone:
//!
//! | Status | Total length |
//! |--------|--------------|
//! | `0xB0` | 3            |
//! | `0xC0` | 2            |
//! | other  | unsupported  |
//!
//! An unsupported status byte is dropped on its own and framing restarts at
//! the next byte read.

use crate::message::{Message, MAX_MESSAGE_LEN};
use crate::{Tic, CONTROL_CHANGE, PROGRAM_CHANGE};

/// How many more bytes `buf` needs to form one message.
///
/// `Some(0)` means complete. `None` means the buffer cannot be a supported
/// message (empty, unknown status, or longer than its status allows).
pub fn bytes_needed(buf: &[u8]) -> Option<usize> {
    let total: usize = match buf.first()? {
        &CONTROL_CHANGE => 3,
        &PROGRAM_CHANGE => 2,
        _ => return None,
    };
    total.checked_sub(buf.len())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// More bytes are needed; read into [`Framer::spare`] again.
    Incomplete,
    Complete(Message),
    /// The pending status byte was unsupported and has been discarded.
    Resync,
}

/// Accumulates bytes for one message at a time.
#[derive(Debug, Default)]
pub struct Framer {
    buf: [u8; MAX_MESSAGE_LEN],
    filled: usize,
    needed: usize,
    tic: Tic,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The region the next device read should fill.
    ///
    /// A single byte while idle so the first byte of every message gets its
    /// own timestamp, then exactly the remaining length of the message.
    #[inline]
    pub fn spare(&mut self) -> &mut [u8] {
        let want = if self.filled == 0 { 1 } else { self.needed };
        &mut self.buf[self.filled..self.filled + want]
    }

    /// Account for `n` bytes written into [`Framer::spare`].
    ///
    /// `tic` is kept as the message timestamp when these are the first
    /// bytes of a message.
    pub fn advance(&mut self, n: usize, tic: Tic) -> FrameStatus {
        if n == 0 {
            return FrameStatus::Incomplete;
        }
        if self.filled == 0 {
            self.tic = tic;
        }
        self.filled += n;

        match bytes_needed(&self.buf[..self.filled]) {
            None => {
                self.filled = 0;
                FrameStatus::Resync
            }
            Some(0) => {
                let msg = Message::framed(self.buf, self.filled, self.tic);
                self.filled = 0;
                FrameStatus::Complete(msg)
            }
            Some(left) => {
                self.needed = left;
                FrameStatus::Incomplete
            }
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.filled == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(framer: &mut Framer, bytes: &[u8]) -> Vec<FrameStatus> {
        let mut out = Vec::new();
        for (i, byte) in bytes.iter().enumerate() {
            let spare = framer.spare();
            spare[0] = *byte;
            out.push(framer.advance(1, Tic::from_micros(i as u64)));
        }
        out
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(bytes_needed(&[0xB0]), Some(2));
        assert_eq!(bytes_needed(&[0xB0, 0x07]), Some(1));
        assert_eq!(bytes_needed(&[0xB0, 0x07, 0x40]), Some(0));
        assert_eq!(bytes_needed(&[0xC0]), Some(1));
        assert_eq!(bytes_needed(&[0xC0, 0x01]), Some(0));
    }

    #[test]
    fn test_unsupported() {
        assert_eq!(bytes_needed(&[]), None);
        assert_eq!(bytes_needed(&[0x90, 60, 100]), None);
        // Only channel 1 is understood
        assert_eq!(bytes_needed(&[0xB1, 7, 0]), None);
        assert_eq!(bytes_needed(&[0xC0, 1, 2]), None);
    }

    #[test]
    fn test_spare_sizes() {
        let mut framer = Framer::new();
        assert_eq!(framer.spare().len(), 1);
        framer.spare()[0] = 0xB0;
        assert_eq!(framer.advance(1, Tic::ZERO), FrameStatus::Incomplete);
        assert_eq!(framer.spare().len(), 2);
    }

    #[test]
    fn test_partial_reads() {
        let mut framer = Framer::new();
        framer.spare()[0] = 0xB0;
        framer.advance(1, Tic::from_micros(10));

        // Device returns one of the two requested bytes
        framer.spare()[0] = 0x14;
        assert_eq!(framer.advance(1, Tic::from_micros(20)), FrameStatus::Incomplete);
        assert_eq!(framer.spare().len(), 1);

        framer.spare()[0] = 0x7F;
        match framer.advance(1, Tic::from_micros(30)) {
            FrameStatus::Complete(msg) => {
                assert_eq!(msg.as_bytes(), &[0xB0, 0x14, 0x7F]);
                // Timestamp of the first byte
                assert_eq!(msg.tic(), Tic::from_micros(10));
            }
            other => panic!("expected complete frame, got {:?}", other),
        }
        assert!(framer.is_idle());
    }

    #[test]
    fn test_multi_byte_read() {
        let mut framer = Framer::new();
        framer.spare()[0] = 0xC0;
        framer.advance(1, Tic::ZERO);
        let spare = framer.spare();
        assert_eq!(spare.len(), 1);
        spare[0] = 0x03;
        assert!(matches!(
            framer.advance(1, Tic::ZERO),
            FrameStatus::Complete(_)
        ));

        framer.spare()[0] = 0xB0;
        framer.advance(1, Tic::ZERO);
        let spare = framer.spare();
        spare.copy_from_slice(&[0x0B, 0x22]);
        match framer.advance(2, Tic::ZERO) {
            FrameStatus::Complete(msg) => assert_eq!(msg.as_bytes(), &[0xB0, 0x0B, 0x22]),
            other => panic!("expected complete frame, got {:?}", other),
        }
    }

    #[test]
    fn test_resync_drops_single_byte() {
        let mut framer = Framer::new();
        let statuses = feed(&mut framer, &[0xF8, 0xC0, 0x02]);
        assert_eq!(statuses[0], FrameStatus::Resync);
        assert_eq!(statuses[1], FrameStatus::Incomplete);
        match statuses[2] {
            FrameStatus::Complete(msg) => {
                assert_eq!(msg.as_bytes(), &[0xC0, 0x02]);
                assert_eq!(msg.tic(), Tic::from_micros(1));
            }
            other => panic!("expected complete frame, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_length_read_is_ignored() {
        let mut framer = Framer::new();
        assert_eq!(framer.advance(0, Tic::ZERO), FrameStatus::Incomplete);
        assert!(framer.is_idle());
    }

    proptest! {
        #[test]
        fn prop_control_change_needs_three(data in proptest::collection::vec(0u8..0x80, 0..3)) {
            let mut buf = vec![0xB0];
            buf.extend_from_slice(&data);
            prop_assert_eq!(bytes_needed(&buf), Some(3 - buf.len()));
        }

        #[test]
        fn prop_program_change_needs_two(data in proptest::collection::vec(0u8..0x80, 0..2)) {
            let mut buf = vec![0xC0];
            buf.extend_from_slice(&data);
            prop_assert_eq!(bytes_needed(&buf), Some(2 - buf.len()));
        }

        #[test]
        fn prop_other_status_resyncs(status in any::<u8>().prop_filter("supported", |s| *s != 0xB0 && *s != 0xC0)) {
            let mut framer = Framer::new();
            prop_assert_eq!(bytes_needed(&[status]), None);
            prop_assert_eq!(feed(&mut framer, &[status]), vec![FrameStatus::Resync]);
            prop_assert!(framer.is_idle());
        }
    }
}
