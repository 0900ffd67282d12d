//! Single-flight, double-buffered mailbox between two roles.
//!
//! The producer fills a back buffer it owns, then [`Slot::publish`] swaps it
//! with the slot's front buffer. From then on the front buffer belongs to
//! the consumer until [`Slot::consume`]; publishing again before that fails,
//! so there is never more than one unconsumed message per slot and the two
//! sides never touch the same buffer. The swapped-out buffer goes back to the
//! producer for reuse, so nothing is allocated per message.
//!
//! Slots are only ever accessed under the pipeline mutex.

use podfbv_midi::Message;
use thiserror::Error;

use crate::role::Endpoint;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("previous message has not been consumed")]
pub struct SlotBusy;

#[derive(Debug, Default)]
pub struct Slot {
    front: Message,
    pending: bool,
}

impl Slot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `back` to the consumer. On success `back` holds the previously
    /// consumed buffer.
    pub fn publish(&mut self, back: &mut Message) -> Result<(), SlotBusy> {
        if self.pending {
            return Err(SlotBusy);
        }
        std::mem::swap(&mut self.front, back);
        self.pending = true;
        Ok(())
    }

    #[inline]
    pub fn pending(&self) -> Option<&Message> {
        self.pending.then_some(&self.front)
    }

    /// Mark the pending message consumed, returning a copy of it.
    pub fn consume(&mut self) -> Option<Message> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(self.front)
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        !self.pending
    }

    /// Drop any pending message. Only valid while no role is running.
    pub fn clear(&mut self) {
        self.pending = false;
        self.front = Message::default();
    }
}

/// The four slots of the pipeline, named by direction.
#[derive(Debug, Default)]
pub struct Slots {
    /// Reader(FBV) → Translator
    pub fbv_in: Slot,
    /// Translator → Writer(FBV)
    pub fbv_out: Slot,
    /// Reader(POD) → Translator
    pub pod_in: Slot,
    /// Translator → Writer(POD)
    pub pod_out: Slot,
}

impl Slots {
    /// Slot the reader of `endpoint` fills.
    pub fn input(&mut self, endpoint: Endpoint) -> &mut Slot {
        match endpoint {
            Endpoint::Fbv => &mut self.fbv_in,
            Endpoint::Pod => &mut self.pod_in,
        }
    }

    /// Slot the writer of `endpoint` drains.
    pub fn output(&mut self, endpoint: Endpoint) -> &mut Slot {
        match endpoint {
            Endpoint::Fbv => &mut self.fbv_out,
            Endpoint::Pod => &mut self.pod_out,
        }
    }

    pub fn clear(&mut self) {
        self.fbv_in.clear();
        self.fbv_out.clear();
        self.pod_in.clear();
        self.pod_out.clear();
    }
}
