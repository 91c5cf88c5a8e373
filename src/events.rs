//! Task notification bitmap.
//!
//! [`EventSignal`] carries the periodic-timer and button notifications from
//! interrupt context into the dispatch task, and the receive interrupt's
//! re-arm failure that the task must turn into a halt. Producers OR their bit into a
//! shared word; the task reads and clears the whole word in one atomic swap.
//! Repeated signals of the same bit between two reads collapse into one, and
//! distinct bits carry no relative ordering.

use core::sync::atomic::{AtomicU32, Ordering};

/// A set of pending task events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Events(u32);

impl Events {
    /// No event pending.
    pub const NONE: Self = Self(0x00);
    /// The periodic transmission timer expired.
    pub const TX_TIMER_EXPIRED: Self = Self(0x01);
    /// Button 1 (power down) was pressed.
    pub const BUTTON_1_PRESSED: Self = Self(0x02);
    /// Button 2 (manual session resync) was pressed.
    pub const BUTTON_2_PRESSED: Self = Self(0x04);
    /// The receive interrupt could not re-arm reception. Fatal for the task.
    pub const RECEIVE_FAILED: Self = Self(0x08);

    /// Raw bitmap value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a set from a raw bitmap, keeping unknown bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Whether no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for Events {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// OR-accumulating, cleared-on-read event word shared between interrupts and the task.
#[derive(Debug, Default)]
pub struct EventSignal {
    bits: AtomicU32,
}

impl EventSignal {
    /// Creates a signal with no event pending. Usable in `static` initialisers.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    /// ORs `events` into the pending set. Never blocks; callable from any context.
    pub fn signal(&self, events: Events) {
        let _ = self.bits.fetch_or(events.bits(), Ordering::AcqRel);
    }

    /// Returns every event signalled since the last call and clears them.
    ///
    /// Only call from the dispatch task. Never blocks.
    pub fn consume(&self) -> Events {
        Events(self.bits.swap(0, Ordering::AcqRel))
    }

    /// Pending events, without clearing them.
    pub fn peek(&self) -> Events {
        Events(self.bits.load(Ordering::Acquire))
    }
}
