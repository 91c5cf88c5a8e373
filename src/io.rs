//! Random-byte and timestamp sources handed to the protocol engine.
//!
//! The engine needs fresh random bytes for nonces and keys and a monotonic
//! timestamp for handshake timeouts. Both are supplied once, at
//! [`ProtocolEngine::initialize`](crate::engine::ProtocolEngine::initialize).
//!
//! - [`BlockRng`] adapts a generator producing fixed 16-byte blocks (such as a
//!   security co-processor) to requests of any length.
//! - [`TickCounter`] counts scheduler ticks from the tick hook; [`TickClock`]
//!   reads it as a millisecond timestamp that rolls over.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::consts::{RNG_BLOCK_LEN, TICK_MS};
use thiserror::Error;

/// The random source could not deliver the requested bytes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[error("cannot generate random bytes")]
pub struct RandomError;

/// Source of cryptographically secure random bytes.
pub trait RandomSource {
    /// Fills `bytes` entirely or fails.
    fn fill_bytes(&mut self, bytes: &mut [u8]) -> Result<(), RandomError>;
}

/// Source of monotonic millisecond timestamps. Rolling over is allowed.
pub trait TimeSource {
    /// Current timestamp.
    fn now_ms(&self) -> u32;
}

/// Generator of fixed-size random blocks.
pub trait BlockSource {
    /// Produces one fresh block.
    fn generate_block(&mut self) -> Result<[u8; RNG_BLOCK_LEN], RandomError>;
}

/// [`RandomSource`] over a [`BlockSource`].
///
/// Whole blocks are copied out one at a time; the tail of the last block is
/// discarded rather than kept for the next request.
#[derive(Debug)]
pub struct BlockRng<G> {
    generator: G,
}

impl<G: BlockSource> BlockRng<G> {
    /// Wraps a block generator.
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Gives the generator back.
    pub fn release(self) -> G {
        self.generator
    }
}

impl<G: BlockSource> RandomSource for BlockRng<G> {
    fn fill_bytes(&mut self, bytes: &mut [u8]) -> Result<(), RandomError> {
        for chunk in bytes.chunks_mut(RNG_BLOCK_LEN) {
            let block = self.generator.generate_block()?;
            chunk.copy_from_slice(&block[..chunk.len()]);
        }
        Ok(())
    }
}

/// Scheduler tick counter, advanced from the tick interrupt.
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: AtomicU32,
}

impl TickCounter {
    /// Creates a counter at zero. Usable in `static` initialisers.
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Advances the counter by one tick, wrapping on overflow.
    pub fn on_tick(&self) {
        let _ = self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Ticks counted so far.
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// A [`TimeSource`] reading this counter.
    pub fn clock(&self) -> TickClock<'_> {
        TickClock { counter: self }
    }
}

/// [`TimeSource`] backed by a [`TickCounter`].
#[derive(Debug, Clone, Copy)]
pub struct TickClock<'a> {
    counter: &'a TickCounter,
}

impl TimeSource for TickClock<'_> {
    fn now_ms(&self) -> u32 {
        self.counter.ticks().wrapping_mul(TICK_MS)
    }
}
