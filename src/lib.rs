//! # cbs-node
//!
//! A portable, no_std Rust runtime core for a demo node on a shared CAN FD
//! bus secured by a CBS-style session protocol.
//!
//! The node is a single reactive task multiplexing three event sources into
//! calls against an external secure-messaging protocol engine:
//! - received bus frames, handed over from the receive interrupt through a
//!   lock-free SPSC [`queue`]
//! - a periodic transmit timer and two user buttons, delivered as bits of an
//!   OR-accumulating [`events`] word
//!
//! Outbound traffic goes through a bounded-retry [`transmit`] layer; runs of
//! security warnings trigger a session resync ([`escalation`]); unrecoverable
//! conditions end in a terminal state blinking a diagnostic signature
//! ([`fatal`]).
//!
//! The protocol engine, the register-level bus driver, the timer and the
//! random/time sources are collaborators behind the traits in [`engine`],
//! [`bus`] and [`io`]. Pins and delays are `embedded-hal` 1.0 traits.
//!
//! ## Crate features
//! | Feature     | Description |
//! |-------------|-------------|
//! | `std`       | Disables `#![no_std]` and enables the `std` backends of `critical-section` and `thiserror` |
//! | `defmt-0-3` | Uses `defmt` logging |
//! | `log`       | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cbs_node::config::Config;
//! use cbs_node::events::EventSignal;
//! use cbs_node::node::{Node, Peripherals};
//! use cbs_node::queue::FrameQueue;
//!
//! static EVENTS: EventSignal = EventSignal::new();
//!
//! let (sender, receiver) = FRAMES.init(FrameQueue::new()).split();
//! cbs_node::isr::global_rx_bridge_setup(&RX_BRIDGE, sender, can_rx);
//!
//! let peripherals = Peripherals { bus: can_tx, timer, led, delay };
//! Node::new(Config::alice(), engine, rng, clock, peripherals, &EVENTS, receiver).run();
//! ```
//!
//! ## Integration Notes
//!
//! - Only one node should run per board: the interrupt helpers in [`isr`]
//!   assume a single global receive bridge
//! - The fatal halt masks interrupts through `critical-section` for good, so
//!   the delay handed to the node must also work as a busy-wait
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub use critical_section;
pub use heapless;

pub mod bus;
pub mod config;
pub mod consts;
pub mod engine;
pub mod escalation;
pub mod events;
pub mod fatal;
pub mod frame;
pub mod io;
pub mod isr;
pub mod led;
pub mod node;
pub mod queue;
pub mod transmit;
