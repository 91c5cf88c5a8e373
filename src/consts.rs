//! Constants used across the node runtime.
//!
//! This module gathers the sizing, timing and identity constants of the demo
//! bus: queue depths, retry budgets, scheduler-tick timeouts, the CAN IDs of the
//! four demo parties and the per-party periodic transmission settings.
//!
//! ## Key Concepts
//!
//! - **Ticks**: all timeouts are expressed in scheduler ticks of [`TICK_MS`] milliseconds.
//! - **Frames**: CAN FD frames with 29-bit identifiers and up to 64 payload bytes.
//! - **Notices**: short human-readable ASCII strings sent unsecured on the bus.
//!
//! These values are the defaults picked up by [`Config`](crate::config::Config);
//! override them there rather than editing this module.

use embedded_can::ExtendedId;

/// Length of one scheduler tick, in milliseconds.
pub const TICK_MS: u32 = 1;

/// Maximum payload length (in bytes) of a single CAN FD frame.
pub const MAX_FRAME_PAYLOAD_LEN: usize = 64;

/// Number of received frames the interrupt-to-task queue can hold.
pub const RX_QUEUE_LEN: usize = 8;

/// Slot count of the backing `heapless::spsc::Queue`, which keeps one slot empty.
pub const RX_QUEUE_SLOTS: usize = RX_QUEUE_LEN + 1;

/// How long the dispatch loop waits for a received frame per iteration.
pub const RX_POP_TIMEOUT_TICKS: u32 = 50;

/// Maximum number of blocking send attempts for a single transmission.
pub const TX_TRIES: u8 = 10;

/// Timeout of a single blocking send attempt.
pub const TX_TIMEOUT_TICKS: u32 = 30;

/// Delay between attempts when the bus driver reports being busy.
pub const TX_BUSY_RETRY_TICKS: u32 = 1;

/// Consecutive security warnings tolerated before a resynchronisation is triggered.
///
/// The resync fires on the warning that makes the counter exceed this value.
pub const MAX_SECURITY_WARNINGS: u8 = 5;

/// Group ID every party belongs to.
pub const BROADCAST_GROUP: u8 = 0;

/// Maximum length (in bytes) of a bus notice string.
///
/// Derived from the frame payload minus the unsecured-message header of the protocol.
pub const MAX_NOTICE_LEN: usize = 61;

/// Length of the plaintext of the periodic secured message.
///
/// Only the first byte carries the rolling counter; the rest is padding.
pub const PERIODIC_PLAINTEXT_LEN: usize = 16;

/// Padding byte of the periodic secured message (`0b0101_0101`).
pub const PERIODIC_PADDING: u8 = 0x55;

/// Size of a block produced by a hardware random generator.
pub const RNG_BLOCK_LEN: usize = 16;

/// Duration of each color of the power-down blink pattern.
pub const POWER_DOWN_BLINK_TICKS: u32 = 300;

/// Duration of the first (longer) color of a fatal error signature.
pub const FATAL_LONG_BLINK_MS: u32 = 600;

/// Duration of the second (shorter) color of a fatal error signature.
pub const FATAL_SHORT_BLINK_MS: u32 = 150;

const fn extended_id(raw: u32) -> ExtendedId {
    match ExtendedId::new(raw) {
        Some(id) => id,
        None => panic!("CAN ID does not fit in 29 bits"),
    }
}

/// CAN ID used by the Server (session authority).
pub const CAN_ID_SERVER: ExtendedId = extended_id(0x700);
/// CAN ID used by Alice.
pub const CAN_ID_ALICE: ExtendedId = extended_id(0x70A);
/// CAN ID used by Bob.
pub const CAN_ID_BOB: ExtendedId = extended_id(0x70B);
/// CAN ID used by Charlie.
pub const CAN_ID_CHARLIE: ExtendedId = extended_id(0x70C);

/// Initial rolling counter value of the Server.
pub const COUNTER_START_SERVER: u8 = 0xF0;
/// Initial rolling counter value of Alice.
pub const COUNTER_START_ALICE: u8 = 0xA0;
/// Initial rolling counter value of Bob.
pub const COUNTER_START_BOB: u8 = 0xB0;
/// Initial rolling counter value of Charlie.
pub const COUNTER_START_CHARLIE: u8 = 0xC0;

/// Periodic transmission interval of the Server.
pub const TX_PERIOD_TICKS_SERVER: u32 = 2000;
/// Periodic transmission interval of Alice.
pub const TX_PERIOD_TICKS_ALICE: u32 = 3000;
/// Periodic transmission interval of Bob.
pub const TX_PERIOD_TICKS_BOB: u32 = 4000;
/// Periodic transmission interval of Charlie.
pub const TX_PERIOD_TICKS_CHARLIE: u32 = 5000;
