//! Interfaces to the physical bus driver and the periodic timer.
//!
//! The register-level CAN FD driver lives outside this crate. The node only
//! needs a blocking transmit with a bounded timeout, a way to (re)start the
//! non-blocking reception whose completion interrupt feeds the
//! [`FrameQueue`](crate::queue::FrameQueue), and init/deinit hooks.

use embedded_can::ExtendedId;
use thiserror::Error;

/// Classified failure of a single blocking send attempt.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TxError {
    /// The transmit mailbox is occupied. Usually transient under bus contention.
    #[error("transmit mailbox busy")]
    Busy,
    /// The attempt did not complete within its timeout.
    #[error("transmission timed out")]
    Timeout,
    /// Any other driver failure. Treated as unrecoverable.
    #[error("bus driver failure")]
    Other,
}

/// Transmit and lifecycle half of the bus driver, owned by the dispatch task.
pub trait BusDriver {
    /// Driver-specific initialisation or teardown failure.
    type Error;

    /// Configures the controller and its mailboxes and arms the first reception.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Sends one frame, blocking up to `timeout_ticks` scheduler ticks.
    fn transmit_blocking(
        &mut self,
        id: ExtendedId,
        payload: &[u8],
        timeout_ticks: u32,
    ) -> Result<(), TxError>;

    /// Shuts the controller down.
    fn deinit(&mut self) -> Result<(), Self::Error>;
}

impl<T: BusDriver + ?Sized> BusDriver for &mut T {
    type Error = T::Error;

    fn init(&mut self) -> Result<(), Self::Error> {
        (**self).init()
    }

    fn transmit_blocking(
        &mut self,
        id: ExtendedId,
        payload: &[u8],
        timeout_ticks: u32,
    ) -> Result<(), TxError> {
        (**self).transmit_blocking(id, payload, timeout_ticks)
    }

    fn deinit(&mut self) -> Result<(), Self::Error> {
        (**self).deinit()
    }
}

/// Receive half of the bus driver, owned by the receive interrupt.
pub trait ReceiveArm {
    /// Driver-specific failure to start a reception.
    type Error;

    /// Starts a non-blocking reception into the driver's receive mailbox.
    ///
    /// Completion is reported through the driver's receive interrupt, which
    /// must hand the frame to [`RxBridge::on_receive_complete`](crate::isr::RxBridge::on_receive_complete).
    fn receive_nonblocking(&mut self) -> Result<(), Self::Error>;
}

/// Periodic timer notifying the task on every expiration.
pub trait PeriodicTimer {
    /// Failure to create or start the timer.
    type Error;

    /// Starts an auto-reloading timer with the given period.
    ///
    /// Each expiration must call [`on_tx_timer`](crate::isr::on_tx_timer).
    fn start(&mut self, period_ticks: u32) -> Result<(), Self::Error>;
}
