//! Reliable outbound transmission.
//!
//! [`Transmitter`] wraps the bus driver's blocking send with a bounded retry
//! budget. Per attempt:
//!
//! - success returns at once,
//! - [`TxError::Busy`] waits one scheduler tick and retries,
//! - [`TxError::Timeout`] retries immediately, the attempt already waited,
//! - [`TxError::Other`] fails without further attempts.
//!
//! Running out of attempts also fails. On this bus that points at a wiring or
//! hardware fault, so both failures are reported as
//! [`FatalError::BusTransmit`].

use crate::bus::{BusDriver, TxError};
use crate::config::Config;
use crate::consts::{TICK_MS, TX_BUSY_RETRY_TICKS, TX_TIMEOUT_TICKS, TX_TRIES};
use crate::fatal::FatalError;
use embedded_can::ExtendedId;
use embedded_hal::delay::DelayNs;

/// Retry policy for blocking transmissions from one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmitter {
    id: ExtendedId,
    tries: u8,
    timeout_ticks: u32,
}

impl Transmitter {
    /// Sends as `id` with the default budget.
    pub const fn new(id: ExtendedId) -> Self {
        Self {
            id,
            tries: TX_TRIES,
            timeout_ticks: TX_TIMEOUT_TICKS,
        }
    }

    /// Sends as the configured node with the configured budget.
    pub const fn from_config(config: &Config) -> Self {
        Self {
            id: config.node_id,
            tries: config.tx_tries,
            timeout_ticks: config.tx_timeout_ticks,
        }
    }

    /// Maximum attempts per transmission.
    pub const fn tries(&self) -> u8 {
        self.tries
    }

    /// Delivers `payload`, retrying transient failures.
    ///
    /// # Returns
    /// - `Ok(n)`: delivered on attempt `n`
    /// - `Err(FatalError::BusTransmit)`: a non-retryable driver error, or all attempts used up
    pub fn transmit<B, D>(&self, bus: &mut B, delay: &mut D, payload: &[u8]) -> Result<u8, FatalError>
    where
        B: BusDriver,
        D: DelayNs,
    {
        for attempt in 1..=self.tries {
            match bus.transmit_blocking(self.id, payload, self.timeout_ticks) {
                Ok(()) => return Ok(attempt),
                Err(TxError::Busy) => {
                    debug!("tx busy, attempt {}", attempt);
                    delay.delay_ms(TX_BUSY_RETRY_TICKS * TICK_MS);
                }
                Err(TxError::Timeout) => {
                    debug!("tx timeout, attempt {}", attempt);
                }
                Err(TxError::Other) => {
                    error!("tx driver failure on attempt {}", attempt);
                    return Err(FatalError::BusTransmit);
                }
            }
        }
        error!("tx failed after {} attempts", self.tries);
        Err(FatalError::BusTransmit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedBus {
        script: Vec<Result<(), TxError>>,
        attempts: usize,
        last_timeout: u32,
        last_id: u32,
    }

    impl ScriptedBus {
        fn new(script: Vec<Result<(), TxError>>) -> Self {
            Self {
                script,
                attempts: 0,
                last_timeout: 0,
                last_id: 0,
            }
        }
    }

    impl BusDriver for ScriptedBus {
        type Error = ();

        fn init(&mut self) -> Result<(), ()> {
            Ok(())
        }

        fn transmit_blocking(
            &mut self,
            id: ExtendedId,
            _payload: &[u8],
            timeout_ticks: u32,
        ) -> Result<(), TxError> {
            let result = self
                .script
                .get(self.attempts)
                .copied()
                .unwrap_or(Err(TxError::Busy));
            self.attempts += 1;
            self.last_timeout = timeout_ticks;
            self.last_id = id.as_raw();
            result
        }

        fn deinit(&mut self) -> Result<(), ()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct TickDelay {
        elapsed_ms: u32,
    }

    impl DelayNs for TickDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.elapsed_ms += ns / 1_000_000;
        }
    }

    fn transmitter() -> Transmitter {
        Transmitter::from_config(&Config::alice())
    }

    #[test]
    fn test_first_attempt_success() {
        let mut bus = ScriptedBus::new(vec![Ok(())]);
        let mut delay = TickDelay::default();
        assert_eq!(transmitter().transmit(&mut bus, &mut delay, &[1, 2]), Ok(1));
        assert_eq!(bus.attempts, 1);
        assert_eq!(bus.last_timeout, TX_TIMEOUT_TICKS);
        assert_eq!(bus.last_id, 0x70A);
        assert_eq!(delay.elapsed_ms, 0);
    }

    #[test]
    fn test_busy_then_success_uses_k_plus_one_attempts() {
        for k in 0..10usize {
            let mut script = vec![Err(TxError::Busy); k];
            script.push(Ok(()));
            let mut bus = ScriptedBus::new(script);
            let mut delay = TickDelay::default();
            let result = transmitter().transmit(&mut bus, &mut delay, &[0]);
            assert_eq!(result, Ok(k as u8 + 1));
            assert_eq!(bus.attempts, k + 1);
            assert_eq!(delay.elapsed_ms, k as u32 * TICK_MS);
        }
    }

    #[test]
    fn test_always_busy_is_fatal_after_ten_attempts() {
        let mut bus = ScriptedBus::new(vec![]);
        let mut delay = TickDelay::default();
        let result = transmitter().transmit(&mut bus, &mut delay, &[0]);
        assert_eq!(result, Err(FatalError::BusTransmit));
        assert_eq!(bus.attempts, 10);
    }

    #[test]
    fn test_timeout_retries_without_delay() {
        let mut bus = ScriptedBus::new(vec![
            Err(TxError::Timeout),
            Err(TxError::Timeout),
            Ok(()),
        ]);
        let mut delay = TickDelay::default();
        assert_eq!(transmitter().transmit(&mut bus, &mut delay, &[0]), Ok(3));
        assert_eq!(delay.elapsed_ms, 0);
    }

    #[test]
    fn test_other_error_stops_immediately() {
        let mut bus = ScriptedBus::new(vec![Err(TxError::Busy), Err(TxError::Other), Ok(())]);
        let mut delay = TickDelay::default();
        assert_eq!(
            transmitter().transmit(&mut bus, &mut delay, &[0]),
            Err(FatalError::BusTransmit)
        );
        assert_eq!(bus.attempts, 2);
    }

    #[test]
    fn test_custom_budget() {
        let mut config = Config::bob();
        config.tx_tries = 3;
        let mut bus = ScriptedBus::new(vec![Err(TxError::Timeout); 5]);
        let mut delay = TickDelay::default();
        let transmitter = Transmitter::from_config(&config);
        assert_eq!(transmitter.tries(), 3);
        assert_eq!(
            transmitter.transmit(&mut bus, &mut delay, &[0]),
            Err(FatalError::BusTransmit)
        );
        assert_eq!(bus.attempts, 3);
    }
}
