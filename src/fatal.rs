//! Unrecoverable errors and their diagnostic signatures.
//!
//! A [`FatalError`] ends normal operation for good. The dispatch loop moves to
//! its `Halted` state and [`halt`] alternates the two colors of the error's
//! [`Signature`] on the indicator forever, with interrupts masked. Only an
//! external reset leaves this state.
//!
//! The first color names the stage that failed, the second the operation:
//!
//! | Longer  | Shorter | Failure |
//! |---------|---------|---------|
//! | red     | blue    | bus driver initialisation |
//! | magenta | green   | periodic timer start |
//! | magenta | blue    | bus driver teardown |
//! | yellow  | red     | transmission retries exhausted or driver failure |
//! | yellow  | blue    | receive re-arm |
//! | blue    | red     | protocol engine initialisation |
//! | blue    | green   | handshake request construction |
//! | blue    | magenta | protocol engine teardown |
//! | blue    | yellow  | processing a received frame (strict mode) |
//! | blue    | white   | bus notice construction |
//! | blue    | cyan    | session renewal construction |
//! | blue    | black   | secured message construction (strict mode) |

use core::convert::Infallible;

use crate::consts::{FATAL_LONG_BLINK_MS, FATAL_SHORT_BLINK_MS, POWER_DOWN_BLINK_TICKS, TICK_MS};
use crate::led::{Indicator, RgbColor};
use embedded_hal::delay::DelayNs;
use thiserror::Error;

/// Unrecoverable condition entering the terminal state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum FatalError {
    /// The bus driver could not be initialised.
    #[error("bus driver initialisation failed")]
    BusInit,
    /// The bus driver could not be shut down.
    #[error("bus driver teardown failed")]
    BusDeinit,
    /// A transmission failed after exhausting its retries, or with a non-retryable error.
    #[error("bus transmission failed")]
    BusTransmit,
    /// The reception could not be re-armed after a received frame.
    #[error("bus reception could not be re-armed")]
    BusReceive,
    /// The periodic transmission timer could not be started.
    #[error("periodic timer could not be started")]
    TimerStart,
    /// The protocol engine rejected its initialisation.
    #[error("protocol engine initialisation failed")]
    EngineInit,
    /// The protocol engine rejected its teardown.
    #[error("protocol engine teardown failed")]
    EngineDeinit,
    /// A handshake request could not be built.
    #[error("handshake request construction failed")]
    BuildRequest,
    /// A session renewal could not be built.
    #[error("session renewal construction failed")]
    BuildRenewal,
    /// A bus notice could not be built.
    #[error("bus notice construction failed")]
    BuildNotice,
    /// Processing a received frame failed unexpectedly.
    #[error("unexpected failure processing a received frame")]
    ProcessReceived,
    /// Building the periodic secured message failed unexpectedly.
    #[error("unexpected failure building a secured message")]
    BuildSecured,
}

/// Two-color blink pattern identifying a [`FatalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Signature {
    /// Color shown for [`FATAL_LONG_BLINK_MS`].
    pub longer: RgbColor,
    /// Color shown for [`FATAL_SHORT_BLINK_MS`].
    pub shorter: RgbColor,
}

impl FatalError {
    /// The blink pattern reported for this error.
    pub const fn signature(self) -> Signature {
        use RgbColor::*;
        let (longer, shorter) = match self {
            FatalError::BusInit => (Red, Blue),
            FatalError::TimerStart => (Magenta, Green),
            FatalError::BusDeinit => (Magenta, Blue),
            FatalError::BusTransmit => (Yellow, Red),
            FatalError::BusReceive => (Yellow, Blue),
            FatalError::EngineInit => (Blue, Red),
            FatalError::BuildRequest => (Blue, Green),
            FatalError::EngineDeinit => (Blue, Magenta),
            FatalError::ProcessReceived => (Blue, Yellow),
            FatalError::BuildNotice => (Blue, White),
            FatalError::BuildRenewal => (Blue, Cyan),
            FatalError::BuildSecured => (Blue, Black),
        };
        Signature { longer, shorter }
    }
}

/// Shows one period of the fatal signature of `reason`.
pub fn blink_signature<L: Indicator, D: DelayNs>(led: &mut L, delay: &mut D, reason: FatalError) {
    let signature = reason.signature();
    led.set_color(signature.longer);
    delay.delay_ms(FATAL_LONG_BLINK_MS);
    led.set_color(signature.shorter);
    delay.delay_ms(FATAL_SHORT_BLINK_MS);
}

/// Shows one period of the power-down pattern: red, green, blue, black.
pub fn blink_power_down<L: Indicator, D: DelayNs>(led: &mut L, delay: &mut D) {
    for color in [RgbColor::Red, RgbColor::Green, RgbColor::Blue, RgbColor::Black] {
        led.set_color(color);
        delay.delay_ms(POWER_DOWN_BLINK_TICKS * TICK_MS);
    }
}

/// Reports `reason` forever. Never returns.
///
/// Interrupts stay masked for good by never leaving the critical section, so
/// no frame, timer or button interrupt runs once this is entered. The delay
/// must therefore be a busy-wait that does not depend on interrupts.
pub fn halt<L: Indicator, D: DelayNs>(mut led: L, mut delay: D, reason: FatalError) -> ! {
    error!("fatal: {:?}", reason);
    let _never: Infallible = critical_section::with(|_| {
        led.turn_off();
        loop {
            blink_signature(&mut led, &mut delay, reason);
        }
    });
    match _never {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingLed {
        colors: Vec<RgbColor>,
    }

    impl Indicator for RecordingLed {
        fn set_color(&mut self, color: RgbColor) {
            self.colors.push(color);
        }
    }

    #[derive(Default)]
    struct TickDelay {
        delays_ms: Vec<u32>,
    }

    impl DelayNs for TickDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.delays_ms.push(ns / 1_000_000);
        }
    }

    #[test]
    fn test_signatures_are_distinct() {
        let all = [
            FatalError::BusInit,
            FatalError::BusDeinit,
            FatalError::BusTransmit,
            FatalError::BusReceive,
            FatalError::TimerStart,
            FatalError::EngineInit,
            FatalError::EngineDeinit,
            FatalError::BuildRequest,
            FatalError::BuildRenewal,
            FatalError::BuildNotice,
            FatalError::ProcessReceived,
            FatalError::BuildSecured,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.signature(), b.signature(), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_blink_signature_longer_first() {
        let mut led = RecordingLed::default();
        let mut delay = TickDelay::default();
        blink_signature(&mut led, &mut delay, FatalError::BusTransmit);
        assert_eq!(led.colors, [RgbColor::Yellow, RgbColor::Red]);
        assert_eq!(delay.delays_ms, [FATAL_LONG_BLINK_MS, FATAL_SHORT_BLINK_MS]);
        assert!(FATAL_LONG_BLINK_MS > FATAL_SHORT_BLINK_MS);
    }

    #[test]
    fn test_power_down_pattern() {
        let mut led = RecordingLed::default();
        let mut delay = TickDelay::default();
        blink_power_down(&mut led, &mut delay);
        assert_eq!(
            led.colors,
            [RgbColor::Red, RgbColor::Green, RgbColor::Blue, RgbColor::Black]
        );
        assert_eq!(delay.delays_ms, [300; 4]);
    }
}
