//! Security-warning escalation.
//!
//! Isolated security warnings on received frames are tolerated: replay
//! windows and bus noise produce them now and then. A run of consecutive
//! warnings means the local session state has drifted, and only a fresh
//! handshake (requester) or a forced renewal (authority) repairs it.
//!
//! [`WarningEscalation`] counts consecutive warnings and tells the caller when
//! to resynchronise. The count survives only until the next non-warning
//! outcome or the resync itself.

use crate::consts::MAX_SECURITY_WARNINGS;
use crate::engine::{EngineError, SecurityWarning};

/// What the caller must do after recording an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Verdict {
    /// Not a warning; the run of warnings, if any, is over.
    Clear,
    /// A tolerated warning. Report it.
    Warned(SecurityWarning),
    /// A warning that exceeded the threshold. Report it, then resynchronise.
    Resync(SecurityWarning),
}

/// Counter of consecutive security warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningEscalation {
    count: u8,
    threshold: u8,
}

impl WarningEscalation {
    /// Resyncs once more than `threshold` consecutive warnings were recorded.
    pub const fn new(threshold: u8) -> Self {
        Self {
            count: 0,
            threshold,
        }
    }

    /// Current run length.
    pub const fn count(&self) -> u8 {
        self.count
    }

    /// Records one receive outcome.
    pub fn record<T>(&mut self, outcome: &Result<T, EngineError>) -> Verdict {
        match outcome {
            Err(EngineError::SecurityWarning(warning)) => self.record_warning(*warning),
            _ => {
                self.count = 0;
                Verdict::Clear
            }
        }
    }

    fn record_warning(&mut self, warning: SecurityWarning) -> Verdict {
        self.count = self.count.saturating_add(1);
        if self.count > self.threshold {
            warn!("{} consecutive security warnings, resync", self.count);
            self.count = 0;
            Verdict::Resync(warning)
        } else {
            warn!("security warning {:?} ({} in a row)", warning, self.count);
            Verdict::Warned(warning)
        }
    }
}

impl Default for WarningEscalation {
    fn default() -> Self {
        Self::new(MAX_SECURITY_WARNINGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WARNING: Result<(), EngineError> =
        Err(EngineError::SecurityWarning(SecurityWarning::InvalidTag));
    const IGNORED: Result<(), EngineError> = Err(EngineError::Ignored);
    const OK: Result<(), EngineError> = Ok(());

    #[test]
    fn test_sixth_consecutive_warning_resyncs_once() {
        let mut escalation = WarningEscalation::default();
        for n in 1..=5 {
            assert_eq!(
                escalation.record(&WARNING),
                Verdict::Warned(SecurityWarning::InvalidTag)
            );
            assert_eq!(escalation.count(), n);
        }
        assert_eq!(
            escalation.record(&WARNING),
            Verdict::Resync(SecurityWarning::InvalidTag)
        );
        assert_eq!(escalation.count(), 0);
        // The run starts over after the resync.
        assert_eq!(
            escalation.record(&WARNING),
            Verdict::Warned(SecurityWarning::InvalidTag)
        );
        assert_eq!(escalation.count(), 1);
    }

    #[test]
    fn test_interleaved_non_warning_resets_the_run() {
        let mut escalation = WarningEscalation::default();
        for _ in 0..3 {
            let _ = escalation.record(&WARNING);
        }
        assert_eq!(escalation.record(&IGNORED), Verdict::Clear);
        assert_eq!(escalation.count(), 0);
        for _ in 0..5 {
            assert!(matches!(escalation.record(&WARNING), Verdict::Warned(_)));
        }
        assert_eq!(escalation.record(&OK), Verdict::Clear);
        assert_eq!(escalation.count(), 0);
    }

    #[test]
    fn test_custom_threshold() {
        let mut escalation = WarningEscalation::new(1);
        assert!(matches!(escalation.record(&WARNING), Verdict::Warned(_)));
        assert!(matches!(escalation.record(&WARNING), Verdict::Resync(_)));
    }
}
