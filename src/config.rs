//! Node configuration.
//!
//! [`Config`] bundles the role and identity of a node with the timing and
//! retry budgets of its runtime. The four demo parties have presets; every
//! field is public so a board crate can adjust individual values.

use crate::consts::*;
use embedded_can::ExtendedId;

/// Part a node plays in the session protocol.
///
/// Each role implements only its own half of the resync actions; the other
/// half is a no-op, so callers may trigger both unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Role {
    /// Obtains session information from the authority through handshakes.
    Requester,
    /// Owns the session information and renews it for all requesters.
    Authority,
}

impl Role {
    /// Whether this role sends handshake requests.
    pub const fn requests_handshakes(self) -> bool {
        matches!(self, Role::Requester)
    }

    /// Whether this role forces session renewals.
    pub const fn renews_sessions(self) -> bool {
        matches!(self, Role::Authority)
    }

    /// Whether this role may be powered down from its button.
    ///
    /// The authority must stay up for every requester to keep working.
    pub const fn can_power_down(self) -> bool {
        matches!(self, Role::Requester)
    }

    /// Short name used in the readiness notice.
    pub const fn name(self) -> &'static str {
        match self {
            Role::Requester => "client",
            Role::Authority => "server",
        }
    }
}

/// Runtime configuration of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Protocol role.
    pub role: Role,
    /// CAN ID used for every frame this node transmits.
    pub node_id: ExtendedId,
    /// Initial value of the rolling counter in periodic messages.
    pub counter_start: u8,
    /// Interval of the periodic secured transmission.
    pub tx_period_ticks: u32,
    /// Maximum blocking send attempts per transmission.
    pub tx_tries: u8,
    /// Timeout of a single blocking send attempt.
    pub tx_timeout_ticks: u32,
    /// Bounded wait on the frame queue per dispatch iteration.
    pub rx_pop_timeout_ticks: u32,
    /// Consecutive security warnings tolerated before a resync.
    pub max_security_warnings: u8,
    /// Group every outgoing message is addressed to.
    pub group: u8,
    /// Treat unclassified engine failures on receive and periodic build as fatal.
    pub other_failure_fatal: bool,
}

impl Config {
    /// Configuration with the default budgets for the given identity.
    pub const fn new(role: Role, node_id: ExtendedId, counter_start: u8, tx_period_ticks: u32) -> Self {
        Self {
            role,
            node_id,
            counter_start,
            tx_period_ticks,
            tx_tries: TX_TRIES,
            tx_timeout_ticks: TX_TIMEOUT_TICKS,
            rx_pop_timeout_ticks: RX_POP_TIMEOUT_TICKS,
            max_security_warnings: MAX_SECURITY_WARNINGS,
            group: BROADCAST_GROUP,
            other_failure_fatal: false,
        }
    }

    /// The session authority.
    pub const fn server() -> Self {
        Self::new(
            Role::Authority,
            CAN_ID_SERVER,
            COUNTER_START_SERVER,
            TX_PERIOD_TICKS_SERVER,
        )
    }

    /// Requester "Alice".
    pub const fn alice() -> Self {
        Self::new(
            Role::Requester,
            CAN_ID_ALICE,
            COUNTER_START_ALICE,
            TX_PERIOD_TICKS_ALICE,
        )
    }

    /// Requester "Bob".
    pub const fn bob() -> Self {
        Self::new(
            Role::Requester,
            CAN_ID_BOB,
            COUNTER_START_BOB,
            TX_PERIOD_TICKS_BOB,
        )
    }

    /// Requester "Charlie".
    pub const fn charlie() -> Self {
        Self::new(
            Role::Requester,
            CAN_ID_CHARLIE,
            COUNTER_START_CHARLIE,
            TX_PERIOD_TICKS_CHARLIE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_capabilities_are_disjoint() {
        for role in [Role::Requester, Role::Authority] {
            assert_ne!(role.requests_handshakes(), role.renews_sessions());
        }
        assert!(Role::Requester.can_power_down());
        assert!(!Role::Authority.can_power_down());
    }

    #[test]
    fn test_presets() {
        let server = Config::server();
        assert_eq!(server.role, Role::Authority);
        assert_eq!(server.node_id.as_raw(), 0x700);
        assert_eq!(server.counter_start, 0xF0);

        let ids: [u32; 3] = [Config::alice(), Config::bob(), Config::charlie()]
            .map(|config| {
                assert_eq!(config.role, Role::Requester);
                config.node_id.as_raw()
            });
        assert_eq!(ids, [0x70A, 0x70B, 0x70C]);
    }

    #[test]
    fn test_default_budgets() {
        let config = Config::alice();
        assert_eq!(config.tx_tries, 10);
        assert_eq!(config.tx_timeout_ticks, 30);
        assert_eq!(config.rx_pop_timeout_ticks, 50);
        assert_eq!(config.max_security_warnings, 5);
        assert!(!config.other_failure_fatal);
    }
}
