//! Capability set of the secure-messaging protocol engine.
//!
//! The engine builds and validates protocol messages and owns all session and
//! handshake state. It is not implemented here: the node drives it through
//! [`ProtocolEngine`] and classifies every non-`Ok` result as an
//! [`EngineError`].
//!
//! The engine value itself is the protocol context. The dispatch loop owns it
//! for its whole lifetime and passes it explicitly to each call.

use crate::frame::{Frame, Payload};
use crate::io::{RandomSource, TimeSource};
use thiserror::Error;

/// Security problem detected in a received frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SecurityWarning {
    /// The authentication tag did not verify.
    #[error("invalid tag")]
    InvalidTag,
    /// The frame claims to come from this very node.
    #[error("message from myself")]
    MessageFromMyself,
    /// A handshake response arrived without a pending request.
    #[error("not expecting a response")]
    NotExpectingResponse,
    /// A message only the authority may send came from someone else.
    #[error("authority-only message")]
    ServerOnlyMessage,
    /// The handshake response arrived after the request timed out.
    #[error("response timeout")]
    ResponseTimeout,
    /// The counter nonce is older than the last accepted one.
    #[error("old counter nonce")]
    OldMessage,
    /// Requests arrive faster than the authority accepts them.
    #[error("denial of service")]
    DenialOfService,
    /// The sender is not in the addressed group.
    #[error("sender not in group")]
    NotInGroup,
    /// The counter nonce overflowed.
    #[error("overflown counter nonce")]
    ReceivedOverflownNonce,
    /// The frame carries an all-zero key.
    #[error("all-zero key")]
    ReceivedZeroKey,
}

impl SecurityWarning {
    /// Bus notice text reporting this warning.
    pub const fn notice(self) -> &'static str {
        match self {
            SecurityWarning::InvalidTag => "WARN: invalid tag",
            SecurityWarning::MessageFromMyself => "WARN: message from myself",
            SecurityWarning::NotExpectingResponse => "WARN: not expecting RES",
            SecurityWarning::ServerOnlyMessage => "WARN: server-only message",
            SecurityWarning::ResponseTimeout => "WARN: RES too late (timeout REQ-to-RES)",
            SecurityWarning::OldMessage => "WARN: old counter nonce",
            SecurityWarning::DenialOfService => "WARN: denial of service",
            SecurityWarning::NotInGroup => "WARN: Client not in REQ Group",
            SecurityWarning::ReceivedOverflownNonce => "WARN: RX overflown counter nonce",
            SecurityWarning::ReceivedZeroKey => "WARN: RX all-zero key",
        }
    }
}

/// Classified non-`Ok` outcome of a protocol engine call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum EngineError {
    /// The frame is not addressed to this node or not of interest in its current state.
    #[error("message ignored")]
    Ignored,
    /// Requester only: no session information obtained yet.
    #[error("session not established")]
    SessionNotEstablished,
    /// Requester only: a handshake request is still awaiting its response.
    #[error("handshake ongoing")]
    HandshakeOngoing,
    /// Authority only: no requester holds session information yet.
    #[error("no potential receiver")]
    NoPotentialReceiver,
    /// The received frame failed an authenticity, freshness or policy check.
    #[error("security warning: {0}")]
    SecurityWarning(SecurityWarning),
    /// The random source failed.
    #[error("cannot generate random bytes")]
    CannotGenerateRandom,
    /// Any other engine error code.
    #[error("engine error {0}")]
    Other(u16),
}

impl EngineError {
    /// The security warning carried by this outcome, if any.
    pub const fn security_warning(self) -> Option<SecurityWarning> {
        match self {
            EngineError::SecurityWarning(warning) => Some(warning),
            _ => None,
        }
    }
}

impl From<SecurityWarning> for EngineError {
    fn from(warning: SecurityWarning) -> Self {
        EngineError::SecurityWarning(warning)
    }
}

/// Application-level view of a processed frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserData {
    /// Whether the frame carried application data rather than protocol-internal traffic.
    pub is_for_user: bool,
    /// Whether the frame was authenticated and encrypted on the bus.
    pub was_secured: bool,
    /// Group the frame was addressed to.
    pub gid: u8,
    /// Source identifier of the sender.
    pub sid: u8,
    /// Decrypted application data.
    pub data: Payload,
}

impl UserData {
    /// Whether this is application data that may be trusted.
    pub fn is_trusted_application_data(&self) -> bool {
        self.is_for_user && self.was_secured
    }
}

/// Successful processing of a received frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Received {
    /// Automatic reaction to transmit immediately. Empty when there is none.
    pub reaction: Payload,
    /// Application view of the received frame.
    pub user_data: UserData,
}

/// Operations the node needs from the protocol engine.
///
/// Each call returns `Ok` or a classified [`EngineError`]; the node decides at
/// every call site which classes are expected, which are benign and which are
/// fatal.
pub trait ProtocolEngine {
    /// Random-byte source handed over at initialisation.
    type Rng: RandomSource;
    /// Monotonic timestamp source handed over at initialisation.
    type Clock: TimeSource;

    /// Sets up the protocol context.
    fn initialize(&mut self, rng: Self::Rng, clock: Self::Clock) -> Result<(), EngineError>;

    /// Wraps `data` in an unsecured message for `group`.
    fn build_unsecured(&mut self, data: &[u8], group: u8) -> Result<Payload, EngineError>;

    /// Authenticates and encrypts `data` into a secured message for `group`.
    fn build_secured(&mut self, data: &[u8], group: u8) -> Result<Payload, EngineError>;

    /// Validates and, where applicable, decrypts one received frame.
    fn process_received(&mut self, frame: &Frame) -> Result<Received, EngineError>;

    /// Requester: builds a request for the current session information.
    fn build_handshake_request(&mut self, group: u8) -> Result<Payload, EngineError>;

    /// Authority: starts a new session and builds the renewal notification.
    fn force_session_renewal(&mut self, group: u8) -> Result<Payload, EngineError>;

    /// Tears the protocol context down.
    fn deinitialize(&mut self) -> Result<(), EngineError>;
}
