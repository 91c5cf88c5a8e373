//! The reactive dispatch loop.
//!
//! [`Node`] is the body of the single task doing all protocol and
//! transmission work. It owns the protocol engine (the protocol context), the
//! transmit half of the bus driver, the periodic timer, the indicator and the
//! consumer halves of the frame queue and event signal.
//!
//! ```text
//! Initializing ──ok──▶ Running ──button 1──▶ ShuttingDown ──ok──▶ Halted(PoweredDown)
//!      │                  │                       │
//!      └──────────────────┴───────── fatal ───────┴─────────────▶ Halted(Fatal)
//! ```
//!
//! Each `Running` iteration waits a bounded time for one frame, processes it,
//! then handles every event bit signalled since the previous iteration. Only
//! an external reset leaves `Halted`.

use core::fmt::{self, Write};

use crate::bus::{BusDriver, PeriodicTimer};
use crate::config::Config;
use crate::consts::{BROADCAST_GROUP, MAX_NOTICE_LEN, PERIODIC_PADDING, PERIODIC_PLAINTEXT_LEN, RX_QUEUE_SLOTS};
use crate::engine::{EngineError, ProtocolEngine, Received, UserData};
use crate::escalation::{Verdict, WarningEscalation};
use crate::events::{EventSignal, Events};
use crate::fatal::{self, FatalError};
use crate::frame::Frame;
use crate::led::{Indicator, Status};
use crate::queue::FrameReceiver;
use crate::transmit::Transmitter;
use embedded_hal::delay::DelayNs;
use heapless::String;

const NOTICE_WAITING_FOR_RESPONSE: &str = "INFO: Not requesting yet, still waiting for RES";
const NOTICE_NO_CLIENTS_FOR_RENEWAL: &str = "INFO: No Clients to send REN to";
const NOTICE_SESSION_NOT_ESTABLISHED: &str = "INFO: Session not established, cannot RX yet";
const NOTICE_TOO_MANY_WARNINGS: &str = "INFO: too many secwarnings";
const NOTICE_PROCESS_RX_OTHER: &str = "ERROR: unexpected problem with process RX";
const NOTICE_NO_REQUEST_YET: &str = "INFO: Cannot TX yet, no REQ so far";
const NOTICE_NO_RESPONSE_YET: &str = "INFO: Cannot TX yet, no RES yet";
const NOTICE_BUILD_SECURED_OTHER: &str = "ERRO: problem with building SADFD";
const NOTICE_CANNOT_POWER_DOWN: &str = "INFO: the Server cannot be powered down";
const NOTICE_POWERING_DOWN: &str = "INFO: powering down";

/// Why the node stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum HaltReason {
    /// Orderly shutdown from button 1.
    PoweredDown,
    /// An unrecoverable error.
    Fatal(FatalError),
}

/// Lifecycle state of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum NodeState {
    /// Collaborators not set up yet.
    Initializing,
    /// Servicing frames and events.
    Running,
    /// Shutdown requested; teardown pending.
    ShuttingDown,
    /// Terminal.
    Halted(HaltReason),
}

/// Hardware collaborators driven by the dispatch task.
#[derive(Debug)]
pub struct Peripherals<B, T, L, D> {
    /// Transmit and lifecycle half of the bus driver.
    pub bus: B,
    /// Periodic transmission timer.
    pub timer: T,
    /// Status indicator.
    pub led: L,
    /// Task delay, also used for the halt patterns.
    pub delay: D,
}

enum Flow {
    Continue,
    PowerDown,
}

/// The dispatch task.
pub struct Node<'a, E, B, T, L, D, const N: usize = RX_QUEUE_SLOTS>
where
    E: ProtocolEngine,
{
    config: Config,
    engine: E,
    engine_io: Option<(E::Rng, E::Clock)>,
    bus: B,
    timer: T,
    led: L,
    delay: D,
    events: &'a EventSignal,
    frames: FrameReceiver<'a, N>,
    transmitter: Transmitter,
    escalation: WarningEscalation,
    counter: u8,
    state: NodeState,
}

impl<'a, E, B, T, L, D, const N: usize> Node<'a, E, B, T, L, D, N>
where
    E: ProtocolEngine,
    B: BusDriver,
    T: PeriodicTimer,
    L: Indicator,
    D: DelayNs,
{
    /// Assembles a node in the `Initializing` state. Nothing is touched yet.
    ///
    /// `rng` and `clock` are handed to the engine when it is initialised.
    pub fn new(
        config: Config,
        engine: E,
        rng: E::Rng,
        clock: E::Clock,
        peripherals: Peripherals<B, T, L, D>,
        events: &'a EventSignal,
        frames: FrameReceiver<'a, N>,
    ) -> Self {
        let Peripherals {
            bus,
            timer,
            led,
            delay,
        } = peripherals;
        Self {
            config,
            engine,
            engine_io: Some((rng, clock)),
            bus,
            timer,
            led,
            delay,
            events,
            frames,
            transmitter: Transmitter::from_config(&config),
            escalation: WarningEscalation::new(config.max_security_warnings),
            counter: config.counter_start,
            state: NodeState::Initializing,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Configuration the node runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rolling counter value of the next periodic message.
    pub fn counter(&self) -> u8 {
        self.counter
    }

    /// Consecutive security warnings seen so far.
    pub fn warnings(&self) -> u8 {
        self.escalation.count()
    }

    /// The protocol engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Performs one state transition, or one loop iteration while `Running`.
    pub fn step(&mut self) {
        self.state = match self.state {
            NodeState::Initializing => match self.initialize() {
                Ok(()) => NodeState::Running,
                Err(e) => NodeState::Halted(HaltReason::Fatal(e)),
            },
            NodeState::Running => match self.iterate() {
                Ok(Flow::Continue) => NodeState::Running,
                Ok(Flow::PowerDown) => NodeState::ShuttingDown,
                Err(e) => NodeState::Halted(HaltReason::Fatal(e)),
            },
            NodeState::ShuttingDown => match self.shutdown() {
                Ok(()) => NodeState::Halted(HaltReason::PoweredDown),
                Err(e) => NodeState::Halted(HaltReason::Fatal(e)),
            },
            halted @ NodeState::Halted(_) => halted,
        };
    }

    /// Runs the node until it halts, then shows the halt pattern forever.
    pub fn run(mut self) -> ! {
        let reason = loop {
            if let NodeState::Halted(reason) = self.state {
                break reason;
            }
            self.step();
        };
        match reason {
            HaltReason::Fatal(error) => fatal::halt(self.led, self.delay, error),
            HaltReason::PoweredDown => loop {
                fatal::blink_power_down(&mut self.led, &mut self.delay);
            },
        }
    }

    /// Takes the node apart.
    pub fn release(self) -> (E, Peripherals<B, T, L, D>) {
        (
            self.engine,
            Peripherals {
                bus: self.bus,
                timer: self.timer,
                led: self.led,
                delay: self.delay,
            },
        )
    }

    fn initialize(&mut self) -> Result<(), FatalError> {
        self.bus.init().map_err(|_| FatalError::BusInit)?;
        self.timer
            .start(self.config.tx_period_ticks)
            .map_err(|_| FatalError::TimerStart)?;
        let (rng, clock) = self.engine_io.take().ok_or(FatalError::EngineInit)?;
        self.engine
            .initialize(rng, clock)
            .map_err(|_| FatalError::EngineInit)?;

        let mut text: String<MAX_NOTICE_LEN> = String::new();
        write!(
            text,
            "INFO: CBS node v{} role={}",
            env!("CARGO_PKG_VERSION"),
            self.config.role.name()
        )
        .map_err(|_| FatalError::BuildNotice)?;
        self.notice(&text)?;
        info!("node {:x} ready as {}", self.config.node_id.as_raw(), self.config.role.name());

        if self.config.role.renews_sessions() {
            self.led.show(Status::WaitingForRequest);
        }
        self.request_handshake()
    }

    fn iterate(&mut self) -> Result<Flow, FatalError> {
        if let Some(frame) = self
            .frames
            .receive_timeout(&mut self.delay, self.config.rx_pop_timeout_ticks)
        {
            trace!("frame from {:x}, {} bytes", frame.bus_address().as_raw(), frame.payload_len());
            self.process_frame(&frame)?;
        }

        let events = self.events.consume();
        if events.is_empty() {
            return Ok(Flow::Continue);
        }
        trace!("events {:x}", events.bits());
        if events.contains(Events::RECEIVE_FAILED) {
            error!("receive interrupt could not re-arm reception");
            return Err(FatalError::BusReceive);
        }

        let mut flow = Flow::Continue;
        if events.contains(Events::TX_TIMER_EXPIRED) {
            self.transmit_periodic()?;
        }
        if events.contains(Events::BUTTON_1_PRESSED) {
            if self.config.role.can_power_down() {
                flow = Flow::PowerDown;
            } else {
                self.notice(NOTICE_CANNOT_POWER_DOWN)?;
            }
        }
        if events.contains(Events::BUTTON_2_PRESSED) {
            info!("manual session resync");
            self.renew_session()?;
            self.request_handshake()?;
        }
        Ok(flow)
    }

    fn shutdown(&mut self) -> Result<(), FatalError> {
        info!("powering down");
        self.notice(NOTICE_POWERING_DOWN)?;
        self.engine
            .deinitialize()
            .map_err(|_| FatalError::EngineDeinit)?;
        self.bus.deinit().map_err(|_| FatalError::BusDeinit)
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<(), FatalError> {
        let outcome = self.engine.process_received(frame);
        let verdict = self.escalation.record(&outcome);
        match outcome {
            Ok(received) => self.on_valid(received),
            Err(EngineError::Ignored) => {
                debug!("frame from {:x} ignored", frame.bus_address().as_raw());
                self.led.show(Status::Ignored);
                Ok(())
            }
            Err(EngineError::SessionNotEstablished) => {
                self.led.show(Status::WaitingForResponse);
                self.notice(NOTICE_SESSION_NOT_ESTABLISHED)?;
                self.request_handshake()
            }
            Err(EngineError::SecurityWarning(_)) => self.on_security_warning(verdict),
            Err(_e) => {
                error!("processing a received frame failed: {:?}", _e);
                self.led.show(Status::ProcessRxOther);
                self.notice(NOTICE_PROCESS_RX_OTHER)?;
                if self.config.other_failure_fatal {
                    Err(FatalError::ProcessReceived)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn on_valid(&mut self, received: Received) -> Result<(), FatalError> {
        let Received { reaction, user_data } = received;
        // Reactions (a response to a request, say) go out before anything else.
        if !reaction.is_empty() {
            self.send(&reaction)?;
        }
        if !user_data.is_trusted_application_data() {
            return Ok(());
        }
        self.led.show(Status::Decrypted);
        self.echo(&user_data)
    }

    fn echo(&mut self, user_data: &UserData) -> Result<(), FatalError> {
        let mut text: String<MAX_NOTICE_LEN> = String::new();
        match user_data.data.first() {
            Some(counter) => write!(
                text,
                "RX GID={:02X},SID={:02X},Secret counter={:02X}",
                user_data.gid, user_data.sid, counter
            ),
            None => write!(text, "RX GID={:02X},SID={:02X}", user_data.gid, user_data.sid),
        }
        .map_err(|_| FatalError::BuildNotice)?;
        self.notice(&text)
    }

    fn on_security_warning(&mut self, verdict: Verdict) -> Result<(), FatalError> {
        self.led.show(Status::SecurityWarning);
        match verdict {
            Verdict::Warned(warning) => self.notice(warning.notice()),
            Verdict::Resync(warning) => {
                self.notice(warning.notice())?;
                self.notice(NOTICE_TOO_MANY_WARNINGS)?;
                self.request_handshake()?;
                self.renew_session()
            }
            Verdict::Clear => Ok(()),
        }
    }

    fn request_handshake(&mut self) -> Result<(), FatalError> {
        if !self.config.role.requests_handshakes() {
            return Ok(());
        }
        match self.engine.build_handshake_request(self.config.group) {
            Ok(request) => {
                info!("sending handshake request");
                self.led.show(Status::WaitingForResponse);
                self.send(&request)
            }
            Err(EngineError::HandshakeOngoing) => {
                self.led.show(Status::WaitingForResponse);
                self.notice(NOTICE_WAITING_FOR_RESPONSE)
            }
            Err(_e) => {
                error!("cannot build handshake request: {:?}", _e);
                Err(FatalError::BuildRequest)
            }
        }
    }

    fn renew_session(&mut self) -> Result<(), FatalError> {
        if !self.config.role.renews_sessions() {
            return Ok(());
        }
        match self.engine.force_session_renewal(self.config.group) {
            Ok(renewal) => {
                info!("sending session renewal");
                self.led.show(Status::WaitingForRequest);
                self.send(&renewal)
            }
            Err(EngineError::NoPotentialReceiver) => {
                self.led.show(Status::NoClientsYet);
                self.notice(NOTICE_NO_CLIENTS_FOR_RENEWAL)
            }
            Err(_e) => {
                error!("cannot build session renewal: {:?}", _e);
                Err(FatalError::BuildRenewal)
            }
        }
    }

    fn transmit_periodic(&mut self) -> Result<(), FatalError> {
        let mut plaintext = [PERIODIC_PADDING; PERIODIC_PLAINTEXT_LEN];
        plaintext[0] = self.counter;
        self.counter = self.counter.wrapping_add(1);

        match self.engine.build_secured(&plaintext, self.config.group) {
            Ok(message) => self.send(&message),
            Err(EngineError::NoPotentialReceiver) => {
                self.led.show(Status::NoClientsYet);
                self.notice(NOTICE_NO_REQUEST_YET)
            }
            Err(EngineError::SessionNotEstablished) => self.request_handshake(),
            Err(EngineError::HandshakeOngoing) => {
                self.led.show(Status::WaitingForResponse);
                self.notice(NOTICE_NO_RESPONSE_YET)
            }
            Err(_e) => {
                error!("cannot build periodic message: {:?}", _e);
                self.led.show(Status::BuildOther);
                self.notice(NOTICE_BUILD_SECURED_OTHER)?;
                if self.config.other_failure_fatal {
                    Err(FatalError::BuildSecured)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Sends a human-readable notice as an unsecured broadcast.
    fn notice(&mut self, text: &str) -> Result<(), FatalError> {
        if text.len() > MAX_NOTICE_LEN {
            return Err(FatalError::BuildNotice);
        }
        let message = self
            .engine
            .build_unsecured(text.as_bytes(), BROADCAST_GROUP)
            .map_err(|_| FatalError::BuildNotice)?;
        self.send(&message)
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), FatalError> {
        let attempts = self
            .transmitter
            .transmit(&mut self.bus, &mut self.delay, payload)?;
        trace!("sent {} bytes after {} attempts", payload.len(), attempts);
        Ok(())
    }
}

impl<E, B, T, L, D, const N: usize> fmt::Debug for Node<'_, E, B, T, L, D, N>
where
    E: ProtocolEngine,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("counter", &self.counter)
            .field("warnings", &self.escalation.count())
            .finish_non_exhaustive()
    }
}
