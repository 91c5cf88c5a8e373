//! Interrupt-context halves of the node.
//!
//! Interrupt handlers do the minimum: copy one frame into the
//! [`FrameQueue`](crate::queue::FrameQueue) and re-arm reception, or OR a bit
//! into the [`EventSignal`]. Everything else happens in the dispatch task.
//!
//! The receive bridge can be stored in a global behind `critical_section` so a
//! vector-table handler can reach it:
//!
//! ```rust,ignore
//! static QUEUE: StaticCell<FrameQueue> = StaticCell::new();
//! static RX_BRIDGE: Mutex<RefCell<Option<RxBridge<'static, CanRx>>>> =
//!     global_rx_bridge_init::<CanRx>();
//!
//! let (sender, receiver) = QUEUE.init(FrameQueue::new()).split();
//! global_rx_bridge_setup(&RX_BRIDGE, sender, can_rx);
//!
//! #[interrupt]
//! fn CAN0_ORED_0_15_MB() {
//!     let (id, data) = read_mailbox();
//!     global_rx_complete(&RX_BRIDGE, &EVENTS, id, data);
//! }
//! ```

use core::cell::RefCell;

use crate::bus::ReceiveArm;
use crate::consts::RX_QUEUE_SLOTS;
use crate::events::{EventSignal, Events};
use crate::fatal::FatalError;
use crate::frame::Frame;
use crate::queue::FrameSender;
use critical_section::Mutex;
use embedded_hal::digital::InputPin;

/// Receive-interrupt side of the frame pipeline.
///
/// Owns the producer half of the frame queue and the driver handle used to
/// start the next reception.
#[derive(Debug)]
pub struct RxBridge<'a, R, const N: usize = RX_QUEUE_SLOTS> {
    sender: FrameSender<'a, N>,
    arm: R,
}

impl<'a, R: ReceiveArm, const N: usize> RxBridge<'a, R, N> {
    /// Pairs a queue producer with the driver's receive handle.
    pub fn new(sender: FrameSender<'a, N>, arm: R) -> Self {
        Self { sender, arm }
    }

    /// Handles one completed reception.
    ///
    /// The frame is enqueued (or dropped if the queue is full or the frame is
    /// malformed) and reception is re-armed before returning.
    ///
    /// # Returns
    /// - `Ok(true)`: the frame was queued
    /// - `Ok(false)`: the frame was dropped
    /// - `Err(FatalError::BusReceive)`: reception could not be re-armed
    pub fn on_receive_complete(&mut self, raw_id: u32, data: &[u8]) -> Result<bool, FatalError> {
        let accepted = match Frame::from_raw(raw_id, data) {
            Ok(frame) => {
                let accepted = self.sender.enqueue(frame);
                if !accepted {
                    warn!("rx queue full, frame from {:x} dropped", raw_id);
                }
                accepted
            }
            Err(_e) => {
                warn!("malformed frame from {:x} dropped: {:?}", raw_id, _e);
                false
            }
        };
        self.arm
            .receive_nonblocking()
            .map_err(|_| FatalError::BusReceive)?;
        Ok(accepted)
    }

    /// Frames dropped so far because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.sender.dropped()
    }

    /// Gives the parts back.
    pub fn release(self) -> (FrameSender<'a, N>, R) {
        (self.sender, self.arm)
    }
}

/// The two user buttons, sampled in their shared port interrupt.
///
/// A high level means pressed. There is no debouncing: a bouncing press only
/// sets the same event bit more than once, which collapses in the
/// [`EventSignal`].
#[derive(Debug)]
pub struct Buttons<B1, B2> {
    button_1: B1,
    button_2: B2,
}

impl<B1: InputPin, B2: InputPin> Buttons<B1, B2> {
    /// Takes ownership of the two button pins.
    pub fn new(button_1: B1, button_2: B2) -> Self {
        Self { button_1, button_2 }
    }

    /// Samples both buttons and signals the pressed ones.
    ///
    /// A pin that cannot be read counts as released.
    ///
    /// # Returns
    /// The events signalled by this call.
    pub fn on_interrupt(&mut self, signal: &EventSignal) -> Events {
        let mut pressed = Events::NONE;
        if matches!(self.button_1.is_high(), Ok(true)) {
            pressed |= Events::BUTTON_1_PRESSED;
        }
        if matches!(self.button_2.is_high(), Ok(true)) {
            pressed |= Events::BUTTON_2_PRESSED;
        }
        if !pressed.is_empty() {
            signal.signal(pressed);
        }
        pressed
    }

    /// Gives the pins back.
    pub fn release(self) -> (B1, B2) {
        (self.button_1, self.button_2)
    }
}

/// Periodic timer callback: notifies the task that a periodic message is due.
pub fn on_tx_timer(signal: &EventSignal) {
    signal.signal(Events::TX_TIMER_EXPIRED);
}

/// Used to initialize the global static [`RxBridge`] for use with
/// `critical_section`.
///
/// # Returns
/// * An empty mutable ref-cell
pub const fn global_rx_bridge_init<R: ReceiveArm, const N: usize>()
-> Mutex<RefCell<Option<RxBridge<'static, R, N>>>> {
    Mutex::new(RefCell::new(None))
}

/// Installs the bridge into the global static.
///
/// # Arguments
/// * The global static bridge
/// * The producer half of a `'static` frame queue
/// * The driver's receive handle
pub fn global_rx_bridge_setup<R: ReceiveArm, const N: usize>(
    global_bridge: &'static Mutex<RefCell<Option<RxBridge<'static, R, N>>>>,
    sender: FrameSender<'static, N>,
    arm: R,
) {
    critical_section::with(|cs| {
        let _ = global_bridge
            .borrow(cs)
            .replace(Some(RxBridge::new(sender, arm)));
    });
}

/// Runs the receive-complete handling at each receive interrupt.
///
/// A re-arm failure is signalled to the task as
/// [`Events::RECEIVE_FAILED`], which halts the node. Does nothing before
/// [`global_rx_bridge_setup`].
///
/// # Returns
/// * Whether the frame was queued
pub fn global_rx_complete<R: ReceiveArm, const N: usize>(
    global_bridge: &'static Mutex<RefCell<Option<RxBridge<'static, R, N>>>>,
    signal: &EventSignal,
    raw_id: u32,
    data: &[u8],
) -> bool {
    critical_section::with(|cs| {
        let mut bridge = global_bridge.borrow(cs).borrow_mut();
        let Some(bridge) = bridge.as_mut() else {
            return false;
        };
        match bridge.on_receive_complete(raw_id, data) {
            Ok(accepted) => accepted,
            Err(_) => {
                signal.signal(Events::RECEIVE_FAILED);
                false
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::FrameQueue;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    struct CountingArm {
        armed: usize,
        fail: bool,
    }

    impl ReceiveArm for CountingArm {
        type Error = ();

        fn receive_nonblocking(&mut self) -> Result<(), ()> {
            self.armed += 1;
            if self.fail { Err(()) } else { Ok(()) }
        }
    }

    #[test]
    fn test_every_completion_rearms() {
        let mut queue: FrameQueue<3> = FrameQueue::new();
        let (sender, mut receiver) = queue.split();
        let mut bridge = RxBridge::new(
            sender,
            CountingArm {
                armed: 0,
                fail: false,
            },
        );

        assert_eq!(bridge.on_receive_complete(0x700, &[1]), Ok(true));
        assert_eq!(bridge.on_receive_complete(0x700, &[2]), Ok(true));
        // Full: dropped, but still re-armed.
        assert_eq!(bridge.on_receive_complete(0x700, &[3]), Ok(false));
        // Not a 29-bit identifier.
        assert_eq!(bridge.on_receive_complete(0x2000_0000, &[4]), Ok(false));
        assert_eq!(bridge.dropped(), 1);

        let (_sender, arm) = bridge.release();
        assert_eq!(arm.armed, 4);
        assert_eq!(receiver.try_receive().unwrap().payload(), &[1]);
        assert_eq!(receiver.try_receive().unwrap().payload(), &[2]);
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_rearm_failure_is_fatal() {
        let mut queue: FrameQueue = FrameQueue::new();
        let (sender, mut receiver) = queue.split();
        let mut bridge = RxBridge::new(
            sender,
            CountingArm {
                armed: 0,
                fail: true,
            },
        );
        assert_eq!(
            bridge.on_receive_complete(0x70A, &[9]),
            Err(FatalError::BusReceive)
        );
        // The frame itself made it into the queue before the re-arm.
        assert_eq!(receiver.try_receive().unwrap().payload(), &[9]);
    }

    #[test]
    fn test_buttons_signal_pressed_pins() {
        let button_1 = PinMock::new(&[
            Transaction::get(State::High),
            Transaction::get(State::Low),
        ]);
        let button_2 = PinMock::new(&[
            Transaction::get(State::Low),
            Transaction::get(State::High),
        ]);
        let mut buttons = Buttons::new(button_1, button_2);
        let signal = EventSignal::new();

        assert_eq!(buttons.on_interrupt(&signal), Events::BUTTON_1_PRESSED);
        assert_eq!(buttons.on_interrupt(&signal), Events::BUTTON_2_PRESSED);
        assert_eq!(
            signal.consume(),
            Events::BUTTON_1_PRESSED | Events::BUTTON_2_PRESSED
        );

        let (mut button_1, mut button_2) = buttons.release();
        button_1.done();
        button_2.done();
    }

    #[test]
    fn test_tx_timer_sets_its_bit() {
        let signal = EventSignal::new();
        on_tx_timer(&signal);
        on_tx_timer(&signal);
        assert_eq!(signal.consume(), Events::TX_TIMER_EXPIRED);
    }

    static RX_BRIDGE: Mutex<RefCell<Option<RxBridge<'static, CountingArm, 4>>>> =
        global_rx_bridge_init::<CountingArm, 4>();

    #[test]
    fn test_global_bridge() {
        let signal = EventSignal::new();
        assert!(!global_rx_complete(&RX_BRIDGE, &signal, 0x700, &[1]));

        let queue: &'static mut FrameQueue<4> = Box::leak(Box::new(FrameQueue::new()));
        let (sender, mut receiver) = queue.split();
        global_rx_bridge_setup(
            &RX_BRIDGE,
            sender,
            CountingArm {
                armed: 0,
                fail: false,
            },
        );
        assert!(global_rx_complete(&RX_BRIDGE, &signal, 0x700, &[1]));
        assert_eq!(receiver.try_receive().unwrap().payload(), &[1]);
        assert!(signal.consume().is_empty());

        critical_section::with(|cs| {
            if let Some(bridge) = RX_BRIDGE.borrow(cs).borrow_mut().as_mut() {
                bridge.arm.fail = true;
            }
        });
        assert!(!global_rx_complete(&RX_BRIDGE, &signal, 0x700, &[2]));
        assert_eq!(signal.consume(), Events::RECEIVE_FAILED);
    }
}
