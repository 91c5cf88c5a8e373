//! RGB status indicator.
//!
//! The node reports its externally observable state through a single RGB LED.
//! Colors are plain on/off combinations of the three primaries; no intensity
//! control exists. The indicator is diagnostic only and never affects
//! correctness.

use embedded_hal::digital::OutputPin;

/// Primary and secondary colors of the RGB model, as a bitmap of primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum RgbColor {
    /// All primaries off.
    #[default]
    Black = 0,
    /// Red only.
    Red = 1,
    /// Green only.
    Green = 2,
    /// Red and green.
    Yellow = 3,
    /// Blue only.
    Blue = 4,
    /// Red and blue.
    Magenta = 5,
    /// Green and blue.
    Cyan = 6,
    /// All primaries on.
    White = 7,
}

impl RgbColor {
    const RED_BIT: u8 = 1;
    const GREEN_BIT: u8 = 2;
    const BLUE_BIT: u8 = 4;

    /// Builds a color from a bitmap of primaries. Bits above blue are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Black,
            1 => Self::Red,
            2 => Self::Green,
            3 => Self::Yellow,
            4 => Self::Blue,
            5 => Self::Magenta,
            6 => Self::Cyan,
            _ => Self::White,
        }
    }

    /// Bitmap of primaries.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Whether the red primary is on.
    pub const fn has_red(self) -> bool {
        self.bits() & Self::RED_BIT != 0
    }

    /// Whether the green primary is on.
    pub const fn has_green(self) -> bool {
        self.bits() & Self::GREEN_BIT != 0
    }

    /// Whether the blue primary is on.
    pub const fn has_blue(self) -> bool {
        self.bits() & Self::BLUE_BIT != 0
    }
}

/// Recoverable operating states shown on the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Status {
    /// A received frame was ignored by the protocol engine.
    Ignored,
    /// A secured frame was received and decrypted.
    Decrypted,
    /// A handshake request is pending a response.
    WaitingForResponse,
    /// A received frame raised a security warning.
    SecurityWarning,
    /// Processing a received frame failed for another reason.
    ProcessRxOther,
    /// The authority waits for the first handshake request.
    WaitingForRequest,
    /// Building an outgoing secured message failed for another reason.
    BuildOther,
    /// The authority has no requester to send secured data to.
    NoClientsYet,
}

impl Status {
    /// Indicator color of this state.
    pub const fn color(self) -> RgbColor {
        match self {
            Status::Ignored => RgbColor::Black,
            Status::Decrypted => RgbColor::Green,
            Status::WaitingForResponse => RgbColor::Cyan,
            Status::SecurityWarning => RgbColor::Red,
            Status::ProcessRxOther => RgbColor::Yellow,
            Status::WaitingForRequest => RgbColor::Magenta,
            Status::BuildOther => RgbColor::Blue,
            Status::NoClientsYet => RgbColor::White,
        }
    }
}

/// Anything able to display an [`RgbColor`].
pub trait Indicator {
    /// Switches the indicator to exactly `color`.
    fn set_color(&mut self, color: RgbColor);

    /// Shows the color associated with `status`.
    fn show(&mut self, status: Status) {
        self.set_color(status.color());
    }

    /// Switches every primary off.
    fn turn_off(&mut self) {
        self.set_color(RgbColor::Black);
    }
}

impl<T: Indicator + ?Sized> Indicator for &mut T {
    fn set_color(&mut self, color: RgbColor) {
        (**self).set_color(color);
    }
}

/// RGB LED wired to three active-low output pins.
///
/// Driving a pin HIGH pulls the LED cathode to ground and switches that
/// primary off, so every write is inverted.
///
/// ## Example
///
/// ```rust
/// # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
/// use cbs_node::led::{Indicator, RgbColor, RgbLed};
///
/// # let red = Pin::new(&[PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)]);
/// # let green = Pin::new(&[PinTransaction::set(PinState::High), PinTransaction::set(PinState::High)]);
/// # let blue = Pin::new(&[PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)]);
/// let mut led = RgbLed::new(red, green, blue);
/// led.set_color(RgbColor::Magenta);
/// # let (mut r, mut g, mut b) = led.release();
/// # r.done();
/// # g.done();
/// # b.done();
/// ```
#[derive(Debug)]
pub struct RgbLed<R, G, B>
where
    R: OutputPin,
    G: OutputPin,
    B: OutputPin,
{
    red: R,
    green: G,
    blue: B,
    color: RgbColor,
}

impl<R, G, B> RgbLed<R, G, B>
where
    R: OutputPin,
    G: OutputPin,
    B: OutputPin,
{
    /// Takes ownership of the three pins and switches the LED off.
    pub fn new(red: R, green: G, blue: B) -> Self {
        let mut led = Self {
            red,
            green,
            blue,
            color: RgbColor::Black,
        };
        led.write(RgbColor::Black);
        led
    }

    /// The color currently shown.
    pub fn color(&self) -> RgbColor {
        self.color
    }

    /// Turns on the primaries of `color`, leaving the others unchanged.
    pub fn add_primaries(&mut self, color: RgbColor) {
        self.set_color(RgbColor::from_bits(self.color.bits() | color.bits()));
    }

    /// Turns off the primaries of `color`, leaving the others unchanged.
    pub fn remove_primaries(&mut self, color: RgbColor) {
        self.set_color(RgbColor::from_bits(self.color.bits() & !color.bits()));
    }

    /// Toggles the primaries of `color`, leaving the others unchanged.
    pub fn toggle(&mut self, color: RgbColor) {
        self.set_color(RgbColor::from_bits(self.color.bits() ^ color.bits()));
    }

    /// Gives the pins back.
    pub fn release(self) -> (R, G, B) {
        (self.red, self.green, self.blue)
    }

    // Pin errors are ignored: the indicator is best-effort.
    fn write(&mut self, color: RgbColor) {
        let _ = self.red.set_state((!color.has_red()).into());
        let _ = self.green.set_state((!color.has_green()).into());
        let _ = self.blue.set_state((!color.has_blue()).into());
        self.color = color;
    }
}

impl<R, G, B> Indicator for RgbLed<R, G, B>
where
    R: OutputPin,
    G: OutputPin,
    B: OutputPin,
{
    fn set_color(&mut self, color: RgbColor) {
        self.write(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    fn off() -> PinTransaction {
        PinTransaction::set(PinState::High)
    }

    fn on() -> PinTransaction {
        PinTransaction::set(PinState::Low)
    }

    #[test]
    fn test_from_bits_roundtrips_palette() {
        for bits in 0..8u8 {
            assert_eq!(RgbColor::from_bits(bits).bits(), bits);
        }
        assert_eq!(RgbColor::from_bits(0xF9), RgbColor::Red);
    }

    #[test]
    fn test_new_turns_led_off() {
        let red = PinMock::new(&[off()]);
        let green = PinMock::new(&[off()]);
        let blue = PinMock::new(&[off()]);

        let led = RgbLed::new(red, green, blue);
        assert_eq!(led.color(), RgbColor::Black);
        let (mut r, mut g, mut b) = led.release();
        r.done();
        g.done();
        b.done();
    }

    #[test]
    fn test_set_color_drives_pins_active_low() {
        let red = PinMock::new(&[off(), off()]);
        let green = PinMock::new(&[off(), on()]);
        let blue = PinMock::new(&[off(), on()]);

        let mut led = RgbLed::new(red, green, blue);
        led.show(Status::WaitingForResponse);
        assert_eq!(led.color(), RgbColor::Cyan);
        let (mut r, mut g, mut b) = led.release();
        r.done();
        g.done();
        b.done();
    }

    #[test]
    fn test_primary_manipulation() {
        let red = PinMock::new(&[off(), on(), on(), on()]);
        let green = PinMock::new(&[off(), off(), off(), on()]);
        let blue = PinMock::new(&[off(), off(), on(), off()]);

        let mut led = RgbLed::new(red, green, blue);
        led.add_primaries(RgbColor::Red);
        assert_eq!(led.color(), RgbColor::Red);
        led.add_primaries(RgbColor::Blue);
        assert_eq!(led.color(), RgbColor::Magenta);
        led.toggle(RgbColor::Cyan);
        assert_eq!(led.color(), RgbColor::Yellow);
        let (mut r, mut g, mut b) = led.release();
        r.done();
        g.done();
        b.done();
    }

    #[test]
    fn test_remove_primaries() {
        let red = PinMock::new(&[off(), on(), off()]);
        let green = PinMock::new(&[off(), on(), on()]);
        let blue = PinMock::new(&[off(), on(), on()]);

        let mut led = RgbLed::new(red, green, blue);
        led.set_color(RgbColor::White);
        led.remove_primaries(RgbColor::Red);
        assert_eq!(led.color(), RgbColor::Cyan);
        let (mut r, mut g, mut b) = led.release();
        r.done();
        g.done();
        b.done();
    }
}
