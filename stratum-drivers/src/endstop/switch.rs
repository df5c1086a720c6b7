//! GPIO endstop switch
//!
//! Reads a mechanical or optical switch through an `embedded-hal` input pin.

use embedded_hal::digital::InputPin;
use stratum_core::traits::EndstopSensor;

/// Switch on a digital input pin
///
/// Normally-open switches wired to ground with a pull-up read low when
/// pressed, so they are configured inverted.
pub struct EndstopSwitch<P> {
    pin: P,
    /// If true, pressed = pin LOW
    inverted: bool,
}

impl<P: InputPin> EndstopSwitch<P> {
    pub fn new(pin: P, inverted: bool) -> Self {
        Self { pin, inverted }
    }

    /// Pressed when the pin reads high
    pub fn new_active_high(pin: P) -> Self {
        Self::new(pin, false)
    }

    /// Pressed when the pin reads low
    pub fn new_active_low(pin: P) -> Self {
        Self::new(pin, true)
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: InputPin> EndstopSensor for EndstopSwitch<P> {
    fn is_triggered(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(high) => high != self.inverted,
            // An unreadable switch must stop the axis
            Err(_) => true,
        }
    }
}

/// Requires several consecutive triggered reads before reporting a press
///
/// A release is reported immediately.
pub struct Debounced<S> {
    sensor: S,
    samples: u8,
    count: u8,
}

impl<S: EndstopSensor> Debounced<S> {
    pub fn new(sensor: S, samples: u8) -> Self {
        Self {
            sensor,
            samples: samples.max(1),
            count: 0,
        }
    }
}

impl<S: EndstopSensor> EndstopSensor for Debounced<S> {
    fn is_triggered(&mut self) -> bool {
        if self.sensor.is_triggered() {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 0;
        }
        self.count >= self.samples
    }
}
