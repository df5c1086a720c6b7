//! Latched endstop bank
//!
//! The stepper executor polls the bank while lines run. A switch that
//! triggers while the bank is armed is latched until cleared, so a short
//! press between polls of the motion code is never lost.

use stratum_core::traits::{EndstopId, EndstopSensor};

const SLOTS: usize = EndstopId::ALL.len();

pub struct EndstopBank<S> {
    sensors: [Option<S>; SLOTS],
    armed: bool,
    hits: u8,
}

impl<S> Default for EndstopBank<S> {
    fn default() -> Self {
        Self {
            sensors: core::array::from_fn(|_| None),
            armed: false,
            hits: 0,
        }
    }
}

impl<S: EndstopSensor> EndstopBank<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the sensor for `id`, replacing any previous one
    pub fn attach(&mut self, id: EndstopId, sensor: S) -> Option<S> {
        self.sensors[id.index()].replace(sensor)
    }

    pub fn is_fitted(&self, id: EndstopId) -> bool {
        self.sensors[id.index()].is_some()
    }

    /// Arm or disarm latching
    pub fn set_armed(&mut self, armed: bool) {
        self.armed = armed;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Read every fitted sensor
    ///
    /// Returns the mask of switches that latched on this poll; the executor
    /// stops the matching motors. Disarmed polls latch nothing.
    pub fn poll(&mut self) -> u8 {
        if !self.armed {
            return 0;
        }
        let mut new = 0;
        for (i, slot) in self.sensors.iter_mut().enumerate() {
            let Some(sensor) = slot else {
                continue;
            };
            let bit = 1 << i;
            if self.hits & bit == 0 && sensor.is_triggered() {
                new |= bit;
            }
        }
        self.hits |= new;
        new
    }

    pub fn hit(&self, id: EndstopId) -> bool {
        self.hits & (1 << id.index()) != 0
    }

    pub fn clear(&mut self) {
        self.hits = 0;
    }

    /// Current state of one switch, latched or not
    pub fn read(&mut self, id: EndstopId) -> Option<bool> {
        self.sensors[id.index()].as_mut().map(|s| s.is_triggered())
    }
}
