//! Cartesian and Core (belt-summing) kinematics

use super::Kinematics;
use crate::motion::{Actuators, Axis, Xyz};

/// One actuator per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cartesian;

impl Kinematics for Cartesian {
    fn inverse(&self, raw: Xyz) -> Actuators {
        Actuators::new(raw.x, raw.y, raw.z)
    }

    fn forward(&self, actuators: Actuators) -> Xyz {
        Xyz::new(actuators.a, actuators.b, actuators.c)
    }

    fn axis_motion(&self, axis: Axis, distance: f32) -> Option<Actuators> {
        match axis {
            Axis::X => Some(Actuators::new(distance, 0.0, 0.0)),
            Axis::Y => Some(Actuators::new(0.0, distance, 0.0)),
            Axis::Z => Some(Actuators::new(0.0, 0.0, distance)),
            Axis::E => None,
        }
    }
}

/// Which pair of axes share the two summing motors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CorePlane {
    /// `a = x + y`, `b = x - y`
    Xy,
    /// `a = x + z`, `c = x - z`
    Xz,
    /// `b = y + z`, `c = y - z`
    Yz,
}

impl CorePlane {
    /// Logical axes (p, q) and the actuator slots holding (p + q, p - q)
    fn layout(self) -> (Axis, Axis, usize, usize) {
        match self {
            CorePlane::Xy => (Axis::X, Axis::Y, 0, 1),
            CorePlane::Xz => (Axis::X, Axis::Z, 0, 2),
            CorePlane::Yz => (Axis::Y, Axis::Z, 1, 2),
        }
    }
}

/// Two motors move two axes through a crossed belt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreKinematics {
    plane: CorePlane,
}

impl CoreKinematics {
    pub fn new(plane: CorePlane) -> Self {
        Self { plane }
    }

    pub fn plane(&self) -> CorePlane {
        self.plane
    }
}

impl Kinematics for CoreKinematics {
    fn inverse(&self, raw: Xyz) -> Actuators {
        let (p, q, sum, diff) = self.plane.layout();
        let mut out = raw.to_array();
        let (pv, qv) = (raw.get(p), raw.get(q));
        out[sum] = pv + qv;
        out[diff] = pv - qv;
        let [a, b, c] = out;
        Actuators::new(a, b, c)
    }

    fn forward(&self, actuators: Actuators) -> Xyz {
        let (p, q, sum, diff) = self.plane.layout();
        let m = [actuators.a, actuators.b, actuators.c];
        let mut out = Xyz::from_array(m);
        out.set(p, (m[sum] + m[diff]) * 0.5);
        out.set(q, (m[sum] - m[diff]) * 0.5);
        out
    }

    fn axis_motion(&self, axis: Axis, distance: f32) -> Option<Actuators> {
        if axis == Axis::E {
            return None;
        }
        let mut delta = Xyz::default();
        delta.set(axis, distance);
        Some(self.inverse(delta))
    }
}
