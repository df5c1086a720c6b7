//! Two-link SCARA kinematics
//!
//! Actuator A is the shoulder angle and B the absolute angle of the
//! forearm, both in degrees. C drives Z directly.

use super::{Kinematics, RadialEnvelope};
use crate::config::{ConfigError, ScaraConfig};
use crate::math;
use crate::motion::{Actuators, Axis, Xyz};

/// Shortest segment a SCARA move is split into (mm)
const MIN_SEGMENT_MM: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scara {
    config: ScaraConfig,
}

impl Scara {
    pub fn new(config: &ScaraConfig) -> Result<Self, ConfigError> {
        if !(config.link1 > 0.0) || !(config.link2 > 0.0) || !(config.segments_per_second > 0.0) {
            return Err(ConfigError::InvalidKinematics);
        }
        Ok(Self { config: *config })
    }

    pub fn config(&self) -> &ScaraConfig {
        &self.config
    }
}

impl Kinematics for Scara {
    fn inverse(&self, raw: Xyz) -> Actuators {
        let (l1, l2) = (self.config.link1, self.config.link2);
        let sx = raw.x - self.config.offset[0];
        let sy = raw.y - self.config.offset[1];

        // Elbow angle from the law of cosines
        let c2 = ((math::hypot2(sx, sy) - l1 * l1 - l2 * l2) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
        let s2 = math::sqrt(1.0 - c2 * c2);

        let theta = math::atan2(sy, sx) - math::atan2(l2 * s2, l1 + l2 * c2);
        let psi = math::atan2(s2, c2);

        Actuators::new(theta.to_degrees(), (theta + psi).to_degrees(), raw.z)
    }

    fn forward(&self, actuators: Actuators) -> Xyz {
        let (l1, l2) = (self.config.link1, self.config.link2);
        let a = actuators.a.to_radians();
        let b = actuators.b.to_radians();
        Xyz::new(
            l1 * math::cos(a) + l2 * math::cos(b) + self.config.offset[0],
            l1 * math::sin(a) + l2 * math::sin(b) + self.config.offset[1],
            actuators.c,
        )
    }

    fn is_kinematic(&self) -> bool {
        true
    }

    fn is_reachable(&self, x: f32, y: f32) -> bool {
        let (l1, l2) = (self.config.link1, self.config.link2);
        let r2 = math::hypot2(x - self.config.offset[0], y - self.config.offset[1]);
        let inner = l1 - l2;
        let outer = l1 + l2;
        r2 <= outer * outer && r2 >= inner * inner
    }

    fn envelope(&self) -> Option<RadialEnvelope> {
        Some(RadialEnvelope {
            center: self.config.offset,
            radius: self.config.link1 + self.config.link2,
        })
    }

    fn segments_per_second(&self) -> f32 {
        self.config.segments_per_second
    }

    fn max_segments(&self, distance: f32) -> Option<u32> {
        Some((distance / MIN_SEGMENT_MM) as u32)
    }

    /// Only Z is independent of the arm angles
    fn axis_motion(&self, axis: Axis, distance: f32) -> Option<Actuators> {
        match axis {
            Axis::Z => Some(Actuators::new(0.0, 0.0, distance)),
            _ => None,
        }
    }
}
