//! Linear delta kinematics
//!
//! Three vertical towers at 210°, 330° and 90° (front left, front right,
//! back), each with a carriage driving a pair of diagonal rods to the
//! effector. Carriage height for a nozzle position is a closed-form
//! trilateration; the forward transform intersects three spheres.

use super::{Kinematics, RadialEnvelope};
use crate::config::{ConfigError, DeltaConfig};
use crate::math;
use crate::motion::{Actuators, Axis, Xyz};

const TOWER_ANGLES_DEG: [f32; 3] = [210.0, 330.0, 90.0];

/// Delta geometry with derived tower constants
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Delta {
    config: DeltaConfig,
    /// Tower XY positions
    tower: [[f32; 2]; 3],
    /// Squared rod length per tower
    rod2: [f32; 3],
}

impl Delta {
    pub fn new(config: &DeltaConfig) -> Result<Self, ConfigError> {
        let mut delta = Self {
            config: *config,
            tower: [[0.0; 2]; 3],
            rod2: [0.0; 3],
        };
        delta.reconfigure(config)?;
        Ok(delta)
    }

    /// Replace the geometry and rebuild every derived constant
    ///
    /// On error the previous geometry is kept.
    pub fn reconfigure(&mut self, config: &DeltaConfig) -> Result<(), ConfigError> {
        if !(config.radius > 0.0) || !(config.height > 0.0) || !(config.segments_per_second > 0.0) {
            return Err(ConfigError::InvalidKinematics);
        }

        let mut tower = [[0.0; 2]; 3];
        let mut rod2 = [0.0; 3];
        for i in 0..3 {
            let angle = (TOWER_ANGLES_DEG[i] + config.tower_angle_trim[i]).to_radians();
            tower[i] = [
                math::cos(angle) * config.radius,
                math::sin(angle) * config.radius,
            ];
            let rod = config.diagonal_rod + config.diagonal_rod_trim[i];
            if !(rod > config.radius) {
                return Err(ConfigError::InvalidKinematics);
            }
            rod2[i] = rod * rod;
        }

        self.config = *config;
        self.tower = tower;
        self.rod2 = rod2;
        Ok(())
    }

    pub fn config(&self) -> &DeltaConfig {
        &self.config
    }

    pub fn height(&self) -> f32 {
        self.config.height
    }

    pub fn endstop_adj(&self) -> [f32; 3] {
        self.config.endstop_adj
    }

    pub fn tower_position(&self, tower: usize) -> [f32; 2] {
        self.tower[tower]
    }
}

impl Kinematics for Delta {
    fn inverse(&self, raw: Xyz) -> Actuators {
        let carriage = |i: usize| {
            let dx = self.tower[i][0] - raw.x;
            let dy = self.tower[i][1] - raw.y;
            math::sqrt(self.rod2[i] - dx * dx - dy * dy) + raw.z
        };
        Actuators::new(carriage(0), carriage(1), carriage(2))
    }

    fn forward(&self, actuators: Actuators) -> Xyz {
        let [ta, tb, tc] = self.tower;
        let (z1, z2, z3) = (actuators.a, actuators.b, actuators.c);

        // Local frame with tower A's carriage at the origin and X toward B
        let p12 = [tb[0] - ta[0], tb[1] - ta[1], z2 - z1];
        let d = math::sqrt(dot(&p12, &p12));
        let ex = [p12[0] / d, p12[1] / d, p12[2] / d];

        let p13 = [tc[0] - ta[0], tc[1] - ta[1], z3 - z1];
        let i = dot(&ex, &p13);
        let mut ey = [p13[0] - ex[0] * i, p13[1] - ex[1] * i, p13[2] - ex[2] * i];
        let j = math::sqrt(dot(&ey, &ey));
        for v in ey.iter_mut() {
            *v /= j;
        }
        let ez = cross(&ex, &ey);

        let x_new = (self.rod2[0] - self.rod2[1] + d * d) / (d * 2.0);
        let y_new = ((self.rod2[0] - self.rod2[2] + i * i + j * j) * 0.5 - i * x_new) / j;
        let z_new = math::sqrt(self.rod2[0] - math::hypot2(x_new, y_new));

        // The effector hangs below the carriages
        Xyz::new(
            ta[0] + ex[0] * x_new + ey[0] * y_new - ez[0] * z_new,
            ta[1] + ex[1] * x_new + ey[1] * y_new - ez[1] * z_new,
            z1 + ex[2] * x_new + ey[2] * y_new - ez[2] * z_new,
        )
    }

    fn is_kinematic(&self) -> bool {
        true
    }

    fn is_reachable(&self, x: f32, y: f32) -> bool {
        let r = self.config.printable_radius;
        math::hypot2(x, y) <= r * r
    }

    fn envelope(&self) -> Option<RadialEnvelope> {
        Some(RadialEnvelope {
            center: [0.0, 0.0],
            radius: self.config.printable_radius,
        })
    }

    fn segments_per_second(&self) -> f32 {
        self.config.segments_per_second
    }

    /// Only Z moves alone: all three carriages together
    fn axis_motion(&self, axis: Axis, distance: f32) -> Option<Actuators> {
        match axis {
            Axis::Z => Some(Actuators::new(distance, distance, distance)),
            _ => None,
        }
    }
}

fn dot(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
