//! Software endstops
//!
//! Logical bounds are the configured raw travel plus home offset and
//! position shift. Cartesian machines clamp each axis independently;
//! kinematic machines clamp XY to a circle and Z separately.

use crate::config::MachineConfig;
use crate::kinematics::{Kinematics, KinematicsModel};
use crate::math;
use crate::motion::{Axis, MotionState, Position, Xyz};

/// Circular XY limit in logical coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadialBound {
    pub center: [f32; 2],
    pub radius: f32,
    pub radius_sq: f32,
}

/// The active software travel limits
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftEnvelope {
    enabled: bool,
    min: Xyz,
    max: Xyz,
    radial: Option<RadialBound>,
}

impl SoftEnvelope {
    pub fn new(config: &MachineConfig, kinematics: &KinematicsModel, state: &MotionState) -> Self {
        let mut envelope = Self {
            enabled: config.motion.soft_endstops,
            min: Xyz::default(),
            max: Xyz::default(),
            radial: None,
        };
        envelope.recompute(config, kinematics, state);
        envelope
    }

    /// Rebuild the bounds after offsets, shift or geometry change
    pub fn recompute(&mut self, config: &MachineConfig, kinematics: &KinematicsModel, state: &MotionState) {
        for axis in Axis::LINEAR {
            let Some(cfg) = config.axis(axis) else {
                continue;
            };
            let offset = state.workspace_offset(axis);
            self.min.set(axis, cfg.min_pos + offset);
            self.max.set(axis, cfg.max_pos + offset);
        }
        if let Some(height) = kinematics.max_height() {
            self.max.z = height + state.workspace_offset(Axis::Z);
        }

        self.radial = kinematics.envelope().map(|_| {
            let center = [(self.min.x + self.max.x) * 0.5, (self.min.y + self.max.y) * 0.5];
            let radius = ((self.max.x - self.min.x) * 0.5).min((self.max.y - self.min.y) * 0.5);
            RadialBound {
                center,
                radius,
                radius_sq: radius * radius,
            }
        });

        debug!(
            "soft endstops x[{}, {}] y[{}, {}] z[{}, {}]",
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn min(&self) -> Xyz {
        self.min
    }

    pub fn max(&self) -> Xyz {
        self.max
    }

    pub fn radial(&self) -> Option<RadialBound> {
        self.radial
    }

    /// Clamp a logical destination into the envelope
    ///
    /// Points already inside are returned unchanged, bit for bit. E is never
    /// touched.
    pub fn clamp(&self, p: Position) -> Position {
        if !self.enabled {
            return p;
        }
        let mut out = p;

        match self.radial {
            Some(bound) => {
                let dx = p.x - bound.center[0];
                let dy = p.y - bound.center[1];
                let dist_sq = math::hypot2(dx, dy);
                if dist_sq > bound.radius_sq {
                    let scale = bound.radius / math::sqrt(dist_sq);
                    out.x = bound.center[0] + dx * scale;
                    out.y = bound.center[1] + dy * scale;
                }
            }
            None => {
                out.x = clamp_axis(p.x, self.min.x, self.max.x);
                out.y = clamp_axis(p.y, self.min.y, self.max.y);
            }
        }
        out.z = clamp_axis(p.z, self.min.z, self.max.z);
        out
    }
}

fn clamp_axis(v: f32, min: f32, max: f32) -> f32 {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeltaConfig, ScaraConfig};
    use proptest::prelude::*;

    fn cartesian() -> SoftEnvelope {
        let config = MachineConfig::default();
        let kin = KinematicsModel::from_config(&config.kinematics).unwrap();
        SoftEnvelope::new(&config, &kin, &MotionState::default())
    }

    fn delta() -> SoftEnvelope {
        let config = MachineConfig::delta(DeltaConfig::default());
        let kin = KinematicsModel::from_config(&config.kinematics).unwrap();
        SoftEnvelope::new(&config, &kin, &MotionState::default())
    }

    #[test]
    fn test_cartesian_per_axis_clamp() {
        let env = cartesian();
        let p = env.clamp(Position::new(-5.0, 250.0, 100.0, 7.0));
        assert_eq!(p, Position::new(0.0, 200.0, 100.0, 7.0));
    }

    #[test]
    fn test_offsets_shift_bounds() {
        let config = MachineConfig::default();
        let kin = KinematicsModel::from_config(&config.kinematics).unwrap();
        let mut state = MotionState::default();
        state.home_offset = Xyz::new(10.0, 0.0, 0.0);
        state.position_shift = Xyz::new(-2.0, 0.0, 0.0);
        let env = SoftEnvelope::new(&config, &kin, &state);
        assert_eq!(env.min().x, 8.0);
        assert_eq!(env.max().x, 208.0);
    }

    #[test]
    fn test_disabled_is_identity() {
        let mut env = cartesian();
        env.set_enabled(false);
        let p = Position::new(-500.0, 900.0, -3.0, 0.0);
        assert_eq!(env.clamp(p), p);
    }

    #[test]
    fn test_delta_radial_clamp_preserves_direction() {
        let env = delta();
        let p = env.clamp(Position::new(120.0, 160.0, 10.0, 0.0));
        // |(120, 160)| = 200 scaled to 90
        assert!((p.x - 54.0).abs() < 1e-3);
        assert!((p.y - 72.0).abs() < 1e-3);
        assert_eq!(p.z, 10.0);
    }

    #[test]
    fn test_delta_z_limited_by_height() {
        let env = delta();
        assert_eq!(env.max().z, 250.0);
        assert_eq!(env.clamp(Position::new(0.0, 0.0, 400.0, 0.0)).z, 250.0);
    }

    #[test]
    fn test_scara_envelope_centered_on_shoulder() {
        let config = MachineConfig::scara(ScaraConfig::default());
        let kin = KinematicsModel::from_config(&config.kinematics).unwrap();
        let env = SoftEnvelope::new(&config, &kin, &MotionState::default());
        let bound = env.radial().unwrap();
        assert_eq!(bound.center, [100.0, -56.0]);
        assert_eq!(bound.radius, 300.0);
    }

    proptest! {
        #[test]
        fn prop_in_bounds_points_untouched(
            x in 0.0f32..=200.0,
            y in 0.0f32..=200.0,
            z in 0.0f32..=200.0,
        ) {
            let p = Position::new(x, y, z, 1.0);
            prop_assert_eq!(cartesian().clamp(p), p);
        }

        #[test]
        fn prop_delta_output_inside_radius(
            x in -500.0f32..500.0,
            y in -500.0f32..500.0,
            z in -50.0f32..500.0,
        ) {
            let env = delta();
            let p = env.clamp(Position::new(x, y, z, 0.0));
            prop_assert!((p.x * p.x + p.y * p.y).sqrt() <= 90.0 + 1e-3);
            prop_assert!(p.z >= 0.0 && p.z <= 250.0);
            if x * x + y * y <= 90.0 * 90.0 {
                prop_assert_eq!(p.x, x);
                prop_assert_eq!(p.y, y);
            }
        }
    }
}
