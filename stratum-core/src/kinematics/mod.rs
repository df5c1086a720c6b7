//! Machine geometry
//!
//! Converts between raw Cartesian coordinates and actuator coordinates.
//! The variant is chosen once from [`KinematicsConfig`] and dispatched
//! through [`KinematicsModel`].

pub mod cartesian;
pub mod delta;
pub mod scara;

pub use cartesian::{Cartesian, CoreKinematics, CorePlane};
pub use delta::Delta;
pub use scara::Scara;

use crate::config::{ConfigError, KinematicsConfig};
use crate::motion::{Actuators, Axis, Xyz};

/// Circular XY envelope of a kinematic machine (raw coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadialEnvelope {
    pub center: [f32; 2],
    pub radius: f32,
}

/// Geometry transform between raw Cartesian space and actuator space
pub trait Kinematics {
    /// Raw Cartesian → actuator coordinates
    ///
    /// Only meaningful for reachable input; callers check
    /// [`is_reachable`](Self::is_reachable) first.
    fn inverse(&self, raw: Xyz) -> Actuators;

    /// Actuator coordinates → raw Cartesian
    fn forward(&self, actuators: Actuators) -> Xyz;

    /// Non-linear geometry: straight lines need segmenting
    fn is_kinematic(&self) -> bool {
        false
    }

    /// Whether the effector can reach this raw XY
    fn is_reachable(&self, _x: f32, _y: f32) -> bool {
        true
    }

    /// Shape of the reachable area, if it is round
    fn envelope(&self) -> Option<RadialEnvelope> {
        None
    }

    /// Segmentation rate for kinematic machines
    fn segments_per_second(&self) -> f32 {
        0.0
    }

    /// Upper bound on segments for a move of `distance` mm
    fn max_segments(&self, _distance: f32) -> Option<u32> {
        None
    }

    /// Actuator displacement produced by moving one axis by `distance`
    ///
    /// `None` when the axis cannot be moved on its own (and therefore cannot
    /// be homed on its own).
    fn axis_motion(&self, axis: Axis, distance: f32) -> Option<Actuators>;
}

/// The configured kinematics
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KinematicsModel {
    Cartesian(Cartesian),
    Core(CoreKinematics),
    Delta(Delta),
    Scara(Scara),
}

impl KinematicsModel {
    /// Build the model and its derived constants from configuration
    pub fn from_config(config: &KinematicsConfig) -> Result<Self, ConfigError> {
        let model = match config {
            KinematicsConfig::Cartesian => Self::Cartesian(Cartesian),
            KinematicsConfig::CoreXy => Self::Core(CoreKinematics::new(CorePlane::Xy)),
            KinematicsConfig::CoreXz => Self::Core(CoreKinematics::new(CorePlane::Xz)),
            KinematicsConfig::CoreYz => Self::Core(CoreKinematics::new(CorePlane::Yz)),
            KinematicsConfig::Delta(d) => Self::Delta(Delta::new(d)?),
            KinematicsConfig::Scara(s) => Self::Scara(Scara::new(s)?),
        };
        Ok(model)
    }

    /// Delta only: raw Z of the nozzle with all carriages at their switches
    pub fn max_height(&self) -> Option<f32> {
        match self {
            Self::Delta(d) => Some(d.height()),
            _ => None,
        }
    }

    /// Whether X and Y are homed together with Z as one carriage group
    pub fn homes_as_group(&self) -> bool {
        matches!(self, Self::Delta(_))
    }
}

impl Kinematics for KinematicsModel {
    fn inverse(&self, raw: Xyz) -> Actuators {
        match self {
            Self::Cartesian(k) => k.inverse(raw),
            Self::Core(k) => k.inverse(raw),
            Self::Delta(k) => k.inverse(raw),
            Self::Scara(k) => k.inverse(raw),
        }
    }

    fn forward(&self, actuators: Actuators) -> Xyz {
        match self {
            Self::Cartesian(k) => k.forward(actuators),
            Self::Core(k) => k.forward(actuators),
            Self::Delta(k) => k.forward(actuators),
            Self::Scara(k) => k.forward(actuators),
        }
    }

    fn is_kinematic(&self) -> bool {
        match self {
            Self::Cartesian(k) => k.is_kinematic(),
            Self::Core(k) => k.is_kinematic(),
            Self::Delta(k) => k.is_kinematic(),
            Self::Scara(k) => k.is_kinematic(),
        }
    }

    fn is_reachable(&self, x: f32, y: f32) -> bool {
        match self {
            Self::Cartesian(k) => k.is_reachable(x, y),
            Self::Core(k) => k.is_reachable(x, y),
            Self::Delta(k) => k.is_reachable(x, y),
            Self::Scara(k) => k.is_reachable(x, y),
        }
    }

    fn envelope(&self) -> Option<RadialEnvelope> {
        match self {
            Self::Cartesian(k) => k.envelope(),
            Self::Core(k) => k.envelope(),
            Self::Delta(k) => k.envelope(),
            Self::Scara(k) => k.envelope(),
        }
    }

    fn segments_per_second(&self) -> f32 {
        match self {
            Self::Cartesian(k) => k.segments_per_second(),
            Self::Core(k) => k.segments_per_second(),
            Self::Delta(k) => k.segments_per_second(),
            Self::Scara(k) => k.segments_per_second(),
        }
    }

    fn max_segments(&self, distance: f32) -> Option<u32> {
        match self {
            Self::Cartesian(k) => k.max_segments(distance),
            Self::Core(k) => k.max_segments(distance),
            Self::Delta(k) => k.max_segments(distance),
            Self::Scara(k) => k.max_segments(distance),
        }
    }

    fn axis_motion(&self, axis: Axis, distance: f32) -> Option<Actuators> {
        match self {
            Self::Cartesian(k) => k.axis_motion(axis, distance),
            Self::Core(k) => k.axis_motion(axis, distance),
            Self::Delta(k) => k.axis_motion(axis, distance),
            Self::Scara(k) => k.axis_motion(axis, distance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeltaConfig, ScaraConfig};

    #[test]
    fn test_from_config_selects_variant() {
        let model = KinematicsModel::from_config(&KinematicsConfig::CoreXy).unwrap();
        assert!(matches!(model, KinematicsModel::Core(_)));
        assert!(!model.is_kinematic());

        let model =
            KinematicsModel::from_config(&KinematicsConfig::Delta(DeltaConfig::default())).unwrap();
        assert!(model.is_kinematic());
        assert!(model.homes_as_group());
        assert_eq!(model.max_height(), Some(250.0));

        let model =
            KinematicsModel::from_config(&KinematicsConfig::Scara(ScaraConfig::default())).unwrap();
        assert!(model.is_kinematic());
        assert!(!model.homes_as_group());
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let scara = ScaraConfig {
            link1: 0.0,
            ..ScaraConfig::default()
        };
        assert_eq!(
            KinematicsModel::from_config(&KinematicsConfig::Scara(scara)),
            Err(ConfigError::InvalidKinematics)
        );
    }
}
