//! Configuration type definitions
//!
//! These types describe the machine: geometry, axis travel, homing,
//! leveling and probe parameters. They are plain values with sensible
//! defaults; [`MachineConfig::validate`] checks cross-field consistency.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::leveling::{MAX_GRID_POINTS, MAX_SUBDIVISION};
use crate::motion::Axis;

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Axis min is not below max
    InvalidAxisRange(Axis),
    /// Homing feedrate, bump or divisor out of range
    InvalidHoming(Axis),
    /// Geometry cannot be realized (e.g. rod shorter than radius)
    InvalidKinematics,
    /// Grid dimensions or bounds out of range
    InvalidGrid,
    /// Spline subdivision factor out of range
    InvalidSubdivision,
    /// Probe feedrates, weights or touch count out of range
    InvalidProbe,
    /// Configuration text could not be parsed
    Parse,
}

/// Direction an axis homes toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HomeDirection {
    #[default]
    Min,
    Max,
}

impl HomeDirection {
    /// -1.0 toward min, +1.0 toward max
    pub fn sign(self) -> f32 {
        match self {
            HomeDirection::Min => -1.0,
            HomeDirection::Max => 1.0,
        }
    }
}

/// Per-axis travel and homing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AxisConfig {
    /// Minimum travel position (mm, raw)
    pub min_pos: f32,
    /// Maximum travel position (mm, raw)
    pub max_pos: f32,
    /// Which end the homing switch is at
    pub home_dir: HomeDirection,
    /// Fast seek speed (mm/s)
    pub homing_feedrate_mm_s: f32,
    /// Back-off distance before the slow re-approach; 0 disables it
    pub bump_mm: f32,
    /// Slow re-approach speed is `homing_feedrate_mm_s / bump_divisor`
    pub bump_divisor: f32,
    /// Offset between the two endstops of a dual-motor axis
    pub dual_endstop_trim: Option<f32>,
}

impl AxisConfig {
    /// Full travel length
    pub fn max_length(&self) -> f32 {
        self.max_pos - self.min_pos
    }

    /// Raw position of the axis at its homing switch
    pub fn base_home_pos(&self) -> f32 {
        match self.home_dir {
            HomeDirection::Min => self.min_pos,
            HomeDirection::Max => self.max_pos,
        }
    }

    fn z_default() -> Self {
        Self {
            homing_feedrate_mm_s: 4.0,
            bump_mm: 2.0,
            bump_divisor: 4.0,
            ..Self::default()
        }
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            min_pos: 0.0,
            max_pos: 200.0,
            home_dir: HomeDirection::Min,
            homing_feedrate_mm_s: 50.0,
            bump_mm: 5.0,
            bump_divisor: 2.0,
            dual_endstop_trim: None,
        }
    }
}

/// Linear delta geometry
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeltaConfig {
    /// Horizontal distance from the center to each tower's carriage pivot
    pub radius: f32,
    /// Diagonal rod length, pivot to pivot
    pub diagonal_rod: f32,
    /// Per-tower angle correction in degrees
    pub tower_angle_trim: [f32; 3],
    /// Per-tower rod length correction
    pub diagonal_rod_trim: [f32; 3],
    /// Per-tower endstop correction; negative values retract after homing
    pub endstop_adj: [f32; 3],
    /// Nozzle height above the bed when all carriages are homed
    pub height: f32,
    /// Radius of the reachable print area
    pub printable_radius: f32,
    /// Segmentation rate for straight-line moves
    pub segments_per_second: f32,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            radius: 124.0,
            diagonal_rod: 250.0,
            tower_angle_trim: [0.0; 3],
            diagonal_rod_trim: [0.0; 3],
            endstop_adj: [0.0; 3],
            height: 250.0,
            printable_radius: 90.0,
            segments_per_second: 200.0,
        }
    }
}

/// Two-link SCARA geometry
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScaraConfig {
    /// Shoulder to elbow length
    pub link1: f32,
    /// Elbow to effector length
    pub link2: f32,
    /// Position of the shoulder joint in raw coordinates
    pub offset: [f32; 2],
    /// Segmentation rate for straight-line moves
    pub segments_per_second: f32,
}

impl Default for ScaraConfig {
    fn default() -> Self {
        Self {
            link1: 150.0,
            link2: 150.0,
            offset: [100.0, -56.0],
            segments_per_second: 200.0,
        }
    }
}

/// Machine geometry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum KinematicsConfig {
    #[default]
    Cartesian,
    CoreXy,
    CoreXz,
    CoreYz,
    Delta(DeltaConfig),
    Scara(ScaraConfig),
}

/// Homing behavior shared by all axes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HomingConfig {
    /// Home Z at this raw XY point; requires X and Y to be known first
    pub safe_z_point: Option<[f32; 2]>,
    /// Z homes on the bed probe instead of a Z-min switch
    pub z_uses_probe: bool,
}

/// Bed compensation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LevelingMode {
    /// No compensation
    #[default]
    None,
    /// Piecewise-bilinear mesh, every node must be probed
    Mesh,
    /// Bilinear grid with extrapolated gaps and optional spline subdivision
    Bilinear,
    /// Least-squares plane through the probed points
    Plane,
}

/// Bed leveling parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LevelingConfig {
    pub mode: LevelingMode,
    /// Probe points along X and Y
    pub grid_points: [u8; 2],
    /// Raw XY of the first grid node
    pub grid_min: [f32; 2],
    /// Raw XY of the last grid node
    pub grid_max: [f32; 2],
    /// Correction fades to zero at this height; `None` never fades
    pub fade_height: Option<f32>,
    /// Catmull-Rom subdivision factor for bilinear mode; 1 disables it
    pub subdivision: u8,
}

impl LevelingConfig {
    /// Node spacing along X and Y
    pub fn spacing(&self) -> [f32; 2] {
        [
            (self.grid_max[0] - self.grid_min[0]) / f32::from(self.grid_points[0].max(2) - 1),
            (self.grid_max[1] - self.grid_min[1]) / f32::from(self.grid_points[1].max(2) - 1),
        ]
    }
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            mode: LevelingMode::None,
            grid_points: [3, 3],
            grid_min: [10.0, 10.0],
            grid_max: [190.0, 190.0],
            fade_height: None,
            subdivision: 1,
        }
    }
}

/// How many times the probe touches per point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProbeTouch {
    /// One slow touch
    Single,
    /// Fast touch, then slow touch, weighted together
    #[default]
    Double,
    /// N slow touches, averaged
    Average(u8),
}

/// Relative weights of the fast and slow touch in double-touch mode
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProbeWeights {
    pub fast: f32,
    pub slow: f32,
}

impl Default for ProbeWeights {
    fn default() -> Self {
        Self { fast: 2.0, slow: 3.0 }
    }
}

/// Z probe parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProbeConfig {
    /// Probe position relative to the nozzle (X, Y) and trigger height (Z)
    pub offset: [f32; 3],
    /// Z height kept between probe points
    pub clearance_mm: f32,
    /// How far below Z min the probe may travel before giving up
    pub overtravel_mm: f32,
    pub fast_feedrate_mm_s: f32,
    pub slow_feedrate_mm_s: f32,
    /// XY travel speed between points
    pub travel_feedrate_mm_s: f32,
    pub touch: ProbeTouch,
    pub double_touch_weights: ProbeWeights,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            offset: [0.0, 0.0, 0.0],
            clearance_mm: 5.0,
            overtravel_mm: 10.0,
            fast_feedrate_mm_s: 4.0,
            slow_feedrate_mm_s: 2.0,
            travel_feedrate_mm_s: 133.0,
            touch: ProbeTouch::Double,
            double_touch_weights: ProbeWeights::default(),
        }
    }
}

/// Move preparation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionConfig {
    /// Clamp destinations to the travel envelope
    pub soft_endstops: bool,
    /// Drop the E component of moves extruding more than this
    pub max_extrude_length: Option<f32>,
    /// Refuse moves on axes that have not been homed
    pub require_homing: bool,
    /// Feedrate used until the first explicit one
    pub default_feedrate_mm_s: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            soft_endstops: true,
            max_extrude_length: Some(200.0),
            require_homing: false,
            default_feedrate_mm_s: 25.0,
        }
    }
}

/// Complete machine configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MachineConfig {
    pub kinematics: KinematicsConfig,
    pub x: AxisConfig,
    pub y: AxisConfig,
    pub z: AxisConfig,
    pub homing: HomingConfig,
    pub leveling: LevelingConfig,
    pub probe: ProbeConfig,
    pub motion: MotionConfig,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineConfig {
    /// Cartesian machine with a 200 mm cube and no leveling
    pub fn new() -> Self {
        Self {
            kinematics: KinematicsConfig::Cartesian,
            x: AxisConfig::default(),
            y: AxisConfig::default(),
            z: AxisConfig::z_default(),
            homing: HomingConfig::default(),
            leveling: LevelingConfig::default(),
            probe: ProbeConfig::default(),
            motion: MotionConfig::default(),
        }
    }

    /// Delta machine with travel bounds derived from the geometry
    pub fn delta(delta: DeltaConfig) -> Self {
        let r = delta.printable_radius;
        let mut config = Self::new();
        config.kinematics = KinematicsConfig::Delta(delta);
        for axis in [&mut config.x, &mut config.y] {
            axis.min_pos = -r;
            axis.max_pos = r;
            axis.home_dir = HomeDirection::Max;
        }
        config.z.min_pos = 0.0;
        config.z.max_pos = delta.height;
        config.z.home_dir = HomeDirection::Max;
        config.z.homing_feedrate_mm_s = 50.0;
        config.z.bump_mm = 5.0;
        config.z.bump_divisor = 10.0;
        config
    }

    /// SCARA machine with travel bounds around the shoulder joint
    pub fn scara(scara: ScaraConfig) -> Self {
        let reach = scara.link1 + scara.link2;
        let mut config = Self::new();
        config.kinematics = KinematicsConfig::Scara(scara);
        config.x.min_pos = scara.offset[0] - reach;
        config.x.max_pos = scara.offset[0] + reach;
        config.y.min_pos = scara.offset[1] - reach;
        config.y.max_pos = scara.offset[1] + reach;
        config
    }

    /// Axis parameters by logical axis (E has none)
    pub fn axis(&self, axis: Axis) -> Option<&AxisConfig> {
        match axis {
            Axis::X => Some(&self.x),
            Axis::Y => Some(&self.y),
            Axis::Z => Some(&self.z),
            Axis::E => None,
        }
    }

    /// Check value ranges and cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        for axis in Axis::LINEAR {
            let Some(cfg) = self.axis(axis) else {
                continue;
            };
            if !(cfg.min_pos < cfg.max_pos) {
                return Err(ConfigError::InvalidAxisRange(axis));
            }
            if !(cfg.homing_feedrate_mm_s > 0.0) || cfg.bump_mm < 0.0 || !(cfg.bump_divisor >= 1.0) {
                return Err(ConfigError::InvalidHoming(axis));
            }
        }

        match self.kinematics {
            KinematicsConfig::Delta(d) => {
                let rods_ok = d
                    .diagonal_rod_trim
                    .iter()
                    .all(|trim| d.diagonal_rod + trim > d.radius + d.printable_radius);
                if !rods_ok || !(d.height > 0.0) || !(d.segments_per_second > 0.0) {
                    return Err(ConfigError::InvalidKinematics);
                }
            }
            KinematicsConfig::Scara(s) => {
                if !(s.link1 > 0.0) || !(s.link2 > 0.0) || !(s.segments_per_second > 0.0) {
                    return Err(ConfigError::InvalidKinematics);
                }
            }
            _ => {}
        }

        let lv = &self.leveling;
        if lv.mode != LevelingMode::None {
            let [nx, ny] = lv.grid_points;
            let in_range = |n: u8| (2..=MAX_GRID_POINTS).contains(&usize::from(n));
            if !in_range(nx) || !in_range(ny) {
                return Err(ConfigError::InvalidGrid);
            }
            if !(lv.grid_min[0] < lv.grid_max[0]) || !(lv.grid_min[1] < lv.grid_max[1]) {
                return Err(ConfigError::InvalidGrid);
            }
            if matches!(lv.fade_height, Some(h) if h < 0.0) {
                return Err(ConfigError::InvalidGrid);
            }
        }
        if lv.subdivision == 0 || usize::from(lv.subdivision) > MAX_SUBDIVISION {
            return Err(ConfigError::InvalidSubdivision);
        }

        let p = &self.probe;
        let weights = p.double_touch_weights;
        if !(p.fast_feedrate_mm_s > 0.0)
            || !(p.slow_feedrate_mm_s > 0.0)
            || !(p.travel_feedrate_mm_s > 0.0)
            || weights.fast < 0.0
            || weights.slow < 0.0
            || !(weights.fast + weights.slow > 0.0)
            || p.touch == ProbeTouch::Average(0)
        {
            return Err(ConfigError::InvalidProbe);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(MachineConfig::default().validate(), Ok(()));
        assert_eq!(MachineConfig::delta(DeltaConfig::default()).validate(), Ok(()));
        assert_eq!(MachineConfig::scara(ScaraConfig::default()).validate(), Ok(()));
    }

    #[test]
    fn test_inverted_axis_range() {
        let mut config = MachineConfig::default();
        config.y.min_pos = 300.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidAxisRange(Axis::Y)));
    }

    #[test]
    fn test_short_delta_rod_rejected() {
        let delta = DeltaConfig {
            diagonal_rod: 150.0,
            ..DeltaConfig::default()
        };
        assert_eq!(
            MachineConfig::delta(delta).validate(),
            Err(ConfigError::InvalidKinematics)
        );
    }

    #[test]
    fn test_grid_limits() {
        let mut config = MachineConfig::default();
        config.leveling.mode = LevelingMode::Mesh;
        config.leveling.grid_points = [1, 3];
        assert_eq!(config.validate(), Err(ConfigError::InvalidGrid));

        config.leveling.grid_points = [MAX_GRID_POINTS as u8 + 1, 3];
        assert_eq!(config.validate(), Err(ConfigError::InvalidGrid));

        config.leveling.grid_points = [3, 3];
        config.leveling.subdivision = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSubdivision));
    }

    #[test]
    fn test_probe_weights_must_not_cancel() {
        let mut config = MachineConfig::default();
        config.probe.double_touch_weights = ProbeWeights { fast: 0.0, slow: 0.0 };
        assert_eq!(config.validate(), Err(ConfigError::InvalidProbe));
    }

    #[test]
    fn test_base_home_pos() {
        let config = MachineConfig::delta(DeltaConfig::default());
        assert_eq!(config.z.base_home_pos(), 250.0);
        assert_eq!(config.x.base_home_pos(), 90.0);
        assert_eq!(MachineConfig::default().x.base_home_pos(), 0.0);
    }

    #[test]
    fn test_grid_spacing() {
        let config = LevelingConfig {
            grid_points: [3, 5],
            grid_min: [0.0, 0.0],
            grid_max: [100.0, 200.0],
            ..LevelingConfig::default()
        };
        assert_eq!(config.spacing(), [50.0, 50.0]);
    }
}
