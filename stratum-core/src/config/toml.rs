//! TOML machine configuration
//!
//! Every section and key is optional; missing values fall back to
//! [`MachineConfig::default`]. The parsed result is validated before it is
//! returned.
//!
//! ```toml
//! [kinematics.delta]
//! radius = 124.0
//! diagonal_rod = 250.0
//! height = 250.0
//!
//! [leveling]
//! mode = "bilinear"
//! grid_points = [5, 5]
//! subdivision = 3
//! fade_height = 10.0
//! ```

use super::{ConfigError, MachineConfig};

/// Parse and validate a TOML configuration
pub fn parse_config(input: &str) -> Result<MachineConfig, ConfigError> {
    let config: MachineConfig = ::toml::from_str(input).map_err(|_| {
        warn!("machine config is not valid TOML");
        ConfigError::Parse
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HomeDirection, KinematicsConfig, LevelingMode, ProbeTouch};

    #[test]
    fn test_empty_input_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, MachineConfig::default());
    }

    #[test]
    fn test_parse_delta_machine() {
        let input = r#"
[kinematics.delta]
radius = 100.0
diagonal_rod = 220.0
height = 300.0
printable_radius = 80.0
endstop_adj = [0.0, -0.5, -1.0]

[z]
home_dir = "max"
max_pos = 300.0

[leveling]
mode = "bilinear"
grid_points = [5, 5]
grid_min = [-80.0, -80.0]
grid_max = [80.0, 80.0]
fade_height = 10.0
subdivision = 3

[probe]
touch = { average = 3 }
offset = [0.0, 20.0, -1.5]
"#;
        let config = parse_config(input).unwrap();
        let KinematicsConfig::Delta(delta) = config.kinematics else {
            panic!("expected delta kinematics");
        };
        assert_eq!(delta.radius, 100.0);
        assert_eq!(delta.endstop_adj, [0.0, -0.5, -1.0]);
        assert_eq!(delta.segments_per_second, 200.0);
        assert_eq!(config.z.home_dir, HomeDirection::Max);
        assert_eq!(config.leveling.mode, LevelingMode::Bilinear);
        assert_eq!(config.leveling.fade_height, Some(10.0));
        assert_eq!(config.probe.touch, ProbeTouch::Average(3));
        assert_eq!(config.probe.offset[2], -1.5);
    }

    #[test]
    fn test_unit_kinematics() {
        let config = parse_config("kinematics = \"core_xy\"\n").unwrap();
        assert_eq!(config.kinematics, KinematicsConfig::CoreXy);
    }

    #[test]
    fn test_syntax_error() {
        assert_eq!(parse_config("[x\nmin_pos = "), Err(ConfigError::Parse));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let input = "[leveling]\nmode = \"mesh\"\ngrid_points = [1, 1]\n";
        assert_eq!(parse_config(input), Err(ConfigError::InvalidGrid));
    }
}
