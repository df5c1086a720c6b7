//! Position types shared by the whole motion pipeline
//!
//! Logical positions are what the command layer talks in. Raw positions are
//! logical minus home offset and position shift, and are what kinematics and
//! leveling operate on. Actuator positions are what the executor steps.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Logical axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    X,
    Y,
    Z,
    /// Extruder
    E,
}

impl Axis {
    /// The three linear axes, in homing order
    pub const LINEAR: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Index into `[x, y, z, e]` style arrays
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::E => 3,
        }
    }
}

/// Actuator identifier
///
/// On Cartesian machines A/B/C drive X/Y/Z. Core machines mix them, Delta
/// towers are A/B/C counter-clockwise from front left, and SCARA uses A/B
/// for the shoulder and elbow angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Actuator {
    A,
    B,
    C,
}

impl Actuator {
    pub const ALL: [Actuator; 3] = [Actuator::A, Actuator::B, Actuator::C];

    pub fn index(self) -> usize {
        match self {
            Actuator::A => 0,
            Actuator::B => 1,
            Actuator::C => 2,
        }
    }
}

/// A point in 3D space (raw or logical, depending on context)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Xyz {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Xyz {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Component by linear axis; `E` reads as zero
    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::E => 0.0,
        }
    }

    pub fn set(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::E => {}
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Full logical position including the extruder
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub e: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32, e: f32) -> Self {
        Self { x, y, z, e }
    }

    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::E => self.e,
        }
    }

    pub fn set(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::E => self.e = value,
        }
    }

    pub fn xyz(&self) -> Xyz {
        Xyz::new(self.x, self.y, self.z)
    }

    /// Replace the XYZ components, keeping E
    pub fn with_xyz(self, p: Xyz) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
            e: self.e,
        }
    }

    /// Linear interpolation toward `other` by `t` on every axis
    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
            e: self.e + (other.e - self.e) * t,
        }
    }

    /// True when only Z and/or E differ from `other`
    pub fn same_xy(&self, other: &Position) -> bool {
        self.x == other.x && self.y == other.y
    }
}

/// Actuator coordinates for the three motion actuators
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Actuators {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl Actuators {
    pub const fn new(a: f32, b: f32, c: f32) -> Self {
        Self { a, b, c }
    }

    pub fn get(&self, actuator: Actuator) -> f32 {
        match actuator {
            Actuator::A => self.a,
            Actuator::B => self.b,
            Actuator::C => self.c,
        }
    }

    pub fn set(&mut self, actuator: Actuator, value: f32) {
        match actuator {
            Actuator::A => self.a = value,
            Actuator::B => self.b = value,
            Actuator::C => self.c = value,
        }
    }

    /// `self + delta * scale`, component-wise
    pub fn offset_by(&self, delta: &Actuators, scale: f32) -> Actuators {
        Actuators {
            a: self.a + delta.a * scale,
            b: self.b + delta.b * scale,
            c: self.c + delta.c * scale,
        }
    }

    /// Attach an extruder position to form a full executor target
    pub fn with_e(self, e: f32) -> ActuatorTarget {
        ActuatorTarget {
            a: self.a,
            b: self.b,
            c: self.c,
            e,
        }
    }
}

/// What the executor receives for each queued line
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorTarget {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub e: f32,
}

impl ActuatorTarget {
    pub fn actuators(&self) -> Actuators {
        Actuators::new(self.a, self.b, self.c)
    }
}

/// Per-axis homing flags
///
/// `homed` means the axis was referenced by a successful homing cycle.
/// `known` means the position can be trusted, which homing also implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisFlags {
    homed: [bool; 3],
    known: [bool; 3],
}

impl AxisFlags {
    pub fn is_homed(&self, axis: Axis) -> bool {
        axis != Axis::E && self.homed[axis.index()]
    }

    pub fn is_known(&self, axis: Axis) -> bool {
        axis != Axis::E && self.known[axis.index()]
    }

    pub fn all_homed(&self) -> bool {
        self.homed.iter().all(|h| *h)
    }

    /// Mark an axis as homed (implies known)
    pub fn set_homed(&mut self, axis: Axis) {
        if axis != Axis::E {
            self.homed[axis.index()] = true;
            self.known[axis.index()] = true;
        }
    }

    /// Forget one axis reference
    pub fn clear_axis(&mut self, axis: Axis) {
        if axis != Axis::E {
            self.homed[axis.index()] = false;
            self.known[axis.index()] = false;
        }
    }

    /// Forget every axis reference
    pub fn clear(&mut self) {
        self.homed = [false; 3];
        self.known = [false; 3];
    }
}

/// Mutable motion state owned by the motion system
///
/// `current` is provisional between resyncs: the executor's measured step
/// counts are the ground truth.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionState {
    /// Last position the planner committed to (logical)
    pub current: Position,
    /// Target of the next move (logical)
    pub destination: Position,
    /// M206-style home offset per linear axis
    pub home_offset: Xyz,
    /// G92-style position shift per linear axis
    pub position_shift: Xyz,
    /// Requested feedrate in mm/s
    pub feedrate_mm_s: f32,
    /// Feedrate override in percent
    pub feedrate_percentage: u16,
    /// Active tool (extruder) index
    pub active_tool: u8,
    /// Global stop flag; no motion is queued while set
    pub stopped: bool,
    /// Axis reference flags
    pub axes: AxisFlags,
    position_trusted: bool,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            current: Position::default(),
            destination: Position::default(),
            home_offset: Xyz::default(),
            position_shift: Xyz::default(),
            feedrate_mm_s: 25.0,
            feedrate_percentage: 100,
            active_tool: 0,
            stopped: false,
            axes: AxisFlags::default(),
            position_trusted: true,
        }
    }
}

impl MotionState {
    /// Total offset between logical and raw coordinates on an axis
    pub fn workspace_offset(&self, axis: Axis) -> f32 {
        self.home_offset.get(axis) + self.position_shift.get(axis)
    }

    /// Logical → raw (XYZ only; E passes through)
    pub fn to_raw(&self, p: &Position) -> Position {
        Position {
            x: p.x - self.workspace_offset(Axis::X),
            y: p.y - self.workspace_offset(Axis::Y),
            z: p.z - self.workspace_offset(Axis::Z),
            e: p.e,
        }
    }

    /// Raw → logical (XYZ only; E passes through)
    pub fn to_logical(&self, p: &Position) -> Position {
        Position {
            x: p.x + self.workspace_offset(Axis::X),
            y: p.y + self.workspace_offset(Axis::Y),
            z: p.z + self.workspace_offset(Axis::Z),
            e: p.e,
        }
    }

    /// Feedrate with the override applied
    pub fn scaled_feedrate(&self) -> f32 {
        self.feedrate_mm_s * f32::from(self.feedrate_percentage) * 0.01
    }

    pub fn is_position_trusted(&self) -> bool {
        self.position_trusted
    }

    /// Called after a quick stop; the next motion call must resync first
    pub fn mark_untrusted(&mut self) {
        self.position_trusted = false;
    }

    pub fn mark_trusted(&mut self) {
        self.position_trusted = true;
    }

    pub fn set_current_from_destination(&mut self) {
        self.current = self.destination;
    }

    pub fn set_destination_from_current(&mut self) {
        self.destination = self.current;
    }
}
