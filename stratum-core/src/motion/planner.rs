//! Segmented move planner
//!
//! Turns one raw straight-line move into the sequence of actuator-space
//! lines the executor should run:
//!
//! - Kinematic machines split the line into short segments at a fixed
//!   segments-per-second rate so the curved actuator paths approximate it.
//! - Cartesian machines with an active grid surface split the line where it
//!   crosses grid cell boundaries, so the correction is linear along each
//!   piece.
//! - Everything else is a single line.
//!
//! Every produced point is leveled and then inverse-transformed. Segments
//! are produced lazily; the final segment always targets the exact
//! destination.

use heapless::Vec;

use crate::kinematics::{Kinematics, KinematicsModel};
use crate::leveling::{GridLayout, LevelingSurface};
use crate::math;
use crate::motion::{ActuatorTarget, Axis, Position};

/// Pending sub-moves held while splitting at grid lines
///
/// Each split clears one boundary bit and grows the stack by one, so the
/// depth never exceeds the number of grid lines plus one.
const SPLIT_STACK_DEPTH: usize = 64;

/// Why a move was not planned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MoveError {
    /// Destination is outside the reachable area
    Unreachable,
    /// Machine is stopped
    Stopped,
    /// Axis must be homed before it can move
    NotHomed(Axis),
}

/// One line for the executor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Segment {
    /// Raw end point, before leveling
    pub end: Position,
    /// Leveled and inverse-transformed end point
    pub target: ActuatorTarget,
    pub feedrate_mm_s: f32,
}

/// Plans moves against a fixed geometry and leveling surface
pub struct SegmentedMovePlanner<'a> {
    kinematics: &'a KinematicsModel,
    leveling: &'a LevelingSurface,
}

impl<'a> SegmentedMovePlanner<'a> {
    pub fn new(kinematics: &'a KinematicsModel, leveling: &'a LevelingSurface) -> Self {
        Self {
            kinematics,
            leveling,
        }
    }

    /// Plan a raw move from `from` to `to`
    ///
    /// Returns [`MoveError::Unreachable`] when a kinematic destination lies
    /// outside the reachable area. A move with no displacement at all yields
    /// no segments.
    pub fn plan(&self, from: Position, to: Position, feedrate_mm_s: f32) -> Result<Segments<'a>, MoveError> {
        let mode = if self.kinematics.is_kinematic() {
            self.kinematic_mode(from, to, feedrate_mm_s)?
        } else if let (Some(layout), false) = (self.leveling.split_layout(), from.same_xy(&to)) {
            let mut stack = Vec::new();
            // Capacity is non-zero, the first push cannot fail
            let _ = stack.push(Pending {
                end: to,
                x_splits: u32::MAX,
                y_splits: u32::MAX,
            });
            Mode::GridSplit {
                layout,
                start: from,
                stack,
            }
        } else if is_degenerate(&from, &to) {
            Mode::Done
        } else {
            Mode::Single(Some(to))
        };

        Ok(Segments {
            kinematics: self.kinematics,
            leveling: self.leveling,
            feedrate_mm_s,
            mode,
        })
    }

    fn kinematic_mode(&self, from: Position, to: Position, feedrate_mm_s: f32) -> Result<Mode, MoveError> {
        if is_degenerate(&from, &to) {
            return Ok(Mode::Done);
        }
        // Z/E-only moves are straight lines for every geometry
        if from.same_xy(&to) {
            return Ok(Mode::Single(Some(to)));
        }
        if !self.kinematics.is_reachable(to.x, to.y) {
            debug!("unreachable destination ({}, {})", to.x, to.y);
            return Err(MoveError::Unreachable);
        }

        let (dx, dy, dz) = (to.x - from.x, to.y - from.y, to.z - from.z);
        let mut distance = math::sqrt(dx * dx + dy * dy + dz * dz);
        if math::near_zero(distance) {
            distance = math::abs(to.e - from.e);
        }
        if math::near_zero(distance) {
            return Ok(Mode::Done);
        }

        let mut count = if feedrate_mm_s > 0.0 {
            let seconds = distance / feedrate_mm_s;
            math::round(self.kinematics.segments_per_second() * seconds) as u32
        } else {
            1
        };
        if let Some(cap) = self.kinematics.max_segments(distance) {
            count = count.min(cap);
        }
        let count = count.max(1);
        trace!("kinematic move {} mm in {} segments", distance, count);

        Ok(Mode::Kinematic {
            start: from,
            end: to,
            count,
            next: 1,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    end: Position,
    /// Grid lines along X not yet split on, one bit per line index
    x_splits: u32,
    y_splits: u32,
}

enum Mode {
    Done,
    Single(Option<Position>),
    Kinematic {
        start: Position,
        end: Position,
        count: u32,
        next: u32,
    },
    GridSplit {
        layout: GridLayout,
        start: Position,
        stack: Vec<Pending, SPLIT_STACK_DEPTH>,
    },
}

/// Lazy segment sequence for one move
///
/// Finite and not restartable; dropping it abandons the rest of the move.
pub struct Segments<'a> {
    kinematics: &'a KinematicsModel,
    leveling: &'a LevelingSurface,
    feedrate_mm_s: f32,
    mode: Mode,
}

impl Segments<'_> {
    fn segment_to(&self, end: Position) -> Segment {
        let leveled = self.leveling.apply(end.xyz());
        Segment {
            end,
            target: self.kinematics.inverse(leveled).with_e(end.e),
            feedrate_mm_s: self.feedrate_mm_s,
        }
    }
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let end = match &mut self.mode {
            Mode::Done => None,
            Mode::Single(end) => end.take(),
            Mode::Kinematic {
                start,
                end,
                count,
                next,
            } => {
                if *next > *count {
                    return None;
                }
                let point = if *next == *count {
                    *end
                } else {
                    start.lerp(end, *next as f32 / *count as f32)
                };
                *next += 1;
                Some(point)
            }
            Mode::GridSplit {
                layout,
                start,
                stack,
            } => next_split(layout, start, stack),
        }?;
        Some(self.segment_to(end))
    }
}

/// Pop pending sub-moves until one lies within a single cell
///
/// Returns its end point and advances `start` past it.
fn next_split(
    layout: &GridLayout,
    start: &mut Position,
    stack: &mut Vec<Pending, SPLIT_STACK_DEPTH>,
) -> Option<Position> {
    while let Some(pending) = stack.pop() {
        let end = pending.end;
        let (cx1, cy1) = (layout.cell_index(0, start.x), layout.cell_index(1, start.y));
        let (cx2, cy2) = (layout.cell_index(0, end.x), layout.cell_index(1, end.y));
        let gcx = cx1.max(cx2);
        let gcy = cy1.max(cy2);

        let mut x_splits = pending.x_splits;
        let mut y_splits = pending.y_splits;

        let mid = if cx1 != cx2 && bit_set(x_splits, gcx) {
            x_splits &= !(1 << gcx);
            let line = layout.line(0, gcx);
            split_at(start, &end, (line - start.x) / (end.x - start.x)).map(|mut mid| {
                mid.x = line;
                mid
            })
        } else if cy1 != cy2 && bit_set(y_splits, gcy) {
            y_splits &= !(1 << gcy);
            let line = layout.line(1, gcy);
            split_at(start, &end, (line - start.y) / (end.y - start.y)).map(|mut mid| {
                mid.y = line;
                mid
            })
        } else {
            let from = *start;
            *start = end;
            if is_degenerate(&from, &end) {
                continue;
            }
            return Some(end);
        };

        let rest = Pending {
            end,
            x_splits,
            y_splits,
        };
        let pushed = match mid {
            Some(mid) => stack.push(rest).is_ok() && stack.push(Pending { end: mid, ..rest }).is_ok(),
            // Boundary coincides with an endpoint: nothing to split off
            None => stack.push(rest).is_ok(),
        };
        if !pushed {
            warn!("grid split stack exhausted");
            let _ = stack.push(rest);
        }
    }
    None
}

/// Interior point at fraction `t`, or `None` if `t` is not strictly inside
fn split_at(start: &Position, end: &Position, t: f32) -> Option<Position> {
    (t > 0.0 && t < 1.0).then(|| start.lerp(end, t))
}

impl core::iter::FusedIterator for Segments<'_> {}

fn bit_set(mask: u32, bit: usize) -> bool {
    bit < 32 && mask & (1 << bit) != 0
}

fn is_degenerate(a: &Position, b: &Position) -> bool {
    math::near_zero(b.x - a.x)
        && math::near_zero(b.y - a.y)
        && math::near_zero(b.z - a.z)
        && math::near_zero(b.e - a.e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DeltaConfig, KinematicsConfig, LevelingConfig, LevelingMode, ScaraConfig,
    };
    use crate::motion::Xyz;
    use proptest::prelude::*;
    use std::vec::Vec as StdVec;

    fn cartesian() -> KinematicsModel {
        KinematicsModel::from_config(&KinematicsConfig::Cartesian).unwrap()
    }

    fn delta() -> KinematicsModel {
        KinematicsModel::from_config(&KinematicsConfig::Delta(DeltaConfig::default())).unwrap()
    }

    fn flat() -> LevelingSurface {
        LevelingSurface::new(&LevelingConfig::default()).unwrap()
    }

    /// 3x3 mesh over 0..100 with spacing 50
    fn mesh(values: [[f32; 3]; 3]) -> LevelingSurface {
        let mut s = LevelingSurface::new(&LevelingConfig {
            mode: LevelingMode::Mesh,
            grid_points: [3, 3],
            grid_min: [0.0, 0.0],
            grid_max: [100.0, 100.0],
            fade_height: None,
            subdivision: 1,
        })
        .unwrap();
        for (ix, row) in values.iter().enumerate() {
            for (iy, z) in row.iter().enumerate() {
                s.set_point(ix, iy, *z).unwrap();
            }
        }
        s.finalize().unwrap();
        s.set_enabled(true).unwrap();
        s
    }

    fn collect(segments: Segments<'_>) -> StdVec<Segment> {
        segments.collect()
    }

    fn assert_chains(from: Position, to: Position, segs: &[Segment]) {
        let mut at = from;
        let mut sum = [0.0f32; 4];
        for s in segs {
            sum[0] += s.end.x - at.x;
            sum[1] += s.end.y - at.y;
            sum[2] += s.end.z - at.z;
            sum[3] += s.end.e - at.e;
            at = s.end;
        }
        assert!((sum[0] - (to.x - from.x)).abs() < 1e-3);
        assert!((sum[1] - (to.y - from.y)).abs() < 1e-3);
        assert!((sum[2] - (to.z - from.z)).abs() < 1e-3);
        assert!((sum[3] - (to.e - from.e)).abs() < 1e-3);
        let last = segs.last().map(|s| s.end).unwrap_or(from);
        assert!((last.x - to.x).abs() < 1e-4 && (last.y - to.y).abs() < 1e-4);
    }

    #[test]
    fn test_cartesian_single_segment() {
        let kin = cartesian();
        let lv = flat();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let from = Position::new(0.0, 0.0, 0.0, 0.0);
        let to = Position::new(100.0, 100.0, 10.0, 5.0);
        let segs = collect(planner.plan(from, to, 50.0).unwrap());
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].end, to);
        assert_eq!(segs[0].target, ActuatorTarget { a: 100.0, b: 100.0, c: 10.0, e: 5.0 });
        assert_eq!(segs[0].feedrate_mm_s, 50.0);
    }

    #[test]
    fn test_zero_length_move_emits_nothing() {
        let kin = cartesian();
        let lv = flat();
        let p = Position::new(5.0, 5.0, 5.0, 5.0);
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        assert_eq!(planner.plan(p, p, 50.0).unwrap().count(), 0);

        let kin = delta();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let a = Position::new(1.0, 2.0, 3.0, 0.0);
        let b = Position::new(1.000_001, 2.0, 3.0, 0.0);
        assert_eq!(planner.plan(a, b, 50.0).unwrap().count(), 0);
    }

    #[test]
    fn test_kinematic_move_to_same_point_emits_nothing() {
        let lv = flat();
        let p = Position::new(10.0, 10.0, 5.0, 1.0);

        let kin = delta();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        assert_eq!(planner.plan(p, p, 50.0).unwrap().count(), 0);

        let kin = KinematicsModel::from_config(&KinematicsConfig::Scara(ScaraConfig {
            offset: [0.0, 0.0],
            ..ScaraConfig::default()
        }))
        .unwrap();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let p = Position::new(100.0, 0.0, 5.0, 1.0);
        assert_eq!(planner.plan(p, p, 50.0).unwrap().count(), 0);
    }

    #[test]
    fn test_delta_segment_count() {
        let kin = delta();
        let lv = flat();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let from = Position::new(0.0, 0.0, 0.0, 0.0);
        let to = Position::new(50.0, 50.0, 50.0, 0.0);
        let segs = collect(planner.plan(from, to, 50.0).unwrap());

        let distance = (3.0f32 * 50.0 * 50.0).sqrt();
        let expected = (200.0 * distance / 50.0).round() as usize;
        assert_eq!(segs.len(), expected);
        assert_eq!(segs.last().unwrap().target, kin.inverse(Xyz::new(50.0, 50.0, 50.0)).with_e(0.0));
        assert_chains(from, to, &segs);

        let back = kin.forward(segs.last().unwrap().target.actuators());
        assert!((back.x - 50.0).abs() < 1e-3);
        assert!((back.y - 50.0).abs() < 1e-3);
        assert!((back.z - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_delta_z_only_move_not_split() {
        let kin = delta();
        let lv = flat();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let from = Position::new(10.0, 10.0, 0.0, 0.0);
        let to = Position::new(10.0, 10.0, 100.0, 3.0);
        assert_eq!(planner.plan(from, to, 5.0).unwrap().count(), 1);
    }

    #[test]
    fn test_delta_extruder_only_distance() {
        let kin = delta();
        let lv = flat();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        // Tiny XY wiggle so the move is not Z/E-only, distance falls back to E
        let from = Position::new(0.0, 0.0, 0.0, 0.0);
        let to = Position::new(0.000_001, 0.0, 0.0, 10.0);
        let segs = collect(planner.plan(from, to, 10.0).unwrap());
        assert_eq!(segs.len(), 200);
    }

    #[test]
    fn test_delta_unreachable() {
        let kin = delta();
        let lv = flat();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let from = Position::default();
        let to = Position::new(200.0, 0.0, 0.0, 0.0);
        assert_eq!(planner.plan(from, to, 50.0).err(), Some(MoveError::Unreachable));
    }

    #[test]
    fn test_scara_minimum_segment_length() {
        let kin = KinematicsModel::from_config(&KinematicsConfig::Scara(ScaraConfig {
            offset: [0.0, 0.0],
            ..ScaraConfig::default()
        }))
        .unwrap();
        let lv = flat();
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        // 1 mm at a crawl would be 200 segments without the cap
        let from = Position::new(100.0, 0.0, 0.0, 0.0);
        let to = Position::new(101.0, 0.0, 0.0, 0.0);
        assert_eq!(planner.plan(from, to, 1.0).unwrap().count(), 4);
    }

    #[test]
    fn test_mesh_crossing_split() {
        let kin = cartesian();
        let lv = mesh([[0.0; 3]; 3]);
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let from = Position::new(10.0, 20.0, 1.0, 0.0);
        let to = Position::new(80.0, 90.0, 2.0, 7.0);
        let segs = collect(planner.plan(from, to, 50.0).unwrap());

        assert!((2..=3).contains(&segs.len()));
        assert_chains(from, to, &segs);

        let layout = lv.split_layout().unwrap();
        let mut at = from;
        for s in &segs {
            let mx = (at.x + s.end.x) * 0.5;
            let my = (at.y + s.end.y) * 0.5;
            let (cx, cy) = (layout.cell_index(0, mx), layout.cell_index(1, my));
            for p in [at, s.end] {
                assert!(p.x >= layout.line(0, cx) - 1e-3 && p.x <= layout.line(0, cx + 1) + 1e-3);
                assert!(p.y >= layout.line(1, cy) - 1e-3 && p.y <= layout.line(1, cy + 1) + 1e-3);
            }
            at = s.end;
        }
    }

    #[test]
    fn test_split_points_are_leveled() {
        let kin = cartesian();
        let lv = mesh([[0.0, 0.0, 0.0], [0.2, 0.2, 0.2], [0.4, 0.4, 0.4]]);
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let from = Position::new(10.0, 10.0, 1.0, 0.0);
        let to = Position::new(90.0, 10.0, 1.0, 0.0);
        let segs = collect(planner.plan(from, to, 50.0).unwrap());
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].end.x, 50.0);
        assert!((segs[0].target.c - 1.2).abs() < 1e-5);
        assert!((segs[1].target.c - 1.36).abs() < 1e-5);
    }

    #[test]
    fn test_same_cell_not_split() {
        let kin = cartesian();
        let lv = mesh([[0.0; 3]; 3]);
        let planner = SegmentedMovePlanner::new(&kin, &lv);
        let from = Position::new(10.0, 10.0, 0.0, 0.0);
        let to = Position::new(40.0, 45.0, 0.0, 0.0);
        assert_eq!(planner.plan(from, to, 50.0).unwrap().count(), 1);
    }

    proptest! {
        #[test]
        fn prop_grid_split_chains_and_confines(
            x1 in -20.0f32..120.0, y1 in -20.0f32..120.0,
            x2 in -20.0f32..120.0, y2 in -20.0f32..120.0,
            e in 0.0f32..10.0,
        ) {
            let kin = cartesian();
            let lv = mesh([[0.0, 0.1, 0.2], [0.1, 0.2, 0.3], [0.2, 0.3, 0.4]]);
            let planner = SegmentedMovePlanner::new(&kin, &lv);
            let from = Position::new(x1, y1, 0.5, 0.0);
            let to = Position::new(x2, y2, 1.5, e);
            let segs = collect(planner.plan(from, to, 50.0).unwrap());
            prop_assume!(!segs.is_empty());
            assert_chains(from, to, &segs);

            let layout = lv.split_layout().unwrap();
            let mut at = from;
            for s in &segs {
                let c1 = (layout.cell_index(0, at.x), layout.cell_index(1, at.y));
                let c2 = (layout.cell_index(0, s.end.x), layout.cell_index(1, s.end.y));
                // Endpoints share a cell, or one sits on the shared boundary
                prop_assert!(c1.0.abs_diff(c2.0) <= 1 && c1.1.abs_diff(c2.1) <= 1);
                if c1.0 != c2.0 {
                    let line = layout.line(0, c1.0.max(c2.0));
                    prop_assert!((at.x - line).abs() < 1e-3 || (s.end.x - line).abs() < 1e-3);
                }
                if c1.1 != c2.1 {
                    let line = layout.line(1, c1.1.max(c2.1));
                    prop_assert!((at.y - line).abs() < 1e-3 || (s.end.y - line).abs() < 1e-3);
                }
                at = s.end;
            }
        }

        #[test]
        fn prop_kinematic_segments_chain(
            x1 in -60.0f32..60.0, y1 in -60.0f32..60.0,
            x2 in -60.0f32..60.0, y2 in -60.0f32..60.0,
            z in 0.0f32..50.0,
            feed in 5.0f32..200.0,
        ) {
            let kin = delta();
            let lv = flat();
            let planner = SegmentedMovePlanner::new(&kin, &lv);
            let from = Position::new(x1, y1, 0.0, 0.0);
            let to = Position::new(x2, y2, z, 1.0);
            let segs = collect(planner.plan(from, to, feed).unwrap());
            prop_assert!(!segs.is_empty());
            assert_chains(from, to, &segs);
        }
    }
}
