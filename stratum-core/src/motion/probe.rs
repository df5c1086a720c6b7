//! Z probe routine
//!
//! Probing runs on raw coordinates with leveling suspended by the caller.
//! A touch is a Z-only descent toward `z_min - overtravel` with the probe
//! switch armed; the position is then resynchronized from the step counts.

use crate::config::{MachineConfig, ProbeConfig, ProbeTouch};
use crate::kinematics::Kinematics;
use crate::leveling::{LevelingError, ProbeGrid};
use crate::motion::{MotionState, MoveError, Mover, Position};
use crate::traits::{EndstopId, MotionExecutor, Service};

/// Probe failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeError {
    /// Descent ended without the probe triggering
    NotTriggered,
    /// The nozzle cannot reach the position that puts the probe over the point
    Unreachable,
    /// Probed data was rejected by the leveling surface
    Leveling(LevelingError),
    /// A positioning move was refused
    Move(MoveError),
}

impl From<LevelingError> for ProbeError {
    fn from(e: LevelingError) -> Self {
        ProbeError::Leveling(e)
    }
}

impl From<MoveError> for ProbeError {
    fn from(e: MoveError) -> Self {
        match e {
            MoveError::Unreachable => ProbeError::Unreachable,
            e => ProbeError::Move(e),
        }
    }
}

pub struct ProbeRoutine<'a, X, S> {
    config: &'a ProbeConfig,
    z_min: f32,
    state: &'a mut MotionState,
    mover: Mover<'a, X, S>,
}

impl<'a, X: MotionExecutor, S: Service> ProbeRoutine<'a, X, S> {
    pub fn new(machine: &'a MachineConfig, state: &'a mut MotionState, mover: Mover<'a, X, S>) -> Self {
        Self {
            config: &machine.probe,
            z_min: machine.z.min_pos,
            state,
            mover,
        }
    }

    /// Whether the nozzle can reach the spot that puts the probe over raw XY
    pub fn can_reach(&self, x: f32, y: f32) -> bool {
        let [nx, ny] = self.nozzle_xy(x, y);
        self.mover.kinematics().is_reachable(nx, ny)
    }

    /// Measure the bed height at raw XY
    pub fn probe_at(&mut self, x: f32, y: f32) -> Result<f32, ProbeError> {
        if !self.can_reach(x, y) {
            debug!("probe point ({}, {}) out of reach", x, y);
            return Err(ProbeError::Unreachable);
        }
        let [nx, ny] = self.nozzle_xy(x, y);
        let here = self.raw_current();
        let z = here.z.max(self.config.clearance_mm);
        self.move_to(
            Position { x: nx, y: ny, z, ..here },
            self.config.travel_feedrate_mm_s,
        )?;

        let slow = self.config.slow_feedrate_mm_s;
        let touch = match self.config.touch {
            ProbeTouch::Single => self.touch(slow)?,
            ProbeTouch::Double => {
                let first = self.touch(self.config.fast_feedrate_mm_s)?;
                self.raise()?;
                let second = self.touch(slow)?;
                let w = self.config.double_touch_weights;
                (first * w.fast + second * w.slow) / (w.fast + w.slow)
            }
            ProbeTouch::Average(n) => {
                let mut sum = 0.0;
                for i in 0..n {
                    if i > 0 {
                        self.raise()?;
                    }
                    sum += self.touch(slow)?;
                }
                sum / f32::from(n.max(1))
            }
        };
        self.raise()?;

        let measured = touch + self.config.offset[2];
        info!("probe ({}, {}) = {}", x, y, measured);
        Ok(measured)
    }

    /// Probe every reachable node of `grid`
    ///
    /// Unreachable nodes are left unprobed. Stops at the first failure.
    pub fn probe_grid(&mut self, grid: &mut ProbeGrid) -> Result<(), ProbeError> {
        grid.clear();
        for ix in 0..grid.nx() {
            for iy in 0..grid.ny() {
                self.mover.idle();
                let [x, y] = grid.node_position(ix, iy);
                if !self.can_reach(x, y) {
                    debug!("skipping node ({}, {})", ix, iy);
                    continue;
                }
                let z = self.probe_at(x, y)?;
                grid.set(ix, iy, z)?;
            }
        }
        Ok(())
    }

    /// One descent; returns the raw nozzle Z at the trigger
    fn touch(&mut self, feedrate_mm_s: f32) -> Result<f32, ProbeError> {
        let here = self.raw_current();
        let target = Position {
            z: self.z_min - self.config.overtravel_mm,
            ..here
        };

        let executor = self.mover.executor();
        executor.clear_endstop_hits();
        executor.enable_endstops(true);
        let queued = self.mover.line(here, target, feedrate_mm_s);
        self.mover.synchronize();
        let executor = self.mover.executor();
        let hit = executor.endstop_hit(EndstopId::Probe);
        executor.enable_endstops(false);
        executor.clear_endstop_hits();
        queued?;

        let measured = self.mover.measured_raw();
        self.state.current = self.state.to_logical(&measured);
        if !hit {
            warn!("probe did not trigger");
            return Err(ProbeError::NotTriggered);
        }
        trace!("touch at {}", measured.z);
        Ok(measured.z)
    }

    /// Lift by the clearance distance
    fn raise(&mut self) -> Result<(), ProbeError> {
        let here = self.raw_current();
        let target = Position {
            z: here.z + self.config.clearance_mm,
            ..here
        };
        self.move_to(target, self.config.fast_feedrate_mm_s)
    }

    fn move_to(&mut self, target: Position, feedrate_mm_s: f32) -> Result<(), ProbeError> {
        let from = self.raw_current();
        self.mover.line(from, target, feedrate_mm_s)?;
        self.mover.synchronize();
        self.state.current = self.state.to_logical(&target);
        Ok(())
    }

    fn raw_current(&self) -> Position {
        self.state.to_raw(&self.state.current)
    }

    fn nozzle_xy(&self, x: f32, y: f32) -> [f32; 2] {
        [x - self.config.offset[0], y - self.config.offset[1]]
    }
}
