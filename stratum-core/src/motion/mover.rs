//! Queueing helpers shared by the motion system, homing and probing
//!
//! A [`Mover`] borrows the geometry, the leveling surface, the executor and
//! the service hook for the duration of one operation.

use crate::kinematics::{Kinematics, KinematicsModel};
use crate::leveling::LevelingSurface;
use crate::motion::{Actuators, MoveError, Position, SegmentedMovePlanner};
use crate::traits::{MotionExecutor, Service};

pub struct Mover<'a, X, S> {
    kinematics: &'a KinematicsModel,
    leveling: &'a LevelingSurface,
    executor: &'a mut X,
    service: &'a mut S,
    tool: u8,
}

impl<'a, X: MotionExecutor, S: Service> Mover<'a, X, S> {
    pub fn new(
        kinematics: &'a KinematicsModel,
        leveling: &'a LevelingSurface,
        executor: &'a mut X,
        service: &'a mut S,
        tool: u8,
    ) -> Self {
        Self {
            kinematics,
            leveling,
            executor,
            service,
            tool,
        }
    }

    pub fn kinematics(&self) -> &'a KinematicsModel {
        self.kinematics
    }

    pub fn executor(&mut self) -> &mut X {
        self.executor
    }

    pub fn idle(&mut self) {
        self.service.idle();
    }

    /// Plan a raw move and queue every segment
    ///
    /// Waits for queue room between segments, polling the service hook.
    /// Nothing is queued if planning fails.
    pub fn line(&mut self, from: Position, to: Position, feedrate_mm_s: f32) -> Result<(), MoveError> {
        let planner = SegmentedMovePlanner::new(self.kinematics, self.leveling);
        for segment in planner.plan(from, to, feedrate_mm_s)? {
            while self.executor.queue_full() {
                self.service.idle();
            }
            self.executor
                .buffer_line(&segment.target, segment.feedrate_mm_s, self.tool);
            self.service.idle();
        }
        Ok(())
    }

    /// Block until the executor has run every queued line
    pub fn synchronize(&mut self) {
        while self.executor.is_busy() {
            self.service.idle();
        }
    }

    /// Raw position recovered from the executor's step counts
    pub fn measured_raw(&self) -> Position {
        let measured = self.executor.measured_position();
        let raw = self
            .leveling
            .unapply(self.kinematics.forward(measured.actuators()));
        Position::new(raw.x, raw.y, raw.z, measured.e)
    }

    /// Tell the executor it is at raw position `raw`
    pub fn set_raw_position(&mut self, raw: Position) {
        let target = self
            .kinematics
            .inverse(self.leveling.apply(raw.xyz()))
            .with_e(raw.e);
        self.executor.set_position(&target);
    }

    /// Blocking move of the actuators by `motion × distance` from where they are
    ///
    /// Runs in actuator space without planning or leveling. Used while the
    /// Cartesian position is not yet known.
    pub fn actuator_move(&mut self, motion: &Actuators, distance: f32, feedrate_mm_s: f32) {
        self.synchronize();
        let measured = self.executor.measured_position();
        self.executor.set_position(&measured);
        let target = measured
            .actuators()
            .offset_by(motion, distance)
            .with_e(measured.e);
        self.executor.buffer_line(&target, feedrate_mm_s, self.tool);
        self.synchronize();
    }
}
