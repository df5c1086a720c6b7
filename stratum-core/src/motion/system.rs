//! The motion system
//!
//! [`MotionSystem`] owns the configuration, the geometry, the leveling
//! surface, the soft envelope and the motion state, and drives an injected
//! executor. It is the only entry point the command layer needs.
//!
//! Homing and probing suspend leveling for their duration and restore it
//! afterwards without moving the nozzle.

use crate::config::{ConfigError, KinematicsConfig, LevelingMode, MachineConfig};
use crate::homing::{HomingError, HomingOutcome, HomingSequencer};
use crate::kinematics::KinematicsModel;
use crate::leveling::{LevelingError, LevelingSurface, ProbeGrid};
use crate::math;
use crate::motion::{
    Axis, MotionState, MoveError, Mover, Position, ProbeError, ProbeRoutine, SoftEnvelope,
};
use crate::traits::{MotionExecutor, Service};

pub struct MotionSystem<X, S> {
    config: MachineConfig,
    kinematics: KinematicsModel,
    leveling: LevelingSurface,
    envelope: SoftEnvelope,
    state: MotionState,
    executor: X,
    service: S,
}

impl<X: MotionExecutor, S: Service> MotionSystem<X, S> {
    /// Validate the configuration and take the executor's position as current
    pub fn new(config: MachineConfig, executor: X, service: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let kinematics = KinematicsModel::from_config(&config.kinematics)?;
        let leveling = LevelingSurface::new(&config.leveling).map_err(|_| ConfigError::InvalidGrid)?;
        let mut state = MotionState::default();
        state.feedrate_mm_s = config.motion.default_feedrate_mm_s;
        let envelope = SoftEnvelope::new(&config, &kinematics, &state);

        let mut system = Self {
            config,
            kinematics,
            leveling,
            envelope,
            state,
            executor,
            service,
        };
        system.resync_from_steppers();
        system.state.set_destination_from_current();
        Ok(system)
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn kinematics(&self) -> &KinematicsModel {
        &self.kinematics
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    /// Command-layer access to feedrate, tool and the stop flag
    pub fn state_mut(&mut self) -> &mut MotionState {
        &mut self.state
    }

    pub fn leveling(&self) -> &LevelingSurface {
        &self.leveling
    }

    pub fn envelope(&self) -> &SoftEnvelope {
        &self.envelope
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut X {
        &mut self.executor
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    /// Set the logical target of the next move
    pub fn set_destination(&mut self, destination: Position) {
        self.state.destination = destination;
    }

    fn mover(&mut self) -> Mover<'_, X, S> {
        Mover::new(
            &self.kinematics,
            &self.leveling,
            &mut self.executor,
            &mut self.service,
            self.state.active_tool,
        )
    }

    /// Split borrow for the homing and probing helpers
    fn parts(&mut self) -> (&MachineConfig, &mut MotionState, Mover<'_, X, S>) {
        let tool = self.state.active_tool;
        (
            &self.config,
            &mut self.state,
            Mover::new(
                &self.kinematics,
                &self.leveling,
                &mut self.executor,
                &mut self.service,
                tool,
            ),
        )
    }

    /// Queue the move from the current position to the destination
    ///
    /// The destination is clamped to the soft envelope first. On error
    /// nothing is queued and the current position is unchanged.
    pub fn prepare_move_to_destination(&mut self) -> Result<(), MoveError> {
        self.begin_motion()?;
        self.check_homed()?;

        let destination = self.envelope.clamp(self.state.destination);
        self.state.destination = destination;

        if let Some(max) = self.config.motion.max_extrude_length {
            let extrude = destination.e - self.state.current.e;
            if math::abs(extrude) > max {
                warn!("extrusion of {} mm over limit, E move dropped", extrude);
                self.state.current.e = destination.e;
                let raw = self.state.to_raw(&self.state.current);
                self.mover().set_raw_position(raw);
            }
        }

        // Z/E-only moves ignore the feedrate override
        let feedrate = if self.state.current.same_xy(&destination) {
            self.state.feedrate_mm_s
        } else {
            self.state.scaled_feedrate()
        };
        let from = self.state.to_raw(&self.state.current);
        let to = self.state.to_raw(&destination);
        self.mover().line(from, to, feedrate)?;
        self.state.set_current_from_destination();
        Ok(())
    }

    /// Move to a logical XYZ and wait for the move to finish
    ///
    /// Not clamped. A delta raises before travelling and travels before
    /// lowering, so the effector never dips toward the bed on the way.
    pub fn do_blocking_move_to(&mut self, x: f32, y: f32, z: f32, feedrate_mm_s: Option<f32>) -> Result<(), MoveError> {
        self.begin_motion()?;
        let feedrate = feedrate_mm_s.unwrap_or(self.state.feedrate_mm_s);
        let current = self.state.current;
        let target = Position { x, y, z, ..current };

        if matches!(self.kinematics, KinematicsModel::Delta(_)) {
            let waypoint = if z > current.z {
                Position { z, ..current }
            } else {
                Position { x, y, ..current }
            };
            self.line_to(waypoint, feedrate)?;
        }
        self.line_to(target, feedrate)?;
        self.synchronize();
        Ok(())
    }

    fn line_to(&mut self, target: Position, feedrate_mm_s: f32) -> Result<(), MoveError> {
        let from = self.state.to_raw(&self.state.current);
        let to = self.state.to_raw(&target);
        self.mover().line(from, to, feedrate_mm_s)?;
        self.state.current = target;
        Ok(())
    }

    /// Wait until the executor is idle
    pub fn synchronize(&mut self) {
        self.mover().synchronize();
    }

    /// Common preamble of every motion-issuing call
    fn begin_motion(&mut self) -> Result<(), MoveError> {
        if self.state.stopped {
            return Err(MoveError::Stopped);
        }
        if !self.state.is_position_trusted() {
            debug!("position untrusted, resyncing");
            self.resync_from_steppers();
        }
        self.service.refresh_inactivity();
        Ok(())
    }

    fn check_homed(&self) -> Result<(), MoveError> {
        if !self.config.motion.require_homing {
            return Ok(());
        }
        for axis in Axis::LINEAR {
            let moves = self.state.destination.get(axis) != self.state.current.get(axis);
            if moves && !self.state.axes.is_homed(axis) {
                return Err(MoveError::NotHomed(axis));
            }
        }
        Ok(())
    }

    /// Home one axis (a delta homes all towers)
    pub fn home_axis(&mut self, axis: Axis) -> Result<HomingOutcome, HomingError> {
        self.begin_motion()?;
        let suspended = self.suspend_leveling();
        let result = {
            let (config, state, mover) = self.parts();
            HomingSequencer::new(config, state, mover).home_axis(axis)
        };
        self.finish_homing(result.is_ok(), suspended);
        result
    }

    /// Home every axis in the machine's order
    pub fn home_all(&mut self) -> Result<(), HomingError> {
        self.begin_motion()?;
        let suspended = self.suspend_leveling();
        let result = {
            let (config, state, mover) = self.parts();
            HomingSequencer::new(config, state, mover).home_all()
        };
        self.finish_homing(result.is_ok(), suspended);
        result
    }

    fn finish_homing(&mut self, ok: bool, suspended: bool) {
        if !ok {
            // The carriages moved; trust only the step counts
            self.resync_from_steppers();
        }
        self.envelope
            .recompute(&self.config, &self.kinematics, &self.state);
        if let Err(e) = self.leveling.refresh() {
            warn!("leveling refresh failed: {}", e);
        }
        self.restore_leveling(suspended);
        self.state.set_destination_from_current();
    }

    /// Turn bed compensation on or off without moving the nozzle
    ///
    /// The logical Z of the current position is adjusted instead.
    pub fn set_leveling_enabled(&mut self, enable: bool) -> Result<(), LevelingError> {
        if enable == self.leveling.is_enabled() {
            return Ok(());
        }
        let raw = self.state.to_raw(&self.state.current);
        let physical = self.leveling.apply(raw.xyz());
        self.leveling.set_enabled(enable)?;
        let raw = raw.with_xyz(self.leveling.unapply(physical));
        self.state.current = self.state.to_logical(&raw);
        self.state.set_destination_from_current();
        Ok(())
    }

    /// Change the fade height without moving the nozzle
    pub fn set_fade_height(&mut self, height: Option<f32>) {
        let raw = self.state.to_raw(&self.state.current);
        let physical = self.leveling.apply(raw.xyz());
        self.leveling.set_fade_height(height);
        let raw = raw.with_xyz(self.leveling.unapply(physical));
        self.state.current = self.state.to_logical(&raw);
        self.state.set_destination_from_current();
    }

    /// Replace the probed grid, e.g. with one restored from storage
    ///
    /// Compensation is left off; enable it with
    /// [`set_leveling_enabled`](Self::set_leveling_enabled).
    pub fn load_leveling_grid(&mut self, grid: ProbeGrid) -> Result<(), LevelingError> {
        self.set_leveling_enabled(false)?;
        self.leveling.load_grid(grid)
    }

    /// Disable leveling, returning whether it was enabled
    fn suspend_leveling(&mut self) -> bool {
        let enabled = self.leveling.is_enabled();
        if enabled {
            // Disabling always succeeds
            let _ = self.set_leveling_enabled(false);
        }
        enabled
    }

    fn restore_leveling(&mut self, enabled: bool) {
        if enabled {
            if let Err(e) = self.set_leveling_enabled(true) {
                warn!("leveling not restored: {}", e);
            }
        }
    }

    /// Probe the bed at logical XY and return the raw bed height there
    pub fn probe_point(&mut self, x: f32, y: f32) -> Result<f32, ProbeError> {
        self.begin_motion()?;
        let raw_x = x - self.state.workspace_offset(Axis::X);
        let raw_y = y - self.state.workspace_offset(Axis::Y);

        let suspended = self.suspend_leveling();
        let result = {
            let (config, state, mover) = self.parts();
            ProbeRoutine::new(config, state, mover).probe_at(raw_x, raw_y)
        };
        self.restore_leveling(suspended);
        self.state.set_destination_from_current();
        result
    }

    /// Probe every reachable grid node and enable the new surface
    ///
    /// On a probe failure, or if the new data is rejected, the previous
    /// grid and leveling state are kept.
    pub fn probe_grid(&mut self) -> Result<(), ProbeError> {
        self.begin_motion()?;
        if self.leveling.mode() == LevelingMode::None {
            return Err(ProbeError::Leveling(LevelingError::InvalidGrid));
        }

        let suspended = self.suspend_leveling();
        let previous = self.leveling.grid().clone();
        let mut grid = previous.clone();
        let result = {
            let (config, state, mover) = self.parts();
            ProbeRoutine::new(config, state, mover).probe_grid(&mut grid)
        };
        self.state.set_destination_from_current();

        if let Err(e) = result {
            warn!("grid probing aborted: {}", e);
            self.restore_leveling(suspended);
            return Err(e);
        }
        if let Err(e) = self.leveling.load_grid(grid) {
            warn!("probed grid rejected: {}", e);
            if self.leveling.load_grid(previous).is_ok() {
                self.restore_leveling(suspended);
            }
            return Err(e.into());
        }
        info!("grid probed, {} points", self.leveling.grid().probed_count());
        self.set_leveling_enabled(true)?;
        Ok(())
    }

    pub fn set_soft_endstops_enabled(&mut self, enabled: bool) {
        self.envelope.set_enabled(enabled);
    }

    /// Set the home offset of a linear axis; the nozzle does not move
    pub fn set_home_offset(&mut self, axis: Axis, offset: f32) {
        if axis == Axis::E {
            return;
        }
        let current = self.state.current.get(axis);
        self.state
            .current
            .set(axis, current + offset - self.state.home_offset.get(axis));
        self.state.home_offset.set(axis, offset);
        self.after_offset_change();
    }

    /// Set the position shift of a linear axis; the nozzle does not move
    pub fn set_position_shift(&mut self, axis: Axis, shift: f32) {
        if axis == Axis::E {
            return;
        }
        let current = self.state.current.get(axis);
        self.state
            .current
            .set(axis, current + shift - self.state.position_shift.get(axis));
        self.state.position_shift.set(axis, shift);
        self.after_offset_change();
    }

    /// Declare the current position of one axis to be `value`
    ///
    /// Linear axes adjust the position shift. E redefines the extruder
    /// position at the executor.
    pub fn set_logical_position(&mut self, axis: Axis, value: f32) {
        if axis == Axis::E {
            self.state.current.e = value;
            let raw = self.state.to_raw(&self.state.current);
            self.mover().set_raw_position(raw);
            self.state.set_destination_from_current();
            return;
        }
        let shift = self.state.position_shift.get(axis) + value - self.state.current.get(axis);
        self.set_position_shift(axis, shift);
    }

    fn after_offset_change(&mut self) {
        self.envelope
            .recompute(&self.config, &self.kinematics, &self.state);
        self.state.set_destination_from_current();
    }

    /// Replace the machine geometry
    ///
    /// Atomic: on error the old geometry stays in place. On success every
    /// axis loses its reference and the position is re-derived from the
    /// step counts.
    pub fn reconfigure_kinematics(&mut self, kinematics: KinematicsConfig) -> Result<(), ConfigError> {
        let mut config = self.config;
        config.kinematics = kinematics;
        config.validate()?;

        match (&mut self.kinematics, &kinematics) {
            (KinematicsModel::Delta(delta), KinematicsConfig::Delta(geometry)) => delta.reconfigure(geometry)?,
            (model, _) => *model = KinematicsModel::from_config(&kinematics)?,
        }
        self.config = config;

        self.state.axes.clear();
        self.envelope
            .recompute(&self.config, &self.kinematics, &self.state);
        self.resync_from_steppers();
        self.state.set_destination_from_current();
        info!("kinematics reconfigured");
        Ok(())
    }

    /// Motors were de-energized; every axis may have been moved by hand
    pub fn on_motors_disabled(&mut self) {
        self.state.axes.clear();
        info!("motors off, axes unreferenced");
    }

    /// The executor discarded its queue; resync before the next move
    pub fn on_quick_stop(&mut self) {
        self.state.mark_untrusted();
    }

    /// Recompute the current position from the executor's step counts
    pub fn resync_from_steppers(&mut self) {
        let raw = self.mover().measured_raw();
        self.state.current = self.state.to_logical(&raw);
        self.state.mark_trusted();
    }
}
