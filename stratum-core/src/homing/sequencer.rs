//! Homing sequencer
//!
//! Drives [`HomingState`] cycles with real moves. Seeks run in actuator
//! space relative to the measured position, since the Cartesian position
//! is unknown until the cycle completes. The service hook is polled at
//! every state boundary.

use crate::config::{AxisConfig, HomeDirection, MachineConfig};
use crate::kinematics::{Kinematics, KinematicsModel};
use crate::math;
use crate::motion::{Actuator, Actuators, Axis, MotionState, Mover, Position, Xyz};
use crate::traits::{DualMotor, EndstopId, MotionExecutor, Service};

use super::machine::{HomingError, HomingEvent, HomingPlan, HomingState};

/// Result of a homing request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingOutcome {
    Homed,
    /// The geometry cannot home this axis on its own
    Skipped,
}

/// Parameters of one cycle
#[derive(Debug, Clone, Copy)]
struct HomingSession {
    axis: Axis,
    /// Actuator displacement per mm of travel away from min
    motion: Actuators,
    endstop: EndstopId,
    /// +1.0 toward max, -1.0 toward min
    dir: f32,
    max_length: f32,
    bump: f32,
    fast_mm_s: f32,
    slow_mm_s: f32,
    trim: Option<f32>,
}

impl HomingSession {
    fn new(axis: Axis, motion: Actuators, endstop: EndstopId, dir: f32, max_length: f32, cfg: &AxisConfig) -> Self {
        Self {
            axis,
            motion,
            endstop,
            dir,
            max_length,
            bump: cfg.bump_mm,
            fast_mm_s: cfg.homing_feedrate_mm_s,
            slow_mm_s: cfg.homing_feedrate_mm_s / cfg.bump_divisor,
            trim: cfg.dual_endstop_trim.filter(|t| *t != 0.0),
        }
    }

    fn plan(&self) -> HomingPlan {
        HomingPlan {
            bump: self.bump > 0.0,
            dual_trim: self.trim.is_some(),
        }
    }
}

/// Runs homing for one request, borrowing the motion system's parts
pub struct HomingSequencer<'a, X, S> {
    config: &'a MachineConfig,
    state: &'a mut MotionState,
    mover: Mover<'a, X, S>,
}

impl<'a, X: MotionExecutor, S: Service> HomingSequencer<'a, X, S> {
    pub fn new(config: &'a MachineConfig, state: &'a mut MotionState, mover: Mover<'a, X, S>) -> Self {
        Self { config, state, mover }
    }

    /// Home every axis
    ///
    /// Z goes first when it homes toward max, so the nozzle clears the bed
    /// before X and Y travel; otherwise it goes last.
    pub fn home_all(&mut self) -> Result<(), HomingError> {
        if self.mover.kinematics().homes_as_group() {
            return self.home_group();
        }
        let z_first = self.config.z.home_dir == HomeDirection::Max;
        if z_first {
            self.home_axis(Axis::Z)?;
        }
        self.home_axis(Axis::X)?;
        self.home_axis(Axis::Y)?;
        if !z_first {
            self.home_axis(Axis::Z)?;
        }
        Ok(())
    }

    /// Home one axis; on a delta any axis homes all three towers
    pub fn home_axis(&mut self, axis: Axis) -> Result<HomingOutcome, HomingError> {
        let Some(cfg) = self.config.axis(axis).copied() else {
            return Err(HomingError::NotHomeable);
        };
        if self.mover.kinematics().homes_as_group() {
            return self.home_group().map(|()| HomingOutcome::Homed);
        }
        let Some(motion) = self.mover.kinematics().axis_motion(axis, 1.0) else {
            debug!("{} cannot be homed on its own", axis);
            return Ok(HomingOutcome::Skipped);
        };

        let probe_z = axis == Axis::Z && self.config.homing.z_uses_probe;
        // Safe-point travel only applies when Z homes toward the bed
        if axis == Axis::Z && cfg.home_dir == HomeDirection::Min {
            if let Some(point) = self.config.homing.safe_z_point {
                self.move_to_safe_point(point, probe_z)?;
            }
        }

        self.state.axes.clear_axis(axis);
        let endstop = if probe_z {
            EndstopId::Probe
        } else {
            axis_endstop(axis, cfg.home_dir)
        };
        let session = HomingSession::new(axis, motion, endstop, cfg.home_dir.sign(), cfg.max_length(), &cfg);
        if let Err(e) = self.run_cycle(&session) {
            warn!("homing {} failed: {}", axis, e);
            return Err(e);
        }
        self.set_axis_is_at_home(axis);
        Ok(HomingOutcome::Homed)
    }

    /// Delta: raise all carriages together, then home each tower
    fn home_group(&mut self) -> Result<(), HomingError> {
        let KinematicsModel::Delta(delta) = *self.mover.kinematics() else {
            return Err(HomingError::NotHomeable);
        };
        for axis in Axis::LINEAR {
            self.state.axes.clear_axis(axis);
        }
        let height = delta.height();

        self.arm_endstops();
        self.mover
            .actuator_move(&Actuators::new(1.0, 1.0, 1.0), 1.5 * height, self.config.z.homing_feedrate_mm_s);
        let executor = self.mover.executor();
        let hit = Actuator::ALL
            .iter()
            .any(|tower| executor.endstop_hit(EndstopId::Max(*tower)));
        self.disarm_endstops();
        if !hit {
            error!("no tower switch triggered");
            return Err(HomingError::EndstopNotTriggered);
        }

        for (tower, axis) in Actuator::ALL.into_iter().zip(Axis::LINEAR) {
            let Some(cfg) = self.config.axis(axis).copied() else {
                continue;
            };
            let mut motion = Actuators::default();
            motion.set(tower, 1.0);
            let session = HomingSession::new(axis, motion, EndstopId::Max(tower), 1.0, height, &cfg);
            if let Err(e) = self.run_cycle(&session) {
                warn!("homing tower {} failed: {}", tower, e);
                return Err(e);
            }

            // Retrace toward the bed by the tower's endstop adjustment
            let adj = delta.endstop_adj()[tower.index()];
            if adj * session.dir < 0.0 {
                self.mover.actuator_move(&motion, adj, session.slow_mm_s);
            }
        }

        // Carriages are now at the top; define that as the home pose
        let towers = delta.inverse(Xyz::new(0.0, 0.0, height));
        let e = self.mover.executor().measured_position().e;
        self.mover.executor().set_position(&towers.with_e(e));
        let top = delta.forward(towers);

        for axis in Axis::LINEAR {
            self.state.position_shift.set(axis, 0.0);
            self.state.axes.set_homed(axis);
        }
        let raw = Position::new(top.x, top.y, top.z, self.state.current.e);
        self.state.current = self.state.to_logical(&raw);
        info!("towers homed, effector at z {}", self.state.current.z);
        Ok(())
    }

    fn run_cycle(&mut self, session: &HomingSession) -> Result<(), HomingError> {
        let plan = session.plan();
        let mut state = HomingState::Unhomed.transition(HomingEvent::Start, &plan);
        loop {
            self.mover.idle();
            debug!("homing {}: {}", session.axis, state);
            let event = match state {
                HomingState::SeekFast => self.seek(session, 1.5 * session.max_length, session.fast_mm_s),
                HomingState::BackOff => {
                    self.mover
                        .actuator_move(&session.motion, -session.bump * session.dir, session.fast_mm_s);
                    HomingEvent::MoveComplete
                }
                HomingState::SeekSlow => self.seek(session, 2.0 * session.bump, session.slow_mm_s),
                HomingState::DualTrim => {
                    self.dual_trim(session);
                    HomingEvent::MoveComplete
                }
                HomingState::Homed => return Ok(()),
                HomingState::Aborted(e) => return Err(e),
                HomingState::Unhomed => return Err(HomingError::NotHomeable),
            };
            state = state.transition(event, &plan);
        }
    }

    /// Move toward the switch by up to `distance`
    fn seek(&mut self, session: &HomingSession, distance: f32, feedrate_mm_s: f32) -> HomingEvent {
        self.arm_endstops();
        self.mover
            .actuator_move(&session.motion, distance * session.dir, feedrate_mm_s);
        let hit = self.mover.executor().endstop_hit(session.endstop);
        self.disarm_endstops();
        if hit {
            HomingEvent::Triggered
        } else {
            HomingEvent::Missed
        }
    }

    /// Square a dual-motor axis by moving one motor alone by the trim
    fn dual_trim(&mut self, session: &HomingSession) {
        let Some(trim) = session.trim else {
            return;
        };
        let toward_max = session.dir > 0.0;
        let locked = if (toward_max && trim > 0.0) || (!toward_max && trim < 0.0) {
            DualMotor::First
        } else {
            DualMotor::Second
        };
        let adj = if toward_max { -math::abs(trim) } else { math::abs(trim) };

        debug!("dual trim {}: {} mm, {} locked", session.axis, adj, locked);
        self.mover.executor().set_motor_locked(session.axis, locked, true);
        self.mover.actuator_move(&session.motion, adj, session.slow_mm_s);
        self.mover.executor().set_motor_locked(session.axis, locked, false);
    }

    /// Travel to the Z homing point so the switch (or probe) is over the bed
    fn move_to_safe_point(&mut self, point: [f32; 2], probe_z: bool) -> Result<(), HomingError> {
        for axis in [Axis::X, Axis::Y] {
            if !self.state.axes.is_known(axis) {
                warn!("z homing needs {} homed first", axis);
                return Err(HomingError::AxisNotKnown(axis));
            }
        }
        let [mut x, mut y] = point;
        if probe_z {
            x -= self.config.probe.offset[0];
            y -= self.config.probe.offset[1];
        }
        let from = self.state.to_raw(&self.state.current);
        let to = Position { x, y, ..from };
        self.mover.line(from, to, self.config.probe.travel_feedrate_mm_s)?;
        self.mover.synchronize();
        self.state.current = self.state.to_logical(&to);
        Ok(())
    }

    /// Define the axis as sitting at its home position
    fn set_axis_is_at_home(&mut self, axis: Axis) {
        let Some(cfg) = self.config.axis(axis) else {
            return;
        };
        let mut home = cfg.base_home_pos();
        if axis == Axis::Z && self.config.homing.z_uses_probe {
            home -= self.config.probe.offset[2];
        }

        let mut raw = self.state.to_raw(&self.state.current);
        raw.set(axis, home);
        self.state.position_shift.set(axis, 0.0);
        self.state.current = self.state.to_logical(&raw);
        self.state.axes.set_homed(axis);

        match self.mover.kinematics() {
            // Shoulder and elbow positions are unknown; only redefine Z
            KinematicsModel::Scara(_) => {
                let mut measured = self.mover.executor().measured_position();
                measured.c = raw.z;
                self.mover.executor().set_position(&measured);
            }
            _ => self.mover.set_raw_position(raw),
        }
        info!("{} homed at {}", axis, self.state.current.get(axis));
    }

    fn arm_endstops(&mut self) {
        let executor = self.mover.executor();
        executor.clear_endstop_hits();
        executor.enable_endstops(true);
    }

    fn disarm_endstops(&mut self) {
        let executor = self.mover.executor();
        executor.enable_endstops(false);
        executor.clear_endstop_hits();
    }
}

/// Switch that references a Cartesian or Core axis
///
/// A/B/C switches are the X/Y/Z switches on these machines.
fn axis_endstop(axis: Axis, dir: HomeDirection) -> EndstopId {
    let actuator = match axis {
        Axis::X => Actuator::A,
        Axis::Y => Actuator::B,
        _ => Actuator::C,
    };
    match dir {
        HomeDirection::Min => EndstopId::Min(actuator),
        HomeDirection::Max => EndstopId::Max(actuator),
    }
}
