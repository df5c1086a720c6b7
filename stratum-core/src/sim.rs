//! Simulated stepper executor for host tests
//!
//! Lines execute instantly. The simulator tracks physical motor positions
//! separately from the step counts the motion code sees, so redefining the
//! position never moves anything. Each switch stops only its own motor;
//! the probe stops the whole line.

use core::cell::Cell;
use std::vec::Vec;

use crate::config::MachineConfig;
use crate::motion::{Actuator, ActuatorTarget, Axis, MotionSystem};
use crate::traits::{DualMotor, EndstopId, MotionExecutor};

pub struct SimExecutor {
    /// Physical a, b, c, e
    pub physical: [f32; 4],
    /// Second motor of a dual A axis, if fitted
    pub second: Option<f32>,
    pub min_stops: [Option<f32>; 3],
    pub max_stops: [Option<f32>; 3],
    pub second_min_stop: Option<f32>,
    pub second_max_stop: Option<f32>,
    /// Physical c at which the probe triggers over physical (a, b)
    pub probe: Option<fn(f32, f32) -> f32>,
    /// The probe reads low by `feedrate × lag`
    pub probe_lag_s: f32,
    /// Every queued line: target, feedrate, tool
    pub lines: Vec<(ActuatorTarget, f32, u8)>,
    /// How many `is_busy` polls report busy after each line
    pub busy_polls: u32,
    /// How many `queue_full` polls report full after each line
    pub full_polls: u32,
    counts_offset: [f32; 4],
    endstops_enabled: bool,
    hits: u8,
    locked: [bool; 2],
    busy: Cell<u32>,
    full: Cell<u32>,
}

impl Default for SimExecutor {
    fn default() -> Self {
        Self {
            physical: [0.0; 4],
            second: None,
            min_stops: [None; 3],
            max_stops: [None; 3],
            second_min_stop: None,
            second_max_stop: None,
            probe: None,
            probe_lag_s: 0.0,
            lines: Vec::new(),
            busy_polls: 0,
            full_polls: 0,
            counts_offset: [0.0; 4],
            endstops_enabled: false,
            hits: 0,
            locked: [false; 2],
            busy: Cell::new(0),
            full: Cell::new(0),
        }
    }
}

impl SimExecutor {
    /// Cartesian machine with min switches at physical zero
    pub fn cartesian() -> Self {
        Self {
            min_stops: [Some(0.0); 3],
            ..Self::default()
        }
    }

    /// Delta with all carriages below max switches at `top`
    pub fn delta(start: f32, top: f32) -> Self {
        Self {
            physical: [start, start, start, 0.0],
            max_stops: [Some(top); 3],
            ..Self::default()
        }
    }

    pub fn with_position(mut self, a: f32, b: f32, c: f32) -> Self {
        self.physical = [a, b, c, self.physical[3]];
        self
    }

    /// Where a motor moving `from → to` ends up, and which switch stopped it
    fn stop_at(from: f32, to: f32, min: Option<f32>, max: Option<f32>, actuator: Actuator) -> (f32, Option<EndstopId>) {
        if let Some(s) = max {
            if to > from && from <= s && to >= s {
                return (s, Some(EndstopId::Max(actuator)));
            }
        }
        if let Some(s) = min {
            if to < from && from >= s && to <= s {
                return (s, Some(EndstopId::Min(actuator)));
            }
        }
        (to, None)
    }

    fn latch(&mut self, id: EndstopId) {
        self.hits |= 1 << id.index();
    }

    fn run_line(&mut self, target: &ActuatorTarget, feedrate_mm_s: f32) {
        let counts = [target.a, target.b, target.c, target.e];
        let start = self.physical;
        let goal: [f32; 4] = core::array::from_fn(|i| counts[i] - self.counts_offset[i]);

        let mut t = 1.0;
        if let (true, Some(surface)) = (self.endstops_enabled, self.probe) {
            let level = surface(goal[0], goal[1]);
            if goal[2] < start[2] && start[2] >= level && goal[2] <= level {
                let stop = level - feedrate_mm_s * self.probe_lag_s;
                t = ((start[2] - stop) / (start[2] - goal[2])).min(1.0);
                self.latch(EndstopId::Probe);
            }
        }
        let mut next: [f32; 4] = core::array::from_fn(|i| start[i] + (goal[i] - start[i]) * t);

        if self.locked[0] {
            next[0] = start[0];
        }
        let delta_a = (goal[0] - start[0]) * t;

        if self.endstops_enabled {
            for (i, actuator) in Actuator::ALL.into_iter().enumerate() {
                let (pos, hit) = Self::stop_at(start[i], next[i], self.min_stops[i], self.max_stops[i], actuator);
                next[i] = pos;
                if let Some(id) = hit {
                    self.latch(id);
                }
            }
        }

        if let Some(second) = self.second {
            let mut moved = if self.locked[1] { second } else { second + delta_a };
            if self.endstops_enabled {
                let (pos, hit) =
                    Self::stop_at(second, moved, self.second_min_stop, self.second_max_stop, Actuator::A);
                moved = pos;
                if let Some(id) = hit {
                    self.latch(id);
                }
            }
            self.second = Some(moved);
        }

        self.physical = next;
    }
}

impl MotionExecutor for SimExecutor {
    fn buffer_line(&mut self, target: &ActuatorTarget, feedrate_mm_s: f32, tool: u8) {
        self.lines.push((*target, feedrate_mm_s, tool));
        self.run_line(target, feedrate_mm_s);
        self.busy.set(self.busy_polls);
        self.full.set(self.full_polls);
    }

    fn queue_full(&self) -> bool {
        let n = self.full.get();
        self.full.set(n.saturating_sub(1));
        n > 0
    }

    fn is_busy(&self) -> bool {
        let n = self.busy.get();
        self.busy.set(n.saturating_sub(1));
        n > 0
    }

    fn set_position(&mut self, position: &ActuatorTarget) {
        let counts = [position.a, position.b, position.c, position.e];
        self.counts_offset = core::array::from_fn(|i| counts[i] - self.physical[i]);
    }

    fn measured_position(&self) -> ActuatorTarget {
        let p: [f32; 4] = core::array::from_fn(|i| self.physical[i] + self.counts_offset[i]);
        ActuatorTarget {
            a: p[0],
            b: p[1],
            c: p[2],
            e: p[3],
        }
    }

    fn enable_endstops(&mut self, enabled: bool) {
        self.endstops_enabled = enabled;
    }

    fn endstop_hit(&self, endstop: EndstopId) -> bool {
        self.hits & (1 << endstop.index()) != 0
    }

    fn clear_endstop_hits(&mut self) {
        self.hits = 0;
    }

    fn set_motor_locked(&mut self, axis: Axis, motor: DualMotor, locked: bool) {
        if axis == Axis::X {
            let i = match motor {
                DualMotor::First => 0,
                DualMotor::Second => 1,
            };
            self.locked[i] = locked;
        }
    }
}

/// Service hook that counts its polls
#[derive(Default)]
pub struct CountingService {
    pub idles: u32,
    pub refreshes: u32,
}

impl crate::traits::Service for CountingService {
    fn idle(&mut self) {
        self.idles += 1;
    }

    fn refresh_inactivity(&mut self) {
        self.refreshes += 1;
    }
}

pub type SimSystem = MotionSystem<SimExecutor, CountingService>;

pub fn motion_system(config: MachineConfig, sim: SimExecutor) -> SimSystem {
    MotionSystem::new(config, sim, CountingService::default()).unwrap()
}
