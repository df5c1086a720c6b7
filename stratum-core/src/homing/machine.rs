//! Homing cycle state machine
//!
//! One cycle references one axis (or one delta tower) against its switch.
//! The cycle is a pure function of the current state, an event and the
//! cycle's plan; the sequencer performs the moves and feeds back events.

use crate::motion::{Axis, MoveError};

/// Why a homing cycle failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingError {
    /// The switch did not trigger within the travel budget
    EndstopNotTriggered,
    /// Z-safe homing needs this axis referenced first
    AxisNotKnown(Axis),
    /// The axis has no homing switch (E)
    NotHomeable,
    /// A positioning move could not be planned
    Move(MoveError),
}

impl From<MoveError> for HomingError {
    fn from(e: MoveError) -> Self {
        HomingError::Move(e)
    }
}

/// What happened since the last transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingEvent {
    /// Begin the cycle
    Start,
    /// Seek move ended with the switch triggered
    Triggered,
    /// Seek move ran its full length without a trigger
    Missed,
    /// A non-seeking move finished
    MoveComplete,
    /// External abort
    Abort(HomingError),
}

/// Optional phases of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingPlan {
    /// Back off and re-approach slowly after the first touch
    pub bump: bool,
    /// Square a dual-motor axis after the slow touch
    pub dual_trim: bool,
}

/// Homing cycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingState {
    /// Cycle not started
    Unhomed,
    /// Fast approach toward the switch
    SeekFast,
    /// Retreat by the bump distance
    BackOff,
    /// Slow re-approach
    SeekSlow,
    /// Move one motor of a dual axis by the trim
    DualTrim,
    /// Axis referenced
    Homed,
    /// Cycle failed
    Aborted(HomingError),
}

impl HomingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HomingState::Homed | HomingState::Aborted(_))
    }

    /// Next state for `event`
    pub fn transition(self, event: HomingEvent, plan: &HomingPlan) -> Self {
        use HomingEvent::*;
        use HomingState::*;

        let touched = if plan.dual_trim { DualTrim } else { Homed };

        match (self, event) {
            (Unhomed, Start) => SeekFast,

            (SeekFast, Triggered) if plan.bump => BackOff,
            (SeekFast, Triggered) => touched,
            (SeekFast, Missed) => Aborted(HomingError::EndstopNotTriggered),

            (BackOff, MoveComplete) => SeekSlow,

            (SeekSlow, Triggered) => touched,
            (SeekSlow, Missed) => Aborted(HomingError::EndstopNotTriggered),

            (DualTrim, MoveComplete) => Homed,

            (state, Abort(e)) if !state.is_terminal() => Aborted(e),

            // Default: stay in current state
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: HomingPlan = HomingPlan {
        bump: true,
        dual_trim: true,
    };

    #[test]
    fn test_full_cycle() {
        let mut state = HomingState::Unhomed;
        for (event, expected) in [
            (HomingEvent::Start, HomingState::SeekFast),
            (HomingEvent::Triggered, HomingState::BackOff),
            (HomingEvent::MoveComplete, HomingState::SeekSlow),
            (HomingEvent::Triggered, HomingState::DualTrim),
            (HomingEvent::MoveComplete, HomingState::Homed),
        ] {
            state = state.transition(event, &FULL);
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn test_zero_bump_skips_slow_phase() {
        let plan = HomingPlan::default();
        let state = HomingState::SeekFast.transition(HomingEvent::Triggered, &plan);
        assert_eq!(state, HomingState::Homed);
    }

    #[test]
    fn test_missed_switch_aborts() {
        for state in [HomingState::SeekFast, HomingState::SeekSlow] {
            assert_eq!(
                state.transition(HomingEvent::Missed, &FULL),
                HomingState::Aborted(HomingError::EndstopNotTriggered)
            );
        }
    }

    #[test]
    fn test_terminal_states_ignore_events() {
        let aborted = HomingState::Aborted(HomingError::NotHomeable);
        assert_eq!(aborted.transition(HomingEvent::Start, &FULL), aborted);
        assert_eq!(
            HomingState::Homed.transition(HomingEvent::Abort(HomingError::NotHomeable), &FULL),
            HomingState::Homed
        );
    }

    #[test]
    fn test_abort_from_any_active_state() {
        let err = HomingError::Move(MoveError::Stopped);
        for state in [
            HomingState::SeekFast,
            HomingState::BackOff,
            HomingState::SeekSlow,
            HomingState::DualTrim,
        ] {
            assert_eq!(state.transition(HomingEvent::Abort(err), &FULL), HomingState::Aborted(err));
        }
    }

    #[test]
    fn test_unexpected_event_keeps_state() {
        assert_eq!(
            HomingState::BackOff.transition(HomingEvent::Triggered, &FULL),
            HomingState::BackOff
        );
    }
}
