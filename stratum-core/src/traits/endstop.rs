//! Endstop inputs

use crate::motion::Actuator;

/// Identifies one endstop switch
///
/// Channels A/B/C are the X/Y/Z switches on Cartesian and Core machines and
/// the tower switches on a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndstopId {
    Min(Actuator),
    Max(Actuator),
    /// Bed probe trigger
    Probe,
}

impl EndstopId {
    /// Dense index for bitmask storage: min A..C, max A..C, probe
    pub fn index(self) -> usize {
        match self {
            EndstopId::Min(a) => a.index(),
            EndstopId::Max(a) => 3 + a.index(),
            EndstopId::Probe => 6,
        }
    }

    /// Every endstop, in index order
    pub const ALL: [EndstopId; 7] = [
        EndstopId::Min(Actuator::A),
        EndstopId::Min(Actuator::B),
        EndstopId::Min(Actuator::C),
        EndstopId::Max(Actuator::A),
        EndstopId::Max(Actuator::B),
        EndstopId::Max(Actuator::C),
        EndstopId::Probe,
    ];
}

/// A single switch input
///
/// Implementations report the debounced, polarity-corrected state.
pub trait EndstopSensor {
    /// True while the switch is pressed
    fn is_triggered(&mut self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense() {
        for (i, id) in EndstopId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }
}
