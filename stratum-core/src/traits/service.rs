//! Cooperative service hook
//!
//! Long-running motion calls never spin on their own; they call back into
//! the firmware so heaters, watchdogs and the command queue keep running.

/// Work to run while motion code waits
pub trait Service {
    /// Run one round of background work
    fn idle(&mut self);

    /// Reset the stepper inactivity timer
    fn refresh_inactivity(&mut self) {}
}

impl<F: FnMut()> Service for F {
    fn idle(&mut self) {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_service() {
        let mut polls = 0;
        let mut service = || polls += 1;
        service.idle();
        service.idle();
        service.refresh_inactivity();
        assert_eq!(polls, 2);
    }
}
