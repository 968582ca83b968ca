//! Logical simulation clock.
//!
//! The clock is owned by one [crate::engine::Engine] and only moves when the
//! engine advances it to the next event time. It never observes wall-clock time.

use crate::error::KernelError;

/// Simulation time in model units (the service-center model uses minutes).
pub type SimTime = f64;

/// Two completion times closer than this are treated as the same instant.
pub const TIME_EPSILON: SimTime = 1e-9;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimulationClock {
    now: SimTime,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Moves the clock forward to `t`.
    ///
    /// Fails when `t` is earlier than the current time or not finite; both mean
    /// the caller has lost track of the event ordering.
    pub fn advance_to(&mut self, t: SimTime) -> Result<(), KernelError> {
        if !t.is_finite() || t < self.now {
            return Err(KernelError::ClockReversal {
                current: self.now,
                target: t,
            });
        }
        self.now = t;
        Ok(())
    }

    /// Sets the time back to zero. Only the engine calls this, before a run starts.
    pub fn reset(&mut self) {
        self.now = 0.0;
    }
}

/// Smallest representable time strictly after `t` (for `t >= 0`).
pub fn next_after(t: SimTime) -> SimTime {
    if t.is_nan() || t == SimTime::INFINITY {
        return t;
    }
    if t == 0.0 {
        return SimTime::from_bits(1);
    }
    if t > 0.0 {
        SimTime::from_bits(t.to_bits() + 1)
    } else {
        SimTime::from_bits(t.to_bits() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_forward_only() {
        let mut clock = SimulationClock::new();
        assert_eq!(clock.now(), 0.0);

        clock.advance_to(5.0).expect("forward");
        assert_eq!(clock.now(), 5.0);

        // Same instant is allowed (simultaneous events).
        clock.advance_to(5.0).expect("same instant");

        let err = clock.advance_to(4.0).unwrap_err();
        assert_eq!(
            err,
            KernelError::ClockReversal {
                current: 5.0,
                target: 4.0
            }
        );
        assert_eq!(clock.now(), 5.0);
    }

    #[test]
    fn clock_rejects_non_finite_targets() {
        let mut clock = SimulationClock::new();
        assert!(clock.advance_to(f64::INFINITY).is_err());
        assert!(clock.advance_to(f64::NAN).is_err());
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut clock = SimulationClock::new();
        clock.advance_to(42.0).expect("forward");
        clock.reset();
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn next_after_is_strictly_greater() {
        for t in [0.0, 1e-300, 1.0, 12.5, 1e12] {
            let next = next_after(t);
            assert!(next > t, "next_after({t}) = {next}");
            assert!(next.is_finite());
        }
    }
}
