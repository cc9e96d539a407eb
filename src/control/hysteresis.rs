//! Debounced boolean. A transition only takes effect after the input has
//! held the opposite of the current state continuously for the dwell time
//! configured for that direction.

pub struct Hysteresis {
    state: bool,
    requested_state: bool,
    last_request_us: u64,
    /// Dwell to leave the `true` state, µs.
    time_from_true_us: u64,
    /// Dwell to leave the `false` state, µs.
    time_from_false_us: u64,
}

impl Hysteresis {
    pub const fn new(initial: bool) -> Self {
        Self {
            state: initial,
            requested_state: initial,
            last_request_us: 0,
            time_from_true_us: 0,
            time_from_false_us: 0,
        }
    }

    /// Configure the dwell required to leave `from_state`.
    pub fn set_transition_time(&mut self, from_state: bool, dwell_us: u64) {
        if from_state {
            self.time_from_true_us = dwell_us;
        } else {
            self.time_from_false_us = dwell_us;
        }
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn update(&mut self, input: bool, now_us: u64) {
        if input != self.requested_state {
            self.requested_state = input;
            self.last_request_us = now_us;
        }
        if self.requested_state != self.state {
            let dwell = if self.state {
                self.time_from_true_us
            } else {
                self.time_from_false_us
            };
            if now_us.saturating_sub(self.last_request_us) >= dwell {
                self.state = self.requested_state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DWELL: u64 = 2_500_000;

    fn armed_hysteresis() -> Hysteresis {
        let mut h = Hysteresis::new(false);
        h.set_transition_time(false, DWELL);
        h
    }

    #[test]
    fn flips_true_only_after_continuous_dwell() {
        let mut h = armed_hysteresis();
        h.update(true, 0);
        assert!(!h.state());
        h.update(true, DWELL - 1);
        assert!(!h.state());
        h.update(true, DWELL);
        assert!(h.state());
    }

    #[test]
    fn interruption_restarts_the_dwell() {
        let mut h = armed_hysteresis();
        h.update(true, 0);
        h.update(false, 1_000_000);
        h.update(true, 1_500_000);
        h.update(true, DWELL);
        assert!(!h.state());
        h.update(true, 1_500_000 + DWELL);
        assert!(h.state());
    }

    #[test]
    fn falls_back_immediately_without_configured_dwell() {
        let mut h = armed_hysteresis();
        h.update(true, 0);
        h.update(true, DWELL);
        assert!(h.state());
        h.update(false, DWELL + 1);
        assert!(!h.state());
    }
}
