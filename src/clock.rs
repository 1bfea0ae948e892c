//! Monotonic microsecond timeout primitive.
//!
//! Every waiting `Mode` (`Delay`, `Homing`, `WaitOnTool`, `WaitOnPlatform`,
//! `WaitOnButton`) and the sleep machine share a single [`Timeout`] register.
//! At most one timeout-bound wait is ever active at a time; this is a design
//! contract the engine enforces by construction, since there is exactly one
//! `Timeout` field in `CommandCore`.

/// Supplies the current monotonic time in microseconds. Implemented by the
/// host runtime over whatever hardware timer it has; a default-constructed
/// `Timeout` needs no clock at all, since it is simply never armed.
pub trait MonotonicClock {
    fn now_us(&self) -> u32;
}

/// A one-shot deadline, armed relative to "now" at `start` time.
///
/// Default-constructed `Timeout` is inactive: `has_elapsed` always returns
/// `false` until `start` is called. Used to cancel a pending wait (e.g. when
/// `PAUSE_FOR_BUTTON` is given a zero-second timeout, or when a filament
/// pause's input timer is reset after firing).
#[derive(Copy, Clone, Debug, Default)]
pub struct Timeout {
    deadline_us: Option<u32>,
}

impl Timeout {
    /// An inactive timeout -- equivalent to the default.
    pub const fn inactive() -> Self {
        Timeout { deadline_us: None }
    }

    /// Arms the timeout to elapse `microseconds` from now.
    pub fn start(&mut self, clock: &dyn MonotonicClock, microseconds: u32) {
        self.deadline_us = Some(clock.now_us().wrapping_add(microseconds));
    }

    /// Clears the timeout back to inactive.
    pub fn cancel(&mut self) {
        self.deadline_us = None;
    }

    /// True once the armed deadline has passed. Always `false` if the
    /// timeout was never armed (or was cancelled).
    pub fn has_elapsed(&self, clock: &dyn MonotonicClock) -> bool {
        match self.deadline_us {
            None => false,
            Some(deadline) => clock.now_us().wrapping_sub(deadline) < u32::MAX / 2,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deadline_us.is_some()
    }
}

#[cfg(test)]
pub(crate) struct FakeClock(core::cell::Cell<u32>);

#[cfg(test)]
impl FakeClock {
    pub(crate) fn new() -> Self {
        FakeClock(core::cell::Cell::new(0))
    }

    pub(crate) fn advance(&self, us: u32) {
        self.0.set(self.0.get().wrapping_add(us));
    }
}

#[cfg(test)]
impl MonotonicClock for FakeClock {
    fn now_us(&self) -> u32 {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_never_elapses() {
        let clock = FakeClock::new();
        let t = Timeout::default();
        clock.advance(1_000_000_000);
        assert!(!t.has_elapsed(&clock));
    }

    #[test]
    fn delay_scenario_1000ms() {
        // A 1000ms DELAY command arms a 1_000_000us timeout.
        let clock = FakeClock::new();
        let mut t = Timeout::inactive();
        t.start(&clock, 1_000_000);
        clock.advance(999_999);
        assert!(!t.has_elapsed(&clock));
        clock.advance(2);
        assert!(t.has_elapsed(&clock));
    }

    #[test]
    fn cancel_makes_it_inactive_again() {
        let clock = FakeClock::new();
        let mut t = Timeout::inactive();
        t.start(&clock, 10);
        clock.advance(100);
        assert!(t.has_elapsed(&clock));
        t.cancel();
        assert!(!t.has_elapsed(&clock));
    }
}
