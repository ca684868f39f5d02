use std::time::{Duration, Instant};

use backoff::backoff::{Backoff, Constant};

/// Deadline-based retry schedule with a bounded number of attempts.
///
/// Nothing sleeps here: the owner calls [`RetrySchedule::schedule`] after a
/// failure and polls [`RetrySchedule::take_due`] from its own loop. Once the
/// attempt counter passes `max_attempts` the schedule is exhausted for good.
pub struct RetrySchedule<B: Backoff = Constant> {
    policy: B,
    next_attempt: u32,
    max_attempts: u32,
    deadline: Option<Instant>,
    exhausted: bool,
}

impl RetrySchedule<Constant> {
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self::new(Constant::new(delay), max_attempts)
    }
}

impl<B: Backoff> RetrySchedule<B> {
    pub fn new(policy: B, max_attempts: u32) -> Self {
        RetrySchedule {
            policy,
            next_attempt: 1,
            max_attempts,
            deadline: None,
            exhausted: false,
        }
    }

    /// Arm the next retry. Returns the deadline, or `None` if the schedule
    /// is exhausted or the policy has no further delay to offer.
    pub fn schedule(&mut self, now: Instant) -> Option<Instant> {
        if self.exhausted {
            return None;
        }
        let delay = self.policy.next_backoff()?;
        let deadline = now + delay;
        self.deadline = Some(deadline);
        Some(deadline)
    }

    /// If the armed deadline has passed, disarm it and return the attempt
    /// number to run. Passing the bound marks the schedule exhausted.
    pub fn take_due(&mut self, now: Instant) -> Option<u32> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                if self.next_attempt > self.max_attempts {
                    self.exhausted = true;
                    return None;
                }
                let attempt = self.next_attempt;
                self.next_attempt += 1;
                Some(attempt)
            }
            _ => None,
        }
    }

    /// Drop a pending deadline without consuming an attempt
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
