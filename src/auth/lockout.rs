//! Consecutive-failure lockout.
//!
//! A pure state machine over the two account fields `login_attempts` and
//! `locked_until`. Expiry is lazy: a lock whose window has passed is read as
//! `Unlocked { attempts: 0 }` on the next attempt.

use chrono::{DateTime, Duration, Utc};

use crate::clock;
use crate::config::SecurityConfig;

/// Default number of consecutive failures before locking.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Default lockout window in seconds (30 minutes).
pub const LOCKOUT_DURATION_SECS: i64 = 30 * 60;

/// Lockout state of an account at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Accepting attempts; `attempts` failures so far.
    Unlocked { attempts: u32 },
    /// Rejecting attempts until the given instant.
    Locked { until: DateTime<Utc> },
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTransition {
    /// New value for `login_attempts`.
    pub attempts: u32,
    /// New value for `locked_until`.
    pub locked_until: Option<DateTime<Utc>>,
    /// True only for the failure that crossed the threshold.
    pub newly_locked: bool,
}

/// Lockout thresholds.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    max_attempts: u32,
    lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(MAX_LOGIN_ATTEMPTS, Duration::seconds(LOCKOUT_DURATION_SECS))
    }
}

impl LockoutPolicy {
    /// Create a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, lock_duration: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lock_duration,
        }
    }

    /// Create a policy from the security settings.
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            config.max_login_attempts,
            clock::secs(config.lockout_duration_secs),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Evaluate the stored fields at `now`.
    pub fn state(
        &self,
        attempts: u32,
        locked_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> LockState {
        match locked_until {
            Some(until) if now < until => LockState::Locked { until },
            Some(_) => LockState::Unlocked { attempts: 0 },
            None => LockState::Unlocked {
                attempts: attempts.min(self.max_attempts - 1),
            },
        }
    }

    /// Transition for a failed credential check.
    ///
    /// A failure while locked changes nothing.
    pub fn on_failure(&self, state: LockState, now: DateTime<Utc>) -> FailureTransition {
        match state {
            LockState::Locked { until } => FailureTransition {
                attempts: self.max_attempts,
                locked_until: Some(until),
                newly_locked: false,
            },
            LockState::Unlocked { attempts } => {
                let attempts = attempts + 1;
                if attempts >= self.max_attempts {
                    FailureTransition {
                        attempts: self.max_attempts,
                        locked_until: Some(now + self.lock_duration),
                        newly_locked: true,
                    }
                } else {
                    FailureTransition {
                        attempts,
                        locked_until: None,
                        newly_locked: false,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_failures_count_up_then_lock() {
        let policy = LockoutPolicy::default();
        let mut attempts = 0;
        let mut locked_until = None;

        for expected in 1..MAX_LOGIN_ATTEMPTS {
            let t = policy.on_failure(policy.state(attempts, locked_until, now()), now());
            assert_eq!(t.attempts, expected);
            assert!(t.locked_until.is_none());
            assert!(!t.newly_locked);
            attempts = t.attempts;
            locked_until = t.locked_until;
        }

        let t = policy.on_failure(policy.state(attempts, locked_until, now()), now());
        assert_eq!(t.attempts, MAX_LOGIN_ATTEMPTS);
        assert_eq!(t.locked_until, Some(now() + Duration::minutes(30)));
        assert!(t.newly_locked);
    }

    #[test]
    fn test_failure_while_locked_is_a_no_op() {
        let policy = LockoutPolicy::default();
        let until = now() + Duration::minutes(10);
        let state = policy.state(5, Some(until), now());
        assert_eq!(state, LockState::Locked { until });

        let t = policy.on_failure(state, now());
        assert_eq!(t.attempts, 5);
        assert_eq!(t.locked_until, Some(until));
        assert!(!t.newly_locked);
    }

    #[test]
    fn test_lock_expires_lazily() {
        let policy = LockoutPolicy::default();
        let until = now();
        assert_eq!(
            policy.state(5, Some(until), now()),
            LockState::Unlocked { attempts: 0 }
        );
        assert_eq!(
            policy.state(5, Some(until), now() - Duration::seconds(1)),
            LockState::Locked { until }
        );

        let t = policy.on_failure(policy.state(5, Some(until), now()), now());
        assert_eq!(t.attempts, 1);
        assert!(t.locked_until.is_none());
    }

    #[test]
    fn test_custom_threshold() {
        let policy = LockoutPolicy::new(2, Duration::seconds(60));
        let t = policy.on_failure(LockState::Unlocked { attempts: 1 }, now());
        assert!(t.newly_locked);
        assert_eq!(t.attempts, 2);
        assert_eq!(t.locked_until, Some(now() + Duration::seconds(60)));
    }

    #[test]
    fn test_zero_threshold_clamped() {
        let policy = LockoutPolicy::new(0, Duration::seconds(60));
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.on_failure(LockState::Unlocked { attempts: 0 }, now()).newly_locked);
    }

    #[test]
    fn test_from_config() {
        let config = SecurityConfig {
            max_login_attempts: 3,
            lockout_duration_secs: 120,
            ..SecurityConfig::default()
        };
        let policy = LockoutPolicy::from_config(&config);
        assert_eq!(policy.max_attempts(), 3);
        let t = policy.on_failure(LockState::Unlocked { attempts: 2 }, now());
        assert_eq!(t.locked_until, Some(now() + Duration::seconds(120)));
    }
}
