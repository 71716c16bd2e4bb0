//! Retry and backoff as an explicit state machine
//!
//! ```text
//! Attempt --ok--> Success
//!    |
//!    +--err--> Retry { after } --sleep--> Attempt
//!    |
//!    +--err--> GiveUp
//! ```

use crate::config::ScraperConfig;
use crate::PageError;
use std::time::Duration;

/// Retry limits for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts granted to a page, shared by every retryable error
    pub budget: u32,

    /// Wait before the first retry; doubles for each later one
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(budget: u32, base_backoff: Duration) -> Self {
        Self {
            budget,
            base_backoff,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(
            config.retry_budget,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// Wait before the `retry`-th retry (1-based): base, 2x base, 4x base, ...
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ScraperConfig::default())
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after waiting
    Retry { after: Duration },

    /// Record the error as final
    GiveUp,
}

/// Retry bookkeeping for one page
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    retries: u32,
    render_retry_used: bool,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retries: 0,
            render_retry_used: false,
        }
    }

    /// Decides whether the page gets another attempt after `error`
    ///
    /// Every retry spends one slot of the budget, so a page is attempted at
    /// most `budget + 1` times whatever mix of errors it hits.
    ///
    /// - `Fetch` and `Timeout` are retried with exponential backoff
    /// - `Render` is retried once, in a fresh context, after the base backoff
    /// - `EmptyContent`, `Query` and `Panicked` are final
    pub fn on_failure(&mut self, error: &PageError) -> RetryDecision {
        if !error.is_retryable() || self.retries >= self.policy.budget {
            return RetryDecision::GiveUp;
        }

        let after = match error {
            PageError::Render { .. } if self.render_retry_used => return RetryDecision::GiveUp,
            PageError::Render { .. } => {
                self.render_retry_used = true;
                self.policy.base_backoff
            }
            _ => self.policy.backoff(self.retries + 1),
        };

        self.retries += 1;
        RetryDecision::Retry { after }
    }

    /// Budgeted retries granted so far
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> PageError {
        PageError::Timeout {
            url: "https://docs.example.com/guide/slow".to_string(),
            timeout_ms: 45_000,
        }
    }

    fn render() -> PageError {
        PageError::Render {
            url: "https://docs.example.com/guide/crash".to_string(),
            message: "target crashed".to_string(),
        }
    }

    #[test]
    fn test_default_schedule() {
        let mut state = RetryState::new(RetryPolicy::default());

        assert_eq!(
            state.on_failure(&timeout()),
            RetryDecision::Retry {
                after: Duration::from_millis(500)
            }
        );
        assert_eq!(
            state.on_failure(&timeout()),
            RetryDecision::Retry {
                after: Duration::from_secs(1)
            }
        );
        assert_eq!(state.on_failure(&timeout()), RetryDecision::GiveUp);
        assert_eq!(state.retries(), 2);
    }

    #[test]
    fn test_zero_budget_gives_up_immediately() {
        let mut state = RetryState::new(RetryPolicy::new(0, Duration::from_millis(500)));
        let fetch = PageError::Fetch {
            url: "https://docs.example.com/guide".to_string(),
            message: "net::ERR_CONNECTION_RESET".to_string(),
        };
        assert_eq!(state.on_failure(&fetch), RetryDecision::GiveUp);
    }

    #[test]
    fn test_empty_content_never_retried() {
        let mut state = RetryState::new(RetryPolicy::default());
        let empty = PageError::EmptyContent {
            url: "https://docs.example.com/guide/blank".to_string(),
        };
        assert_eq!(state.on_failure(&empty), RetryDecision::GiveUp);
    }

    #[test]
    fn test_render_error_retried_once() {
        let mut state = RetryState::new(RetryPolicy::new(2, Duration::from_millis(500)));
        assert_eq!(
            state.on_failure(&render()),
            RetryDecision::Retry {
                after: Duration::from_millis(500)
            }
        );
        assert_eq!(state.on_failure(&render()), RetryDecision::GiveUp);
    }

    #[test]
    fn test_mixed_errors_share_the_budget() {
        let mut state = RetryState::new(RetryPolicy::new(2, Duration::from_millis(500)));
        assert!(matches!(state.on_failure(&timeout()), RetryDecision::Retry { .. }));
        assert_eq!(
            state.on_failure(&render()),
            RetryDecision::Retry {
                after: Duration::from_millis(500)
            }
        );
        assert_eq!(state.on_failure(&timeout()), RetryDecision::GiveUp);
        assert_eq!(state.retries(), 2);
    }

    #[test]
    fn test_render_after_budget_spent_gives_up() {
        let mut state = RetryState::new(RetryPolicy::new(1, Duration::from_millis(500)));
        assert!(matches!(state.on_failure(&timeout()), RetryDecision::Retry { .. }));
        assert_eq!(state.on_failure(&render()), RetryDecision::GiveUp);
    }

    #[test]
    fn test_panicked_page_not_retried() {
        let mut state = RetryState::new(RetryPolicy::default());
        let panicked = PageError::Panicked {
            url: "https://docs.example.com/guide/broken".to_string(),
            message: "attempt to add with overflow".to_string(),
        };
        assert_eq!(state.on_failure(&panicked), RetryDecision::GiveUp);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(4), Duration::from_millis(4000));
    }
}
