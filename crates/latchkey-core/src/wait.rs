//! Named await functions over a busy-wait primitive.
//!
//! Both nodes suspend by polling: a timer completion flag, or the intrusion
//! sensor. Every such wait goes through [`await_condition`] with a
//! [`WaitBudget`], so production can wait forever while tests bound the wait
//! and observe a stall as an error.

use std::time::Duration;

use thiserror::Error;

use crate::{config::WaitConfig, env::Environment, timer::CompletionFlag};

/// How many polls a wait may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitBudget {
    /// Poll until the condition holds.
    Unbounded,
    /// Give up after this many polls.
    Polls(u64),
}

impl From<Option<u64>> for WaitBudget {
    fn from(polls: Option<u64>) -> Self {
        polls.map_or(Self::Unbounded, Self::Polls)
    }
}

/// A wait ran out of budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// Condition did not hold within the poll budget.
    #[error("stalled waiting for {what} after {polls} polls")]
    Stalled {
        /// Name of the wait.
        what: &'static str,
        /// Polls performed.
        polls: u64,
    },
}

/// Poll `condition` every `interval` until it holds or the budget runs out.
///
/// Returns the number of polls that found the condition false.
///
/// # Errors
///
/// `WaitError::Stalled` when the budget is exhausted.
pub async fn await_condition<E, F>(
    env: &E,
    interval: Duration,
    budget: WaitBudget,
    what: &'static str,
    mut condition: F,
) -> Result<u64, WaitError>
where
    E: Environment,
    F: FnMut() -> bool + Send,
{
    let mut polls = 0u64;
    loop {
        if condition() {
            return Ok(polls);
        }
        if let WaitBudget::Polls(max) = budget
            && polls >= max
        {
            return Err(WaitError::Stalled { what, polls });
        }
        polls += 1;
        env.sleep(interval).await;
    }
}

/// Wait for a timer completion flag.
pub async fn await_timer<E: Environment>(
    env: &E,
    config: &WaitConfig,
    flag: &CompletionFlag,
) -> Result<u64, WaitError> {
    await_condition(env, config.poll_interval, config.max_polls.into(), "timer", || flag.is_set()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::SystemEnv;

    #[tokio::test(start_paused = true)]
    async fn returns_immediately_when_condition_holds() {
        let polls = await_condition(&SystemEnv, Duration::from_millis(1), WaitBudget::Polls(0), "ready", || true)
            .await
            .expect("already true");
        assert_eq!(polls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_reports_stall() {
        let err = await_condition(&SystemEnv, Duration::from_millis(1), WaitBudget::Polls(5), "sensor", || false)
            .await
            .expect_err("never true");
        assert_eq!(err, WaitError::Stalled { what: "sensor", polls: 5 });
    }

    #[tokio::test(start_paused = true)]
    async fn counts_false_polls() {
        let mut remaining = 3;
        let polls = await_condition(&SystemEnv, Duration::from_millis(1), WaitBudget::Unbounded, "countdown", || {
            if remaining == 0 {
                return true;
            }
            remaining -= 1;
            false
        })
        .await
        .expect("eventually true");
        assert_eq!(polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_wait_sees_raised_flag() {
        let flag = CompletionFlag::new();
        let raiser = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            raiser.raise();
        });
        let config = WaitConfig { poll_interval: Duration::from_millis(1), max_polls: Some(100) };
        let polls = await_timer(&SystemEnv, &config, &flag).await.expect("raised in time");
        assert!(polls >= 9);
    }
}
