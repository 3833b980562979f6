use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, sleep_until};

use crate::error::DispatchError;

/// Reservoir limiter settings
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Token capacity; `None` disables the reservoir
    pub reservoir: Option<u32>,

    /// How often tokens are added back
    #[serde(rename = "reservoir_refresh_interval_ms", with = "millis")]
    pub reservoir_refresh_interval: Duration,

    /// Tokens added per refresh, capped at `reservoir`
    pub reservoir_increase_amount: u32,

    /// Minimum spacing between dispatch starts
    #[serde(rename = "min_time_ms", with = "millis")]
    pub min_time: Duration,

    /// Calls allowed in flight at once
    pub max_concurrent: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            reservoir: Some(20),
            reservoir_refresh_interval: Duration::from_secs(60),
            reservoir_increase_amount: 20,
            min_time: Duration::from_secs(3),
            max_concurrent: 1,
        }
    }
}

impl LimiterConfig {
    /// Reject settings under which an empty reservoir never refills
    pub fn validate(&self) -> Result<(), DispatchError> {
        match self.reservoir {
            Some(0) => Err(DispatchError::Config("reservoir must be positive".into())),
            Some(_) if self.reservoir_refresh_interval.is_zero() => Err(DispatchError::Config(
                "reservoir_refresh_interval_ms must be positive when a reservoir is set".into(),
            )),
            _ => Ok(()),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Held for the duration of one dispatch
pub struct LimiterPermit {
    _slot: OwnedSemaphorePermit,
}

struct LimiterState {
    tokens: Option<u32>,
    next_refill: Instant,
    last_start: Option<Instant>,
}

impl LimiterState {
    fn refill(&mut self, now: Instant, config: &LimiterConfig) {
        let (Some(tokens), Some(capacity)) = (self.tokens.as_mut(), config.reservoir) else {
            return;
        };
        let interval = config.reservoir_refresh_interval;
        if interval.is_zero() || now < self.next_refill {
            return;
        }

        let elapsed = now - self.next_refill;
        let periods = u32::try_from(elapsed.as_nanos() / interval.as_nanos())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        let added = config.reservoir_increase_amount.saturating_mul(periods);
        *tokens = tokens.saturating_add(added).min(capacity);
        self.next_refill += interval.saturating_mul(periods);
    }
}

/// Refillable token-reservoir limiter with minimum spacing.
///
/// One instance per dispatcher; the reservoir counter is never shared.
pub struct RateLimiter {
    config: LimiterConfig,
    slots: Arc<Semaphore>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        let state = LimiterState {
            tokens: config.reservoir,
            next_refill: Instant::now() + config.reservoir_refresh_interval,
            last_start: None,
        };

        Self {
            slots: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            state: Mutex::new(state),
            config,
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Tokens currently left in the reservoir
    pub fn available_tokens(&self) -> Option<u32> {
        let mut state = self.state.lock();
        state.refill(Instant::now(), &self.config);
        state.tokens
    }

    /// Wait until a dispatch may start.
    ///
    /// Takes a concurrency slot, then waits out the spacing since the last
    /// start and, if the reservoir is empty, the next refill.
    pub async fn acquire(&self) -> Result<LimiterPermit, DispatchError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::Closed)?;

        loop {
            let deadline = {
                let mut state = self.state.lock();
                let now = Instant::now();
                state.refill(now, &self.config);

                let spaced = state.last_start.map(|t| t + self.config.min_time);
                match spaced {
                    Some(at) if at > now => Some(at),
                    _ if state.tokens == Some(0) && self.config.reservoir_refresh_interval.is_zero() => {
                        return Err(DispatchError::Config("reservoir is empty and never refills".into()));
                    }
                    _ if state.tokens == Some(0) => Some(state.next_refill),
                    _ => {
                        if let Some(tokens) = state.tokens.as_mut() {
                            *tokens -= 1;
                        }
                        state.last_start = Some(now);
                        None
                    }
                }
            };

            match deadline {
                Some(at) => sleep_until(at).await,
                None => return Ok(LimiterPermit { _slot: slot }),
            }
        }
    }
}
