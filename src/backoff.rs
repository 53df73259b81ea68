//! Delay computation between retry attempts.
//!
//! The policy is a pure function of the attempt index, whether the failure
//! was a rate limit, and an optional server-supplied hint. Randomness comes
//! from an injected [`JitterSource`] so tests can pin it.

use std::fmt;
use std::time::Duration;

use rand::Rng;

/// Timing constants for exponential backoff.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Base delay for transient server or transport errors.
    pub base: Duration,
    /// Base delay for rate-limited (HTTP 429) responses.
    pub rate_limit_base: Duration,
    /// Ceiling applied to server hints and to the exponential term.
    pub max_delay: Duration,
    /// Upper bound of jitter as a fraction of the capped exponential delay.
    pub jitter_fraction: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            rate_limit_base: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter_fraction: 0.25,
        }
    }
}

/// How a delay was derived.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DelaySource {
    /// The server's retry-after hint, capped at the ceiling.
    ServerHint,
    /// Exponential backoff plus jitter.
    Computed,
}

/// Delay to wait before the next attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffDecision {
    pub delay: Duration,
    pub source: DelaySource,
}

impl BackoffPolicy {
    /// Computes the delay before retry number `attempt + 1`.
    ///
    /// `attempt` is zero-based: the wait before the first retry uses `0`.
    /// A server hint wins over computed backoff and gets no jitter. On the
    /// computed path jitter is added after capping, so the result may exceed
    /// `max_delay` by up to `jitter_fraction`.
    pub fn delay(
        &self,
        attempt: u32,
        is_rate_limit: bool,
        server_hint_secs: Option<f64>,
        jitter: &dyn JitterSource,
    ) -> BackoffDecision {
        let ceiling = self.max_delay.as_secs_f64();

        if let Some(hint) = server_hint_secs.filter(|hint| hint.is_finite() && *hint >= 0.0) {
            return BackoffDecision {
                delay: saturating_secs(hint.min(ceiling)),
                source: DelaySource::ServerHint,
            };
        }

        let capped = self.capped_exponential_secs(attempt, is_rate_limit);
        let draw = jitter.sample().clamp(0.0, 1.0);
        let fraction = self.jitter_fraction.max(0.0);

        BackoffDecision {
            delay: saturating_secs(capped + capped * fraction * draw),
            source: DelaySource::Computed,
        }
    }

    /// `min(base * 2^attempt, max_delay)` in seconds, without jitter.
    pub fn capped_exponential_secs(&self, attempt: u32, is_rate_limit: bool) -> f64 {
        let base = if is_rate_limit {
            self.rate_limit_base
        } else {
            self.base
        };
        // 2^64 already overflows any realistic ceiling.
        let exponent = attempt.min(64) as i32;
        let delay = base.as_secs_f64() * 2f64.powi(exponent);
        delay.min(self.max_delay.as_secs_f64())
    }
}

fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Source of jitter draws in `[0, 1]`.
pub trait JitterSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Thread-local RNG jitter; draws are independent across calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same draw. Intended for deterministic tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for BackoffDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}s", self.delay.as_secs_f64())
    }
}
