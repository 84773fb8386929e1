// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy configuration and the circuit-breaker state it drives.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RetryPolicy {
    None,
    CircuitBreaker(CircuitBreakerPolicy),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerPolicy {
    pub max_contiguous_retries: u32,
    #[serde(default, with = "humantime_duration_opt")]
    pub request_timeout: Option<Duration>,
    #[serde(default)]
    pub backoff: BackoffPolicy,
    #[serde(with = "humantime_duration")]
    pub open_time: Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackoffPolicy {
    #[default]
    None,
    Exponential {
        #[serde(with = "humantime_duration")]
        base: Duration,
        factor: f64,
    },
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Exponential { base, factor } => {
                let multiplier = factor.powi(attempt as i32);
                base.mul_f64(multiplier.max(1.0))
            }
        }
    }
}

/// Tracks contiguous-failure counts and open-circuit deadlines per service
/// id, for a single bound context. A service whose circuit is open is
/// treated as failed without attempting the call.
#[derive(Default)]
pub struct CircuitBreakerState {
    contiguous_failures: Mutex<HashMap<String, u32>>,
    opened_until: Mutex<HashMap<String, Instant>>,
}

impl CircuitBreakerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self, service_id: &str) -> bool {
        self.opened_until
            .lock()
            .expect("circuit breaker mutex poisoned")
            .get(service_id)
            .is_some_and(|until| Instant::now() < *until)
    }

    pub fn record_success(&self, service_id: &str) {
        self.contiguous_failures
            .lock()
            .expect("circuit breaker mutex poisoned")
            .remove(service_id);
    }

    /// Record a failure; returns `true` once contiguous failures exceed
    /// the policy's threshold and the circuit opens for `open_time`.
    pub fn record_failure(&self, service_id: &str, policy: &CircuitBreakerPolicy) -> bool {
        let mut failures = self
            .contiguous_failures
            .lock()
            .expect("circuit breaker mutex poisoned");
        let count = failures.entry(service_id.to_string()).or_insert(0);
        *count += 1;
        if *count > policy.max_contiguous_retries {
            self.opened_until
                .lock()
                .expect("circuit breaker mutex poisoned")
                .insert(service_id.to_string(), Instant::now() + policy.open_time);
            true
        } else {
            false
        }
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_millis().to_string().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod humantime_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(|d| d.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
