// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Retry/circuit-breaker policy and service-failover selection, shared by
//! the map interpreter and the bound profile provider.

mod policy;
mod selector;

pub use policy::{BackoffPolicy, CircuitBreakerPolicy, CircuitBreakerState, RetryPolicy};
pub use selector::{FailoverSession, Service, ServiceSelector};
