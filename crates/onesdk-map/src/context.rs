// SPDX-License-Identifier: MIT OR Apache-2.0

//! Everything the interpreter needs that is not part of the map AST
//! itself: the HTTP capability, resolved security handlers, retry policy,
//! and the set of services a call may target.

use std::collections::BTreeMap;
use std::sync::Arc;

use onesdk_http::HttpClient;
use onesdk_retry::{CircuitBreakerState, RetryPolicy, ServiceSelector};
use onesdk_security::SecurityHandler;
use onesdk_value::Variable;

#[derive(Clone)]
pub struct InterpreterContext {
    pub http_client: Arc<dyn HttpClient>,
    pub services: Arc<ServiceSelector>,
    pub security_handlers: BTreeMap<String, Arc<dyn SecurityHandler>>,
    pub retry_policy: RetryPolicy,
    pub circuit_breaker: Arc<CircuitBreakerState>,
    pub parameters: Variable,
}
