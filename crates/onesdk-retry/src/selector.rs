// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves a named service to a base URL and walks an ordered failover
//! set, advancing to the next candidate on failure.

use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use serde::{Deserialize, Serialize};

/// One entry from a provider descriptor's `services` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub base_url: String,
}

/// Holds the full set of services a provider advertises.
#[derive(Debug)]
pub struct ServiceSelector {
    services: Vec<Service>,
    default_service: String,
}

impl ServiceSelector {
    pub fn new(services: Vec<Service>, default_service: impl Into<String>) -> Self {
        Self {
            services,
            default_service: default_service.into(),
        }
    }

    pub fn resolve(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn default(&self) -> Option<&Service> {
        self.resolve(&self.default_service)
    }

    pub fn default_service_id(&self) -> &str {
        &self.default_service
    }

    /// Every declared service id, in the order the provider declared them.
    pub fn all_ids(&self) -> Vec<String> {
        self.services.iter().map(|s| s.id.clone()).collect()
    }

    /// Begin a failover walk over `ids` (an explicit failover set, or just
    /// `[defaultService]` when the map names no alternatives).
    pub fn failover(&self, ids: Vec<String>) -> FailoverSession<'_> {
        FailoverSession {
            selector: self,
            ids,
            index: AtomicUsize::new(0),
        }
    }
}

/// Walks an ordered list of service ids, advancing on failure. Uses an
/// atomic index so a session can be shared across retry attempts without
/// a mutable borrow threading through the call stack.
pub struct FailoverSession<'a> {
    selector: &'a ServiceSelector,
    ids: Vec<String>,
    index: AtomicUsize,
}

impl FailoverSession<'_> {
    pub fn current(&self) -> Option<&Service> {
        let idx = self.index.load(Relaxed);
        self.ids.get(idx).and_then(|id| self.selector.resolve(id))
    }

    /// Advance to the next candidate, returning `None` once the failover
    /// set is exhausted.
    pub fn advance(&self) -> Option<&Service> {
        let idx = self.index.fetch_add(1, Relaxed) + 1;
        self.ids.get(idx).and_then(|id| self.selector.resolve(id))
    }

    pub fn is_exhausted(&self) -> bool {
        self.index.load(Relaxed) >= self.ids.len()
    }
}
