// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound response shape, with content-negotiated body decoding.

use crate::multimap::MultiMap;

#[derive(Debug, Clone)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Binary(bytes::Bytes),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: MultiMap,
    pub body: ResponseBody,
}

const BINARY_CONTENT_TYPE_PREFIXES: &[&str] = &["audio/", "video/", "image/"];

/// Decide how to decode a response body, purely from its `content-type`.
/// Matches the precedence documented for the interpreter's HTTP dispatch:
/// JSON-ish types first, then known binary families, then UTF-8 text.
pub fn classify_content_type(content_type: &str) -> BodyKind {
    let ct = content_type.split(';').next().unwrap_or("").trim();
    if ct == "application/json" || ct.ends_with("+json") {
        return BodyKind::Json;
    }
    if ct == "application/octet-stream"
        || BINARY_CONTENT_TYPE_PREFIXES.iter().any(|p| ct.starts_with(p))
    {
        return BodyKind::Binary;
    }
    BodyKind::Text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Binary,
    Text,
}
