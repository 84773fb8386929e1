// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound request shape, independent of any particular HTTP client.

use std::time::Duration;

use onesdk_value::BinaryRef;

use crate::multimap::MultiMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// A single part of a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub enum MultipartField {
    Text { name: String, value: String },
    Binary {
        name: String,
        data: BinaryRef,
    },
}

#[derive(Debug, Clone)]
pub enum HttpRequestBody {
    Text(String),
    Binary(BinaryRef),
    UrlEncoded(Vec<(String, String)>),
    Multipart(Vec<MultipartField>),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: MultiMap,
    pub query: MultiMap,
    pub body: Option<HttpRequestBody>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: MultiMap::new(),
            query: MultiMap::new(),
            body: None,
            timeout: None,
        }
    }
}
