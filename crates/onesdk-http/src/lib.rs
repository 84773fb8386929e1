// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! HTTP request/response abstraction consumed by the map interpreter, and
//! a `reqwest`-backed default implementation of the capability.

mod client;
mod multimap;
mod request;
mod response;

pub use client::{HttpClient, ReqwestHttpClient};
pub use multimap::MultiMap;
pub use request::{HttpMethod, HttpRequest, HttpRequestBody, MultipartField};
pub use response::{classify_content_type, BodyKind, HttpResponse, ResponseBody};
