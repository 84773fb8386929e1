// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Security scheme resolution and per-request handlers: API key, Basic,
//! Bearer, and Digest (RFC 2617, with a per-realm credential cache).

mod configuration;
mod digest;
mod handler;
mod scheme;
mod values;

pub use configuration::{overlay_values, resolve, SecurityConfiguration};
pub use digest::DigestCache;
pub use handler::{build_handler, SecurityHandler};
pub use scheme::{ApiKeyPlacement, SecurityScheme};
pub use values::SecurityValues;
