// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Binding/resolution and the bound profile provider: the two pieces that
//! turn a profile, a provider descriptor, and a map AST - loaded from
//! local files, a disk cache, or a registry - into something that can
//! actually run a use-case end to end.

mod ast_json;
mod bind;
mod cache;
mod config;
mod provider;
mod registry;
mod wire;

pub use bind::{MapCompiler, Runtime};
pub use cache::CacheKey;
pub use config::{
    BindOptions, MapSource, ProfileProviderConfig, ProfileSource, ProviderConfig, ProviderSource,
    RuntimeConfig, SuperJsonConfig, AST_EXTENSION, MAP_SOURCE_EXTENSION, PROFILE_SOURCE_EXTENSION,
};
pub use provider::BoundProfileProvider;
pub use wire::{BindResponseJson, ProviderJson, ProviderParameterJson, ServiceJson};
