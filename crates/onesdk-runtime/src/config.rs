// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration accepted by [`crate::bind::bind`]: where to load the
//! profile, provider descriptor, and map from, and what overlays a
//! caller contributes on top of a super-configuration document.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use onesdk_retry::RetryPolicy;
use onesdk_security::SecurityValues;
use onesdk_value::Variable;

/// Build-artifact extension accepted for a compiled profile or map AST.
pub const AST_EXTENSION: &str = "ast.json";
/// Source extension for an uncompiled map; compilation is out of scope,
/// so a sibling `.ast.json` build artifact must already exist.
pub const MAP_SOURCE_EXTENSION: &str = "suma";
/// Source extension for an uncompiled profile.
pub const PROFILE_SOURCE_EXTENSION: &str = "supr";

#[derive(Debug, Clone)]
pub enum ProfileSource {
    File(PathBuf),
    Registry {
        profile_id: String,
        version: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub enum ProviderSource {
    File(PathBuf),
    Registry { name: String },
}

#[derive(Debug, Clone)]
pub enum MapSource {
    /// A pre-compiled map AST file.
    File(PathBuf),
    /// An uncompiled map source file; a sibling `<name>.ast.json` must exist.
    SourceFile(PathBuf),
    Registry {
        map_variant: Option<String>,
        map_revision: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub cache_key: String,
    /// Caller-supplied parameter values, keyed by provider parameter name.
    pub parameters: BTreeMap<String, String>,
    /// Caller-supplied security values, overlaid over `super_json`'s.
    pub security_values: Vec<SecurityValues>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileProviderConfig {
    pub cache_key: String,
    /// Per-use-case default input, merged underneath the caller's input
    /// at every `perform` call.
    pub defaults: BTreeMap<String, Variable>,
    pub retry_policy: RetryPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct SuperJsonConfig {
    pub security_values: Vec<SecurityValues>,
}

#[derive(Debug, Clone)]
pub struct BindOptions {
    pub profile: ProfileSource,
    pub provider: ProviderSource,
    pub provider_config: ProviderConfig,
    pub profile_provider_config: ProfileProviderConfig,
    pub map: MapSource,
    pub super_json: Option<SuperJsonConfig>,
}

/// Resources shared across every `bind` call: the transport used both for
/// map dispatch and registry calls, and the registry/cache coordinates.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub registry_base_url: String,
    pub registry_token: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub bound_context_ttl: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            registry_base_url: "https://superface.ai".to_string(),
            registry_token: None,
            cache_path: None,
            bound_context_ttl: Duration::from_secs(5 * 60),
        }
    }
}
