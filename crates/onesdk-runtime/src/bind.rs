// SPDX-License-Identifier: MIT OR Apache-2.0

//! Binding/resolution: loads a profile, provider descriptor, and map AST
//! from local files, the disk cache, or the registry, checks their
//! identities agree, resolves security and parameters, and produces a
//! [`BoundProfileProvider`] cached with a TTL.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use onesdk_error::BindError;
use onesdk_http::HttpClient;
use onesdk_map::MapDocument;
use onesdk_profile::ProfileDocument;
use onesdk_retry::ServiceSelector;
use onesdk_security::{build_handler, overlay_values, resolve as resolve_security, DigestCache};

use crate::ast_json::{decode_map_document, decode_profile_document};
use crate::cache::{read_provider_cache, write_provider_cache, BoundCache, CacheKey};
use crate::config::{
    BindOptions, MapSource, ProfileSource, ProviderSource, RuntimeConfig, AST_EXTENSION,
    MAP_SOURCE_EXTENSION, PROFILE_SOURCE_EXTENSION,
};
use crate::provider::BoundProfileProvider;
use crate::registry::RegistryClient;
use crate::wire::ProviderJson;

/// External capability for compiling map source text into an AST, used
/// only on the registry-bind path when the embedded AST is malformed.
/// The parser itself is out of scope for this runtime.
#[async_trait]
pub trait MapCompiler: Send + Sync {
    async fn compile(&self, source: &str) -> Result<MapDocument, BindError>;
}

pub struct Runtime {
    http: Arc<dyn HttpClient>,
    registry: RegistryClient,
    cache_path: Option<std::path::PathBuf>,
    bound_cache: BoundCache,
    map_compiler: Option<Arc<dyn MapCompiler>>,
}

impl Runtime {
    pub fn new(http: Arc<dyn HttpClient>, config: RuntimeConfig) -> Self {
        let registry = RegistryClient::new(
            http.clone(),
            config.registry_base_url.clone(),
            config.registry_token.clone(),
        );
        Self {
            http,
            registry,
            cache_path: config.cache_path,
            bound_cache: BoundCache::new(config.bound_context_ttl),
            map_compiler: None,
        }
    }

    pub fn with_map_compiler(mut self, compiler: Arc<dyn MapCompiler>) -> Self {
        self.map_compiler = Some(compiler);
        self
    }

    #[tracing::instrument(level = "debug", skip(self, options))]
    pub async fn bind(&self, options: BindOptions) -> Result<Arc<BoundProfileProvider>, BindError> {
        let key = CacheKey {
            profile_id: profile_key(&options.profile),
            provider_name: provider_key(&options.provider),
            profile_provider_cache_key: options.profile_provider_config.cache_key.clone(),
            provider_cache_key: options.provider_config.cache_key.clone(),
        };
        self.bound_cache.get_or_bind(key, || self.do_bind(options)).await
    }

    async fn do_bind(&self, options: BindOptions) -> Result<BoundProfileProvider, BindError> {
        let profile = self.resolve_profile(&options.profile).await?;
        let mut provider = self.resolve_provider(&options.provider).await?;
        let map = self
            .resolve_map(&profile.id, &mut provider, &options.map)
            .await?;

        check_consistency(&options, &profile, &provider, &map)?;

        let super_security = options
            .super_json
            .as_ref()
            .map(|s| s.security_values.clone())
            .unwrap_or_default();
        let overlaid = overlay_values(super_security, options.provider_config.security_values.clone());
        let schemes = provider.security_schemes()?;
        let configurations = resolve_security(&schemes, overlaid)?;
        let digest_cache = DigestCache::new();
        let mut handlers = std::collections::BTreeMap::new();
        for configuration in configurations {
            let id = configuration.scheme.id().to_string();
            handlers.insert(id, Arc::from(build_handler(configuration, digest_cache.clone())));
        }

        let services = Arc::new(ServiceSelector::new(provider.services(), provider.default_service.clone()));
        let provider_parameters = provider.parameters.clone();
        let caller_parameters = options.provider_config.parameters.clone();
        let effective_parameters =
            crate::provider::resolve_parameters(&caller_parameters, &provider_parameters);

        Ok(BoundProfileProvider::new(
            Arc::new(profile),
            Arc::new(map),
            self.http.clone(),
            services,
            handlers,
            options.profile_provider_config.retry_policy.clone(),
            effective_parameters,
            options.profile_provider_config.defaults.clone(),
            schemes,
            provider_parameters,
            caller_parameters,
            digest_cache,
        ))
    }

    async fn resolve_profile(&self, source: &ProfileSource) -> Result<ProfileDocument, BindError> {
        match source {
            ProfileSource::File(path) => {
                let value = read_ast_json(path, PROFILE_SOURCE_EXTENSION).await?;
                decode_profile_document(&value)
            }
            ProfileSource::Registry { profile_id, version } => {
                let body = self.registry.get_profile(profile_id, version.as_deref()).await?;
                let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
                    BindError::UnableToResolveProfile {
                        profile_id: format!("{profile_id}: malformed profile AST ({e})"),
                    }
                })?;
                let doc = decode_profile_document(&value)?;
                if let Some(expected) = version {
                    if &doc.version != expected {
                        tracing::warn!(
                            expected,
                            actual = %doc.version,
                            "registry returned a different profile version than configured"
                        );
                    }
                }
                Ok(doc)
            }
        }
    }

    async fn resolve_provider(&self, source: &ProviderSource) -> Result<ProviderJson, BindError> {
        match source {
            ProviderSource::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|_| BindError::ReferencedFileNotFound {
                    path: path.display().to_string(),
                })?;
                let provider: ProviderJson = serde_json::from_slice(&bytes).map_err(|e| {
                    BindError::InvalidProviderResponse {
                        reason: e.to_string(),
                    }
                })?;
                provider.validate()?;
                Ok(provider)
            }
            ProviderSource::Registry { name } => match self.registry.get_provider(name).await {
                Ok(provider) => {
                    if let Some(cache_path) = &self.cache_path {
                        write_provider_cache(cache_path, name, &provider).await;
                    }
                    Ok(provider)
                }
                Err(remote_err) => {
                    if let Some(cache_path) = &self.cache_path {
                        if let Some(cached) = read_provider_cache(cache_path, name).await {
                            tracing::warn!(error = %remote_err, provider = name, "falling back to cached provider descriptor");
                            return Ok(cached);
                        }
                    }
                    Err(remote_err)
                }
            },
        }
    }

    async fn resolve_map(
        &self,
        profile_id: &str,
        provider: &mut ProviderJson,
        source: &MapSource,
    ) -> Result<MapDocument, BindError> {
        match source {
            MapSource::File(path) => {
                let value = read_ast_json(path, MAP_SOURCE_EXTENSION).await?;
                decode_map_document(&value)
            }
            MapSource::SourceFile(path) => {
                let built = path.with_extension(AST_EXTENSION);
                if tokio::fs::metadata(&built).await.is_err() {
                    return Err(BindError::ReferencedFileNotFound {
                        path: format!(
                            "{} has no compiled build artifact at {}; compile the map first",
                            path.display(),
                            built.display()
                        ),
                    });
                }
                let bytes = tokio::fs::read(&built).await?;
                let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
                    BindError::InvalidMapAstResponse {
                        reason: e.to_string(),
                    }
                })?;
                decode_map_document(&value)
            }
            MapSource::Registry { map_variant, map_revision } => {
                let response = self
                    .registry
                    .post_bind(profile_id, &provider.name, map_variant.as_deref(), map_revision.as_deref())
                    .await?;
                *provider = response.provider;
                provider.validate()?;
                let value: serde_json::Value = serde_json::from_str(&response.map_ast).map_err(|e| {
                    BindError::InvalidMapAstResponse {
                        reason: e.to_string(),
                    }
                })?;
                match decode_map_document(&value) {
                    Ok(doc) => Ok(doc),
                    Err(decode_err) => {
                        let compiler = self.map_compiler.as_ref().ok_or(decode_err)?;
                        let map_id = format!("{profile_id}.{}", provider.name);
                        let source = self.registry.get_map_source(&map_id).await?;
                        compiler.compile(&source).await
                    }
                }
            }
        }
    }
}

async fn read_ast_json(path: &Path, source_extension: &str) -> Result<serde_json::Value, BindError> {
    let path_str = path.to_string_lossy().into_owned();
    if path_str.ends_with(source_extension) {
        return Err(BindError::SourceFileExtensionFound { path: path_str });
    }
    if !path_str.ends_with(AST_EXTENSION) {
        return Err(BindError::UnsupportedFileExtension { path: path_str });
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| BindError::ReferencedFileNotFound { path: path_str.clone() })?;
    serde_json::from_slice(&bytes).map_err(|e| BindError::InvalidMapAstResponse {
        reason: format!("{path_str}: {e}"),
    })
}

fn profile_key(source: &ProfileSource) -> String {
    match source {
        ProfileSource::Registry { profile_id, .. } => profile_id.clone(),
        ProfileSource::File(path) => path.display().to_string(),
    }
}

fn provider_key(source: &ProviderSource) -> String {
    match source {
        ProviderSource::Registry { name } => name.clone(),
        ProviderSource::File(path) => path.display().to_string(),
    }
}

fn check_consistency(
    options: &BindOptions,
    profile: &ProfileDocument,
    provider: &ProviderJson,
    map: &MapDocument,
) -> Result<(), BindError> {
    if let ProviderSource::Registry { name } = &options.provider {
        if name != &provider.name {
            return Err(BindError::ProvidersDoNotMatch {
                expected: name.clone(),
                actual: provider.name.clone(),
            });
        }
    }
    if provider.name != map.provider {
        return Err(BindError::ProvidersDoNotMatch {
            expected: provider.name.clone(),
            actual: map.provider.clone(),
        });
    }
    if let MapSource::Registry { map_variant: Some(expected), .. } = &options.map {
        if Some(expected) != map.variant.as_ref() {
            return Err(BindError::VariantMismatch {
                expected: Some(expected.clone()),
                actual: map.variant.clone(),
            });
        }
    }
    if matches!(options.map, MapSource::File(_) | MapSource::SourceFile(_)) && map.profile_id != profile.id {
        return Err(BindError::ProfileIdsDoNotMatch {
            expected: profile.id.clone(),
            actual: map.profile_id.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProfileProviderConfig, ProviderConfig};
    use async_trait::async_trait;
    use onesdk_error::NetworkError;
    use onesdk_http::{HttpRequest, HttpResponse, MultiMap, ResponseBody};
    use std::time::Duration;

    struct StaticClient {
        responses: std::sync::Mutex<std::collections::VecDeque<(u16, serde_json::Value)>>,
    }

    #[async_trait]
    impl HttpClient for StaticClient {
        async fn fetch(&self, _request: HttpRequest) -> Result<HttpResponse, NetworkError> {
            let (status, body) = self.responses.lock().unwrap().pop_front().expect("no stubbed response left");
            Ok(HttpResponse {
                status,
                status_text: String::new(),
                headers: MultiMap::new(),
                body: ResponseBody::Json(body),
            })
        }
    }

    fn provider_json(name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "services": [{"id": "default", "baseUrl": "https://api.example.test"}],
            "defaultService": "default",
        })
    }

    fn minimal_map_json(provider: &str, profile_id: &str) -> serde_json::Value {
        serde_json::json!({
            "profileId": profile_id,
            "provider": provider,
            "variant": null,
            "maps": {
                "DoThing": {
                    "statements": [
                        {"kind": "outcome", "value": {"kind": "literal", "value": 1}, "isError": false, "terminateFlow": true}
                    ]
                }
            },
            "operations": {}
        })
    }

    fn minimal_profile_json(profile_id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": profile_id,
            "version": "1.0.0",
            "useCases": {"DoThing": {"input": null, "result": null, "error": null}},
            "models": {},
            "fields": {}
        })
    }

    #[tokio::test]
    async fn binds_entirely_from_the_registry() {
        let client = Arc::new(StaticClient {
            responses: std::sync::Mutex::new(
                vec![
                    (200, minimal_profile_json("acme/example")),
                    (
                        200,
                        serde_json::json!({
                            "provider": provider_json("acme"),
                            "map_ast": minimal_map_json("acme", "acme/example").to_string(),
                        }),
                    ),
                ]
                .into(),
            ),
        });
        let runtime = Runtime::new(
            client,
            RuntimeConfig {
                registry_base_url: "https://reg.example".into(),
                registry_token: None,
                cache_path: None,
                bound_context_ttl: Duration::from_secs(60),
            },
        );
        let options = BindOptions {
            profile: ProfileSource::Registry {
                profile_id: "acme/example".into(),
                version: None,
            },
            provider: ProviderSource::Registry { name: "acme".into() },
            provider_config: ProviderConfig::default(),
            profile_provider_config: ProfileProviderConfig::default(),
            map: MapSource::Registry {
                map_variant: None,
                map_revision: None,
            },
            super_json: None,
        };
        let bound = runtime.bind(options).await.unwrap();
        assert_eq!(bound.map.provider, "acme");
    }

    #[tokio::test]
    async fn provider_name_mismatch_is_rejected() {
        let client = Arc::new(StaticClient {
            responses: std::sync::Mutex::new(
                vec![
                    (200, minimal_profile_json("acme/example")),
                    (
                        200,
                        serde_json::json!({
                            "provider": provider_json("other"),
                            "map_ast": minimal_map_json("other", "acme/example").to_string(),
                        }),
                    ),
                ]
                .into(),
            ),
        });
        let runtime = Runtime::new(
            client,
            RuntimeConfig {
                registry_base_url: "https://reg.example".into(),
                registry_token: None,
                cache_path: None,
                bound_context_ttl: Duration::from_secs(60),
            },
        );
        let options = BindOptions {
            profile: ProfileSource::Registry {
                profile_id: "acme/example".into(),
                version: None,
            },
            provider: ProviderSource::Registry { name: "acme".into() },
            provider_config: ProviderConfig::default(),
            profile_provider_config: ProfileProviderConfig::default(),
            map: MapSource::Registry {
                map_variant: None,
                map_revision: None,
            },
            super_json: None,
        };
        let err = runtime.bind(options).await.unwrap_err();
        assert!(matches!(err, BindError::ProvidersDoNotMatch { .. }));
    }
}
