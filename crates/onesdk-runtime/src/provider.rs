// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bound profile provider: composes validated input, resolved
//! security and parameters, and the map interpreter into one `perform`
//! call per use-case.

use std::collections::BTreeMap;
use std::sync::Arc;

use onesdk_error::PerformError;
use onesdk_http::HttpClient;
use onesdk_map::{InterpreterContext, MapDocument};
use onesdk_profile::{validate, ProfileDocument, ValidationKind};
use onesdk_retry::{CircuitBreakerState, RetryPolicy, ServiceSelector};
use onesdk_security::{build_handler, resolve, DigestCache, SecurityHandler, SecurityScheme, SecurityValues};
use onesdk_value::{get_value, merge, Variable};

use crate::wire::ProviderParameterJson;

/// Everything produced by a successful `bind`, ready to serve `perform`
/// calls for any use-case the map document defines.
pub struct BoundProfileProvider {
    pub profile: Arc<ProfileDocument>,
    pub map: Arc<MapDocument>,
    ctx: Arc<InterpreterContext>,
    defaults: BTreeMap<String, Variable>,
    provider_schemes: Vec<SecurityScheme>,
    provider_parameters: Vec<ProviderParameterJson>,
    caller_parameters: BTreeMap<String, String>,
    digest_cache: DigestCache,
}

impl BoundProfileProvider {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        profile: Arc<ProfileDocument>,
        map: Arc<MapDocument>,
        http_client: Arc<dyn HttpClient>,
        services: Arc<ServiceSelector>,
        security_handlers: BTreeMap<String, Arc<dyn SecurityHandler>>,
        retry_policy: RetryPolicy,
        effective_parameters: Variable,
        defaults: BTreeMap<String, Variable>,
        provider_schemes: Vec<SecurityScheme>,
        provider_parameters: Vec<ProviderParameterJson>,
        caller_parameters: BTreeMap<String, String>,
        digest_cache: DigestCache,
    ) -> Self {
        let ctx = Arc::new(InterpreterContext {
            http_client,
            services,
            security_handlers,
            retry_policy,
            circuit_breaker: Arc::new(CircuitBreakerState::new()),
            parameters: effective_parameters,
        });
        Self {
            profile,
            map,
            ctx,
            defaults,
            provider_schemes,
            provider_parameters,
            caller_parameters,
            digest_cache,
        }
    }

    /// Run one use-case: validate input, invoke the map interpreter,
    /// validate the result. `security_override` re-resolves security from
    /// scratch against this provider's declared schemes; `parameters`
    /// overrides the caller parameters captured at bind time for this one
    /// call.
    pub async fn perform(
        &self,
        usecase: &str,
        input: Option<Variable>,
        parameters: Option<BTreeMap<String, String>>,
        security_override: Option<Vec<SecurityValues>>,
    ) -> Result<Variable, PerformError> {
        let default_input = self
            .defaults
            .get(usecase)
            .cloned()
            .unwrap_or_else(|| Variable::object([]));
        let effective_input = merge(default_input, input.unwrap_or_else(|| Variable::object([])));

        validate(&self.profile, usecase, ValidationKind::Input, &effective_input)
            .map_err(PerformError::InputValidation)?;

        let mut ctx = match security_override {
            Some(values) => self.rebind_security(values)?,
            None => (*self.ctx).clone(),
        };
        let caller_parameters = parameters.as_ref().unwrap_or(&self.caller_parameters);
        ctx.parameters = resolve_parameters(caller_parameters, &self.provider_parameters);

        let result = onesdk_map::perform(&self.map, usecase, effective_input, &ctx).await?;
        validate(&self.profile, usecase, ValidationKind::Result, &result)
            .map_err(PerformError::ResultValidation)?;
        Ok(result)
    }

    fn rebind_security(
        &self,
        values: Vec<SecurityValues>,
    ) -> Result<InterpreterContext, PerformError> {
        let configurations = resolve(&self.provider_schemes, values)
            .map_err(|e| PerformError::Unexpected(e.to_string()))?;
        let mut handlers = BTreeMap::new();
        for configuration in configurations {
            let id = configuration.scheme.id().to_string();
            handlers.insert(id, Arc::from(build_handler(configuration, self.digest_cache.clone())));
        }
        Ok(InterpreterContext {
            http_client: self.ctx.http_client.clone(),
            services: self.ctx.services.clone(),
            security_handlers: handlers,
            retry_policy: self.ctx.retry_policy.clone(),
            circuit_breaker: self.ctx.circuit_breaker.clone(),
            parameters: self.ctx.parameters.clone(),
        })
    }
}

/// Resolve `$NAME`-style placeholders against the provider's declared
/// parameter defaults; unset entries with a default are filled in.
pub(crate) fn resolve_parameters(
    caller: &BTreeMap<String, String>,
    declared: &[ProviderParameterJson],
) -> Variable {
    let mut resolved = caller.clone();
    for parameter in declared {
        let placeholder = format!("${}", parameter.name);
        match resolved.get(&parameter.name) {
            Some(value) if *value == placeholder => {
                if let Some(default) = &parameter.default {
                    resolved.insert(parameter.name.clone(), default.clone());
                }
            }
            None => {
                if let Some(default) = &parameter.default {
                    resolved.insert(parameter.name.clone(), default.clone());
                }
            }
            Some(_) => {}
        }
    }
    Variable::object(
        resolved
            .into_iter()
            .map(|(k, v)| (k, Variable::String(v))),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use onesdk_http::ReqwestHttpClient;
    use onesdk_profile::ProfileDocument;
    use onesdk_retry::Service;

    pub(crate) fn empty_bound_profile_provider() -> BoundProfileProvider {
        let profile = Arc::new(ProfileDocument::default());
        let map = Arc::new(MapDocument {
            profile_id: "acme/example".into(),
            provider: "acme".into(),
            variant: None,
            maps: BTreeMap::new(),
            operations: BTreeMap::new(),
        });
        let services = Arc::new(ServiceSelector::new(
            vec![Service {
                id: "default".into(),
                base_url: "https://api.acme.test".into(),
            }],
            "default",
        ));
        BoundProfileProvider::new(
            profile,
            map,
            Arc::new(ReqwestHttpClient::new()),
            services,
            BTreeMap::new(),
            RetryPolicy::None,
            Variable::object([]),
            BTreeMap::new(),
            vec![],
            vec![],
            BTreeMap::new(),
            DigestCache::new(),
        )
    }

    #[test]
    fn resolve_parameters_fills_default_for_placeholder() {
        let mut caller = BTreeMap::new();
        caller.insert("region".to_string(), "$region".to_string());
        let declared = vec![ProviderParameterJson {
            name: "region".into(),
            description: None,
            default: Some("us".into()),
        }];
        let resolved = resolve_parameters(&caller, &declared);
        assert_eq!(get_value(&resolved, &["region"]), Variable::String("us".into()));
    }

    #[test]
    fn resolve_parameters_passes_through_without_default() {
        let mut caller = BTreeMap::new();
        caller.insert("region".to_string(), "$region".to_string());
        let declared = vec![ProviderParameterJson {
            name: "region".into(),
            description: None,
            default: None,
        }];
        let resolved = resolve_parameters(&caller, &declared);
        assert_eq!(
            get_value(&resolved, &["region"]),
            Variable::String("$region".into())
        );
    }

    #[test]
    fn resolve_parameters_fills_absent_entries_with_default() {
        let caller = BTreeMap::new();
        let declared = vec![ProviderParameterJson {
            name: "region".into(),
            description: None,
            default: Some("eu".into()),
        }];
        let resolved = resolve_parameters(&caller, &declared);
        assert_eq!(get_value(&resolved, &["region"]), Variable::String("eu".into()));
    }

    #[test]
    fn resolve_parameters_leaves_explicit_values_untouched() {
        let mut caller = BTreeMap::new();
        caller.insert("region".to_string(), "ap".to_string());
        let declared = vec![ProviderParameterJson {
            name: "region".into(),
            description: None,
            default: Some("us".into()),
        }];
        let resolved = resolve_parameters(&caller, &declared);
        assert_eq!(get_value(&resolved, &["region"]), Variable::String("ap".into()));
    }
}
