// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes returned by the registry, and their conversion into the
//! types the rest of the runtime operates on.

use onesdk_error::BindError;
use onesdk_retry::Service;
use onesdk_security::{ApiKeyPlacement, SecurityScheme};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderJson {
    pub name: String,
    pub services: Vec<ServiceJson>,
    pub default_service: String,
    #[serde(default)]
    pub security_schemes: Vec<SecuritySchemeJson>,
    #[serde(default)]
    pub parameters: Vec<ProviderParameterJson>,
}

impl ProviderJson {
    /// Structural validation per 4.H: a provider descriptor must name its
    /// default service among its declared services.
    pub fn validate(&self) -> Result<(), BindError> {
        if self.services.is_empty() {
            return Err(BindError::InvalidProviderResponse {
                reason: "provider descriptor declares no services".to_string(),
            });
        }
        if !self.services.iter().any(|s| s.id == self.default_service) {
            return Err(BindError::InvalidProviderResponse {
                reason: format!(
                    "default service '{}' is not among the declared services",
                    self.default_service
                ),
            });
        }
        Ok(())
    }

    pub fn services(&self) -> Vec<Service> {
        self.services
            .iter()
            .map(|s| Service {
                id: s.id.clone(),
                base_url: s.base_url.clone(),
            })
            .collect()
    }

    pub fn security_schemes(&self) -> Result<Vec<SecurityScheme>, BindError> {
        self.security_schemes.iter().map(SecuritySchemeJson::to_scheme).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceJson {
    pub id: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecuritySchemeJson {
    ApiKey {
        id: String,
        r#in: String,
        name: String,
    },
    Basic {
        id: String,
    },
    Bearer {
        id: String,
        #[serde(default)]
        bearer_format: Option<String>,
    },
    Digest {
        id: String,
        #[serde(default = "default_challenge_status")]
        challenge_status: u16,
    },
}

fn default_challenge_status() -> u16 {
    401
}

impl SecuritySchemeJson {
    fn to_scheme(&self) -> Result<SecurityScheme, BindError> {
        Ok(match self {
            Self::ApiKey { id, r#in, name } => SecurityScheme::ApiKey {
                id: id.clone(),
                placement: match r#in.as_str() {
                    "header" => ApiKeyPlacement::Header(name.clone()),
                    "query" => ApiKeyPlacement::Query(name.clone()),
                    "body" => ApiKeyPlacement::Body(name.clone()),
                    "path" => ApiKeyPlacement::Path(name.clone()),
                    other => {
                        return Err(BindError::InvalidProviderResponse {
                            reason: format!("unknown apiKey placement '{other}'"),
                        })
                    }
                },
            },
            Self::Basic { id } => SecurityScheme::Basic { id: id.clone() },
            Self::Bearer { id, bearer_format } => SecurityScheme::Bearer {
                id: id.clone(),
                bearer_format: bearer_format.clone(),
            },
            Self::Digest { id, challenge_status } => SecurityScheme::Digest {
                id: id.clone(),
                challenge_status: *challenge_status,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderParameterJson {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

/// Non-200 registry response body, per the documented `{detail, title}`
/// error shape.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryErrorBody {
    pub title: String,
    pub detail: String,
}

/// `POST /registry/bind` success body.
#[derive(Debug, Clone, Deserialize)]
pub struct BindResponseJson {
    pub provider: ProviderJson,
    pub map_ast: String,
}
