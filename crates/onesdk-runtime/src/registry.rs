// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-over-HTTPS client for the registry described in the external
//! interfaces: provider descriptors, profile ASTs, map sources, and the
//! combined bind endpoint. Dispatches through the same [`HttpClient`]
//! capability the map interpreter uses, so tests can stub it with the
//! same in-process mock.

use std::sync::Arc;

use onesdk_error::BindError;
use onesdk_http::{HttpClient, HttpMethod, HttpRequest, ResponseBody};

use crate::wire::{BindResponseJson, ProviderJson, RegistryErrorBody};

pub struct RegistryClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    token: Option<String>,
}

impl RegistryClient {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let mut request = HttpRequest::new(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.token {
            request
                .headers
                .set("Authorization", format!("SUPERFACE-SDK-TOKEN {token}"));
        }
        request
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_provider(&self, name: &str) -> Result<ProviderJson, BindError> {
        let request = self.request(HttpMethod::Get, &format!("/providers/{name}"));
        let response = self.http.fetch(request).await?;
        if response.status != 200 {
            return Err(self.classify_error(response.status, response.body));
        }
        let value = match response.body {
            ResponseBody::Json(v) => v,
            ResponseBody::Text(t) => serde_json::from_str(&t).map_err(|e| {
                BindError::InvalidProviderResponse {
                    reason: format!("non-JSON provider response: {e}"),
                }
            })?,
            ResponseBody::Binary(_) => {
                return Err(BindError::InvalidProviderResponse {
                    reason: "provider response was binary".to_string(),
                })
            }
        };
        let definition = value
            .get("definition")
            .cloned()
            .unwrap_or(value);
        let provider: ProviderJson = serde_json::from_value(definition).map_err(|e| {
            BindError::InvalidProviderResponse {
                reason: format!("malformed provider descriptor: {e}"),
            }
        })?;
        provider.validate()?;
        Ok(provider)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_profile(&self, profile_id: &str, version: Option<&str>) -> Result<String, BindError> {
        let path = match version {
            Some(v) => format!("/{profile_id}@{v}"),
            None => format!("/{profile_id}"),
        };
        let mut request = self.request(HttpMethod::Get, &path);
        request
            .headers
            .set("Accept", "application/vnd.superface.profile+json");
        let response = self.http.fetch(request).await?;
        if response.status != 200 {
            return Err(self.classify_error(response.status, response.body));
        }
        Ok(body_as_string(response.body))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_map_source(&self, map_id: &str) -> Result<String, BindError> {
        let mut request = self.request(HttpMethod::Get, &format!("/{map_id}"));
        request.headers.set("Accept", "application/vnd.superface.map");
        let response = self.http.fetch(request).await?;
        if response.status != 200 {
            return Err(self.classify_error(response.status, response.body));
        }
        Ok(body_as_string(response.body))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn post_bind(
        &self,
        profile_id: &str,
        provider: &str,
        map_variant: Option<&str>,
        map_revision: Option<&str>,
    ) -> Result<BindResponseJson, BindError> {
        let mut request = self.request(HttpMethod::Post, "/registry/bind");
        let body = serde_json::json!({
            "profile_id": profile_id,
            "provider": provider,
            "map_variant": map_variant,
            "map_revision": map_revision,
        });
        request.headers.set("content-type", "application/json");
        request.body = Some(onesdk_http::HttpRequestBody::Text(body.to_string()));
        let response = self.http.fetch(request).await?;
        if response.status != 200 {
            return Err(self.classify_error(response.status, response.body));
        }
        let value = match response.body {
            ResponseBody::Json(v) => v,
            other => {
                let text = body_as_string(other);
                serde_json::from_str(&text).map_err(|e| BindError::InvalidMapAstResponse {
                    reason: format!("non-JSON bind response: {e}"),
                })?
            }
        };
        serde_json::from_value(value).map_err(|e| BindError::InvalidMapAstResponse {
            reason: format!("malformed bind response: {e}"),
        })
    }

    fn classify_error(&self, status: u16, body: ResponseBody) -> BindError {
        let text = body_as_string(body);
        match serde_json::from_str::<RegistryErrorBody>(&text) {
            Ok(err) => BindError::BindResponse {
                title: err.title,
                detail: err.detail,
            },
            Err(_) => BindError::UnknownBindResponse { status, body: text },
        }
    }
}

fn body_as_string(body: ResponseBody) -> String {
    match body {
        ResponseBody::Json(v) => v.to_string(),
        ResponseBody::Text(t) => t,
        ResponseBody::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use onesdk_error::NetworkError;
    use onesdk_http::HttpResponse;
    use onesdk_http::MultiMap;
    use std::sync::Mutex;

    struct StubClient {
        status: u16,
        body: ResponseBody,
        seen: Mutex<Option<HttpRequest>>,
    }

    #[async_trait]
    impl HttpClient for StubClient {
        async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
            *self.seen.lock().unwrap() = Some(request);
            Ok(HttpResponse {
                status: self.status,
                status_text: String::new(),
                headers: MultiMap::new(),
                body: self.body.clone(),
            })
        }
    }

    #[tokio::test]
    async fn get_provider_sends_bearer_style_token_header() {
        let provider_json = serde_json::json!({
            "definition": {
                "name": "acme",
                "services": [{"id": "default", "baseUrl": "https://api.acme.test"}],
                "defaultService": "default",
            }
        });
        let client = Arc::new(StubClient {
            status: 200,
            body: ResponseBody::Json(provider_json),
            seen: Mutex::new(None),
        });
        let registry = RegistryClient::new(client.clone(), "https://reg.example", Some("tok".into()));
        let provider = registry.get_provider("acme").await.unwrap();
        assert_eq!(provider.name, "acme");
        let seen = client.seen.lock().unwrap().clone().unwrap();
        assert_eq!(
            seen.headers.get_first("Authorization"),
            Some("SUPERFACE-SDK-TOKEN tok")
        );
    }

    #[tokio::test]
    async fn non_200_with_detail_title_becomes_bind_response_error() {
        let client = Arc::new(StubClient {
            status: 400,
            body: ResponseBody::Json(serde_json::json!({"title": "Bad", "detail": "nope"})),
            seen: Mutex::new(None),
        });
        let registry = RegistryClient::new(client, "https://reg.example", None);
        let err = registry.get_provider("acme").await.unwrap_err();
        assert!(matches!(err, BindError::BindResponse { .. }));
    }

    #[tokio::test]
    async fn non_200_unparseable_body_becomes_unknown_bind_response() {
        let client = Arc::new(StubClient {
            status: 500,
            body: ResponseBody::Text("internal error".to_string()),
            seen: Mutex::new(None),
        });
        let registry = RegistryClient::new(client, "https://reg.example", None);
        let err = registry.get_provider("acme").await.unwrap_err();
        assert!(matches!(err, BindError::UnknownBindResponse { status: 500, .. }));
    }
}
