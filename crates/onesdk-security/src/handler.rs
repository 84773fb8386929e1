// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-scheme request preparation and challenge-response handling.

use async_trait::async_trait;
use onesdk_error::PerformError;
use onesdk_http::{HttpRequest, HttpRequestBody, HttpResponse};
use uuid::Uuid;

use crate::configuration::SecurityConfiguration;
use crate::digest::{compute_response, parse_www_authenticate, DigestCache};
use crate::scheme::{ApiKeyPlacement, SecurityScheme};
use crate::values::SecurityValues;

/// Prepares a request for one security configuration, and reacts to a
/// challenge response (Digest is the only scheme that does).
#[async_trait]
pub trait SecurityHandler: Send + Sync {
    fn prepare_request(&self, request: &mut HttpRequest) -> Result<(), PerformError>;

    /// Returns `Some(retry)` when the response is a challenge this handler
    /// can answer; the caller should dispatch `retry` and use its result
    /// instead of the original response.
    async fn handle_response(
        &self,
        _original: &HttpRequest,
        _response: &HttpResponse,
    ) -> Option<HttpRequest> {
        None
    }
}

pub fn build_handler(config: SecurityConfiguration, digest_cache: DigestCache) -> Box<dyn SecurityHandler> {
    match (&config.scheme, &config.values) {
        (SecurityScheme::ApiKey { placement, .. }, SecurityValues::ApiKey { apikey, .. }) => {
            Box::new(ApiKeyHandler {
                placement: placement.clone(),
                apikey: apikey.clone(),
            })
        }
        (SecurityScheme::Basic { .. }, SecurityValues::Basic { username, password, .. }) => {
            Box::new(BasicHandler {
                username: username.clone(),
                password: password.clone(),
            })
        }
        (SecurityScheme::Bearer { bearer_format, .. }, SecurityValues::Bearer { token, .. }) => {
            Box::new(BearerHandler {
                scheme: bearer_format.clone().unwrap_or_else(|| "Bearer".to_string()),
                token: token.clone(),
            })
        }
        (
            SecurityScheme::Digest { challenge_status, .. },
            SecurityValues::Digest {
                username, password, ..
            },
        ) => Box::new(DigestHandler {
            challenge_status: *challenge_status,
            username: username.clone().unwrap_or_default(),
            password: password.clone().unwrap_or_default(),
            cache: digest_cache,
        }),
        _ => Box::new(NoopHandler),
    }
}

struct NoopHandler;

#[async_trait]
impl SecurityHandler for NoopHandler {
    fn prepare_request(&self, _request: &mut HttpRequest) -> Result<(), PerformError> {
        Ok(())
    }
}

struct ApiKeyHandler {
    placement: ApiKeyPlacement,
    apikey: String,
}

#[async_trait]
impl SecurityHandler for ApiKeyHandler {
    fn prepare_request(&self, request: &mut HttpRequest) -> Result<(), PerformError> {
        match &self.placement {
            ApiKeyPlacement::Header(name) => request.headers.set(name, &self.apikey),
            ApiKeyPlacement::Query(name) => request.query.set(name, &self.apikey),
            ApiKeyPlacement::Path(name) => {
                request.url = request.url.replace(&format!("{{{name}}}"), &self.apikey);
            }
            ApiKeyPlacement::Body(field) => {
                apply_to_json_body(request, field, &self.apikey)?;
            }
        }
        Ok(())
    }
}

fn apply_to_json_body(request: &mut HttpRequest, field: &str, value: &str) -> Result<(), PerformError> {
    match &mut request.body {
        Some(HttpRequestBody::Text(text)) => {
            let mut json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                PerformError::Unexpected(format!("apiKey body placement expects JSON: {e}"))
            })?;
            match json.as_object_mut() {
                Some(map) => {
                    map.insert(field.to_string(), serde_json::Value::String(value.to_string()));
                }
                None => {
                    return Err(PerformError::Unexpected(
                        "apiKey body placement requires an object body".to_string(),
                    ))
                }
            }
            *text = serde_json::to_string(&json).map_err(|e| {
                PerformError::Unexpected(format!("failed to re-serialize body: {e}"))
            })?;
            Ok(())
        }
        _ => Err(PerformError::Unexpected(
            "apiKey body placement requires a JSON text body".to_string(),
        )),
    }
}

struct BasicHandler {
    username: String,
    password: String,
}

#[async_trait]
impl SecurityHandler for BasicHandler {
    fn prepare_request(&self, request: &mut HttpRequest) -> Result<(), PerformError> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        request.headers.set("authorization", format!("Basic {encoded}"));
        Ok(())
    }
}

struct BearerHandler {
    scheme: String,
    token: String,
}

#[async_trait]
impl SecurityHandler for BearerHandler {
    fn prepare_request(&self, request: &mut HttpRequest) -> Result<(), PerformError> {
        request
            .headers
            .set("authorization", format!("{} {}", self.scheme, self.token));
        Ok(())
    }
}

struct DigestHandler {
    challenge_status: u16,
    username: String,
    password: String,
    cache: DigestCache,
}

impl DigestHandler {
    fn authority(url: &str) -> String {
        url::Url::parse(url)
            .ok()
            .map(|u| format!("{}://{}", u.scheme(), u.authority()))
            .unwrap_or_else(|| url.to_string())
    }

    fn path(url: &str) -> String {
        url::Url::parse(url)
            .ok()
            .map(|u| {
                let mut p = u.path().to_string();
                if let Some(q) = u.query() {
                    p.push('?');
                    p.push_str(q);
                }
                p
            })
            .unwrap_or_else(|| url.to_string())
    }
}

#[async_trait]
impl SecurityHandler for DigestHandler {
    fn prepare_request(&self, request: &mut HttpRequest) -> Result<(), PerformError> {
        // A realm's first request is unauthenticated; once a challenge has
        // been cached for this authority, every subsequent request attaches
        // credentials proactively and skips the challenge round-trip.
        let authority = Self::authority(&request.url);
        if let Some((challenge, nc)) = self.cache.get(&authority) {
            let uri = Self::path(&request.url);
            let cnonce = Uuid::new_v4().simple().to_string();
            let computed = compute_response(
                &challenge,
                &self.username,
                &self.password,
                request.method.as_str(),
                &uri,
                &cnonce,
                nc,
            );
            request.headers.set("authorization", computed.header_value);
        }
        Ok(())
    }

    async fn handle_response(
        &self,
        original: &HttpRequest,
        response: &HttpResponse,
    ) -> Option<HttpRequest> {
        if response.status != self.challenge_status {
            return None;
        }
        let header = response.headers.get_first("www-authenticate")?;
        let challenge = parse_www_authenticate(header)?;

        let authority = Self::authority(&original.url);
        let uri = Self::path(&original.url);
        let cnonce = Uuid::new_v4().simple().to_string();

        let computed = compute_response(
            &challenge,
            &self.username,
            &self.password,
            original.method.as_str(),
            &uri,
            &cnonce,
            1,
        );

        self.cache.store(&authority, challenge);

        let mut retry = original.clone();
        retry.headers.set("authorization", computed.header_value);
        Some(retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onesdk_http::{HttpMethod, MultiMap};
    use onesdk_http::ResponseBody;

    #[test]
    fn api_key_header_placement_sets_header() {
        let handler = ApiKeyHandler {
            placement: ApiKeyPlacement::Header("X-Api-Key".into()),
            apikey: "secret".into(),
        };
        let mut req = HttpRequest::new(HttpMethod::Get, "https://example.com");
        handler.prepare_request(&mut req).unwrap();
        assert_eq!(req.headers.get_first("X-Api-Key"), Some("secret"));
    }

    #[test]
    fn basic_handler_encodes_credentials() {
        let handler = BasicHandler {
            username: "user".into(),
            password: "pass".into(),
        };
        let mut req = HttpRequest::new(HttpMethod::Get, "https://example.com");
        handler.prepare_request(&mut req).unwrap();
        assert_eq!(
            req.headers.get_first("authorization"),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[tokio::test]
    async fn digest_handler_responds_to_challenge() {
        let handler = DigestHandler {
            challenge_status: 401,
            username: "Mufasa".into(),
            password: "Circle Of Life".into(),
            cache: DigestCache::new(),
        };
        let original = HttpRequest::new(HttpMethod::Get, "https://example.com/dir/index.html");
        let mut headers = MultiMap::new();
        headers.set(
            "www-authenticate",
            r#"Digest realm="testrealm@host.com", qop="auth", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
        );
        let response = HttpResponse {
            status: 401,
            status_text: "Unauthorized".into(),
            headers,
            body: ResponseBody::Text(String::new()),
        };
        let retry = handler.handle_response(&original, &response).await.unwrap();
        assert!(retry
            .headers
            .get_first("authorization")
            .unwrap()
            .starts_with("Digest username=\"Mufasa\""));
    }

    #[test]
    fn digest_handler_attaches_cached_challenge_without_a_round_trip() {
        let cache = DigestCache::new();
        cache.store(
            "https://example.com",
            crate::digest::DigestChallenge {
                realm: "testrealm@host.com".into(),
                nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".into(),
                qop: Some("auth".into()),
                opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".into()),
                algorithm: "MD5".into(),
            },
        );
        let handler = DigestHandler {
            challenge_status: 401,
            username: "Mufasa".into(),
            password: "Circle Of Life".into(),
            cache,
        };
        let mut request = HttpRequest::new(HttpMethod::Get, "https://example.com/dir/index.html");
        handler.prepare_request(&mut request).unwrap();
        assert!(request
            .headers
            .get_first("authorization")
            .unwrap()
            .starts_with("Digest username=\"Mufasa\""));
    }

    #[test]
    fn digest_handler_sends_no_credentials_without_a_cached_challenge() {
        let handler = DigestHandler {
            challenge_status: 401,
            username: "Mufasa".into(),
            password: "Circle Of Life".into(),
            cache: DigestCache::new(),
        };
        let mut request = HttpRequest::new(HttpMethod::Get, "https://example.com/dir/index.html");
        handler.prepare_request(&mut request).unwrap();
        assert!(request.headers.get_first("authorization").is_none());
    }

    #[tokio::test]
    async fn digest_handler_ignores_non_challenge_status() {
        let handler = DigestHandler {
            challenge_status: 401,
            username: "u".into(),
            password: "p".into(),
            cache: DigestCache::new(),
        };
        let original = HttpRequest::new(HttpMethod::Get, "https://example.com");
        let response = HttpResponse {
            status: 200,
            status_text: "OK".into(),
            headers: MultiMap::new(),
            body: ResponseBody::Text(String::new()),
        };
        assert!(handler.handle_response(&original, &response).await.is_none());
    }
}
