// SPDX-License-Identifier: MIT OR Apache-2.0

//! The injected HTTP capability, plus the default `reqwest`-backed adapter.

use async_trait::async_trait;
use onesdk_error::{NetworkError, NetworkErrorKind};

use crate::request::{HttpMethod, HttpRequest, HttpRequestBody, MultipartField};
use crate::response::{classify_content_type, BodyKind, HttpResponse, ResponseBody};

/// The capability the interpreter dispatches every `HttpCall` through.
/// Implementations must be `Send + Sync` so a single bound context can
/// serve concurrent `perform` invocations.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError>;
}

/// Default adapter over [`reqwest::Client`].
pub struct ReqwestHttpClient {
    inner: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl From<reqwest::Client> for ReqwestHttpClient {
    fn from(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(level = "debug", skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        };

        let mut builder = self.inner.request(method, &request.url);
        for (k, v) in request.headers.iter() {
            builder = builder.header(k, v);
        }
        if !request.query.is_empty() {
            let pairs: Vec<(&str, &str)> = request.query.iter().collect();
            builder = builder.query(&pairs);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            Some(HttpRequestBody::Text(text)) => builder.body(text),
            Some(HttpRequestBody::Binary(binary)) => match binary.data {
                onesdk_value::BinaryData::Bytes(bytes) => builder.body(bytes),
                onesdk_value::BinaryData::Stream(_) => {
                    return Err(NetworkError::new(
                        NetworkErrorKind::Abort,
                        "stream bodies must be materialized before dispatch",
                    ))
                }
            },
            Some(HttpRequestBody::UrlEncoded(pairs)) => builder.form(&pairs),
            Some(HttpRequestBody::Multipart(fields)) => {
                let mut form = reqwest::multipart::Form::new();
                for field in fields {
                    form = match field {
                        MultipartField::Text { name, value } => form.text(name, value),
                        MultipartField::Binary { name, data } => {
                            let bytes = match data.data {
                                onesdk_value::BinaryData::Bytes(b) => b,
                                onesdk_value::BinaryData::Stream(_) => {
                                    return Err(NetworkError::new(
                                        NetworkErrorKind::Abort,
                                        "stream parts must be materialized before dispatch",
                                    ))
                                }
                            };
                            let mut part = reqwest::multipart::Part::bytes(bytes.to_vec());
                            if let Some(filename) = data.filename {
                                part = part.file_name(filename);
                            }
                            if let Some(mime) = data.mime_type {
                                part = part.mime_str(&mime).unwrap_or(part);
                            }
                            form.part(name, part)
                        }
                    };
                }
                builder.multipart(form)
            }
            None => builder,
        };

        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();

        let mut headers = crate::multimap::MultiMap::new();
        for (name, value) in response.headers().iter() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str(), v);
            }
        }
        let content_type = headers.get_first("content-type").unwrap_or("").to_string();

        let bytes = response.bytes().await.map_err(classify_reqwest_error)?;
        let body = match classify_content_type(&content_type) {
            BodyKind::Json => {
                let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
                    NetworkError::new(NetworkErrorKind::Reject, format!("invalid JSON body: {e}"))
                })?;
                ResponseBody::Json(value)
            }
            BodyKind::Binary => ResponseBody::Binary(bytes),
            BodyKind::Text => ResponseBody::Text(
                String::from_utf8(bytes.to_vec())
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()),
            ),
        };

        Ok(HttpResponse {
            status,
            status_text,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> NetworkError {
    let kind = if err.is_timeout() {
        NetworkErrorKind::Timeout
    } else if err.is_connect() {
        NetworkErrorKind::Dns
    } else if err.is_status() {
        NetworkErrorKind::Reject
    } else {
        NetworkErrorKind::Abort
    };
    NetworkError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpMethod;

    #[tokio::test]
    async fn fetches_json_body() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/twelve"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": 12})),
            )
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let request = HttpRequest::new(HttpMethod::Get, format!("{}/twelve", server.uri()));
        let response = client.fetch(request).await.unwrap();
        assert_eq!(response.status, 200);
        match response.body {
            ResponseBody::Json(v) => assert_eq!(v["data"], 12),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetches_text_body_by_default() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/plain"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let request = HttpRequest::new(HttpMethod::Get, format!("{}/plain", server.uri()));
        let response = client.fetch(request).await.unwrap();
        match response.body {
            ResponseBody::Text(s) => assert_eq!(s, "hello"),
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
