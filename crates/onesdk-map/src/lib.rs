// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Map AST types and the stack-based interpreter that executes a use-case
//! against a concrete provider, driving HTTP calls through an injected
//! [`InterpreterContext`].

mod ast;
mod context;
mod interpreter;

pub use ast::{
    Assignment, Expr, HttpCallStatement, MapDef, MapDocument, OperationDef, RequestNode,
    ResponseHandler, Statement,
};
pub use context::InterpreterContext;
use interpreter::Interpreter;
use onesdk_error::PerformError;
use onesdk_value::Variable;

/// Run `usecase` from `doc` against `input`, returning the use-case result
/// or propagating whatever `Outcome(..., error: true)` or transport failure
/// ended the flow.
#[tracing::instrument(level = "info", skip(doc, ctx, input), fields(usecase, provider = %doc.provider))]
pub async fn perform(
    doc: &MapDocument,
    usecase: &str,
    input: Variable,
    ctx: &InterpreterContext,
) -> Result<Variable, PerformError> {
    let mut interpreter = Interpreter::new(doc, ctx);
    interpreter.perform(usecase, input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use onesdk_http::{
        HttpClient, HttpMethod as Method, HttpRequest, HttpRequestBody, HttpResponse, MultiMap,
        ResponseBody,
    };
    use onesdk_retry::{CircuitBreakerState, RetryPolicy, Service, ServiceSelector};
    use onesdk_security::SecurityHandler;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::Arc;

    /// An in-process `HttpClient` stub that replays a queued response per
    /// call, recording every request it received for assertions.
    struct MockHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, onesdk_error::NetworkError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockHttpClient {
        fn new(responses: Vec<Result<HttpResponse, onesdk_error::NetworkError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, onesdk_error::NetworkError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock client ran out of stubbed responses")
        }
    }

    fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
        let mut headers = MultiMap::new();
        headers.set("content-type", "application/json");
        HttpResponse {
            status,
            status_text: String::new(),
            headers,
            body: ResponseBody::Json(body),
        }
    }

    fn single_service_ctx(client: MockHttpClient, base_url: &str) -> InterpreterContext {
        InterpreterContext {
            http_client: Arc::new(client),
            services: Arc::new(ServiceSelector::new(
                vec![Service {
                    id: "default".into(),
                    base_url: base_url.into(),
                }],
                "default",
            )),
            security_handlers: BTreeMap::new(),
            retry_policy: RetryPolicy::None,
            circuit_breaker: Arc::new(CircuitBreakerState::new()),
            parameters: Variable::Object(BTreeMap::new()),
        }
    }

    fn get_users_doc() -> MapDocument {
        let mut maps = BTreeMap::new();
        maps.insert(
            "GetUser".into(),
            MapDef {
                usecase_name: "GetUser".into(),
                statements: vec![Statement::HttpCall(HttpCallStatement {
                    method: Method::Get,
                    url: "/users/{input.id}".into(),
                    service_id: None,
                    request: None,
                    response_handlers: vec![ResponseHandler {
                        status_code: Some(200),
                        content_type: Some("application/json".into()),
                        content_language: None,
                        statements: vec![Statement::Outcome {
                            value: Expr::Jessie("body".into()),
                            is_error: false,
                            terminate_flow: true,
                        }],
                    }],
                })],
            },
        );
        MapDocument {
            profile_id: "test/get-user".into(),
            provider: "acme".into(),
            variant: None,
            maps,
            operations: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn json_get_returns_decoded_body() {
        let client = MockHttpClient::new(vec![Ok(json_response(
            200,
            serde_json::json!({"name": "Ada"}),
        ))]);
        let ctx = single_service_ctx(client, "https://api.example.com");
        let doc = get_users_doc();
        let mut input = BTreeMap::new();
        input.insert("id".to_string(), Variable::String("42".into()));

        let result = perform(&doc, "GetUser", Variable::Object(input), &ctx)
            .await
            .unwrap();
        assert_eq!(
            result,
            Variable::Object(BTreeMap::from([("name".to_string(), Variable::String("Ada".into()))]))
        );
    }

    #[tokio::test]
    async fn missing_url_placeholder_is_reported_before_dispatch() {
        let client = MockHttpClient::new(vec![Ok(json_response(200, serde_json::json!({})))]);
        let ctx = single_service_ctx(client, "https://api.example.com");
        let doc = get_users_doc();

        let err = perform(&doc, "GetUser", Variable::Object(BTreeMap::new()), &ctx)
            .await
            .unwrap_err();
        match err {
            PerformError::Http { response: Some(msg), .. } => assert!(msg.contains("input.id")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn upload_doc() -> MapDocument {
        let mut maps = BTreeMap::new();
        let mut assignments = vec![Assignment {
            key: vec!["tags".into()],
            value: Expr::Literal(Variable::Array(vec![
                Variable::String("a".into()),
                Variable::String("b".into()),
            ])),
        }];
        assignments.push(Assignment {
            key: vec!["file".into()],
            value: Expr::Literal(Variable::Binary(
                onesdk_value::BinaryRef::bytes(bytes::Bytes::from_static(b"payload"))
                    .with_filename("payload.bin")
                    .with_mime_type("application/octet-stream"),
            )),
        });
        maps.insert(
            "UploadFile".into(),
            MapDef {
                usecase_name: "UploadFile".into(),
                statements: vec![Statement::HttpCall(HttpCallStatement {
                    method: Method::Post,
                    url: "/upload".into(),
                    service_id: None,
                    request: Some(RequestNode {
                        content_type: Some("multipart/form-data".into()),
                        content_language: None,
                        headers: vec![],
                        query: vec![],
                        body: Some(Expr::Object(assignments)),
                        security: None,
                    }),
                    response_handlers: vec![ResponseHandler {
                        status_code: Some(200),
                        content_type: None,
                        content_language: None,
                        statements: vec![Statement::Outcome {
                            value: Expr::Literal(Variable::Bool(true)),
                            is_error: false,
                            terminate_flow: true,
                        }],
                    }],
                })],
            },
        );
        MapDocument {
            profile_id: "test/upload".into(),
            provider: "acme".into(),
            variant: None,
            maps,
            operations: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn multipart_upload_explodes_array_field_and_sends_binary_part() {
        let client = Arc::new(MockHttpClient::new(vec![Ok(json_response(
            200,
            serde_json::json!({}),
        ))]));
        let ctx = InterpreterContext {
            http_client: client.clone(),
            services: Arc::new(ServiceSelector::new(
                vec![Service {
                    id: "default".into(),
                    base_url: "https://upload.example.com".into(),
                }],
                "default",
            )),
            security_handlers: BTreeMap::new(),
            retry_policy: RetryPolicy::None,
            circuit_breaker: Arc::new(CircuitBreakerState::new()),
            parameters: Variable::Object(BTreeMap::new()),
        };
        let doc = upload_doc();

        let result = perform(&doc, "UploadFile", Variable::Object(BTreeMap::new()), &ctx)
            .await
            .unwrap();
        assert_eq!(result, Variable::Bool(true));

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let body = requests[0]
            .body
            .as_ref()
            .expect("upload request must have a body");
        let fields = match body {
            HttpRequestBody::Multipart(fields) => fields,
            other => panic!("expected a multipart body, got {other:?}"),
        };

        let tags: Vec<&str> = fields
            .iter()
            .filter_map(|f| match f {
                onesdk_http::MultipartField::Text { name, value } if name == "tags" => {
                    Some(value.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(tags, vec!["a", "b"]);

        let binaries: Vec<_> = fields
            .iter()
            .filter_map(|f| match f {
                onesdk_http::MultipartField::Binary { name, data } if name == "file" => {
                    Some(data)
                }
                _ => None,
            })
            .collect();
        assert_eq!(binaries.len(), 1);
        assert_eq!(binaries[0].filename.as_deref(), Some("payload.bin"));
        assert_eq!(binaries[0].mime_type.as_deref(), Some("application/octet-stream"));
    }

    struct RecordingBearerHandler;

    #[async_trait]
    impl SecurityHandler for RecordingBearerHandler {
        fn prepare_request(&self, request: &mut HttpRequest) -> Result<(), PerformError> {
            request.headers.set("authorization", "Bearer token-123");
            Ok(())
        }
    }

    #[tokio::test]
    async fn security_handler_prepares_request_before_dispatch() {
        let client = MockHttpClient::new(vec![Ok(json_response(200, serde_json::json!({"ok": true})))]);
        let mut ctx = single_service_ctx(client, "https://api.example.com");
        let mut handlers: BTreeMap<String, Arc<dyn SecurityHandler>> = BTreeMap::new();
        handlers.insert("main".into(), Arc::new(RecordingBearerHandler));
        ctx.security_handlers = handlers;

        let mut maps = BTreeMap::new();
        maps.insert(
            "Secured".into(),
            MapDef {
                usecase_name: "Secured".into(),
                statements: vec![Statement::HttpCall(HttpCallStatement {
                    method: Method::Get,
                    url: "/secure".into(),
                    service_id: None,
                    request: Some(RequestNode {
                        content_type: None,
                        content_language: None,
                        headers: vec![],
                        query: vec![],
                        body: None,
                        security: Some("main".into()),
                    }),
                    response_handlers: vec![ResponseHandler {
                        status_code: Some(200),
                        content_type: None,
                        content_language: None,
                        statements: vec![Statement::Outcome {
                            value: Expr::Jessie("body.ok".into()),
                            is_error: false,
                            terminate_flow: true,
                        }],
                    }],
                })],
            },
        );
        let doc = MapDocument {
            profile_id: "test/secure".into(),
            provider: "acme".into(),
            variant: None,
            maps,
            operations: BTreeMap::new(),
        };

        let result = perform(&doc, "Secured", Variable::Object(BTreeMap::new()), &ctx)
            .await
            .unwrap();
        assert_eq!(result, Variable::Bool(true));
    }

    #[tokio::test]
    async fn retry_policy_fails_over_to_second_service_on_server_error() {
        let client = MockHttpClient::new(vec![Ok(HttpResponse {
            status: 503,
            status_text: "Service Unavailable".into(),
            headers: MultiMap::new(),
            body: ResponseBody::Text(String::new()),
        })]);
        let failing = Arc::new(client);

        let second_responses = MockHttpClient::new(vec![Ok(json_response(
            200,
            serde_json::json!({"ok": true}),
        ))]);

        struct DualClient {
            primary: Arc<MockHttpClient>,
            secondary: MockHttpClient,
        }

        #[async_trait]
        impl HttpClient for DualClient {
            async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, onesdk_error::NetworkError> {
                if request.url.starts_with("https://primary") {
                    self.primary.fetch(request).await
                } else {
                    self.secondary.fetch(request).await
                }
            }
        }

        let dual = DualClient {
            primary: failing.clone(),
            secondary: second_responses,
        };

        let ctx = InterpreterContext {
            http_client: Arc::new(dual),
            services: Arc::new(ServiceSelector::new(
                vec![
                    Service {
                        id: "primary".into(),
                        base_url: "https://primary.example.com".into(),
                    },
                    Service {
                        id: "secondary".into(),
                        base_url: "https://secondary.example.com".into(),
                    },
                ],
                "primary",
            )),
            security_handlers: BTreeMap::new(),
            retry_policy: RetryPolicy::CircuitBreaker(onesdk_retry::CircuitBreakerPolicy {
                max_contiguous_retries: 0,
                request_timeout: None,
                backoff: onesdk_retry::BackoffPolicy::None,
                open_time: std::time::Duration::from_secs(30),
            }),
            circuit_breaker: Arc::new(CircuitBreakerState::new()),
            parameters: Variable::Object(BTreeMap::new()),
        };

        let mut maps = BTreeMap::new();
        maps.insert(
            "Flaky".into(),
            MapDef {
                usecase_name: "Flaky".into(),
                statements: vec![Statement::HttpCall(HttpCallStatement {
                    method: Method::Get,
                    url: "/status".into(),
                    service_id: None,
                    request: None,
                    response_handlers: vec![ResponseHandler {
                        status_code: Some(200),
                        content_type: None,
                        content_language: None,
                        statements: vec![Statement::Outcome {
                            value: Expr::Jessie("body.ok".into()),
                            is_error: false,
                            terminate_flow: true,
                        }],
                    }],
                })],
            },
        );
        let doc = MapDocument {
            profile_id: "test/flaky".into(),
            provider: "acme".into(),
            variant: None,
            maps,
            operations: BTreeMap::new(),
        };

        let result = perform(&doc, "Flaky", Variable::Object(BTreeMap::new()), &ctx)
            .await
            .unwrap();
        assert_eq!(result, Variable::Bool(true));
    }
}
