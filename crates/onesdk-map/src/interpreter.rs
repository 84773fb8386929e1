// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stack-based interpreter that walks a [`MapDocument`] use-case and
//! drives HTTP calls through the injected [`InterpreterContext`].

use std::collections::BTreeMap;

use onesdk_error::PerformError;
use onesdk_http::{HttpMethod, HttpRequest, HttpRequestBody, HttpResponse, MultipartField};
use onesdk_retry::RetryPolicy;
use onesdk_value::{get_value, merge, set_value, BinaryRef, Variable};

use crate::ast::{Assignment, Expr, HttpCallStatement, MapDocument, RequestNode, ResponseHandler, Statement};
use crate::context::InterpreterContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Map,
    Operation,
}

struct Frame {
    kind: FrameKind,
    variables: Variable,
}

impl Frame {
    fn new(kind: FrameKind, seed: Variable) -> Self {
        Self {
            kind,
            variables: seed,
        }
    }

    fn merge_in(&mut self, path: &[&str], value: Variable) {
        set_value(&mut self.variables, path, value);
    }
}

/// What a statement sequence did: fall through, or terminate the
/// enclosing flow early with a final value.
enum Flow {
    Continue,
    Return(Variable, bool),
}

pub struct Interpreter<'a> {
    doc: &'a MapDocument,
    ctx: &'a InterpreterContext,
    stack: Vec<Frame>,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a MapDocument, ctx: &'a InterpreterContext) -> Self {
        Self {
            doc,
            ctx,
            stack: Vec::new(),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, input), fields(usecase))]
    pub async fn perform(&mut self, usecase: &str, input: Variable) -> Result<Variable, PerformError> {
        let map = self
            .doc
            .map_for(usecase)
            .ok_or_else(|| PerformError::MapAst(format!("no map defined for use-case {usecase}")))?
            .clone();

        let mut seed = BTreeMap::new();
        seed.insert("input".to_string(), input);
        seed.insert("parameters".to_string(), self.ctx.parameters.clone());
        self.stack.push(Frame::new(FrameKind::Map, Variable::Object(seed)));

        let flow = self.execute_statements(&map.statements).await?;

        let frame = self.stack.pop().expect("map frame present");
        match flow {
            Flow::Return(value, is_error) => finalize(value, is_error),
            Flow::Continue => {
                let result = get_value(&frame.variables, &["result"]);
                if matches!(result, Variable::Undefined) {
                    let error = get_value(&frame.variables, &["error"]);
                    if !matches!(error, Variable::Undefined) {
                        return finalize(error, true);
                    }
                }
                finalize(result, false)
            }
        }
    }

    fn scope(&self) -> Variable {
        self.stack
            .iter()
            .fold(Variable::Object(BTreeMap::new()), |acc, frame| {
                merge(acc, frame.variables.clone())
            })
    }

    fn current_mut(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("interpreter stack non-empty")
    }

    async fn execute_statements(&mut self, statements: &[Statement]) -> Result<Flow, PerformError> {
        for statement in statements {
            match self.execute_statement(statement).await? {
                Flow::Continue => {}
                returned => return Ok(returned),
            }
        }
        Ok(Flow::Continue)
    }

    async fn execute_statement(&mut self, statement: &Statement) -> Result<Flow, PerformError> {
        match statement {
            Statement::Set { assignments } => {
                self.apply_assignments(assignments).await?;
                Ok(Flow::Continue)
            }
            Statement::Outcome {
                value,
                is_error,
                terminate_flow,
            } => {
                let scope = self.scope();
                let resolved = self.eval_expr(value, &scope).await?;
                self.record_outcome(resolved.clone(), *is_error);
                if *terminate_flow {
                    Ok(Flow::Return(resolved, *is_error))
                } else {
                    Ok(Flow::Continue)
                }
            }
            Statement::Call {
                operation,
                arguments,
                statements,
            } => self.execute_call(operation, arguments, statements).await,
            Statement::HttpCall(call) => self.execute_http_call(call).await,
        }
    }

    async fn apply_assignments(&mut self, assignments: &[Assignment]) -> Result<(), PerformError> {
        for assignment in assignments {
            let scope = self.scope();
            let value = self.eval_expr(&assignment.value, &scope).await?;
            let path: Vec<&str> = assignment.key.iter().map(String::as_str).collect();
            self.current_mut().merge_in(&path, value);
        }
        Ok(())
    }

    fn record_outcome(&mut self, value: Variable, is_error: bool) {
        let frame = self.current_mut();
        match (frame.kind, is_error) {
            (FrameKind::Map, false) => frame.merge_in(&["result"], value),
            (FrameKind::Map, true) => frame.merge_in(&["error"], value),
            (FrameKind::Operation, false) => frame.merge_in(&["outcome", "data"], value),
            (FrameKind::Operation, true) => frame.merge_in(&["outcome", "error"], value),
        }
    }

    fn eval_expr<'s>(
        &'s mut self,
        expr: &'s Expr,
        scope: &'s Variable,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Variable, PerformError>> + 's>> {
        Box::pin(async move {
            match expr {
                Expr::Literal(v) => Ok(v.clone()),
                Expr::Object(assignments) => {
                    let mut object = Variable::Object(BTreeMap::new());
                    for assignment in assignments {
                        let value = self.eval_expr(&assignment.value, scope).await?;
                        let path: Vec<&str> = assignment.key.iter().map(String::as_str).collect();
                        set_value(&mut object, &path, value);
                    }
                    Ok(object)
                }
                Expr::Jessie(source) => {
                    onesdk_sandbox::evaluate(source, scope).map_err(PerformError::from)
                }
                Expr::InlineCall { operation, arguments } => {
                    self.eval_inline_call(operation, arguments).await
                }
            }
        })
    }

    async fn execute_call(
        &mut self,
        operation_name: &str,
        arguments: &[Assignment],
        trailing: &[Statement],
    ) -> Result<Flow, PerformError> {
        let operation = self
            .doc
            .operation(operation_name)
            .ok_or_else(|| PerformError::MapAst(format!("no operation named {operation_name}")))?
            .clone();

        let scope = self.scope();
        let mut args = Variable::Object(BTreeMap::new());
        for assignment in arguments {
            let value = self.eval_expr(&assignment.value, &scope).await?;
            let path: Vec<&str> = assignment.key.iter().map(String::as_str).collect();
            set_value(&mut args, &path, value);
        }

        self.stack.push(Frame::new(FrameKind::Operation, args));
        let body_flow = Box::pin(self.execute_statements(&operation.statements)).await?;
        let outcome_data = match body_flow {
            Flow::Return(value, is_error) => {
                self.record_outcome(value.clone(), is_error);
                value
            }
            Flow::Continue => get_value(&self.stack.last().unwrap().variables, &["outcome", "data"]),
        };
        let operation_frame = self.stack.pop().expect("operation frame present");
        let outcome_error = get_value(&operation_frame.variables, &["outcome", "error"]);

        let mut outcome_object = BTreeMap::new();
        outcome_object.insert("data".to_string(), outcome_data);
        outcome_object.insert("error".to_string(), outcome_error);
        self.current_mut()
            .merge_in(&["outcome"], Variable::Object(outcome_object));

        Box::pin(self.execute_statements(trailing)).await
    }

    async fn eval_inline_call(
        &mut self,
        operation_name: &str,
        arguments: &[Assignment],
    ) -> Result<Variable, PerformError> {
        let operation = self
            .doc
            .operation(operation_name)
            .ok_or_else(|| PerformError::MapAst(format!("no operation named {operation_name}")))?
            .clone();

        let scope = self.scope();
        let mut args = Variable::Object(BTreeMap::new());
        for assignment in arguments {
            let value = self.eval_expr(&assignment.value, &scope).await?;
            let path: Vec<&str> = assignment.key.iter().map(String::as_str).collect();
            set_value(&mut args, &path, value);
        }

        self.stack.push(Frame::new(FrameKind::Operation, args));
        let body_flow = Box::pin(self.execute_statements(&operation.statements)).await?;
        let result = match body_flow {
            Flow::Return(value, _) => value,
            Flow::Continue => get_value(&self.stack.last().unwrap().variables, &["outcome", "data"]),
        };
        self.stack.pop();
        Ok(result)
    }

    async fn execute_http_call(&mut self, call: &HttpCallStatement) -> Result<Flow, PerformError> {
        let scope = self.scope();
        let path = resolve_url_template(&call.url, &scope)?;

        let service_ids = match &call.service_id {
            Some(id) => {
                let mut ids = vec![id.clone()];
                ids.extend(self.ctx.services.all_ids().into_iter().filter(|i| i != id));
                ids
            }
            None => {
                let default = self.ctx.services.default_service_id().to_string();
                let mut ids = vec![default.clone()];
                ids.extend(self.ctx.services.all_ids().into_iter().filter(|i| *i != default));
                ids
            }
        };

        let request_node = call.request.clone().unwrap_or_default();
        let response = self
            .dispatch_with_policy(call.method, &path, &request_node, &service_ids, &scope)
            .await?;

        let content_type = response.headers.get_first("content-type").unwrap_or("").to_string();
        let content_language = response
            .headers
            .get_first("content-language")
            .unwrap_or("")
            .to_string();

        let handler = call
            .response_handlers
            .iter()
            .find(|h| h.matches(response.status, &content_type, &content_language));

        let body_variable = response_body_to_variable(&response);
        let mut headers_object = BTreeMap::new();
        for (k, v) in response.headers.iter() {
            headers_object.insert(k.to_string(), Variable::String(v.to_string()));
        }

        let frame = self.current_mut();
        frame.merge_in(&["body"], body_variable);
        frame.merge_in(&["statusCode"], Variable::Number(response.status as f64));
        frame.merge_in(&["headers"], Variable::Object(headers_object));

        match handler {
            Some(handler) => self.execute_statements(&handler.statements).await,
            None => Err(PerformError::Http {
                status_code: Some(response.status),
                request: path,
                response: Some(format!("no response handler matched status {}", response.status)),
            }),
        }
    }

    async fn dispatch_with_policy(
        &mut self,
        method: HttpMethod,
        path: &str,
        request_node: &RequestNode,
        service_ids: &[String],
        scope: &Variable,
    ) -> Result<HttpResponse, PerformError> {
        let session = self.ctx.services.failover(service_ids.to_vec());
        let mut last_error: Option<PerformError> = None;

        loop {
            let Some(service) = session.current() else {
                return Err(last_error.unwrap_or_else(|| PerformError::Http {
                    status_code: None,
                    request: path.to_string(),
                    response: None,
                }));
            };
            let service_id = service.id.clone();
            let base_url = service.base_url.clone();

            if !self.ctx.circuit_breaker.is_open(&service_id) {
                loop {
                    let request = self
                        .build_request(method, &base_url, path, request_node, scope)
                        .await?;
                    let outcome = self.dispatch_once(request, request_node).await;

                    match outcome {
                        Ok(response) if !is_server_error(response.status) => {
                            self.ctx.circuit_breaker.record_success(&service_id);
                            return Ok(response);
                        }
                        Ok(response) => {
                            let status = response.status;
                            last_error = Some(PerformError::Http {
                                status_code: Some(status),
                                request: format!("{base_url}{path}"),
                                response: None,
                            });
                            match &self.ctx.retry_policy {
                                RetryPolicy::None => return Err(last_error.unwrap()),
                                RetryPolicy::CircuitBreaker(policy) => {
                                    if self.ctx.circuit_breaker.record_failure(&service_id, policy) {
                                        break;
                                    }
                                    continue;
                                }
                            }
                        }
                        Err(network_err) => {
                            last_error = Some(network_err);
                            match &self.ctx.retry_policy {
                                RetryPolicy::None => return Err(last_error.unwrap()),
                                RetryPolicy::CircuitBreaker(policy) => {
                                    if self.ctx.circuit_breaker.record_failure(&service_id, policy) {
                                        break;
                                    }
                                    continue;
                                }
                            }
                        }
                    }
                }
            }

            if session.advance().is_none() {
                return Err(last_error.unwrap_or_else(|| PerformError::Http {
                    status_code: None,
                    request: path.to_string(),
                    response: None,
                }));
            }
        }
    }

    async fn dispatch_once(
        &mut self,
        mut request: HttpRequest,
        request_node: &RequestNode,
    ) -> Result<HttpResponse, PerformError> {
        let handler = match &request_node.security {
            Some(id) => Some(self.ctx.security_handlers.get(id).ok_or_else(|| {
                PerformError::Unexpected(format!("no security handler bound for id {id}"))
            })?),
            None => None,
        };

        if let Some(handler) = handler {
            handler.prepare_request(&mut request)?;
        }

        let response = self
            .ctx
            .http_client
            .fetch(request.clone())
            .await
            .map_err(|e| PerformError::Http {
                status_code: None,
                request: request.url.clone(),
                response: Some(e.to_string()),
            })?;

        if let Some(handler) = handler {
            if let Some(retry_request) = handler.handle_response(&request, &response).await {
                return self
                    .ctx
                    .http_client
                    .fetch(retry_request.clone())
                    .await
                    .map_err(|e| PerformError::Http {
                        status_code: None,
                        request: retry_request.url.clone(),
                        response: Some(e.to_string()),
                    });
            }
        }

        Ok(response)
    }

    async fn build_request(
        &mut self,
        method: HttpMethod,
        base_url: &str,
        path: &str,
        request_node: &RequestNode,
        scope: &Variable,
    ) -> Result<HttpRequest, PerformError> {
        let mut request = HttpRequest::new(method, format!("{base_url}{path}"));

        for assignment in &request_node.headers {
            let value = self.eval_expr(&assignment.value, scope).await?;
            let name = assignment.key.join(".");
            request.headers.insert(name, value.to_string());
        }
        for assignment in &request_node.query {
            let value = self.eval_expr(&assignment.value, scope).await?;
            let name = assignment.key.join(".");
            request.query.insert(name, value.to_string());
        }

        if let Some(content_type) = &request_node.content_type {
            request.headers.set("content-type", content_type.clone());
        }
        if let Some(content_language) = &request_node.content_language {
            request.headers.set("content-language", content_language.clone());
        }

        if let Some(body_expr) = &request_node.body {
            let value = self.eval_expr(body_expr, scope).await?;
            request.body = Some(build_request_body(request_node.content_type.as_deref(), value)?);
        }

        Ok(request)
    }
}

fn finalize(value: Variable, is_error: bool) -> Result<Variable, PerformError> {
    if is_error {
        Err(PerformError::MappedHttp {
            status_code: None,
            payload: value.into(),
        })
    } else {
        Ok(value)
    }
}

fn resolve_url_template(template: &str, scope: &Variable) -> Result<String, PerformError> {
    let mut result = String::new();
    let mut missing = Vec::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    break;
                }
                name.push(c2);
            }
            let value = get_value(scope, &[&name]);
            if matches!(value, Variable::Undefined) {
                missing.push(name);
            } else {
                result.push_str(&value.to_string());
            }
        } else {
            result.push(c);
        }
    }
    if !missing.is_empty() {
        return Err(PerformError::Http {
            status_code: None,
            request: template.to_string(),
            response: Some(format!("unresolved URL placeholders: {}", missing.join(", "))),
        });
    }
    Ok(result)
}

fn is_server_error(status: u16) -> bool {
    (500..600).contains(&status)
}

fn response_body_to_variable(response: &HttpResponse) -> Variable {
    match &response.body {
        onesdk_http::ResponseBody::Json(value) => Variable::from(value.clone()),
        onesdk_http::ResponseBody::Text(text) => Variable::String(text.clone()),
        onesdk_http::ResponseBody::Binary(bytes) => Variable::Binary(BinaryRef::bytes(bytes.clone())),
    }
}

fn build_request_body(content_type: Option<&str>, value: Variable) -> Result<HttpRequestBody, PerformError> {
    match content_type {
        Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
            let object = value.as_object().ok_or_else(|| {
                PerformError::Unexpected("url-encoded body requires an object value".to_string())
            })?;
            let pairs = object
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect();
            Ok(HttpRequestBody::UrlEncoded(pairs))
        }
        Some(ct) if ct.starts_with("multipart/form-data") => {
            let object = value.as_object().ok_or_else(|| {
                PerformError::Unexpected("multipart body requires an object value".to_string())
            })?;
            let mut fields = Vec::new();
            for (name, field_value) in object {
                match field_value {
                    Variable::Array(items) => {
                        for item in items {
                            push_multipart_field(&mut fields, name, item);
                        }
                    }
                    other => push_multipart_field(&mut fields, name, other),
                }
            }
            Ok(HttpRequestBody::Multipart(fields))
        }
        Some(ct) if ct.ends_with("json") => {
            Ok(HttpRequestBody::Text(serde_json::to_string(&serde_json::Value::from(value)).map_err(
                |e| PerformError::Unexpected(format!("failed to serialize JSON body: {e}")),
            )?))
        }
        None => match &value {
            Variable::Object(_) | Variable::Array(_) => Ok(HttpRequestBody::Text(
                serde_json::to_string(&serde_json::Value::from(value))
                    .map_err(|e| PerformError::Unexpected(format!("failed to serialize JSON body: {e}")))?,
            )),
            Variable::Binary(b) => Ok(HttpRequestBody::Binary(b.clone())),
            other => Ok(HttpRequestBody::Text(other.to_string())),
        },
        Some(_) => match value {
            Variable::Binary(b) => Ok(HttpRequestBody::Binary(b)),
            other => Ok(HttpRequestBody::Text(other.to_string())),
        },
    }
}

fn push_multipart_field(fields: &mut Vec<MultipartField>, name: &str, value: &Variable) {
    match value {
        Variable::Binary(data) => fields.push(MultipartField::Binary {
            name: name.to_string(),
            data: data.clone(),
        }),
        other => fields.push(MultipartField::Text {
            name: name.to_string(),
            value: other.to_string(),
        }),
    }
}
