// SPDX-License-Identifier: MIT OR Apache-2.0

//! Map AST: one document per provider, holding a `Map` body per use-case
//! plus any number of reusable `Operation`s. Produced by an external
//! parser; treated as immutable input.

use std::collections::BTreeMap;

use onesdk_http::HttpMethod;
use onesdk_value::Variable;

#[derive(Debug, Clone)]
pub struct MapDocument {
    pub profile_id: String,
    pub provider: String,
    pub variant: Option<String>,
    pub maps: BTreeMap<String, MapDef>,
    pub operations: BTreeMap<String, OperationDef>,
}

impl MapDocument {
    pub fn map_for(&self, usecase: &str) -> Option<&MapDef> {
        self.maps.get(usecase)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDef> {
        self.operations.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct MapDef {
    pub usecase_name: String,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct OperationDef {
    pub name: String,
    pub statements: Vec<Statement>,
}

/// A single `key.path = value` assignment, as used by `Set`, object
/// literals, and call arguments.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub key: Vec<String>,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Set {
        assignments: Vec<Assignment>,
    },
    Outcome {
        value: Expr,
        is_error: bool,
        terminate_flow: bool,
    },
    Call {
        operation: String,
        arguments: Vec<Assignment>,
        statements: Vec<Statement>,
    },
    HttpCall(HttpCallStatement),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Variable),
    Object(Vec<Assignment>),
    InlineCall {
        operation: String,
        arguments: Vec<Assignment>,
    },
    Jessie(String),
}

#[derive(Debug, Clone)]
pub struct HttpCallStatement {
    pub method: HttpMethod,
    pub url: String,
    pub service_id: Option<String>,
    pub request: Option<RequestNode>,
    pub response_handlers: Vec<ResponseHandler>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestNode {
    pub content_type: Option<String>,
    pub content_language: Option<String>,
    pub headers: Vec<Assignment>,
    pub query: Vec<Assignment>,
    pub body: Option<Expr>,
    pub security: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResponseHandler {
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content_language: Option<String>,
    pub statements: Vec<Statement>,
}

impl ResponseHandler {
    pub fn matches(&self, status: u16, content_type: &str, content_language: &str) -> bool {
        if let Some(expected) = self.status_code {
            if expected != status {
                return false;
            }
        }
        if let Some(expected) = &self.content_type {
            if !content_type.starts_with(expected.as_str()) {
                return false;
            }
        }
        if let Some(expected) = &self.content_language {
            if !content_language.starts_with(expected.as_str()) {
                return false;
            }
        }
        true
    }
}
