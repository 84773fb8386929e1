// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decodes the JSON-encoded profile and map ASTs the registry (or a local
//! build artifact) hands back into the typed trees `onesdk-profile` and
//! `onesdk-map` operate on. The AST types themselves carry no `serde`
//! derives - they are produced by an external parser out of this crate's
//! scope - so decoding is done by hand, field by field.

use std::collections::BTreeMap;

use onesdk_error::BindError;
use onesdk_http::HttpMethod;
use onesdk_map::{
    Assignment, Expr, HttpCallStatement, MapDef, MapDocument, OperationDef, RequestNode,
    ResponseHandler, Statement,
};
use onesdk_profile::{PrimitiveType, ProfileDocument, TypeNode, UseCase};
use onesdk_value::Variable;
use serde_json::Value;

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, BindError> {
    value.get(name).ok_or_else(|| BindError::InvalidMapAstResponse {
        reason: format!("missing field '{name}'"),
    })
}

fn as_str<'a>(value: &'a Value, name: &str) -> Result<&'a str, BindError> {
    field(value, name)?
        .as_str()
        .ok_or_else(|| BindError::InvalidMapAstResponse {
            reason: format!("field '{name}' must be a string"),
        })
}

fn as_object<'a>(value: &'a Value) -> Result<&'a serde_json::Map<String, Value>, BindError> {
    value.as_object().ok_or_else(|| BindError::InvalidMapAstResponse {
        reason: "expected a JSON object".to_string(),
    })
}

fn as_array<'a>(value: &'a Value) -> Result<&'a Vec<Value>, BindError> {
    value.as_array().ok_or_else(|| BindError::InvalidMapAstResponse {
        reason: "expected a JSON array".to_string(),
    })
}

pub fn decode_map_document(value: &Value) -> Result<MapDocument, BindError> {
    let profile_id = as_str(value, "profileId")?.to_string();
    let provider = as_str(value, "provider")?.to_string();
    let variant = value
        .get("variant")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut maps = BTreeMap::new();
    for (usecase_name, def) in as_object(field(value, "maps")?)? {
        let statements = decode_statements(field(def, "statements")?)?;
        maps.insert(
            usecase_name.clone(),
            MapDef {
                usecase_name: usecase_name.clone(),
                statements,
            },
        );
    }

    let mut operations = BTreeMap::new();
    if let Some(ops) = value.get("operations") {
        for (name, def) in as_object(ops)? {
            let statements = decode_statements(field(def, "statements")?)?;
            operations.insert(
                name.clone(),
                OperationDef {
                    name: name.clone(),
                    statements,
                },
            );
        }
    }

    Ok(MapDocument {
        profile_id,
        provider,
        variant,
        maps,
        operations,
    })
}

fn decode_statements(value: &Value) -> Result<Vec<Statement>, BindError> {
    as_array(value)?.iter().map(decode_statement).collect()
}

fn decode_statement(value: &Value) -> Result<Statement, BindError> {
    match as_str(value, "kind")? {
        "set" => Ok(Statement::Set {
            assignments: decode_assignments(field(value, "assignments")?)?,
        }),
        "outcome" => Ok(Statement::Outcome {
            value: decode_expr(field(value, "value")?)?,
            is_error: value.get("isError").and_then(Value::as_bool).unwrap_or(false),
            terminate_flow: value
                .get("terminateFlow")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        "call" => Ok(Statement::Call {
            operation: as_str(value, "operation")?.to_string(),
            arguments: decode_assignments(field(value, "arguments")?)?,
            statements: decode_statements(field(value, "statements")?)?,
        }),
        "httpCall" => Ok(Statement::HttpCall(decode_http_call(value)?)),
        other => Err(BindError::InvalidMapAstResponse {
            reason: format!("unknown statement kind '{other}'"),
        }),
    }
}

fn decode_assignments(value: &Value) -> Result<Vec<Assignment>, BindError> {
    as_array(value)?
        .iter()
        .map(|entry| {
            let key = as_array(field(entry, "key")?)?
                .iter()
                .map(|k| {
                    k.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| BindError::InvalidMapAstResponse {
                            reason: "assignment key segments must be strings".to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Assignment {
                key,
                value: decode_expr(field(entry, "value")?)?,
            })
        })
        .collect()
}

fn decode_expr(value: &Value) -> Result<Expr, BindError> {
    match as_str(value, "kind")? {
        "literal" => Ok(Expr::Literal(Variable::from(field(value, "value")?.clone()))),
        "object" => Ok(Expr::Object(decode_assignments(field(value, "assignments")?)?)),
        "inlineCall" => Ok(Expr::InlineCall {
            operation: as_str(value, "operation")?.to_string(),
            arguments: decode_assignments(field(value, "arguments")?)?,
        }),
        "jessie" => Ok(Expr::Jessie(as_str(value, "source")?.to_string())),
        other => Err(BindError::InvalidMapAstResponse {
            reason: format!("unknown expression kind '{other}'"),
        }),
    }
}

fn decode_http_call(value: &Value) -> Result<HttpCallStatement, BindError> {
    let method = match as_str(value, "method")?.to_ascii_uppercase().as_str() {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        "HEAD" => HttpMethod::Head,
        "OPTIONS" => HttpMethod::Options,
        other => {
            return Err(BindError::InvalidMapAstResponse {
                reason: format!("unknown HTTP method '{other}'"),
            })
        }
    };
    let request = match value.get("request") {
        Some(Value::Null) | None => None,
        Some(node) => Some(decode_request_node(node)?),
    };
    let response_handlers = as_array(field(value, "responseHandlers")?)?
        .iter()
        .map(decode_response_handler)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HttpCallStatement {
        method,
        url: as_str(value, "url")?.to_string(),
        service_id: value
            .get("serviceId")
            .and_then(Value::as_str)
            .map(str::to_string),
        request,
        response_handlers,
    })
}

fn decode_request_node(value: &Value) -> Result<RequestNode, BindError> {
    let headers = match value.get("headers") {
        Some(v) => decode_assignments(v)?,
        None => Vec::new(),
    };
    let query = match value.get("query") {
        Some(v) => decode_assignments(v)?,
        None => Vec::new(),
    };
    let body = match value.get("body") {
        Some(Value::Null) | None => None,
        Some(expr) => Some(decode_expr(expr)?),
    };
    Ok(RequestNode {
        content_type: value
            .get("contentType")
            .and_then(Value::as_str)
            .map(str::to_string),
        content_language: value
            .get("contentLanguage")
            .and_then(Value::as_str)
            .map(str::to_string),
        headers,
        query,
        body,
        security: value
            .get("security")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn decode_response_handler(value: &Value) -> Result<ResponseHandler, BindError> {
    Ok(ResponseHandler {
        status_code: value
            .get("statusCode")
            .and_then(Value::as_u64)
            .map(|n| n as u16),
        content_type: value
            .get("contentType")
            .and_then(Value::as_str)
            .map(str::to_string),
        content_language: value
            .get("contentLanguage")
            .and_then(Value::as_str)
            .map(str::to_string),
        statements: decode_statements(field(value, "statements")?)?,
    })
}

pub fn decode_profile_document(value: &Value) -> Result<ProfileDocument, BindError> {
    let id = as_str(value, "id")?.to_string();
    let version = as_str(value, "version")?.to_string();

    let mut use_cases = BTreeMap::new();
    for (name, def) in as_object(field(value, "useCases")?)? {
        use_cases.insert(
            name.clone(),
            UseCase {
                name: name.clone(),
                input: decode_optional_type_node(def.get("input"))?,
                result: decode_optional_type_node(def.get("result"))?,
                error: decode_optional_type_node(def.get("error"))?,
            },
        );
    }

    let mut models = BTreeMap::new();
    if let Some(m) = value.get("models") {
        for (name, node) in as_object(m)? {
            models.insert(name.clone(), decode_type_node(node)?);
        }
    }

    let mut fields = BTreeMap::new();
    if let Some(f) = value.get("fields") {
        for (name, node) in as_object(f)? {
            fields.insert(name.clone(), decode_type_node(node)?);
        }
    }

    Ok(ProfileDocument {
        id,
        version,
        use_cases,
        models,
        fields,
    })
}

fn decode_optional_type_node(value: Option<&Value>) -> Result<Option<TypeNode>, BindError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(node) => Ok(Some(decode_type_node(node)?)),
    }
}

fn decode_type_node(value: &Value) -> Result<TypeNode, BindError> {
    match as_str(value, "kind")? {
        "primitive" => {
            let ty = match as_str(value, "type")? {
                "string" => PrimitiveType::String,
                "number" => PrimitiveType::Number,
                "boolean" => PrimitiveType::Boolean,
                other => {
                    return Err(BindError::UnableToResolveProfile {
                        profile_id: format!("unknown primitive type '{other}'"),
                    })
                }
            };
            Ok(TypeNode::Primitive(ty))
        }
        "enum" => Ok(TypeNode::Enum(
            as_array(field(value, "values")?)?
                .iter()
                .cloned()
                .map(Variable::from)
                .collect(),
        )),
        "object" => {
            let mut fields = BTreeMap::new();
            for (name, node) in as_object(field(value, "fields")?)? {
                fields.insert(name.clone(), decode_type_node(node)?);
            }
            Ok(TypeNode::Object(fields))
        }
        "list" => Ok(TypeNode::List(Box::new(decode_type_node(field(value, "of")?)?))),
        "union" => Ok(TypeNode::Union(
            as_array(field(value, "of")?)?
                .iter()
                .map(decode_type_node)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        "nonNull" => Ok(TypeNode::NonNull(Box::new(decode_type_node(field(
            value, "of",
        )?)?))),
        "modelRef" => Ok(TypeNode::ModelRef(as_str(value, "name")?.to_string())),
        "fieldRef" => Ok(TypeNode::FieldRef(as_str(value, "name")?.to_string())),
        other => Err(BindError::UnableToResolveProfile {
            profile_id: format!("unknown type node kind '{other}'"),
        }),
    }
}
