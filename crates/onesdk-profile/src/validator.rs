// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural validation of a [`Variable`] against a profile's input or
//! result slot. Errors are accumulated, never short-circuited, and every
//! error carries the dotted path at which it was found.

use onesdk_error::{ValidationError, ValidationErrorKind};
use onesdk_value::{get_value, Variable};

use crate::ast::{ProfileDocument, TypeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Input,
    Result,
}

/// Validate `value` against the named use-case's input or result slot.
pub fn validate(
    doc: &ProfileDocument,
    usecase_name: &str,
    kind: ValidationKind,
    value: &Variable,
) -> Result<(), Vec<ValidationError>> {
    let root_name = match kind {
        ValidationKind::Input => "input",
        ValidationKind::Result => "result",
    };

    let usecase = match doc.use_case(usecase_name) {
        Some(u) => u,
        None => {
            return Err(vec![ValidationError::new(
                root_name,
                ValidationErrorKind::WrongInput,
            )])
        }
    };

    let slot = match kind {
        ValidationKind::Input => &usecase.input,
        ValidationKind::Result => &usecase.result,
    };

    let mut errors = Vec::new();
    match slot {
        Some(node) => validate_node(doc, node, value, root_name, &mut errors),
        None => {
            if !is_empty(value) {
                errors.push(ValidationError::new(root_name, ValidationErrorKind::WrongInput));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_empty(value: &Variable) -> bool {
    matches!(value, Variable::Undefined | Variable::Null)
}

fn validate_node(
    doc: &ProfileDocument,
    node: &TypeNode,
    value: &Variable,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    match node {
        TypeNode::NonNull(inner) => {
            if matches!(value, Variable::Undefined) {
                errors.push(ValidationError::new(path, ValidationErrorKind::MissingRequired));
            } else {
                validate_node(doc, inner, value, path, errors);
            }
        }
        TypeNode::Primitive(primitive) => {
            if matches!(value, Variable::Undefined) {
                return;
            }
            if !primitive.matches(value) {
                errors.push(ValidationError::new(
                    path,
                    ValidationErrorKind::WrongType {
                        expected: primitive.name().to_string(),
                        actual: value.type_name().to_string(),
                    },
                ));
            }
        }
        TypeNode::Enum(values) => {
            if matches!(value, Variable::Undefined) {
                return;
            }
            if !values.contains(value) {
                errors.push(ValidationError::new(
                    path,
                    ValidationErrorKind::EnumValue {
                        expected: values.iter().map(|v| v.to_string()).collect(),
                    },
                ));
            }
        }
        TypeNode::List(elem) => {
            if matches!(value, Variable::Undefined) {
                return;
            }
            match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        validate_node(doc, elem, item, &format!("{path}[{i}]"), errors);
                    }
                }
                None => errors.push(ValidationError::new(
                    path,
                    ValidationErrorKind::WrongType {
                        expected: "array".to_string(),
                        actual: value.type_name().to_string(),
                    },
                )),
            }
        }
        TypeNode::Object(fields) => {
            if matches!(value, Variable::Undefined) {
                return;
            }
            if value.as_object().is_none() {
                errors.push(ValidationError::new(
                    path,
                    ValidationErrorKind::WrongType {
                        expected: "object".to_string(),
                        actual: value.type_name().to_string(),
                    },
                ));
                return;
            }
            for (field_name, field_type) in fields {
                let field_value = get_value(value, &[field_name]);
                let field_path = format!("{path}.{field_name}");
                validate_node(doc, field_type, &field_value, &field_path, errors);
            }
        }
        TypeNode::Union(branches) => {
            if matches!(value, Variable::Undefined) {
                return;
            }
            let mut matched = false;
            for branch in branches {
                let mut branch_errors = Vec::new();
                validate_node(doc, branch, value, path, &mut branch_errors);
                if branch_errors.is_empty() {
                    matched = true;
                    break;
                }
            }
            if !matched {
                errors.push(ValidationError::new(
                    path,
                    ValidationErrorKind::WrongUnion {
                        expected: branches.iter().map(TypeNode::describe).collect(),
                    },
                ));
            }
        }
        TypeNode::ModelRef(name) => match doc.models.get(name) {
            Some(resolved) => validate_node(doc, resolved, value, path, errors),
            None => errors.push(ValidationError::new(
                path,
                ValidationErrorKind::WrongType {
                    expected: format!("model:{name}"),
                    actual: "unresolved".to_string(),
                },
            )),
        },
        TypeNode::FieldRef(name) => match doc.fields.get(name) {
            Some(resolved) => validate_node(doc, resolved, value, path, errors),
            None => errors.push(ValidationError::new(
                path,
                ValidationErrorKind::WrongType {
                    expected: format!("field:{name}"),
                    actual: "unresolved".to_string(),
                },
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PrimitiveType, UseCase};
    use std::collections::BTreeMap;

    fn doc_with_input(input: TypeNode) -> ProfileDocument {
        let mut use_cases = BTreeMap::new();
        use_cases.insert(
            "Test".to_string(),
            UseCase {
                name: "Test".to_string(),
                input: Some(input),
                result: Some(TypeNode::Primitive(PrimitiveType::Number)),
                error: None,
            },
        );
        ProfileDocument {
            id: "test/profile".to_string(),
            version: "1.0.0".to_string(),
            use_cases,
            models: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    fn user_input_type() -> TypeNode {
        let mut fields = BTreeMap::new();
        fields.insert(
            "name".to_string(),
            TypeNode::NonNull(Box::new(TypeNode::Primitive(PrimitiveType::String))),
        );
        fields.insert("age".to_string(), TypeNode::Primitive(PrimitiveType::Number));
        let user = TypeNode::Object(fields);
        let mut top = BTreeMap::new();
        top.insert("user".to_string(), TypeNode::NonNull(Box::new(user)));
        TypeNode::Object(top)
    }

    #[test]
    fn s1_scenario_reports_missing_and_wrong_type() {
        let doc = doc_with_input(user_input_type());
        let mut user = BTreeMap::new();
        user.insert("age".to_string(), Variable::String("x".into()));
        let mut input = BTreeMap::new();
        input.insert("user".to_string(), Variable::Object(user));
        let value = Variable::Object(input);

        let errors = validate(&doc, "Test", ValidationKind::Input, &value).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| e.path == "input.user.name" && matches!(e.kind, ValidationErrorKind::MissingRequired)));
        assert!(errors.iter().any(|e| e.path == "input.user.age"
            && matches!(
                &e.kind,
                ValidationErrorKind::WrongType { expected, actual }
                    if expected == "number" && actual == "string"
            )));
    }

    #[test]
    fn valid_input_passes() {
        let doc = doc_with_input(user_input_type());
        let mut user = BTreeMap::new();
        user.insert("name".to_string(), Variable::String("Ada".into()));
        user.insert("age".to_string(), Variable::Number(30.0));
        let mut input = BTreeMap::new();
        input.insert("user".to_string(), Variable::Object(user));
        let value = Variable::Object(input);

        assert!(validate(&doc, "Test", ValidationKind::Input, &value).is_ok());
    }

    #[test]
    fn undefined_passes_through_list_and_union() {
        let list_type = TypeNode::List(Box::new(TypeNode::Primitive(PrimitiveType::Number)));
        let doc = doc_with_input(list_type);
        assert!(validate(&doc, "Test", ValidationKind::Input, &Variable::Undefined).is_ok());

        let union_type = TypeNode::Union(vec![
            TypeNode::Primitive(PrimitiveType::String),
            TypeNode::Primitive(PrimitiveType::Number),
        ]);
        let doc = doc_with_input(union_type);
        assert!(validate(&doc, "Test", ValidationKind::Input, &Variable::Undefined).is_ok());
    }

    #[test]
    fn union_succeeds_if_any_branch_matches() {
        let union_type = TypeNode::Union(vec![
            TypeNode::Primitive(PrimitiveType::String),
            TypeNode::Primitive(PrimitiveType::Number),
        ]);
        let doc = doc_with_input(union_type);
        assert!(validate(&doc, "Test", ValidationKind::Input, &Variable::Number(1.0)).is_ok());
        let errors = validate(&doc, "Test", ValidationKind::Input, &Variable::Bool(true)).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0].kind, ValidationErrorKind::WrongUnion { .. }));
    }

    #[test]
    fn list_elements_report_their_own_indexed_path() {
        let list_type = TypeNode::List(Box::new(TypeNode::Primitive(PrimitiveType::Number)));
        let doc = doc_with_input(list_type);
        let value = Variable::Array(vec![Variable::Number(1.0), Variable::String("x".into())]);
        let errors = validate(&doc, "Test", ValidationKind::Input, &value).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "input[1]");
    }
}
