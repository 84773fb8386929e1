// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile AST: named models/fields plus the use-cases that reference
//! them. Produced by an external parser; treated as immutable input.

use std::collections::BTreeMap;

use onesdk_value::Variable;

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum PrimitiveType {
    String,
    Number,
    Boolean,
}

impl PrimitiveType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    pub fn matches(&self, value: &Variable) -> bool {
        matches!(
            (self, value),
            (Self::String, Variable::String(_))
                | (Self::Number, Variable::Number(_))
                | (Self::Boolean, Variable::Bool(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    Primitive(PrimitiveType),
    Enum(Vec<Variable>),
    Object(BTreeMap<String, TypeNode>),
    List(Box<TypeNode>),
    Union(Vec<TypeNode>),
    NonNull(Box<TypeNode>),
    ModelRef(String),
    FieldRef(String),
}

impl TypeNode {
    /// A short, human-readable description used in `wrongUnion` messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Primitive(p) => p.name().to_string(),
            Self::Enum(_) => "enum".to_string(),
            Self::Object(_) => "object".to_string(),
            Self::List(inner) => format!("[{}]", inner.describe()),
            Self::Union(ts) => ts
                .iter()
                .map(TypeNode::describe)
                .collect::<Vec<_>>()
                .join(" | "),
            Self::NonNull(inner) => format!("{}!", inner.describe()),
            Self::ModelRef(name) => name.clone(),
            Self::FieldRef(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UseCase {
    pub name: String,
    pub input: Option<TypeNode>,
    pub result: Option<TypeNode>,
    pub error: Option<TypeNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileDocument {
    pub id: String,
    pub version: String,
    pub use_cases: BTreeMap<String, UseCase>,
    pub models: BTreeMap<String, TypeNode>,
    pub fields: BTreeMap<String, TypeNode>,
}

impl ProfileDocument {
    pub fn use_case(&self, name: &str) -> Option<&UseCase> {
        self.use_cases.get(name)
    }
}
