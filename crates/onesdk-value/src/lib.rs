// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The dynamic value type passed between every layer of the runtime:
//! use-case input/result, map scope variables, HTTP bodies, and provider
//! configuration all speak [`Variable`].

use std::collections::BTreeMap;
use std::fmt;

/// A dynamically-typed value.
///
/// `Undefined` is distinct from `Null`: it means "this key was looked up
/// and nothing was there", not "this key holds an explicit null".
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Null,
    String(String),
    Number(f64),
    Bool(bool),
    Array(Vec<Variable>),
    Binary(BinaryRef),
    Object(BTreeMap<String, Variable>),
    Undefined,
}

/// A binary payload: either fully materialized bytes or a handle to a
/// stream owned by the HTTP layer, plus optional filename/MIME metadata
/// used when the value is placed into a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRef {
    pub data: BinaryData,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

impl BinaryRef {
    pub fn bytes(data: impl Into<bytes::Bytes>) -> Self {
        Self {
            data: BinaryData::Bytes(data.into()),
            filename: None,
            mime_type: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Binary data storage. A stream is represented by an opaque handle; the
/// bytes behind it are owned and resolved by the HTTP layer, which is the
/// only component that needs to read it incrementally.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryData {
    Bytes(bytes::Bytes),
    Stream(LazyStream),
}

/// A handle to a not-yet-materialized byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyStream {
    pub id: String,
    pub known_length: Option<u64>,
}

impl LazyStream {
    pub fn new(id: impl Into<String>, known_length: Option<u64>) -> Self {
        Self {
            id: id.into(),
            known_length,
        }
    }
}

impl Variable {
    pub fn object(fields: impl IntoIterator<Item = (String, Variable)>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Variable::Undefined)
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Variable::Object(_))
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Variable>> {
        match self {
            Variable::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Variable]> {
        match self {
            Variable::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variable::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The runtime type name, used in validator "wrong type" messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variable::Null => "null",
            Variable::String(_) => "string",
            Variable::Number(_) => "number",
            Variable::Bool(_) => "boolean",
            Variable::Array(_) => "array",
            Variable::Binary(_) => "binary",
            Variable::Object(_) => "object",
            Variable::Undefined => "undefined",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Null => write!(f, "null"),
            Variable::String(s) => write!(f, "{s}"),
            Variable::Number(n) => write!(f, "{n}"),
            Variable::Bool(b) => write!(f, "{b}"),
            Variable::Undefined => write!(f, "undefined"),
            other => write!(f, "{}", serde_json::to_string(other).unwrap_or_default()),
        }
    }
}

/// Deep right-biased merge.
///
/// Two [`Variable::Object`] maps merge key-by-key, recursing when both
/// sides hold an object at the same key. Anything else — primitives,
/// arrays, binaries, mismatched kinds — is replaced outright by `right`.
pub fn merge(left: Variable, right: Variable) -> Variable {
    match (left, right) {
        (Variable::Object(mut l), Variable::Object(r)) => {
            for (k, rv) in r {
                match l.remove(&k) {
                    Some(lv) => {
                        l.insert(k, merge(lv, rv));
                    }
                    None => {
                        l.insert(k, rv);
                    }
                }
            }
            Variable::Object(l)
        }
        (_, right) => right,
    }
}

/// Follow a dotted path of keys through nested objects.
///
/// Any missing intermediate segment, or indexing into a non-object,
/// yields [`Variable::Undefined`] rather than an error.
pub fn get_value(root: &Variable, path: &[&str]) -> Variable {
    let mut current = root;
    for segment in path {
        match current {
            Variable::Object(map) => match map.get(*segment) {
                Some(v) => current = v,
                None => return Variable::Undefined,
            },
            _ => return Variable::Undefined,
        }
    }
    current.clone()
}

/// Set a value at a dotted path inside an object, creating intermediate
/// objects as needed. Used by `Set`/`ObjectLiteral` map statements.
pub fn set_value(root: &mut Variable, path: &[&str], value: Variable) {
    if path.is_empty() {
        *root = value;
        return;
    }
    if !matches!(root, Variable::Object(_)) {
        *root = Variable::Object(BTreeMap::new());
    }
    let Variable::Object(map) = root else {
        unreachable!()
    };
    if path.len() == 1 {
        map.insert(path[0].to_string(), value);
        return;
    }
    let entry = map
        .entry(path[0].to_string())
        .or_insert_with(|| Variable::Object(BTreeMap::new()));
    set_value(entry, &path[1..], value);
}

/// A value that cannot be represented in the [`Variable`] domain.
///
/// JSON (the only practical input source in this runtime) cannot express
/// functions or symbols, so this is never actually constructed; it exists
/// so the conversion boundary matches its source-of-truth counterpart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("value cannot be represented as a variable: {0}")]
pub struct CastError(pub String);

/// Convert an arbitrary JSON value into a [`Variable`].
///
/// Infallible in practice; see [`CastError`].
pub fn cast_to_variables(value: serde_json::Value) -> Result<Variable, CastError> {
    Ok(Variable::from(value))
}

impl From<serde_json::Value> for Variable {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Variable::Null,
            serde_json::Value::Bool(b) => Variable::Bool(b),
            serde_json::Value::Number(n) => Variable::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Variable::String(s),
            serde_json::Value::Array(a) => {
                Variable::Array(a.into_iter().map(Variable::from).collect())
            }
            serde_json::Value::Object(o) => {
                Variable::Object(o.into_iter().map(|(k, v)| (k, Variable::from(v))).collect())
            }
        }
    }
}

impl From<Variable> for serde_json::Value {
    fn from(value: Variable) -> Self {
        match value {
            Variable::Null | Variable::Undefined => serde_json::Value::Null,
            Variable::String(s) => serde_json::Value::String(s),
            Variable::Number(n) => serde_json::json!(n),
            Variable::Bool(b) => serde_json::Value::Bool(b),
            Variable::Array(a) => {
                serde_json::Value::Array(a.into_iter().map(serde_json::Value::from).collect())
            }
            Variable::Object(o) => serde_json::Value::Object(
                o.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
            // Binary variables are never meant to round-trip through JSON;
            // the HTTP layer reads BinaryRef directly off the Variable tree
            // before a body would ever be serialized this way.
            Variable::Binary(_) => serde_json::Value::Null,
        }
    }
}

/// Stringify every value in a flat map, dropping `Undefined` entries.
/// Non-string primitives are JSON-stringified; used to project integration
/// parameters and security values into HTTP-safe string maps.
pub fn variables_to_strings(map: &BTreeMap<String, Variable>) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(k, v)| match v {
            Variable::Undefined => None,
            Variable::String(s) => Some((k.clone(), s.clone())),
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, Variable)]) -> Variable {
        Variable::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn merge_recurses_into_nested_objects() {
        let left = obj(&[("a", Variable::Number(1.0)), ("nested", obj(&[("x", Variable::Number(1.0))]))]);
        let right = obj(&[("nested", obj(&[("y", Variable::Number(2.0))]))]);
        let merged = merge(left, right);
        let Variable::Object(m) = merged else { panic!() };
        assert_eq!(m.get("a"), Some(&Variable::Number(1.0)));
        let Some(Variable::Object(nested)) = m.get("nested") else {
            panic!()
        };
        assert_eq!(nested.get("x"), Some(&Variable::Number(1.0)));
        assert_eq!(nested.get("y"), Some(&Variable::Number(2.0)));
    }

    #[test]
    fn merge_right_wins_on_primitives() {
        let left = Variable::String("old".into());
        let right = Variable::String("new".into());
        assert_eq!(merge(left, right), Variable::String("new".into()));
    }

    #[test]
    fn merge_is_associative_for_objects() {
        let a = obj(&[("k", Variable::Number(1.0))]);
        let b = obj(&[("k", Variable::Number(2.0)), ("m", Variable::Number(3.0))]);
        let c = obj(&[("m", Variable::Number(4.0))]);
        let left_assoc = merge(merge(a.clone(), b.clone()), c.clone());
        let right_assoc = merge(a, merge(b, c));
        assert_eq!(left_assoc, right_assoc);
    }

    #[test]
    fn get_value_misses_yield_undefined() {
        let root = obj(&[("user", obj(&[("name", Variable::String("a".into()))]))]);
        assert_eq!(get_value(&root, &["user", "age"]), Variable::Undefined);
        assert_eq!(get_value(&root, &["missing"]), Variable::Undefined);
        assert_eq!(
            get_value(&root, &["user", "name"]),
            Variable::String("a".into())
        );
    }

    #[test]
    fn get_value_through_non_object_is_undefined() {
        let root = obj(&[("user", Variable::Number(1.0))]);
        assert_eq!(get_value(&root, &["user", "name"]), Variable::Undefined);
    }

    #[test]
    fn set_value_creates_intermediate_objects() {
        let mut root = Variable::Object(BTreeMap::new());
        set_value(&mut root, &["a", "b", "c"], Variable::Number(1.0));
        assert_eq!(get_value(&root, &["a", "b", "c"]), Variable::Number(1.0));
    }

    #[test]
    fn variables_to_strings_drops_undefined_and_stringifies() {
        let mut m = BTreeMap::new();
        m.insert("name".to_string(), Variable::String("a".into()));
        m.insert("age".to_string(), Variable::Number(3.0));
        m.insert("gone".to_string(), Variable::Undefined);
        let out = variables_to_strings(&m);
        assert_eq!(out.get("name"), Some(&"a".to_string()));
        assert_eq!(out.get("age"), Some(&"3".to_string()));
        assert!(!out.contains_key("gone"));
    }

    #[test]
    fn cast_from_json_round_trips_common_shapes() {
        let json = serde_json::json!({"a": 1, "b": [true, null], "c": "x"});
        let v = cast_to_variables(json).unwrap();
        let Variable::Object(m) = v else { panic!() };
        assert_eq!(m.get("a"), Some(&Variable::Number(1.0)));
        assert_eq!(
            m.get("b"),
            Some(&Variable::Array(vec![Variable::Bool(true), Variable::Null]))
        );
    }

    proptest::proptest! {
        #[test]
        fn merge_associative_prop(a in 0..5i64, b in 0..5i64, c in 0..5i64) {
            let oa = obj(&[("k", Variable::Number(a as f64))]);
            let ob = obj(&[("k", Variable::Number(b as f64))]);
            let oc = obj(&[("k", Variable::Number(c as f64))]);
            let left = merge(merge(oa.clone(), ob.clone()), oc.clone());
            let right = merge(oa, merge(ob, oc));
            proptest::prop_assert_eq!(left, right);
        }
    }
}
