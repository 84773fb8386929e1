// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Closed-set error taxonomy shared by every layer of the runtime.
//!
//! Each public enum here corresponds to one failure domain from the design:
//! [`NetworkErrorKind`] and [`SandboxError`] are the leaf errors produced by
//! the transport and expression layers; [`ValidationError`] is produced by
//! the profile validator; [`PerformError`] and [`BindError`] are the two
//! errors a caller actually sees, covering everything returned from
//! `perform` and everything thrown during `bind` respectively.

use std::fmt;

/// Normalized transport failure, after collapsing whatever the concrete
/// [`HttpClient`](https://docs.rs/onesdk-http) adapter reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkErrorKind {
    Timeout,
    Dns,
    Reject,
    Abort,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::Reject => "reject",
            Self::Abort => "abort",
        };
        f.write_str(s)
    }
}

/// A transport-level failure, carrying the normalized [`NetworkErrorKind`]
/// plus whatever the adapter could say about the cause.
#[derive(Debug, thiserror::Error)]
#[error("network error ({kind}): {message}")]
pub struct NetworkError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl NetworkError {
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Failure raised by the embedded-expression sandbox.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// The expression did not parse under the whitelisted grammar.
    #[error("failed to compile expression: {message}")]
    Compile { message: String },
    /// The expression parsed but failed while evaluating.
    #[error("failed to evaluate expression: {message}")]
    Runtime { message: String },
    /// The expression exceeded its wall-clock quota.
    #[error("expression evaluation timed out")]
    Timeout,
}

/// One structural mismatch found while validating a value against a
/// profile AST, qualified by a dotted path from the use-case root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

impl std::error::Error for ValidationError {}

/// The specific kind of structural mismatch, independent of where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    MissingRequired,
    WrongType { expected: String, actual: String },
    EnumValue { expected: Vec<String> },
    WrongUnion { expected: Vec<String> },
    WrongInput,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired => write!(f, "missing required value"),
            Self::WrongType { expected, actual } => {
                write!(f, "expected type {expected}, got {actual}")
            }
            Self::EnumValue { expected } => {
                write!(f, "value is not one of [{}]", expected.join(", "))
            }
            Self::WrongUnion { expected } => {
                write!(f, "value matched none of [{}]", expected.join(", "))
            }
            Self::WrongInput => write!(f, "use-case does not declare this slot"),
        }
    }
}

/// Everything `BoundProfileProvider::perform` can return.
#[derive(Debug, thiserror::Error)]
pub enum PerformError {
    #[error("input validation failed with {} error(s)", .0.len())]
    InputValidation(Vec<ValidationError>),

    #[error("result validation failed with {} error(s)", .0.len())]
    ResultValidation(Vec<ValidationError>),

    #[error("invalid map AST: {0}")]
    MapAst(String),

    #[error("HTTP call failed{}", .status_code.map(|c| format!(" with status {c}")).unwrap_or_default())]
    Http {
        status_code: Option<u16>,
        request: String,
        response: Option<String>,
    },

    #[error("mapped HTTP error{}", .status_code.map(|c| format!(" (status {c})")).unwrap_or_default())]
    MappedHttp {
        status_code: Option<u16>,
        payload: serde_json::Value,
    },

    #[error("expression error: {0}")]
    Jessie(#[from] SandboxError),

    #[error("unexpected internal error: {0}")]
    Unexpected(String),
}

/// Everything the binding/resolution pipeline can throw.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("security scheme not found: {id}")]
    SecurityNotFound { id: String },

    #[error("invalid security values: {reason}")]
    InvalidSecurityValues { reason: String },

    #[error("provider name mismatch: configured {expected}, found {actual}")]
    ProvidersDoNotMatch { expected: String, actual: String },

    #[error("map variant mismatch: configured {expected:?}, found {actual:?}")]
    VariantMismatch {
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("profile id mismatch: configured {expected}, found {actual}")]
    ProfileIdsDoNotMatch { expected: String, actual: String },

    #[error("referenced file not found: {path}")]
    ReferencedFileNotFound { path: String },

    #[error("unsupported file extension: {path}")]
    UnsupportedFileExtension { path: String },

    #[error("source file extension found, expected a compiled artifact: {path}")]
    SourceFileExtensionFound { path: String },

    #[error("unable to resolve profile: {profile_id}")]
    UnableToResolveProfile { profile_id: String },

    #[error("invalid map AST response: {reason}")]
    InvalidMapAstResponse { reason: String },

    #[error("invalid provider response: {reason}")]
    InvalidProviderResponse { reason: String },

    #[error("registry returned status {status} with unrecognized body: {body}")]
    UnknownBindResponse { status: u16, body: String },

    #[error("registry error: {title}: {detail}")]
    BindResponse { title: String, detail: String },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BindError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_kind_display() {
        assert_eq!(NetworkErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(NetworkErrorKind::Dns.to_string(), "dns");
    }

    #[test]
    fn validation_error_display_includes_path() {
        let e = ValidationError::new("input.user.age", ValidationErrorKind::MissingRequired);
        assert_eq!(e.to_string(), "input.user.age: missing required value");
    }

    #[test]
    fn wrong_type_display() {
        let e = ValidationErrorKind::WrongType {
            expected: "number".into(),
            actual: "string".into(),
        };
        assert_eq!(e.to_string(), "expected type number, got string");
    }

    #[test]
    fn perform_error_input_validation_message_counts() {
        let e = PerformError::InputValidation(vec![
            ValidationError::new("input.a", ValidationErrorKind::MissingRequired),
            ValidationError::new("input.b", ValidationErrorKind::MissingRequired),
        ]);
        assert!(e.to_string().contains('2'));
    }

    #[test]
    fn bind_error_providers_do_not_match_message() {
        let e = BindError::ProvidersDoNotMatch {
            expected: "acme".into(),
            actual: "other".into(),
        };
        assert!(e.to_string().contains("acme"));
        assert!(e.to_string().contains("other"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let e: BindError = io.into();
        assert!(matches!(e, BindError::Io(_)));
    }
}
