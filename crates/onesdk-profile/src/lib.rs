// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Profile AST types and the structural validator that checks use-case
//! input and result values against them.

mod ast;
mod validator;

pub use ast::{PrimitiveType, ProfileDocument, TypeNode, UseCase};
pub use validator::{validate, ValidationKind};
