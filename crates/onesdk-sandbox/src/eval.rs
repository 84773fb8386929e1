// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree-walking evaluator for the whitelisted expression grammar. Every
//! name resolved here comes from the caller-supplied scope; there is no
//! path to host capabilities.

use onesdk_error::SandboxError;
use onesdk_value::Variable;

use crate::ast::{BinaryOp, Expr, UnaryOp};

pub fn eval(expr: &Expr, scope: &Variable) -> Result<Variable, SandboxError> {
    match expr {
        Expr::Null => Ok(Variable::Null),
        Expr::Bool(b) => Ok(Variable::Bool(*b)),
        Expr::Number(n) => Ok(Variable::Number(*n)),
        Expr::String(s) => Ok(Variable::String(s.clone())),
        Expr::Identifier(name) => Ok(lookup(scope, name)),
        Expr::Member(inner, field) => {
            let base = eval(inner, scope)?;
            Ok(index_object(&base, field))
        }
        Expr::Index(inner, index_expr) => {
            let base = eval(inner, scope)?;
            let index = eval(index_expr, scope)?;
            Ok(index_value(&base, &index))
        }
        Expr::Unary(op, inner) => eval_unary(*op, &eval(inner, scope)?),
        Expr::Binary(op, lhs, rhs) => {
            // Short-circuit && and || before evaluating the right side.
            match op {
                BinaryOp::And => {
                    let l = eval(lhs, scope)?;
                    if !truthy(&l) {
                        return Ok(Variable::Bool(false));
                    }
                    return Ok(Variable::Bool(truthy(&eval(rhs, scope)?)));
                }
                BinaryOp::Or => {
                    let l = eval(lhs, scope)?;
                    if truthy(&l) {
                        return Ok(Variable::Bool(true));
                    }
                    return Ok(Variable::Bool(truthy(&eval(rhs, scope)?)));
                }
                _ => {}
            }
            let l = eval(lhs, scope)?;
            let r = eval(rhs, scope)?;
            eval_binary(*op, &l, &r)
        }
        Expr::Ternary(cond, then_branch, else_branch) => {
            if truthy(&eval(cond, scope)?) {
                eval(then_branch, scope)
            } else {
                eval(else_branch, scope)
            }
        }
        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, scope)?);
            }
            Ok(Variable::Array(values))
        }
        Expr::Object(fields) => {
            let mut map = std::collections::BTreeMap::new();
            for (key, value_expr) in fields {
                map.insert(key.clone(), eval(value_expr, scope)?);
            }
            Ok(Variable::Object(map))
        }
    }
}

fn lookup(scope: &Variable, name: &str) -> Variable {
    index_object(scope, name)
}

fn index_object(base: &Variable, field: &str) -> Variable {
    match base {
        Variable::Object(map) => map.get(field).cloned().unwrap_or(Variable::Undefined),
        _ => Variable::Undefined,
    }
}

fn index_value(base: &Variable, index: &Variable) -> Variable {
    match (base, index) {
        (Variable::Array(items), Variable::Number(n)) => {
            let i = *n as i64;
            if i < 0 {
                return Variable::Undefined;
            }
            items
                .get(i as usize)
                .cloned()
                .unwrap_or(Variable::Undefined)
        }
        (Variable::Object(_), Variable::String(key)) => index_object(base, key),
        _ => Variable::Undefined,
    }
}

fn truthy(value: &Variable) -> bool {
    match value {
        Variable::Null | Variable::Undefined => false,
        Variable::Bool(b) => *b,
        Variable::Number(n) => *n != 0.0,
        Variable::String(s) => !s.is_empty(),
        Variable::Array(a) => !a.is_empty(),
        Variable::Object(_) | Variable::Binary(_) => true,
    }
}

fn as_number(value: &Variable) -> Result<f64, SandboxError> {
    match value {
        Variable::Number(n) => Ok(*n),
        Variable::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(SandboxError::Runtime {
            message: format!("expected a number, found {}", other.type_name()),
        }),
    }
}

fn eval_unary(op: UnaryOp, value: &Variable) -> Result<Variable, SandboxError> {
    match op {
        UnaryOp::Neg => Ok(Variable::Number(-as_number(value)?)),
        UnaryOp::Not => Ok(Variable::Bool(!truthy(value))),
    }
}

fn eval_binary(op: BinaryOp, l: &Variable, r: &Variable) -> Result<Variable, SandboxError> {
    match op {
        BinaryOp::Add => match (l, r) {
            (Variable::String(a), _) => Ok(Variable::String(format!("{a}{r}"))),
            (_, Variable::String(b)) => Ok(Variable::String(format!("{l}{b}"))),
            _ => Ok(Variable::Number(as_number(l)? + as_number(r)?)),
        },
        BinaryOp::Sub => Ok(Variable::Number(as_number(l)? - as_number(r)?)),
        BinaryOp::Mul => Ok(Variable::Number(as_number(l)? * as_number(r)?)),
        BinaryOp::Div => Ok(Variable::Number(as_number(l)? / as_number(r)?)),
        BinaryOp::Mod => Ok(Variable::Number(as_number(l)? % as_number(r)?)),
        BinaryOp::Eq => Ok(Variable::Bool(l == r)),
        BinaryOp::NotEq => Ok(Variable::Bool(l != r)),
        BinaryOp::Lt => Ok(Variable::Bool(compare(l, r)? == std::cmp::Ordering::Less)),
        BinaryOp::Le => Ok(Variable::Bool(compare(l, r)? != std::cmp::Ordering::Greater)),
        BinaryOp::Gt => Ok(Variable::Bool(compare(l, r)? == std::cmp::Ordering::Greater)),
        BinaryOp::Ge => Ok(Variable::Bool(compare(l, r)? != std::cmp::Ordering::Less)),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited above"),
    }
}

fn compare(l: &Variable, r: &Variable) -> Result<std::cmp::Ordering, SandboxError> {
    match (l, r) {
        (Variable::String(a), Variable::String(b)) => Ok(a.cmp(b)),
        _ => as_number(l)?
            .partial_cmp(&as_number(r)?)
            .ok_or_else(|| SandboxError::Runtime {
                message: "cannot compare NaN".to_string(),
            }),
    }
}
