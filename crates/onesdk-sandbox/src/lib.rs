// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! A small, whitelisted expression grammar for embedded map scripts.
//!
//! The grammar has no production for module loading, timers, function or
//! class construction, `eval`, regex-from-string, or any other reflective
//! capability — denial is structural, not a runtime check. Evaluation runs
//! on a dedicated worker thread so it can be abandoned past its wall-clock
//! quota without corrupting caller state.

mod ast;
mod eval;
mod lexer;
mod parser;

use std::sync::mpsc;
use std::time::Duration;

use onesdk_error::SandboxError;
use onesdk_value::Variable;

/// Wall-clock ceiling for a single expression evaluation.
pub const EVALUATION_TIMEOUT: Duration = Duration::from_millis(100);

/// Evaluate `source` against `scope`, denying every host capability by
/// construction and enforcing [`EVALUATION_TIMEOUT`].
#[tracing::instrument(level = "debug", skip(scope), fields(source_len = source.len()))]
pub fn evaluate(source: &str, scope: &Variable) -> Result<Variable, SandboxError> {
    let tokens = lexer::lex(source)?;
    let expr = parser::parse(&tokens)?;

    let scope = scope.clone();
    let (tx, rx) = mpsc::channel();
    let handle = std::thread::Builder::new()
        .name("onesdk-sandbox-eval".into())
        .spawn(move || {
            let result = eval::eval(&expr, &scope);
            // The receiver may already have timed out and dropped; a send
            // error just means this result is discarded.
            let _ = tx.send(result);
        })
        .map_err(|e| SandboxError::Runtime {
            message: format!("failed to spawn evaluation thread: {e}"),
        })?;

    match rx.recv_timeout(EVALUATION_TIMEOUT) {
        Ok(result) => {
            let _ = handle.join();
            result
        }
        Err(_) => {
            tracing::warn!(target: "onesdk.sandbox", "expression evaluation timed out");
            Err(SandboxError::Timeout)
        }
    }
}
