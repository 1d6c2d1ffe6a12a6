// SPDX-License-Identifier: MIT OR Apache-2.0
//! The hs expression language.
//!
//! Expressions are compiled once against a lexical [`Scope`] and a
//! [`FuncTable`], then evaluated many times — once per input record —
//! against a [`Bindings`] chain. Three entry points mirror the three source
//! syntaxes:
//!
//! - [`parse_expr`] — a bare expression (`.field`, `myfunc .a "b"`, …)
//! - [`parse_string`] — string syntax with `\(expr)` interpolation
//! - [`parse_template`] — literal text with `${expr}` interpolation
//!
//! Name resolution happens at parse time: identifiers resolve to [`Ident`]
//! handles through the scope, and function heads resolve against the
//! function table, so evaluation does no name lookups.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod bindings;
pub mod funcs;
pub mod lex;
pub mod parser;
pub mod scope;

pub use ast::{Expr, Template, string_escape};
pub use bindings::{Bindings, Scoped};
pub use funcs::{Func, FuncTable};
pub use parser::{parse_expr, parse_string, parse_template};
pub use scope::{Ident, Scope};

use lex::SyntaxError;

/// Errors produced while parsing or evaluating expressions.
#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    /// The source text failed to lex or parse.
    #[error("syntax error at position {rpos}: {msg}")]
    Syntax {
        /// Byte position of the error.
        pos: usize,
        /// Character position of the error.
        rpos: usize,
        /// What went wrong.
        msg: String,
    },

    /// An identifier did not resolve through the scope at parse time.
    #[error("reference to undeclared variable '{name}'")]
    UnknownVariable {
        /// The unresolved name.
        name: String,
    },

    /// A function head did not resolve through the function table.
    #[error("reference to undeclared func '{name}'")]
    UnknownFunction {
        /// The unresolved name.
        name: String,
    },

    /// Evaluation reached a variable with no binding for its identifier.
    #[error("reference to unbound variable '{name}'")]
    UnboundVariable {
        /// Display name of the unbound identifier.
        name: String,
    },

    /// Evaluating a function argument failed.
    #[error("arg {index} to func {func}: {source}")]
    FuncArg {
        /// 1-based argument position.
        index: usize,
        /// Function name.
        func: String,
        /// The underlying evaluation error.
        #[source]
        source: Box<ExprError>,
    },

    /// An array index expression produced a non-integer number.
    #[error("non-integer array index {value}")]
    NonIntegerIndex {
        /// The offending number.
        value: f64,
    },

    /// An array index was out of range.
    #[error("array index {index} out of bounds on array of length {len}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// Length of the indexed array.
        len: usize,
    },

    /// A numeric index was applied to something other than an array.
    #[error("array lookup on non-array {actual}")]
    IndexNonArray {
        /// Variant name of the indexed value.
        actual: &'static str,
    },

    /// A string key was applied to something other than an object.
    #[error("string field lookup on non-object {actual}")]
    FieldNonObject {
        /// Variant name of the indexed value.
        actual: &'static str,
    },

    /// An index expression produced a value that is neither number nor string.
    #[error("cannot index with {actual} value")]
    BadIndexKey {
        /// Variant name of the index value.
        actual: &'static str,
    },

    /// A built-in function rejected its arguments.
    #[error("func {func}: {msg}")]
    Builtin {
        /// Function name.
        func: String,
        /// What the function rejected.
        msg: String,
    },
}

impl From<SyntaxError> for ExprError {
    fn from(e: SyntaxError) -> Self {
        ExprError::Syntax {
            pos: e.pos,
            rpos: e.rpos,
            msg: e.msg,
        }
    }
}
