// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expression AST and evaluator.
//!
//! An [`Expr`] is compiled once and evaluated per record. Evaluation is a
//! pure function of the input record and the bindings chain, so parsed
//! expressions are freely shared across parallel workers.

use crate::ExprError;
use crate::bindings::Bindings;
use crate::funcs::Func;
use crate::scope::{Ident, is_valid_ident};
use hs_record::{Record, RecordError, coerce_string, number_to_index, type_name};
use serde_json::Value;
use std::fmt;

/// A compiled expression.
pub enum Expr {
    /// A constant value.
    Const(Record),
    /// A variable, resolved to its identifier at parse time.
    Var(Ident),
    /// A function call, resolved to its implementation at parse time.
    Call {
        /// Resolved implementation.
        func: Func,
        /// Name, kept for error context and display.
        name: String,
        /// Argument expressions, evaluated left to right.
        args: Vec<Expr>,
    },
    /// A field path applied to the input record.
    FieldPath(Vec<Expr>),
    /// A field path applied to the result of a base expression.
    BaseFieldPath {
        /// Expression producing the record to index into.
        base: Box<Expr>,
        /// Path components.
        path: Vec<Expr>,
    },
    /// Alternating literals and embedded expressions, coerced to one string.
    Template(Template),
}

impl Expr {
    /// Evaluates this expression against a record and bindings.
    pub fn eval(&self, rec: &Record, binds: &Bindings) -> Result<Record, ExprError> {
        match self {
            Expr::Const(v) => Ok(v.clone()),
            Expr::Var(id) => {
                binds
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ExprError::UnboundVariable {
                        name: id.name().to_string(),
                    })
            }
            Expr::Call { func, name, args } => {
                let mut vals = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    let v = arg.eval(rec, binds).map_err(|e| ExprError::FuncArg {
                        index: i + 1,
                        func: name.clone(),
                        source: Box::new(e),
                    })?;
                    vals.push(v);
                }
                (**func)(&vals)
            }
            Expr::FieldPath(path) => eval_path(path, rec, rec, binds),
            Expr::BaseFieldPath { base, path } => {
                let base = base.eval(rec, binds)?;
                eval_path(path, &base, rec, binds)
            }
            Expr::Template(tmpl) => tmpl.eval(rec, binds).map(Value::String),
        }
    }

    /// Evaluates and coerces the result to a string (strings pass through,
    /// everything else becomes compact JSON).
    pub fn eval_to_string(&self, rec: &Record, binds: &Bindings) -> Result<String, ExprError> {
        Ok(coerce_string(&self.eval(rec, binds)?))
    }

    /// Renders this expression in template syntax, such that re-parsing the
    /// result as a template evaluates identically.
    pub fn to_template_string(&self) -> String {
        match self {
            Expr::Template(tmpl) => tmpl.to_template_string(),
            Expr::Const(Value::String(s)) => template_escape(s),
            other => format!("${{{other}}}"),
        }
    }
}

/// Walks `path` down from `base`. Index expressions evaluate against `ctx`
/// (the original input record), not the record being walked: `.a.b[.c]`
/// indexes `R.a.b` with `R.c`.
fn eval_path(
    path: &[Expr],
    base: &Record,
    ctx: &Record,
    binds: &Bindings,
) -> Result<Record, ExprError> {
    static NULL: Record = Value::Null;

    let Some((first, rest)) = path.split_first() else {
        return Ok(base.clone());
    };

    let idx = first.eval(ctx, binds)?;
    let next = match &idx {
        Value::Number(_) => {
            let i = number_to_index(&idx).map_err(|e| match e {
                RecordError::NotAnInteger { value } => ExprError::NonIntegerIndex { value },
                _ => ExprError::BadIndexKey {
                    actual: type_name(&idx),
                },
            })?;
            let Value::Array(arr) = base else {
                return Err(ExprError::IndexNonArray {
                    actual: type_name(base),
                });
            };
            arr.get(i).ok_or(ExprError::IndexOutOfBounds {
                index: i,
                len: arr.len(),
            })?
        }
        Value::String(key) => {
            let Value::Object(obj) = base else {
                return Err(ExprError::FieldNonObject {
                    actual: type_name(base),
                });
            };
            // A missing key yields null, not an error.
            obj.get(key).unwrap_or(&NULL)
        }
        other => {
            return Err(ExprError::BadIndexKey {
                actual: type_name(other),
            });
        }
    };

    eval_path(rest, next, ctx, binds)
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A string template: `exprs[i]` sits between `lits[i]` and `lits[i+1]`.
pub struct Template {
    /// Literal runs; always one more than `exprs`.
    pub lits: Vec<String>,
    /// Embedded expressions.
    pub exprs: Vec<Expr>,
}

impl Template {
    /// Evaluates every embedded expression, coerces each to a string, and
    /// interleaves with the literals.
    pub fn eval(&self, rec: &Record, binds: &Bindings) -> Result<String, ExprError> {
        let mut out = String::new();
        out.push_str(&self.lits[0]);
        for (expr, lit) in self.exprs.iter().zip(&self.lits[1..]) {
            out.push_str(&expr.eval_to_string(rec, binds)?);
            out.push_str(lit);
        }
        Ok(out)
    }

    /// Collapses degenerate shapes: no parts → `Const("")`, a single
    /// literal → `Const`, a lone expression between empty literals → the
    /// expression itself.
    pub fn simplify(mut self) -> Expr {
        match (self.lits.len(), self.exprs.len()) {
            (0, _) => Expr::Const(Value::String(String::new())),
            (1, _) => Expr::Const(Value::String(self.lits.remove(0))),
            (2, 1) if self.lits[0].is_empty() && self.lits[1].is_empty() => self.exprs.remove(0),
            _ => Expr::Template(self),
        }
    }

    fn to_template_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&template_escape(&self.lits[0]));
        for (expr, lit) in self.exprs.iter().zip(&self.lits[1..]) {
            out.push_str(&format!("${{{expr}}}"));
            out.push_str(&template_escape(lit));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Escapes a literal for string syntax (`"…"`).
pub fn string_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn template_escape(s: &str) -> String {
    s.replace('$', "$$")
}

impl fmt::Display for Expr {
    /// Renders in expression syntax. Strings (including parsed templates)
    /// render in `"…"` form, so the output re-parses in expression position.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(Value::String(s)) => write!(f, "\"{}\"", string_escape(s)),
            Expr::Const(v) => f.write_str(&coerce_string(v)),
            Expr::Var(id) => f.write_str(id.name()),
            Expr::Call { name, args, .. } => {
                write!(f, "({name}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_str(")")
            }
            Expr::FieldPath(path) => fmt_path(f, path),
            Expr::BaseFieldPath { base, path } => {
                write!(f, "{base}")?;
                fmt_path(f, path)
            }
            Expr::Template(tmpl) => {
                f.write_str("\"")?;
                f.write_str(&string_escape(&tmpl.lits[0]))?;
                for (expr, lit) in tmpl.exprs.iter().zip(&tmpl.lits[1..]) {
                    write!(f, "\\({expr})")?;
                    f.write_str(&string_escape(lit))?;
                }
                f.write_str("\"")
            }
        }
    }
}

fn fmt_path(f: &mut fmt::Formatter<'_>, path: &[Expr]) -> fmt::Result {
    if path.is_empty() {
        return f.write_str(".");
    }
    for comp in path {
        // Identifier-like string indices render without brackets.
        match comp {
            Expr::Const(Value::String(s)) if is_valid_ident(s) => write!(f, ".{s}")?,
            other => write!(f, "[{other}]")?,
        }
    }
    Ok(())
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
