// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive-descent parser over the tri-modal lexer.
//!
//! Grammar (expression mode):
//!
//! ```text
//! top-expr   ::= WS? (expr | func-call) WS?
//! expr       ::= IDENT | NUMBER | field-path | string | '(' top-expr ')'
//! func-call  ::= IDENT (WS expr)+
//! field-path ::= ('.' IDENT | '[' top-expr ']')+
//! string     ::= '"' (LIT | escape | '\(' top-expr ')')* '"'
//! template   ::= (LIT | '$$' | '${' top-expr '}')*
//! ```
//!
//! Bare identifiers resolve at parse time: in top-expr position with
//! arguments following, against the function table; otherwise against the
//! scope. Unknown names are fatal.

use crate::ExprError;
use crate::ast::{Expr, Template};
use crate::funcs::FuncTable;
use crate::lex::{Lexer, Mode, Token};
use crate::scope::Scope;
use hs_record::number_to_index;
use serde_json::Value;
use std::sync::Arc;

/// Parses a complete expression. The whole input must be consumed.
pub fn parse_expr(
    src: &str,
    scope: &Arc<Scope>,
    funcs: &Arc<FuncTable>,
) -> Result<Expr, ExprError> {
    let mut p = Parser::new(Lexer::new(src, Mode::Expr)?, scope, funcs);
    let expr = p.parse_expr(true, None)?;
    p.expect_eof()?;
    Ok(expr)
}

/// Parses string syntax starting at character 0, as if already inside the
/// opening `"`. An unterminated string ends at end of input.
pub fn parse_string(
    src: &str,
    scope: &Arc<Scope>,
    funcs: &Arc<FuncTable>,
) -> Result<Expr, ExprError> {
    let mut p = Parser::new(Lexer::new(src, Mode::Str)?, scope, funcs);
    let expr = p.parse_string(Mode::Str)?;
    p.expect_eof()?;
    Ok(expr)
}

/// Parses template syntax: literal text with `${expr}` interpolations.
pub fn parse_template(
    src: &str,
    scope: &Arc<Scope>,
    funcs: &Arc<FuncTable>,
) -> Result<Expr, ExprError> {
    let mut p = Parser::new(Lexer::new(src, Mode::Template)?, scope, funcs);
    p.parse_template()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    lex: Lexer<'a>,
    scope: &'a Arc<Scope>,
    funcs: &'a Arc<FuncTable>,
}

impl<'a> Parser<'a> {
    fn new(lex: Lexer<'a>, scope: &'a Arc<Scope>, funcs: &'a Arc<FuncTable>) -> Self {
        Parser { lex, scope, funcs }
    }

    fn parse_error(&self, msg: impl Into<String>) -> ExprError {
        self.lex.syntax_error(msg).into()
    }

    fn expect_eof(&self) -> Result<(), ExprError> {
        if self.lex.peek() != &Token::Eof {
            return Err(self.parse_error(format!(
                "unexpected trailing input '{}'",
                self.lex.raw_token()
            )));
        }
        Ok(())
    }

    fn parse_template(&mut self) -> Result<Expr, ExprError> {
        let mut tmpl = Template {
            lits: Vec::new(),
            exprs: Vec::new(),
        };
        let mut next_lit = String::new();
        loop {
            match self.lex.peek() {
                Token::Literal(lit) => {
                    next_lit.push_str(lit);
                    self.lex.adv()?;
                }
                Token::TmplExprOpen => {
                    tmpl.lits.push(std::mem::take(&mut next_lit));
                    self.lex.adv_mode(Mode::Expr)?;
                    tmpl.exprs
                        .push(self.parse_expr(true, Some((Token::TmplExprClose, Mode::Template)))?);
                }
                Token::Eof => {
                    tmpl.lits.push(next_lit);
                    return Ok(tmpl.simplify());
                }
                _ => {
                    return Err(self.parse_error(format!(
                        "unexpected token '{}'",
                        self.lex.raw_token()
                    )));
                }
            }
        }
    }

    /// Parses string-mode content. On the closing `"` the lexer switches to
    /// `close_mode`; end of input also ends the string.
    fn parse_string(&mut self, close_mode: Mode) -> Result<Expr, ExprError> {
        let mut tmpl = Template {
            lits: Vec::new(),
            exprs: Vec::new(),
        };
        let mut next_lit = String::new();
        loop {
            match self.lex.peek() {
                Token::Literal(lit) => {
                    next_lit.push_str(lit);
                    self.lex.adv()?;
                }
                Token::ExprOpen => {
                    tmpl.lits.push(std::mem::take(&mut next_lit));
                    self.lex.adv_mode(Mode::Expr)?;
                    // The ')' puts the lexer back into string mode.
                    tmpl.exprs
                        .push(self.parse_expr(true, Some((Token::ExprClose, Mode::Str)))?);
                }
                Token::StrClose => {
                    self.lex.adv_mode(close_mode)?;
                    tmpl.lits.push(next_lit);
                    return Ok(tmpl.simplify());
                }
                Token::Eof => {
                    tmpl.lits.push(next_lit);
                    return Ok(tmpl.simplify());
                }
                _ => {
                    return Err(self.parse_error(format!(
                        "unexpected token '{}'",
                        self.lex.raw_token()
                    )));
                }
            }
        }
    }

    /// Parses an expression. When `close` is given, that token is required
    /// and consumed as the terminal, switching the lexer to the paired mode.
    fn parse_expr(
        &mut self,
        top: bool,
        close: Option<(Token, Mode)>,
    ) -> Result<Expr, ExprError> {
        if top && self.lex.peek() == &Token::Whitespace {
            self.lex.adv()?;
        }

        let mut allow_field_path = false;
        let mut expr = match self.lex.peek().clone() {
            Token::FieldSep => Expr::FieldPath(self.parse_field_path()?),
            Token::Ident(name) => {
                self.lex.adv()?;

                // Only a top-expr position can be a function call head.
                let args = if top {
                    self.parse_func_args(close.as_ref().map(|(t, _)| t))?
                } else {
                    Vec::new()
                };

                if !args.is_empty() {
                    let func = self
                        .funcs
                        .get(&name)
                        .ok_or(ExprError::UnknownFunction { name: name.clone() })?;
                    Expr::Call { func, name, args }
                } else {
                    let id = self
                        .scope
                        .lookup(&name)
                        .ok_or(ExprError::UnknownVariable { name: name.clone() })?;
                    allow_field_path = true;
                    Expr::Var(id)
                }
            }
            Token::Number(v) => {
                self.lex.adv()?;
                Expr::Const(number_record(v))
            }
            Token::StrOpen => {
                self.lex.adv_mode(Mode::Str)?;
                self.parse_string(Mode::Expr)?
            }
            Token::ExprOpen => {
                self.lex.adv()?;
                let inner = self.parse_expr(true, Some((Token::ExprClose, Mode::Expr)))?;
                allow_field_path = true;
                inner
            }
            _ => {
                return Err(self.parse_error(format!(
                    "unexpected token '{}'",
                    self.lex.raw_token()
                )));
            }
        };

        if allow_field_path {
            let path = self.parse_field_path()?;
            if !path.is_empty() {
                expr = Expr::BaseFieldPath {
                    base: Box::new(expr),
                    path,
                };
            }
        }

        if top && self.lex.peek() == &Token::Whitespace {
            self.lex.adv()?;
        }

        if let Some((tok, mode)) = close {
            if self.lex.peek() != &tok {
                return Err(self.parse_error(format!(
                    "expected end of expression with {tok:?}, got {:?}",
                    self.lex.peek()
                )));
            }
            self.lex.adv_mode(mode)?;
        }
        Ok(expr)
    }

    /// Parses whitespace-separated (non-top) argument expressions, stopping
    /// without consuming the closing token.
    fn parse_func_args(&mut self, close: Option<&Token>) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        loop {
            if self.lex.peek() != &Token::Whitespace {
                return Ok(args);
            }
            self.lex.adv()?;

            let next = self.lex.peek();
            if next == &Token::Eof || close.is_some_and(|c| next == c) {
                return Ok(args);
            }

            args.push(self.parse_expr(false, None)?);
        }
    }

    fn parse_field_path(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut path = Vec::new();
        loop {
            let has_sep = self.lex.peek() == &Token::FieldSep;
            if has_sep {
                self.lex.adv()?;
            }

            match self.lex.peek().clone() {
                Token::Ident(name) if has_sep => {
                    self.lex.adv()?;
                    path.push(Expr::Const(Value::String(name)));
                }
                Token::IdxOpen => {
                    self.lex.adv()?;
                    let comp = self.parse_expr(true, Some((Token::IdxClose, Mode::Expr)))?;
                    self.check_field_component(&comp)?;
                    path.push(comp);
                }
                _ => return Ok(path),
            }
        }
    }

    /// A constant numeric path component must be a valid array index.
    fn check_field_component(&self, comp: &Expr) -> Result<(), ExprError> {
        if let Expr::Const(v @ Value::Number(_)) = comp {
            number_to_index(v).map_err(|e| self.parse_error(e.to_string()))?;
        }
        Ok(())
    }
}

fn number_record(v: f64) -> Value {
    // Integral literals stay integral so they round-trip through display.
    if v.fract() == 0.0 && v.abs() < (i64::MAX as f64) {
        Value::from(v as i64)
    } else {
        Value::from(v)
    }
}
