// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tri-modal lexer for the expression language.
//!
//! The lexer operates in one of three [`Mode`]s — expression, string, or
//! template — and the parser drives mode changes explicitly. Before every
//! token the lexer records a mark (byte + char position); [`Lexer::set_mode`]
//! rewinds to that mark and re-lexes the same source bytes under the new
//! mode. This is what lets a `"` that terminated a string be re-read as an
//! expression-mode token, and a `)` that closed an interpolation be re-read
//! as string text.

use crate::scope::valid_ident_prefix;

const WHITESPACE: [char; 2] = [' ', '\t'];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A lexical or syntactic error with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Byte position.
    pub pos: usize,
    /// Character position.
    pub rpos: usize,
    /// Description.
    pub msg: String,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "syntax error at position {}: {}", self.rpos, self.msg)
    }
}

impl std::error::Error for SyntaxError {}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Lexer mode. Determines how the next token is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Expression syntax: idents, numbers, punctuation.
    Expr,
    /// Inside a `"…"` string: literal runs and escapes.
    Str,
    /// Template text: literal runs, `$$`, and `${`.
    Template,
}

/// A lexed token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of input.
    Eof,
    /// A literal character run (string or template text).
    Literal(String),
    /// `${` opening an embedded expression in template mode.
    TmplExprOpen,
    /// `(` in expression mode, or `\(` opening an interpolation in a string.
    ExprOpen,
    /// `}` closing a template interpolation.
    TmplExprClose,
    /// `)`.
    ExprClose,
    /// A run of spaces/tabs.
    Whitespace,
    /// `.`.
    FieldSep,
    /// `[`.
    IdxOpen,
    /// `]`.
    IdxClose,
    /// An identifier.
    Ident(String),
    /// A number literal.
    Number(f64),
    /// `"` opening a string in expression mode.
    StrOpen,
    /// `"` closing a string in string mode.
    StrClose,
    /// A character no rule matched.
    Bad(char),
}

// ---------------------------------------------------------------------------
// Character stream with mark/rewind
// ---------------------------------------------------------------------------

struct CharStream<'a> {
    s: &'a str,
    next: Option<char>,
    next_len: usize,
    pos: usize,
    rpos: usize,
    mark: Option<(usize, usize)>,
}

impl<'a> CharStream<'a> {
    fn new(s: &'a str) -> Self {
        let mut cs = CharStream {
            s,
            next: None,
            next_len: 0,
            pos: 0,
            rpos: 0,
            mark: None,
        };
        cs.refresh_next();
        cs
    }

    fn refresh_next(&mut self) {
        match self.s[self.pos..].chars().next() {
            Some(c) => {
                self.next = Some(c);
                self.next_len = c.len_utf8();
            }
            None => {
                self.next = None;
                self.next_len = 0;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.next
    }

    fn rem(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn adv(&mut self) -> Result<char, SyntaxError> {
        let c = self
            .next
            .ok_or_else(|| self.syntax_error("unexpected eof"))?;
        self.rpos += 1;
        self.pos += self.next_len;
        self.refresh_next();
        Ok(c)
    }

    fn adv_by(&mut self, n: usize) -> Result<(), SyntaxError> {
        if self.pos + n > self.s.len() {
            return Err(self.syntax_error("unexpected eof"));
        }
        self.rpos += self.s[self.pos..self.pos + n].chars().count();
        self.pos += n;
        self.refresh_next();
        Ok(())
    }

    fn set_mark(&mut self) {
        self.mark = Some((self.pos, self.rpos));
    }

    fn mark_str(&self) -> &'a str {
        match self.mark {
            Some((m, _)) => &self.s[m..self.pos],
            None => "",
        }
    }

    fn reset(&mut self) {
        if let Some((pos, rpos)) = self.mark.take() {
            self.pos = pos;
            self.rpos = rpos;
            self.refresh_next();
        }
    }

    fn syntax_error(&self, msg: impl Into<String>) -> SyntaxError {
        SyntaxError {
            pos: self.pos,
            rpos: self.rpos,
            msg: msg.into(),
        }
    }

    fn mark_syntax_error(&self, msg: impl Into<String>) -> SyntaxError {
        let (pos, rpos) = self.mark.unwrap_or((self.pos, self.rpos));
        SyntaxError {
            pos,
            rpos,
            msg: msg.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

/// The tri-modal lexer. [`peek`](Lexer::peek) returns the same token until
/// one of [`adv`](Lexer::adv), [`set_mode`](Lexer::set_mode), or
/// [`adv_mode`](Lexer::adv_mode) is called.
pub struct Lexer<'a> {
    iter: CharStream<'a>,
    next: Token,
    mode: Mode,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `src`, lexing the first token in `mode`.
    pub fn new(src: &'a str, mode: Mode) -> Result<Self, SyntaxError> {
        let mut lex = Lexer {
            iter: CharStream::new(src),
            next: Token::Eof,
            mode,
        };
        lex.refresh_next()?;
        Ok(lex)
    }

    /// The current token.
    pub fn peek(&self) -> &Token {
        &self.next
    }

    /// The current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The raw source bytes underlying the current token.
    pub fn raw_token(&self) -> &str {
        self.iter.mark_str()
    }

    /// A syntax error positioned at the current token's start.
    pub fn syntax_error(&self, msg: impl Into<String>) -> SyntaxError {
        self.iter.mark_syntax_error(msg)
    }

    /// Moves to the next token.
    pub fn adv(&mut self) -> Result<(), SyntaxError> {
        self.refresh_next()
    }

    /// As [`adv`](Lexer::adv), but first switches to a new mode. Equivalent
    /// to, but cheaper than, `adv` followed by `set_mode`.
    pub fn adv_mode(&mut self, mode: Mode) -> Result<(), SyntaxError> {
        self.mode = mode;
        self.refresh_next()
    }

    /// Re-lexes the bytes underlying the current token in a new mode,
    /// likely changing the current token.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), SyntaxError> {
        if self.mode != mode {
            self.iter.reset();
            self.adv_mode(mode)?;
        }
        Ok(())
    }

    fn refresh_next(&mut self) -> Result<(), SyntaxError> {
        if self.iter.peek().is_none() {
            self.next = Token::Eof;
            return Ok(());
        }

        self.iter.set_mark();
        self.next = match self.mode {
            Mode::Expr => self.next_expr()?,
            Mode::Str => self.next_str()?,
            Mode::Template => self.next_tmpl()?,
        };
        Ok(())
    }

    fn next_expr(&mut self) -> Result<Token, SyntaxError> {
        let c = self.iter.peek().unwrap_or('\0');
        let simple = match c {
            '.' => Some(Token::FieldSep),
            '[' => Some(Token::IdxOpen),
            ']' => Some(Token::IdxClose),
            '"' => Some(Token::StrOpen),
            '(' => Some(Token::ExprOpen),
            ')' => Some(Token::ExprClose),
            '}' => Some(Token::TmplExprClose),
            _ => None,
        };
        if let Some(tok) = simple {
            self.iter.adv()?;
            return Ok(tok);
        }

        if WHITESPACE.contains(&c) {
            while matches!(self.iter.peek(), Some(w) if WHITESPACE.contains(&w)) {
                self.iter.adv()?;
            }
            return Ok(Token::Whitespace);
        }
        if let Some(id) = self.next_ident()? {
            return Ok(Token::Ident(id));
        }
        if let Some(v) = self.next_number()? {
            return Ok(Token::Number(v));
        }
        Ok(Token::Bad(c))
    }

    fn next_ident(&mut self) -> Result<Option<String>, SyntaxError> {
        let rem = self.iter.rem();
        let n = valid_ident_prefix(rem);
        if n == 0 {
            return Ok(None);
        }
        let id = rem[..n].to_string();
        self.iter.adv_by(n)?;
        Ok(Some(id))
    }

    fn next_number(&mut self) -> Result<Option<f64>, SyntaxError> {
        let neg = self.iter.peek() == Some('-');
        if neg {
            self.iter.adv()?;
        }

        let mut val: f64 = 0.0;
        let mut empty = true;
        while let Some(d) = self.iter.peek().and_then(|c| c.to_digit(10)) {
            self.iter.adv()?;
            empty = false;
            val = 10.0 * val + f64::from(d);
        }

        if empty {
            if neg {
                return Err(self.syntax_error("bad number literal"));
            }
            return Ok(None);
        }
        Ok(Some(if neg { -val } else { val }))
    }

    fn next_tmpl(&mut self) -> Result<Token, SyntaxError> {
        let rem = self.iter.rem();
        let idx = rem.find('$');

        // Literal run up to the next escape.
        if idx != Some(0) {
            let end = idx.unwrap_or(rem.len());
            self.iter.adv_by(end)?;
            return Ok(Token::Literal(rem[..end].to_string()));
        }

        self.iter.adv()?; // the '$'
        match self.iter.adv()? {
            '$' => Ok(Token::Literal("$".to_string())),
            '{' => Ok(Token::TmplExprOpen),
            c => Err(self.syntax_error(format!("illegal escape '{c}'"))),
        }
    }

    fn next_str(&mut self) -> Result<Token, SyntaxError> {
        let rem = self.iter.rem();
        let idx = rem.find(['"', '\\']);

        // Literal run up to the quote or escape.
        if idx != Some(0) {
            let end = idx.unwrap_or(rem.len());
            self.iter.adv_by(end)?;
            return Ok(Token::Literal(rem[..end].to_string()));
        }

        if self.iter.adv()? == '"' {
            return Ok(Token::StrClose);
        }

        // We consumed the backslash; the next char picks the escape kind.
        match self.iter.adv()? {
            'x' => Ok(Token::Literal(self.parse_hex(2)?.to_string())),
            'u' => Ok(Token::Literal(self.parse_hex(4)?.to_string())),
            '(' => Ok(Token::ExprOpen),
            '0' => Ok(Token::Literal("\0".to_string())),
            '\\' => Ok(Token::Literal("\\".to_string())),
            '\'' => Ok(Token::Literal("'".to_string())),
            '"' => Ok(Token::Literal("\"".to_string())),
            'n' => Ok(Token::Literal("\n".to_string())),
            'r' => Ok(Token::Literal("\r".to_string())),
            't' => Ok(Token::Literal("\t".to_string())),
            c => Err(self.syntax_error(format!("illegal escape '\\{c}'"))),
        }
    }

    fn parse_hex(&mut self, n: usize) -> Result<char, SyntaxError> {
        let rem = self.iter.rem();
        let digits = rem
            .get(..n)
            .ok_or_else(|| self.iter.syntax_error("unexpected eof"))?;
        let val = u32::from_str_radix(digits, 16)
            .map_err(|e| self.syntax_error(format!("bad hex: {e}")))?;
        self.iter.adv_by(n)?;
        char::from_u32(val).ok_or_else(|| self.syntax_error("bad hex: invalid character code"))
    }
}
