//! Text parser for query terms.
//!
//! Grammar (goal level):
//!
//! ```text
//! goal    := unify ("," unify)* "."?
//! unify   := primary ("=" primary)?
//! primary := VAR | NUMBER | ATOM ("(" args ")")? | STRING | list | "(" goal ")"
//! list    := "[" "]" | "[" args ("|" primary)? "]"
//! ```

use crate::error::EngineError;
use crate::term::Term;

/// Parse query source text into a term.
pub fn parse_term(source: &str) -> Result<Term, EngineError> {
    let mut parser = Parser::new(source);
    let goal = parser.goal()?;
    parser.skip_ws();
    if parser.peek() == Some('.') {
        parser.bump();
        parser.skip_ws();
    }
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected '{}' after end of term", c)));
    }
    Ok(goal)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    anonymous: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            anonymous: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '%' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), EngineError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn goal(&mut self) -> Result<Term, EngineError> {
        let first = self.unify()?;
        self.skip_ws();
        if self.peek() == Some(',') {
            self.bump();
            let rest = self.goal()?;
            return Ok(Term::compound(",", vec![first, rest]));
        }
        Ok(first)
    }

    fn unify(&mut self) -> Result<Term, EngineError> {
        let left = self.primary()?;
        self.skip_ws();
        if self.peek() == Some('=') {
            self.bump();
            let right = self.primary()?;
            return Ok(Term::compound("=", vec![left, right]));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Term, EngineError> {
        self.skip_ws();
        let c = match self.peek() {
            Some(c) => c,
            None => return Err(self.error("unexpected end of input")),
        };
        match c {
            '(' => {
                self.bump();
                let inner = self.goal()?;
                self.expect(')')?;
                Ok(inner)
            }
            '[' => self.list(),
            '"' => {
                self.bump();
                Ok(Term::Str(self.quoted('"')?))
            }
            '\'' => {
                self.bump();
                let name = self.quoted('\'')?;
                self.compound_tail(name)
            }
            '-' | '0'..='9' => self.number(),
            c if c == '_' || c.is_uppercase() => {
                let name = self.identifier();
                if name == "_" {
                    self.anonymous += 1;
                    Ok(Term::Var(format!("_G{}", self.anonymous)))
                } else {
                    Ok(Term::Var(name))
                }
            }
            c if c.is_lowercase() => {
                let name = self.identifier();
                self.compound_tail(name)
            }
            c => Err(self.error(format!("unexpected '{}'", c))),
        }
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        self.src[start..self.pos].to_string()
    }

    fn compound_tail(&mut self, functor: String) -> Result<Term, EngineError> {
        // no whitespace is allowed between functor and '('
        if self.peek() != Some('(') {
            return Ok(Term::Atom(functor));
        }
        self.bump();
        let args = self.args()?;
        self.expect(')')?;
        Ok(Term::Compound { functor, args })
    }

    fn args(&mut self) -> Result<Vec<Term>, EngineError> {
        let mut args = vec![self.unify()?];
        loop {
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
                args.push(self.unify()?);
            } else {
                return Ok(args);
            }
        }
    }

    fn list(&mut self) -> Result<Term, EngineError> {
        self.bump();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(Term::List(Vec::new()));
        }
        let items = self.args()?;
        self.skip_ws();
        if self.peek() == Some('|') {
            self.bump();
            let tail = self.primary()?;
            self.expect(']')?;
            return Ok(match tail {
                Term::List(rest) => Term::List(items.into_iter().chain(rest).collect()),
                tail => items
                    .into_iter()
                    .rev()
                    .fold(tail, |acc, head| Term::compound(".", vec![head, acc])),
            });
        }
        self.expect(']')?;
        Ok(Term::List(items))
    }

    fn quoted(&mut self, quote: char) -> Result<String, EngineError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated quoted text")),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Term, EngineError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == digits_start {
            return Err(self.error("expected digits"));
        }
        let mut is_float = false;
        // "1." ends a clause, "1.5" is a float
        let rest = &self.src[self.pos..];
        if rest.starts_with('.') && rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Term::Float)
                .map_err(|e| self.error(format!("invalid float {}: {}", text, e)))
        } else {
            text.parse::<i64>()
                .map(Term::Integer)
                .map_err(|e| self.error(format!("invalid integer {}: {}", text, e)))
        }
    }
}
