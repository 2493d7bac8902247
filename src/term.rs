//! Query terms and solution bindings
//!
//! Terms are opaque to the worker machinery; they only flow through result
//! mappings. The text form follows Prolog syntax so that query specs can be
//! logged and round-tripped through the parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod parser;

pub use parser::parse_term;

/// One solution: variable name to bound term.
pub type Solution = BTreeMap<String, Term>;

/// A logic term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Term {
    Atom(String),
    Integer(i64),
    Float(f64),
    Str(String),
    Var(String),
    Compound { functor: String, args: Vec<Term> },
    List(Vec<Term>),
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn compound(functor: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Compound {
            functor: functor.into(),
            args,
        }
    }

    /// Short name of the term kind, used in type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Term::Atom(_) => "atom",
            Term::Integer(_) => "integer",
            Term::Float(_) => "float",
            Term::Str(_) => "string",
            Term::Var(_) => "variable",
            Term::Compound { .. } => "compound",
            Term::List(_) => "list",
        }
    }

    /// Name and arity for callable terms.
    pub fn indicator(&self) -> Option<(&str, usize)> {
        match self {
            Term::Atom(name) => Some((name.as_str(), 0)),
            Term::Compound { functor, args } => Some((functor.as_str(), args.len())),
            _ => None,
        }
    }

    /// Named variables in first-occurrence order. Anonymous `_`-prefixed
    /// variables are skipped.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Term::Var(name) => {
                if !name.starts_with('_') && !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Term::Compound { args, .. } | Term::List(args) => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
            _ => {}
        }
    }

    /// `,` or `=` for the binary compounds printed infix.
    fn infix_operator(&self) -> Option<&'static str> {
        match self {
            Term::Compound { functor, args } if args.len() == 2 => match functor.as_str() {
                "," => Some(","),
                "=" => Some("="),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Integer(value)
    }
}

fn atom_needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => !chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => name != "[]",
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str, quote: char) -> fmt::Result {
    write!(f, "{}", quote)?;
    for c in text.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c if c == quote => write!(f, "\\{}", c)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "{}", quote)
}

/// Print `term`, parenthesized if it is an infix compound whose operator is
/// not in `bare`.
fn write_operand(f: &mut fmt::Formatter<'_>, term: &Term, bare: &[&str]) -> fmt::Result {
    match term.infix_operator() {
        Some(op) if !bare.contains(&op) => write!(f, "({})", term),
        _ => write!(f, "{}", term),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(name) => {
                if atom_needs_quotes(name) {
                    write_quoted(f, name, '\'')
                } else {
                    write!(f, "{}", name)
                }
            }
            Term::Integer(value) => write!(f, "{}", value),
            Term::Float(value) => {
                if value.fract() == 0.0 && value.is_finite() {
                    write!(f, "{:.1}", value)
                } else {
                    write!(f, "{}", value)
                }
            }
            Term::Str(text) => write_quoted(f, text, '"'),
            Term::Var(name) => write!(f, "{}", name),
            Term::Compound { args, .. } if self.infix_operator() == Some(",") => {
                write_operand(f, &args[0], &["="])?;
                write!(f, ", ")?;
                write_operand(f, &args[1], &[",", "="])
            }
            Term::Compound { args, .. } if self.infix_operator() == Some("=") => {
                write_operand(f, &args[0], &[])?;
                write!(f, " = ")?;
                write_operand(f, &args[1], &[])
            }
            Term::Compound { functor, args } => {
                write!(f, "{}", Term::Atom(functor.clone()))?;
                write!(f, "(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write_operand(f, arg, &[])?;
                }
                write!(f, ")")
            }
            Term::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write_operand(f, item, &[])?;
                }
                write!(f, "]")
            }
        }
    }
}
