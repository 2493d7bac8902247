//! In-process reference engine
//!
//! Evaluates a small set of goals (`true`, `fail`, conjunction, `=`,
//! `member/2`, `between/3`, `length/2`) over syntactic unification. Solutions
//! are computed on first demand and then walked with a cursor.

use std::collections::HashMap;
use tracing::debug;

use crate::engine::{Engine, QuerySession, QuerySpec};
use crate::error::EngineError;
use crate::term::{parse_term, Solution, Term};

const DEFAULT_SOLUTION_LIMIT: usize = 1_000_000;

type Bindings = HashMap<String, Term>;

/// Engine backed by the built-in solver
#[derive(Debug, Clone)]
pub struct BuiltinEngine {
    solution_limit: usize,
}

impl BuiltinEngine {
    pub fn new() -> Self {
        Self {
            solution_limit: DEFAULT_SOLUTION_LIMIT,
        }
    }

    /// Cap on the number of solutions one query may produce.
    pub fn with_solution_limit(solution_limit: usize) -> Self {
        Self { solution_limit }
    }
}

impl Default for BuiltinEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for BuiltinEngine {
    type Session = BuiltinSession;

    fn open(&mut self, spec: &QuerySpec) -> Result<BuiltinSession, EngineError> {
        let goal = match spec {
            QuerySpec::Source(text) => parse_term(text)?,
            QuerySpec::Term(term) => term.clone(),
        };
        if goal.indicator().is_none() {
            return Err(EngineError::Type {
                expected: "callable".to_string(),
                found: goal.kind().to_string(),
            });
        }
        Ok(BuiltinSession::new(goal, self.solution_limit))
    }

    fn close(&mut self, session: BuiltinSession) {
        debug!(goal = %session.goal, "Closing builtin session");
    }
}

/// One query's enumeration state
#[derive(Debug)]
pub struct BuiltinSession {
    goal: Term,
    variables: Vec<String>,
    solutions: Option<Vec<Solution>>,
    cursor: usize,
    solution_limit: usize,
}

impl BuiltinSession {
    fn new(goal: Term, solution_limit: usize) -> Self {
        let variables = goal.variables();
        Self {
            goal,
            variables,
            solutions: None,
            cursor: 0,
            solution_limit,
        }
    }

    pub fn goal(&self) -> &Term {
        &self.goal
    }

    fn solved(&mut self) -> Result<&[Solution], EngineError> {
        if self.solutions.is_none() {
            let mut solver = Solver {
                limit: self.solution_limit,
                fresh: 0,
            };
            let found = solver.solve(&self.goal, Bindings::new())?;
            let solutions = found
                .iter()
                .map(|bindings| {
                    self.variables
                        .iter()
                        .map(|name| (name.clone(), resolve(&Term::Var(name.clone()), bindings)))
                        .collect::<Solution>()
                })
                .collect();
            self.solutions = Some(solutions);
        }
        Ok(self.solutions.as_deref().unwrap_or(&[]))
    }
}

impl QuerySession for BuiltinSession {
    fn reset(&mut self) -> Result<(), EngineError> {
        self.cursor = 0;
        Ok(())
    }

    fn has_more_solutions(&mut self) -> Result<bool, EngineError> {
        let cursor = self.cursor;
        Ok(cursor < self.solved()?.len())
    }

    fn next_solution(&mut self) -> Result<Option<Solution>, EngineError> {
        let cursor = self.cursor;
        let next = self.solved()?.get(cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }

    fn all_solutions(&mut self) -> Result<Vec<Solution>, EngineError> {
        let cursor = self.cursor;
        let remaining: Vec<Solution> = self.solved()?.iter().skip(cursor).cloned().collect();
        self.cursor += remaining.len();
        Ok(remaining)
    }
}

/// Follow variable bindings until a non-variable or an unbound variable.
fn walk(term: &Term, bindings: &Bindings) -> Term {
    let mut current = term;
    while let Term::Var(name) = current {
        match bindings.get(name) {
            Some(bound) => current = bound,
            None => break,
        }
    }
    current.clone()
}

fn resolve(term: &Term, bindings: &Bindings) -> Term {
    match walk(term, bindings) {
        Term::Compound { functor, args } => {
            let args: Vec<Term> = args.iter().map(|arg| resolve(arg, bindings)).collect();
            match (functor.as_str(), args.as_slice()) {
                (".", [head, Term::List(rest)]) => {
                    Term::List(std::iter::once(head.clone()).chain(rest.iter().cloned()).collect())
                }
                _ => Term::Compound { functor, args },
            }
        }
        Term::List(items) => Term::List(items.iter().map(|item| resolve(item, bindings)).collect()),
        other => other,
    }
}

fn unify(left: &Term, right: &Term, bindings: &mut Bindings) -> bool {
    let left = walk(left, bindings);
    let right = walk(right, bindings);
    match (&left, &right) {
        (Term::Var(a), Term::Var(b)) if a == b => true,
        (Term::Var(name), other) | (other, Term::Var(name)) => {
            if occurs(name, other, bindings) {
                return false;
            }
            bindings.insert(name.clone(), other.clone());
            true
        }
        (Term::List(items), Term::Compound { functor, args })
        | (Term::Compound { functor, args }, Term::List(items))
            if functor == "." && args.len() == 2 =>
        {
            match items.split_first() {
                Some((head, rest)) => {
                    unify(head, &args[0], bindings)
                        && unify(&Term::List(rest.to_vec()), &args[1], bindings)
                }
                None => false,
            }
        }
        (
            Term::Compound { functor: f1, args: a1 },
            Term::Compound { functor: f2, args: a2 },
        ) => {
            f1 == f2
                && a1.len() == a2.len()
                && a1.iter().zip(a2).all(|(x, y)| unify(x, y, bindings))
        }
        (Term::List(xs), Term::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| unify(x, y, bindings))
        }
        (a, b) => a == b,
    }
}

/// True if `name` appears in `term` once bindings are followed.
fn occurs(name: &str, term: &Term, bindings: &Bindings) -> bool {
    match walk(term, bindings) {
        Term::Var(other) => other == name,
        Term::Compound { args, .. } | Term::List(args) => {
            args.iter().any(|arg| occurs(name, arg, bindings))
        }
        _ => false,
    }
}

/// Elements of a proper list, following `'.'/2` cells from `[H|T]` syntax.
fn list_items(term: &Term, bindings: &Bindings) -> Result<Vec<Term>, EngineError> {
    let mut items = Vec::new();
    let mut current = walk(term, bindings);
    loop {
        match current {
            Term::List(rest) => {
                items.extend(rest);
                return Ok(items);
            }
            Term::Compound { functor, mut args } if functor == "." && args.len() == 2 => {
                let tail = args.pop().unwrap_or(Term::List(Vec::new()));
                items.extend(args);
                current = walk(&tail, bindings);
            }
            Term::Var(name) => return Err(EngineError::Instantiation(name)),
            other => {
                return Err(EngineError::Type {
                    expected: "list".to_string(),
                    found: other.kind().to_string(),
                })
            }
        }
    }
}

struct Solver {
    limit: usize,
    fresh: usize,
}

impl Solver {
    fn solve(&mut self, goal: &Term, bindings: Bindings) -> Result<Vec<Bindings>, EngineError> {
        let goal = walk(goal, &bindings);
        let (name, arity) = match goal.indicator() {
            Some(indicator) => indicator,
            None if matches!(goal, Term::Var(_)) => {
                return Err(EngineError::Instantiation(goal.to_string()))
            }
            None => {
                return Err(EngineError::Type {
                    expected: "callable".to_string(),
                    found: goal.kind().to_string(),
                })
            }
        };
        let args: &[Term] = match &goal {
            Term::Compound { args, .. } => args,
            _ => &[],
        };

        let results = match (name, arity) {
            ("true", 0) => vec![bindings],
            ("fail", 0) | ("false", 0) => Vec::new(),
            (",", 2) => {
                let mut out = Vec::new();
                for partial in self.solve(&args[0], bindings)? {
                    out.extend(self.solve(&args[1], partial)?);
                    self.check_limit(out.len())?;
                }
                out
            }
            ("=", 2) => {
                let mut bindings = bindings;
                if unify(&args[0], &args[1], &mut bindings) {
                    vec![bindings]
                } else {
                    Vec::new()
                }
            }
            ("member", 2) => {
                let items = list_items(&args[1], &bindings)?;
                let mut out = Vec::new();
                for item in &items {
                    let mut candidate = bindings.clone();
                    if unify(&args[0], item, &mut candidate) {
                        out.push(candidate);
                    }
                }
                out
            }
            ("between", 3) => {
                let low = integer_arg(&args[0], &bindings)?;
                let high = integer_arg(&args[1], &bindings)?;
                match walk(&args[2], &bindings) {
                    Term::Var(name) => {
                        if high >= low {
                            self.check_limit(high.saturating_sub(low).saturating_add(1) as usize)?;
                        }
                        (low..=high)
                            .map(|value| {
                                let mut candidate = bindings.clone();
                                candidate.insert(name.clone(), Term::Integer(value));
                                candidate
                            })
                            .collect()
                    }
                    Term::Integer(value) if (low..=high).contains(&value) => vec![bindings],
                    Term::Integer(_) => Vec::new(),
                    other => {
                        return Err(EngineError::Type {
                            expected: "integer".to_string(),
                            found: other.kind().to_string(),
                        })
                    }
                }
            }
            ("length", 2) => match walk(&args[0], &bindings) {
                Term::Var(name) => {
                    let len = integer_arg(&args[1], &bindings)?;
                    if len < 0 {
                        return Ok(Vec::new());
                    }
                    self.check_limit(len as usize)?;
                    let items = (0..len).map(|_| self.fresh_var()).collect();
                    let mut bindings = bindings;
                    bindings.insert(name, Term::List(items));
                    vec![bindings]
                }
                list => {
                    let len = list_items(&list, &bindings)?.len() as i64;
                    let mut bindings = bindings;
                    if unify(&args[1], &Term::Integer(len), &mut bindings) {
                        vec![bindings]
                    } else {
                        Vec::new()
                    }
                }
            },
            (name, arity) => {
                return Err(EngineError::UnknownProcedure {
                    name: name.to_string(),
                    arity,
                })
            }
        };
        self.check_limit(results.len())?;
        Ok(results)
    }

    fn check_limit(&self, count: usize) -> Result<(), EngineError> {
        if count > self.limit {
            return Err(EngineError::Other(format!(
                "solution limit of {} exceeded",
                self.limit
            )));
        }
        Ok(())
    }

    fn fresh_var(&mut self) -> Term {
        self.fresh += 1;
        Term::Var(format!("_L{}", self.fresh))
    }
}

fn integer_arg(term: &Term, bindings: &Bindings) -> Result<i64, EngineError> {
    match walk(term, bindings) {
        Term::Integer(value) => Ok(value),
        Term::Var(name) => Err(EngineError::Instantiation(name)),
        other => Err(EngineError::Type {
            expected: "integer".to_string(),
            found: other.kind().to_string(),
        }),
    }
}
