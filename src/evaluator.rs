//! Boolean evaluator trees over (action, scope) leaves.
//!
//! Evaluators are immutable and hold no request state: parameters are passed
//! to every `evaluate` call, so one instance can be shared across threads.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::scope::{self, Parameters};

/// A principal's granted permissions: action -> scopes
pub type Grants = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluator {
    /// Holds `action` on any of `scopes`. No scopes: holds `action` at all.
    Permission { action: String, scopes: Vec<String> },
    All(Vec<Evaluator>),
    Any(Vec<Evaluator>),
}

impl Evaluator {
    pub fn permission(action: impl Into<String>, scope: impl Into<String>) -> Self {
        Evaluator::Permission { action: action.into(), scopes: vec![scope.into()] }
    }

    /// Satisfied by the action on any scope
    pub fn action(action: impl Into<String>) -> Self {
        Evaluator::Permission { action: action.into(), scopes: Vec::new() }
    }

    pub fn all(children: impl IntoIterator<Item = Evaluator>) -> Self {
        Evaluator::All(children.into_iter().collect())
    }

    pub fn any(children: impl IntoIterator<Item = Evaluator>) -> Self {
        Evaluator::Any(children.into_iter().collect())
    }

    /// Empty `Any` is false, empty `All` is true.
    pub fn evaluate(&self, grants: &Grants, params: &Parameters) -> bool {
        match self {
            Evaluator::Permission { action, scopes } => eval_permission(action, scopes, grants, params),
            Evaluator::All(children) => children.iter().all(|c| c.evaluate(grants, params)),
            Evaluator::Any(children) => children.iter().any(|c| c.evaluate(grants, params)),
        }
    }
}

fn eval_permission(action: &str, patterns: &[String], grants: &Grants, params: &Parameters) -> bool {
    let Some(granted) = grants.get(action) else {
        return false;
    };
    if patterns.is_empty() {
        return true;
    }
    for pattern in patterns {
        let Some(target) = scope::resolve(pattern, params) else {
            debug!(action, pattern = %pattern, "scope parameter missing, leaf denied");
            continue;
        };
        if granted.iter().any(|g| scope::matches(g, &target)) {
            return true;
        }
    }
    false
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluator::Permission { action, scopes } if scopes.is_empty() => write!(f, "action:{}", action),
            Evaluator::Permission { action, scopes } => write!(f, "action:{} scopes:{}", action, scopes.join(", ")),
            Evaluator::All(c) => write_group(f, "all", c),
            Evaluator::Any(c) => write_group(f, "any", c),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, name: &str, children: &[Evaluator]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, c) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", c)?;
    }
    write!(f, ")")
}
