//! Per-resource-type configuration.
//!
//! A `ResourceTypeConfig` is an explicit value handed to the resolver and the
//! service; nothing is registered globally.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scope;

/// Path parameter holding the resource instance id
pub const RESOURCE_ID_PARAM: &str = ":resourceID";

/// Which subject kinds may be granted permissions on the resource type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignments {
    #[serde(default)]
    pub users: bool,
    #[serde(default)]
    pub teams: bool,
    #[serde(default)]
    pub built_in_roles: bool,
}

impl Assignments {
    pub fn all() -> Self {
        Assignments { users: true, teams: true, built_in_roles: true }
    }
}

/// A named bundle of actions, e.g. "Edit" -> {dashboards:read, dashboards:write}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub name: String,
    pub actions: BTreeSet<String>,
}

/// Resolves a resource instance to the scopes of the resources containing it,
/// nearest container first
pub trait InheritedScopesSolver: Send + Sync {
    fn resolve(&self, resource_id: &str) -> Result<Vec<String>>;
}

impl<F> InheritedScopesSolver for F
where
    F: Fn(&str) -> Result<Vec<String>> + Send + Sync,
{
    fn resolve(&self, resource_id: &str) -> Result<Vec<String>> {
        self(resource_id)
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeConfig {
    pub resource: String,
    pub resource_attribute: String,
    /// Least privileged first
    pub permissions: Vec<PermissionLevel>,
    #[serde(default)]
    pub assignments: Assignments,
    /// Scope prefixes eligible for inheritance, e.g. `folders:uid:`
    #[serde(default)]
    pub inherited_scope_prefixes: Vec<String>,
    #[serde(skip)]
    pub inherited_scopes_solver: Option<Arc<dyn InheritedScopesSolver>>,
}

impl ResourceTypeConfig {
    pub fn new(resource: impl Into<String>, resource_attribute: impl Into<String>) -> Self {
        ResourceTypeConfig {
            resource: resource.into(),
            resource_attribute: resource_attribute.into(),
            permissions: Vec::new(),
            assignments: Assignments::default(),
            inherited_scope_prefixes: Vec::new(),
            inherited_scopes_solver: None,
        }
    }

    /// Append a level; call from least to most privileged
    pub fn level<I, S>(mut self, name: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.push(PermissionLevel {
            name: name.into(),
            actions: actions.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn assignments(mut self, assignments: Assignments) -> Self {
        self.assignments = assignments;
        self
    }

    pub fn inherit_from<I, S>(mut self, solver: Arc<dyn InheritedScopesSolver>, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherited_scopes_solver = Some(solver);
        self.inherited_scope_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a solver to prefixes loaded from a config file
    pub fn with_solver(mut self, solver: Arc<dyn InheritedScopesSolver>) -> Self {
        self.inherited_scopes_solver = Some(solver);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.resource.is_empty() {
            return Err(Error::validation("resource name is empty"));
        }
        if self.resource_attribute.is_empty() {
            return Err(Error::validation(format!("{}: resource attribute is empty", self.resource)));
        }
        if self.permissions.is_empty() {
            return Err(Error::validation(format!("{}: no permission levels", self.resource)));
        }
        let mut seen = HashSet::new();
        for level in &self.permissions {
            if level.name.is_empty() {
                return Err(Error::validation(format!("{}: empty level name", self.resource)));
            }
            if !seen.insert(level.name.as_str()) {
                return Err(Error::validation(format!("{}: duplicate level {}", self.resource, level.name)));
            }
            if level.actions.is_empty() || level.actions.iter().any(String::is_empty) {
                return Err(Error::validation(format!(
                    "{}: level {} needs non-empty actions",
                    self.resource, level.name
                )));
            }
        }
        Ok(())
    }

    pub fn action_read(&self) -> String {
        format!("{}.permissions:read", self.resource)
    }

    pub fn action_write(&self) -> String {
        format!("{}.permissions:write", self.resource)
    }

    /// Concrete scope of one instance
    pub fn scope(&self, resource_id: &str) -> String {
        scope::scope(&[&self.resource, &self.resource_attribute, resource_id])
    }

    /// Scope of the instance named by the `:resourceID` request parameter
    pub fn scope_pattern(&self) -> String {
        self.scope(&scope::parameter(RESOURCE_ID_PARAM))
    }

    /// Every action any level grants, sorted
    pub fn actions(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self.permissions.iter().flat_map(|l| l.actions.iter()).collect();
        all.into_iter().cloned().collect()
    }

    pub fn has_inheritance(&self) -> bool {
        self.inherited_scopes_solver.is_some() && !self.inherited_scope_prefixes.is_empty()
    }
}

impl fmt::Debug for ResourceTypeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTypeConfig")
            .field("resource", &self.resource)
            .field("resource_attribute", &self.resource_attribute)
            .field("permissions", &self.permissions)
            .field("assignments", &self.assignments)
            .field("inherited_scope_prefixes", &self.inherited_scope_prefixes)
            .field("inherited_scopes_solver", &self.inherited_scopes_solver.is_some())
            .finish()
    }
}
