//! Subjects a resource permission can be assigned to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Assignments;
use crate::error::{Error, Result};

/// Built-in roles accepted as subjects
pub const BUILT_IN_ROLES: &[&str] = &["Viewer", "Editor", "Admin", "Grafana Admin"];

pub const ROLE_ADMIN: &str = "Admin";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Subject {
    User(i64),
    Team(i64),
    BuiltInRole(String),
}

impl Subject {
    /// Parse a user id path segment
    pub fn user(raw: &str) -> Result<Self> {
        parse_id(raw, "userID").map(Subject::User)
    }

    /// Parse a team id path segment
    pub fn team(raw: &str) -> Result<Self> {
        parse_id(raw, "teamID").map(Subject::Team)
    }

    pub fn built_in_role(raw: &str) -> Result<Self> {
        if BUILT_IN_ROLES.contains(&raw) {
            Ok(Subject::BuiltInRole(raw.to_string()))
        } else {
            Err(Error::validation(format!("invalid built-in role: {}", raw)))
        }
    }

    /// Storage key part for the subject kind
    pub fn kind(&self) -> &'static str {
        match self {
            Subject::User(_) => "user",
            Subject::Team(_) => "team",
            Subject::BuiltInRole(_) => "builtin",
        }
    }

    /// Storage key part for the subject id
    pub fn key_id(&self) -> String {
        match self {
            Subject::User(id) | Subject::Team(id) => id.to_string(),
            Subject::BuiltInRole(role) => role.clone(),
        }
    }

    /// Rebuild a subject from its storage key parts
    pub fn from_key(kind: &str, id: &str) -> Option<Self> {
        match kind {
            "user" => id.parse().ok().map(Subject::User),
            "team" => id.parse().ok().map(Subject::Team),
            "builtin" => Some(Subject::BuiltInRole(id.to_string())),
            _ => None,
        }
    }

    /// Ids must be positive and roles must be built in
    pub fn validate(&self) -> Result<()> {
        match self {
            Subject::User(id) if *id <= 0 => Err(Error::validation(format!("userID is invalid: {}", id))),
            Subject::Team(id) if *id <= 0 => Err(Error::validation(format!("teamID is invalid: {}", id))),
            Subject::BuiltInRole(role) if !BUILT_IN_ROLES.contains(&role.as_str()) => {
                Err(Error::validation(format!("invalid built-in role: {}", role)))
            }
            _ => Ok(()),
        }
    }

    /// Name of the role backing the grant: `managed:<kind>s:<id>:permissions` for
    /// direct assignments, `basic:<role>` for role-derived ones
    pub fn role_name(&self, managed: bool) -> String {
        match (self, managed) {
            (Subject::User(id), _) => format!("managed:users:{}:permissions", id),
            (Subject::Team(id), _) => format!("managed:teams:{}:permissions", id),
            (Subject::BuiltInRole(role), true) => {
                format!("managed:builtins:{}:permissions", role.to_lowercase().replace(' ', "_"))
            }
            (Subject::BuiltInRole(role), false) => format!("basic:{}", role.to_lowercase().replace(' ', "_")),
        }
    }

    /// Reject kinds the resource type does not allow
    pub fn check_assignable(&self, assignments: &Assignments) -> Result<()> {
        let allowed = match self {
            Subject::User(_) => assignments.users,
            Subject::Team(_) => assignments.teams,
            Subject::BuiltInRole(_) => assignments.built_in_roles,
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::validation(format!("{} assignment is not enabled", self.kind())))
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key_id())
    }
}

fn parse_id(raw: &str, what: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Error::validation(format!("{} is invalid: {}", what, raw))),
    }
}
