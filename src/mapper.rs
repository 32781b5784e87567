//! Translation between stored action sets and permission level names.

use std::collections::BTreeSet;

use crate::config::{PermissionLevel, ResourceTypeConfig};
use crate::error::{Error, Result};

/// Levels are held least privileged first; the display order is the reverse.
#[derive(Debug, Clone)]
pub struct PermissionMapper {
    levels: Vec<PermissionLevel>,
}

impl PermissionMapper {
    pub fn new(levels: Vec<PermissionLevel>) -> Self {
        PermissionMapper { levels }
    }

    pub fn from_config(config: &ResourceTypeConfig) -> Self {
        Self::new(config.permissions.clone())
    }

    /// The highest level whose every action is present in `actions`.
    /// `None` when no level is satisfied; such rows are hidden, not deleted.
    pub fn map_actions<'a, I>(&self, actions: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let stored: BTreeSet<&str> = actions.into_iter().map(String::as_str).collect();
        self.levels
            .iter()
            .rev()
            .find(|l| l.actions.iter().all(|a| stored.contains(a.as_str())))
            .map(|l| l.name.as_str())
    }

    /// Actions implied by a level; `""` yields the empty set (remove assignment)
    pub fn actions_for_level(&self, name: &str) -> Result<BTreeSet<String>> {
        if name.is_empty() {
            return Ok(BTreeSet::new());
        }
        self.levels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.actions.clone())
            .ok_or_else(|| Error::validation(format!("invalid permission level: {}", name)))
    }

    /// Most privileged first
    pub fn display_levels(&self) -> Vec<String> {
        self.levels.iter().rev().map(|l| l.name.clone()).collect()
    }
}
