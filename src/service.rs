//! Resource permission assignment service.
//!
//! Owns the assignment lifecycle of one resource type: lookup of the grants on
//! an instance, idempotent set/remove of a subject's level, and the implicit
//! Admin grant shown while role-based enforcement is unlicensed.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Assignments, ResourceTypeConfig};
use crate::error::Result;
use crate::mapper::PermissionMapper;
use crate::permission::{Display, ResourcePermission};
use crate::read::ResourceRef;
use crate::resolver::ScopeResolver;
use crate::scope::WILDCARD;
use crate::store::PermissionStore;
use crate::subject::{Subject, ROLE_ADMIN};

/// License feature that turns on role-based enforcement
pub const ENFORCEMENT_FEATURE: &str = "accesscontrol.enforcement";

pub trait LicenseChecker: Send + Sync {
    fn feature_enabled(&self, feature: &str) -> bool;
}

impl<F> LicenseChecker for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn feature_enabled(&self, feature: &str) -> bool {
        self(feature)
    }
}

/// A fixed set of licensed features
#[derive(Debug, Clone, Default)]
pub struct FeatureSet(HashSet<String>);

impl FeatureSet {
    pub fn none() -> Self {
        FeatureSet::default()
    }

    pub fn with<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FeatureSet(features.into_iter().map(Into::into).collect())
    }
}

impl LicenseChecker for FeatureSet {
    fn feature_enabled(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }
}

/// Static description of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    pub assignments: Assignments,
    /// Most privileged first
    pub permissions: Vec<String>,
}

/// One grant as exposed to API consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionEntry {
    pub id: u64,
    pub is_managed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_in_role: Option<String>,
    pub role_name: String,
    pub actions: Vec<String>,
    pub permission: String,
}

impl PermissionEntry {
    fn new(p: &ResourcePermission, permission: &str) -> Self {
        let Display { name, avatar_url } = p.display.clone();
        let mut entry = PermissionEntry {
            id: p.id,
            is_managed: p.managed,
            user_id: None,
            user_login: None,
            user_avatar_url: None,
            team_id: None,
            team: None,
            team_avatar_url: None,
            built_in_role: None,
            role_name: p.subject.role_name(p.managed),
            actions: p.actions.iter().cloned().collect(),
            permission: permission.to_string(),
        };
        match &p.subject {
            Subject::User(id) => {
                entry.user_id = Some(*id);
                entry.user_login = name;
                entry.user_avatar_url = avatar_url;
            }
            Subject::Team(id) => {
                entry.team_id = Some(*id);
                entry.team = name;
                entry.team_avatar_url = avatar_url;
            }
            Subject::BuiltInRole(role) => entry.built_in_role = Some(role.clone()),
        }
        entry
    }
}

pub struct ResourcePermissionService<S> {
    config: Arc<ResourceTypeConfig>,
    mapper: PermissionMapper,
    resolver: ScopeResolver,
    store: Arc<S>,
    license: Arc<dyn LicenseChecker>,
    actions: BTreeSet<String>,
}

impl<S: PermissionStore> ResourcePermissionService<S> {
    pub fn new(config: ResourceTypeConfig, store: Arc<S>, license: Arc<dyn LicenseChecker>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(ResourcePermissionService {
            mapper: PermissionMapper::from_config(&config),
            resolver: ScopeResolver::new(config.clone()),
            actions: config.actions().into_iter().collect(),
            config,
            store,
            license,
        })
    }

    pub fn config(&self) -> &ResourceTypeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    pub fn mapper(&self) -> &PermissionMapper {
        &self.mapper
    }

    pub fn description(&self) -> Description {
        Description {
            assignments: self.config.assignments,
            permissions: self.mapper.display_levels(),
        }
    }

    /// Level name of a row, `None` when it matches no configured level
    pub fn map_actions(&self, permission: &ResourcePermission) -> Option<&str> {
        self.mapper.map_actions(&permission.actions)
    }

    /// Every grant on the instance, in no particular order. Unknown instances
    /// simply have none.
    pub fn get_permissions(&self, resource_id: &str) -> Result<Vec<ResourcePermission>> {
        let scope = self.config.scope(resource_id);
        let r = self.resource_ref(resource_id, &scope);
        let mut permissions = self.store.list_permissions(&r)?;
        if let Some(fallback) = self.license_fallback(resource_id) {
            permissions.push(fallback);
        }
        Ok(permissions)
    }

    /// `get_permissions` mapped to level names; rows without a level are left out
    pub fn entries(&self, resource_id: &str) -> Result<Vec<PermissionEntry>> {
        let permissions = self.get_permissions(resource_id)?;
        let mut entries = Vec::with_capacity(permissions.len());
        for p in &permissions {
            match self.map_actions(p) {
                Some(level) => entries.push(PermissionEntry::new(p, level)),
                None => debug!(resource_id, subject = %p.subject, "grant matches no permission level, hidden"),
            }
        }
        Ok(entries)
    }

    /// Assign `level` to `subject` on the instance; `""` removes the assignment.
    ///
    /// Returns the committed row, or `None` when the subject ends up without a
    /// row (removed, or there was nothing to remove). Validation happens
    /// before the transaction opens; the read-modify-write runs inside it.
    pub fn set_permission(&self, resource_id: &str, subject: &Subject, level: &str) -> Result<Option<ResourcePermission>> {
        subject.validate()?;
        subject.check_assignable(&self.config.assignments)?;
        let actions = self.mapper.actions_for_level(level)?;
        let scope = self.config.scope(resource_id);
        let r = self.resource_ref(resource_id, &scope);

        let committed = self.store.transact(|tx| {
            if actions.is_empty() {
                tx.delete(&r, subject)?;
                return Ok(None);
            }
            let mut row = tx.upsert(&r, subject, &actions)?;
            row.managed = true;
            Ok(Some(row))
        })?;

        match &committed {
            Some(row) => info!(resource = %self.config.resource, resource_id, subject = %subject, level, id = row.id, "permission updated"),
            None => info!(resource = %self.config.resource, resource_id, subject = %subject, "permission removed"),
        }
        Ok(committed)
    }

    pub fn set_user_permission(&self, resource_id: &str, user_id: i64, level: &str) -> Result<Option<ResourcePermission>> {
        self.set_permission(resource_id, &Subject::User(user_id), level)
    }

    pub fn set_team_permission(&self, resource_id: &str, team_id: i64, level: &str) -> Result<Option<ResourcePermission>> {
        self.set_permission(resource_id, &Subject::Team(team_id), level)
    }

    pub fn set_built_in_role_permission(&self, resource_id: &str, role: &str, level: &str) -> Result<Option<ResourcePermission>> {
        self.set_permission(resource_id, &Subject::built_in_role(role)?, level)
    }

    /// Admin holds every action everywhere while enforcement is unlicensed.
    /// Computed per call, never stored.
    fn license_fallback(&self, resource_id: &str) -> Option<ResourcePermission> {
        if !self.config.assignments.built_in_roles || self.license.feature_enabled(ENFORCEMENT_FEATURE) {
            return None;
        }
        Some(ResourcePermission {
            id: 0,
            resource_id: resource_id.to_string(),
            subject: Subject::BuiltInRole(ROLE_ADMIN.to_string()),
            actions: self.actions.clone(),
            scope: WILDCARD.to_string(),
            managed: false,
            display: Display { name: Some(ROLE_ADMIN.to_string()), avatar_url: None },
        })
    }

    fn resource_ref<'a>(&'a self, resource_id: &'a str, scope: &'a str) -> ResourceRef<'a> {
        ResourceRef { resource: &self.config.resource, resource_id, scope }
    }
}
