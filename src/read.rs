//! Read operations shared by read snapshots and write transactions

use std::collections::{BTreeMap, BTreeSet};

use heed::RoTxn;

use crate::db::{Dbs, Row};
use crate::error::{err, Result};
use crate::keys;
use crate::permission::{Display, ResourcePermission};
use crate::scope;
use crate::subject::Subject;

/// The resource instance a query is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef<'a> {
    pub resource: &'a str,
    pub resource_id: &'a str,
    /// Concrete scope of the instance, e.g. `dashboards:uid:42`
    pub scope: &'a str,
}

/// A read-only view over one snapshot
pub struct ReadTx<'t, 'e> {
    txn: &'t RoTxn<'e>,
    dbs: &'t Dbs,
}

impl<'t, 'e> ReadTx<'t, 'e> {
    pub(crate) fn new(txn: &'t RoTxn<'e>, dbs: &'t Dbs) -> Self {
        ReadTx { txn, dbs }
    }

    pub fn find_permission(&self, r: &ResourceRef, subject: &Subject) -> Result<Option<ResourcePermission>> {
        find_permission(self.dbs, self.txn, r, subject)
    }

    pub fn list_permissions(&self, r: &ResourceRef) -> Result<Vec<ResourcePermission>> {
        list_permissions(self.dbs, self.txn, r)
    }

    pub fn parent_scopes(&self, resource: &str, resource_id: &str) -> Result<Vec<String>> {
        parent_scopes(self.dbs, self.txn, resource, resource_id)
    }
}

pub(crate) fn find_row(d: &Dbs, tx: &RoTxn, r: &ResourceRef, subject: &Subject) -> Result<Option<Row>> {
    let key = keys::permission_key(r.resource, r.resource_id, subject.kind(), &subject.key_id())?;
    d.perms.get(tx, &key).map_err(err)
}

/// Build the caller-facing row from its stored parts
pub(crate) fn to_permission(d: &Dbs, tx: &RoTxn, r: &ResourceRef, subject: Subject, row: Row) -> Result<ResourcePermission> {
    Ok(ResourcePermission {
        id: row.id,
        resource_id: r.resource_id.to_string(),
        display: display(d, tx, &subject)?,
        subject,
        actions: row.actions,
        scope: r.scope.to_string(),
        managed: true,
    })
}

pub(crate) fn find_permission(d: &Dbs, tx: &RoTxn, r: &ResourceRef, subject: &Subject) -> Result<Option<ResourcePermission>> {
    match find_row(d, tx, r, subject)? {
        Some(row) => Ok(Some(to_permission(d, tx, r, subject.clone(), row)?)),
        None => Ok(None),
    }
}

/// Managed rows of the instance, then one unmanaged row per built-in role
/// holding role grants whose scope covers the instance
pub(crate) fn list_permissions(d: &Dbs, tx: &RoTxn, r: &ResourceRef) -> Result<Vec<ResourcePermission>> {
    let prefix = keys::resource_key(r.resource, r.resource_id)?;
    let mut out = Vec::new();
    for item in d.perms.prefix_iter(tx, &prefix).map_err(err)? {
        let (k, row) = item.map_err(err)?;
        let Some(subject) = keys::get_part(k, 2).zip(keys::get_part(k, 3)).and_then(|(kind, id)| Subject::from_key(kind, id)) else {
            continue;
        };
        out.push(to_permission(d, tx, r, subject, row)?);
    }

    let mut by_role: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for item in d.role_grants.iter(tx).map_err(err)? {
        let (k, ()) = item.map_err(err)?;
        let parts = keys::parse_key(k);
        if let [role, action, granted] = parts.as_slice() {
            if scope::matches(granted, r.scope) {
                by_role.entry(role.to_string()).or_default().insert(action.to_string());
            }
        }
    }
    for (role, actions) in by_role {
        let subject = Subject::BuiltInRole(role);
        out.push(ResourcePermission {
            id: 0,
            resource_id: r.resource_id.to_string(),
            display: display(d, tx, &subject)?,
            subject,
            actions,
            scope: r.scope.to_string(),
            managed: false,
        });
    }
    Ok(out)
}

pub(crate) fn display(d: &Dbs, tx: &RoTxn, subject: &Subject) -> Result<Display> {
    Ok(match subject {
        Subject::User(id) => d.users.get(tx, id).map_err(err)?.map(|u| u.display()).unwrap_or_default(),
        Subject::Team(id) => d.teams.get(tx, id).map_err(err)?.map(|t| t.display()).unwrap_or_default(),
        Subject::BuiltInRole(role) => Display { name: Some(role.clone()), avatar_url: None },
    })
}

pub(crate) fn parent_scopes(d: &Dbs, tx: &RoTxn, resource: &str, resource_id: &str) -> Result<Vec<String>> {
    let key = keys::resource_key(resource, resource_id)?;
    Ok(d.parents.get(tx, &key).map_err(err)?.unwrap_or_default())
}
