//! Write transaction wrapper

use std::collections::BTreeSet;

use heed::RwTxn;

use crate::db::{Dbs, Row};
use crate::error::{err, Result};
use crate::keys;
use crate::permission::{ResourcePermission, TeamInfo, UserInfo};
use crate::read::{self, ResourceRef};
use crate::subject::Subject;

const NEXT_ID: &str = "next_id";

/// One write transaction. Dropped without `commit` means aborted.
pub struct Tx<'t> {
    txn: RwTxn<'t>,
    dbs: &'t Dbs,
}

impl<'t> Tx<'t> {
    pub(crate) fn new(txn: RwTxn<'t>, dbs: &'t Dbs) -> Self {
        Tx { txn, dbs }
    }

    pub(crate) fn commit(self) -> Result<()> {
        self.txn.commit().map_err(err)
    }

    /// Reads inside the transaction see its own uncommitted writes
    pub fn find_permission(&self, r: &ResourceRef, subject: &Subject) -> Result<Option<ResourcePermission>> {
        read::find_permission(self.dbs, &self.txn, r, subject)
    }

    pub fn list_permissions(&self, r: &ResourceRef) -> Result<Vec<ResourcePermission>> {
        read::list_permissions(self.dbs, &self.txn, r)
    }

    /// Replace the subject's actions on the instance, keeping the row id if it exists
    pub fn upsert(&mut self, r: &ResourceRef, subject: &Subject, actions: &BTreeSet<String>) -> Result<ResourcePermission> {
        let id = match read::find_row(self.dbs, &self.txn, r, subject)? {
            Some(row) => row.id,
            None => self.next_id()?,
        };
        let row = Row { id, actions: actions.clone() };
        let key = keys::permission_key(r.resource, r.resource_id, subject.kind(), &subject.key_id())?;
        self.dbs.perms.put(&mut self.txn, &key, &row).map_err(err)?;
        read::to_permission(self.dbs, &self.txn, r, subject.clone(), row)
    }

    pub fn delete(&mut self, r: &ResourceRef, subject: &Subject) -> Result<bool> {
        let key = keys::permission_key(r.resource, r.resource_id, subject.kind(), &subject.key_id())?;
        self.dbs.perms.delete(&mut self.txn, &key).map_err(err)
    }

    pub fn put_user(&mut self, id: i64, info: &UserInfo) -> Result<()> {
        self.dbs.users.put(&mut self.txn, &id, info).map_err(err)
    }

    pub fn put_team(&mut self, id: i64, info: &TeamInfo) -> Result<()> {
        self.dbs.teams.put(&mut self.txn, &id, info).map_err(err)
    }

    pub fn put_role_grant(&mut self, role: &str, action: &str, scope: &str) -> Result<()> {
        let key = keys::role_grant_key(role, action, scope)?;
        self.dbs.role_grants.put(&mut self.txn, &key, &()).map_err(err)
    }

    pub fn remove_role_grant(&mut self, role: &str, action: &str, scope: &str) -> Result<bool> {
        let key = keys::role_grant_key(role, action, scope)?;
        self.dbs.role_grants.delete(&mut self.txn, &key).map_err(err)
    }

    pub fn set_parent_scopes(&mut self, resource: &str, resource_id: &str, scopes: &[String]) -> Result<()> {
        let key = keys::resource_key(resource, resource_id)?;
        if scopes.is_empty() {
            self.dbs.parents.delete(&mut self.txn, &key).map_err(err)?;
            return Ok(());
        }
        self.dbs.parents.put(&mut self.txn, &key, &scopes.to_vec()).map_err(err)
    }

    pub fn parent_scopes(&self, resource: &str, resource_id: &str) -> Result<Vec<String>> {
        read::parent_scopes(self.dbs, &self.txn, resource, resource_id)
    }

    pub(crate) fn next_id(&mut self) -> Result<u64> {
        let id = self.dbs.meta.get(&self.txn, NEXT_ID).map_err(err)?.unwrap_or(1);
        self.dbs.meta.put(&mut self.txn, NEXT_ID, &(id + 1)).map_err(err)?;
        Ok(id)
    }

    pub(crate) fn clear_all(&mut self) -> Result<()> {
        self.dbs.perms.clear(&mut self.txn).map_err(err)?;
        self.dbs.role_grants.clear(&mut self.txn).map_err(err)?;
        self.dbs.parents.clear(&mut self.txn).map_err(err)?;
        self.dbs.users.clear(&mut self.txn).map_err(err)?;
        self.dbs.teams.clear(&mut self.txn).map_err(err)?;
        self.dbs.meta.clear(&mut self.txn).map_err(err)
    }
}
