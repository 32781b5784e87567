//! The persistence seam the service is written against.
//!
//! `Store` (LMDB) is the bundled implementation; tests substitute their own.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::InheritedScopesSolver;
use crate::db::Store;
use crate::error::Result;
use crate::permission::ResourcePermission;
use crate::read::ResourceRef;
use crate::subject::Subject;
use crate::tx::Tx;

/// Operations available inside one all-or-nothing unit of work
pub trait PermissionTxn {
    fn find_permission(&self, r: &ResourceRef, subject: &Subject) -> Result<Option<ResourcePermission>>;
    fn upsert(&mut self, r: &ResourceRef, subject: &Subject, actions: &BTreeSet<String>) -> Result<ResourcePermission>;
    fn delete(&mut self, r: &ResourceRef, subject: &Subject) -> Result<bool>;
}

pub trait PermissionStore: Send + Sync {
    /// Managed rows plus role-derived (unmanaged) rows covering the instance
    fn list_permissions(&self, r: &ResourceRef) -> Result<Vec<ResourcePermission>>;

    /// Run `f` as one serialized unit of work; an error leaves nothing written
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn PermissionTxn) -> Result<T>;
}

impl PermissionTxn for Tx<'_> {
    fn find_permission(&self, r: &ResourceRef, subject: &Subject) -> Result<Option<ResourcePermission>> {
        Tx::find_permission(self, r, subject)
    }

    fn upsert(&mut self, r: &ResourceRef, subject: &Subject, actions: &BTreeSet<String>) -> Result<ResourcePermission> {
        Tx::upsert(self, r, subject, actions)
    }

    fn delete(&mut self, r: &ResourceRef, subject: &Subject) -> Result<bool> {
        Tx::delete(self, r, subject)
    }
}

impl PermissionStore for Store {
    fn list_permissions(&self, r: &ResourceRef) -> Result<Vec<ResourcePermission>> {
        self.read(|tx| tx.list_permissions(r))
    }

    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn PermissionTxn) -> Result<T>,
    {
        Store::transact(self, |tx| f(tx))
    }
}

/// Inherited-scope solver over the store's parents table
pub struct StoreScopeSolver {
    store: Arc<Store>,
    resource: String,
}

impl StoreScopeSolver {
    pub fn new(store: Arc<Store>, resource: impl Into<String>) -> Self {
        StoreScopeSolver { store, resource: resource.into() }
    }
}

impl InheritedScopesSolver for StoreScopeSolver {
    fn resolve(&self, resource_id: &str) -> Result<Vec<String>> {
        self.store.parent_scopes(&self.resource, resource_id)
    }
}
