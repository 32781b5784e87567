//! LMDB environment and table handles

use std::collections::BTreeSet;
use std::path::Path;

use heed::types::{Bytes, SerdeJson, Str, Unit, I64, U64};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};

use crate::error::{err, Result};
use crate::permission::{TeamInfo, UserInfo};
use crate::read::ReadTx;
use crate::tx::Tx;

type BigEndian = byteorder::BigEndian;

/// Stored value of a managed grant; the subject lives in the key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: u64,
    pub actions: BTreeSet<String>,
}

/// All database handles
pub struct Dbs {
    /// [resource][resource_id][kind][subject_id] -> row
    pub perms: Database<Bytes, SerdeJson<Row>>,
    /// [role][action][scope] -> ()
    pub role_grants: Database<Bytes, Unit>,
    /// [resource][resource_id] -> container scopes, nearest first
    pub parents: Database<Bytes, SerdeJson<Vec<String>>>,
    pub users: Database<I64<BigEndian>, SerdeJson<UserInfo>>,
    pub teams: Database<I64<BigEndian>, SerdeJson<TeamInfo>>,
    /// counters
    pub meta: Database<Str, U64<BigEndian>>,
}

/// An owned LMDB environment. Writers are serialized by LMDB; readers see snapshots.
pub struct Store {
    env: Env,
    dbs: Dbs,
}

impl Store {
    /// Open (creating if needed) the environment at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other process to open this path with different settings.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1 << 30)
                .max_dbs(6)
                .open(path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            perms: env.create_database(&mut tx, Some("perms")).map_err(err)?,
            role_grants: env.create_database(&mut tx, Some("role_grants")).map_err(err)?,
            parents: env.create_database(&mut tx, Some("parents")).map_err(err)?,
            users: env.create_database(&mut tx, Some("users")).map_err(err)?,
            teams: env.create_database(&mut tx, Some("teams")).map_err(err)?,
            meta: env.create_database(&mut tx, Some("meta")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        Ok(Store { env, dbs })
    }

    /// Run `f` against a consistent read snapshot
    pub fn read<T, F: FnOnce(&ReadTx) -> Result<T>>(&self, f: F) -> Result<T> {
        let txn = self.env.read_txn().map_err(err)?;
        f(&ReadTx::new(&txn, &self.dbs))
    }

    /// Run `f` in one write transaction. An error from `f` aborts it with nothing written.
    pub fn transact<T, F: FnOnce(&mut Tx) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = Tx::new(self.env.write_txn().map_err(err)?, &self.dbs);
        let r = f(&mut tx)?;
        tx.commit()?;
        Ok(r)
    }

    pub fn put_user(&self, id: i64, info: &UserInfo) -> Result<()> {
        self.transact(|tx| tx.put_user(id, info))
    }

    pub fn put_team(&self, id: i64, info: &TeamInfo) -> Result<()> {
        self.transact(|tx| tx.put_team(id, info))
    }

    /// Grant `action` at `scope` to every holder of a built-in role
    pub fn put_role_grant(&self, role: &str, action: &str, scope: &str) -> Result<()> {
        self.transact(|tx| tx.put_role_grant(role, action, scope))
    }

    pub fn remove_role_grant(&self, role: &str, action: &str, scope: &str) -> Result<bool> {
        self.transact(|tx| tx.remove_role_grant(role, action, scope))
    }

    /// Record the containers of a resource instance, nearest first
    pub fn set_parent_scopes(&self, resource: &str, resource_id: &str, scopes: &[String]) -> Result<()> {
        self.transact(|tx| tx.set_parent_scopes(resource, resource_id, scopes))
    }

    pub fn parent_scopes(&self, resource: &str, resource_id: &str) -> Result<Vec<String>> {
        self.read(|tx| tx.parent_scopes(resource, resource_id))
    }

    /// Clear all tables (for testing)
    pub fn clear_all(&self) -> Result<()> {
        self.transact(|tx| tx.clear_all())
    }
}
