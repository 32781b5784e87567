//! resperm - resource-scoped permissions for users, teams and built-in roles
//!
//! - `Evaluator`: boolean trees over (action, scope) leaves, checked against a
//!   principal's grants
//! - `ScopeResolver`: endpoint evaluators per resource type, widened with
//!   inherited (container) scopes
//! - `PermissionMapper`: action sets <-> permission level names
//! - `ResourcePermissionService`: idempotent assignment of levels to subjects,
//!   stored in LMDB

pub mod config;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod keys;
pub mod mapper;
pub mod permission;
pub mod read;
pub mod resolver;
pub mod scope;
pub mod service;
pub mod store;
pub mod subject;
pub mod tx;

#[cfg(feature = "server")]
pub mod api;

pub use config::{Assignments, InheritedScopesSolver, PermissionLevel, ResourceTypeConfig, RESOURCE_ID_PARAM};
pub use db::Store;
pub use error::{Error, Result};
pub use evaluator::{Evaluator, Grants};
pub use mapper::PermissionMapper;
pub use permission::{Display, ResourcePermission, TeamInfo, UserInfo};
pub use read::ResourceRef;
pub use resolver::{build_evaluators, Access, ScopeResolver};
pub use scope::Parameters;
pub use service::{
    Description, FeatureSet, LicenseChecker, PermissionEntry, ResourcePermissionService, ENFORCEMENT_FEATURE,
};
pub use store::{PermissionStore, PermissionTxn, StoreScopeSolver};
pub use subject::Subject;
