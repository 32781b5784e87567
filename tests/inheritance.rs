//! Endpoint authorization with inherited scopes resolved from the store

use std::sync::Arc;

use resperm::{
    Access, Assignments, Error, Evaluator, FeatureSet, Grants, InheritedScopesSolver, ResourcePermissionService,
    ResourceTypeConfig, Result, ScopeResolver, Store, StoreScopeSolver,
};
use tempfile::TempDir;

fn grants(pairs: &[(&str, &str)]) -> Grants {
    let mut g = Grants::new();
    for (a, s) in pairs {
        g.entry(a.to_string()).or_default().push(s.to_string());
    }
    g
}

fn dashboards() -> ResourceTypeConfig {
    ResourceTypeConfig::new("dashboards", "uid")
        .level("View", ["dashboards:read"])
        .level("Edit", ["dashboards:read", "dashboards:write"])
        .assignments(Assignments::all())
}

fn setup() -> (TempDir, Arc<Store>, ScopeResolver) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    let solver = Arc::new(StoreScopeSolver::new(store.clone(), "dashboards"));
    let config = dashboards().inherit_from(solver, ["folders:uid:"]);
    (dir, store, ScopeResolver::new(Arc::new(config)))
}

/// A folder-level grant authorizes every dashboard stored under the folder
#[test]
fn folder_grant_covers_contained_dashboard() {
    let (_dir, store, resolver) = setup();
    store.set_parent_scopes("dashboards", "42", &["folders:uid:team-a".to_string()]).unwrap();

    let g = grants(&[("dashboards.permissions:read", "folders:uid:team-a")]);
    assert!(resolver.authorize(&g, "42", Access::Read).is_ok());
    // dashboard outside the folder
    store.set_parent_scopes("dashboards", "43", &["folders:uid:team-b".to_string()]).unwrap();
    assert!(matches!(resolver.authorize(&g, "43", Access::Read), Err(Error::NotAuthorized(_))));
    // no parents recorded at all
    assert!(resolver.authorize(&g, "44", Access::Read).is_err());
}

#[test]
fn wildcard_folder_grant_covers_any_folder() {
    let (_dir, store, resolver) = setup();
    store.set_parent_scopes("dashboards", "42", &["folders:uid:team-a".to_string()]).unwrap();
    let g = grants(&[("dashboards.permissions:write", "folders:*")]);
    assert!(resolver.authorize(&g, "42", Access::Write).is_ok());
}

#[test]
fn direct_grant_still_works_with_inheritance() {
    let (_dir, _store, resolver) = setup();
    let g = grants(&[("dashboards.permissions:write", "dashboards:uid:42")]);
    assert!(resolver.authorize(&g, "42", Access::Write).is_ok());
    assert!(resolver.authorize(&g, "42", Access::Read).is_err());
}

#[test]
fn moving_a_dashboard_moves_its_inherited_access() {
    let (_dir, store, resolver) = setup();
    let g = grants(&[("dashboards.permissions:read", "folders:uid:team-a")]);
    store.set_parent_scopes("dashboards", "42", &["folders:uid:team-a".to_string()]).unwrap();
    assert!(resolver.authorize(&g, "42", Access::Read).is_ok());

    store.set_parent_scopes("dashboards", "42", &["folders:uid:team-b".to_string()]).unwrap();
    assert!(resolver.authorize(&g, "42", Access::Read).is_err());

    store.set_parent_scopes("dashboards", "42", &[]).unwrap();
    assert!(store.parent_scopes("dashboards", "42").unwrap().is_empty());
}

/// Solver errors deny even callers holding a direct grant
#[test]
fn failing_solver_denies() {
    let solver: Arc<dyn InheritedScopesSolver> =
        Arc::new(|_: &str| -> Result<Vec<String>> { Err(Error::Persistence("folder lookup failed".into())) });
    let resolver = ScopeResolver::new(Arc::new(dashboards().inherit_from(solver, ["folders:uid:"])));
    let g = grants(&[("dashboards.permissions:read", "dashboards:uid:42"), ("dashboards.permissions:read", "*")]);
    assert!(matches!(resolver.authorize(&g, "42", Access::Read), Err(Error::InheritanceResolution(_))));
}

/// Without inheritance the read evaluator holds iff the exact (read action, instance scope) pair is granted
#[test]
fn no_inheritance_needs_exact_pair() {
    let resolver = ScopeResolver::new(Arc::new(dashboards()));
    let read = "dashboards.permissions:read";
    for (g, expected) in [
        (grants(&[(read, "dashboards:uid:42")]), true),
        (grants(&[(read, "dashboards:uid:420")]), false),
        (grants(&[("dashboards.permissions:write", "dashboards:uid:42")]), false),
        (grants(&[(read, "folders:uid:42")]), false),
        (Grants::new(), false),
    ] {
        assert_eq!(resolver.authorize(&g, "42", Access::Read).is_ok(), expected, "{:?}", g);
    }
    assert!(matches!(resolver.evaluator(Access::Read), Evaluator::Permission { .. }));
}

/// The service exposes the same resolver it was configured with
#[test]
fn service_resolver_uses_config_inheritance() {
    let (_dir, store, _) = setup();
    let solver = Arc::new(StoreScopeSolver::new(store.clone(), "dashboards"));
    let config = dashboards().inherit_from(solver, ["folders:uid:"]);
    let service = ResourcePermissionService::new(config, store.clone(), Arc::new(FeatureSet::none())).unwrap();
    store.set_parent_scopes("dashboards", "42", &["folders:uid:f".to_string()]).unwrap();

    let g = grants(&[("dashboards.permissions:write", "folders:uid:f")]);
    assert!(service.resolver().authorize(&g, "42", Access::Write).is_ok());
    assert!(matches!(service.resolver().evaluator(Access::Write), Evaluator::Any(c) if c.len() == 2));
}
