//! Endpoint evaluators for a resource type, with inherited-scope alternatives.
//!
//! Evaluators are built once per resource type and refer to the instance and
//! its containers through placeholders. `resolve_parameters` fills them in for
//! one request; it must run before evaluation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ResourceTypeConfig, RESOURCE_ID_PARAM};
use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, Grants};
use crate::scope::{self, Parameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Read and write evaluators protecting the instance at `scope`.
///
/// Without inheritance each is a single permission leaf. With inheritance the
/// leaf is widened into `Any` with one alternative per inherited prefix, so a
/// grant on a containing resource (e.g. `folders:uid:abc`) also authorizes.
pub fn build_evaluators(config: &ResourceTypeConfig, scope: &str) -> (Evaluator, Evaluator) {
    let (action_read, action_write) = (config.action_read(), config.action_write());
    if !config.has_inheritance() {
        return (
            Evaluator::permission(action_read, scope),
            Evaluator::permission(action_write, scope),
        );
    }

    let mut read = vec![Evaluator::permission(action_read.clone(), scope)];
    let mut write = vec![Evaluator::permission(action_write.clone(), scope)];
    for prefix in &config.inherited_scope_prefixes {
        read.push(Evaluator::permission(action_read.clone(), scope::parameter(prefix)));
        write.push(Evaluator::permission(action_write.clone(), scope::parameter(prefix)));
    }
    (Evaluator::Any(read), Evaluator::Any(write))
}

pub struct ScopeResolver {
    config: Arc<ResourceTypeConfig>,
    read: Evaluator,
    write: Evaluator,
    description: Evaluator,
}

impl ScopeResolver {
    pub fn new(config: Arc<ResourceTypeConfig>) -> Self {
        let (read, write) = build_evaluators(&config, &config.scope_pattern());
        let description = Evaluator::action(config.action_read());
        ScopeResolver { config, read, write, description }
    }

    pub fn config(&self) -> &ResourceTypeConfig {
        &self.config
    }

    pub fn evaluator(&self, access: Access) -> &Evaluator {
        match access {
            Access::Read => &self.read,
            Access::Write => &self.write,
        }
    }

    /// Protects the resource type description; no instance involved
    pub fn description_evaluator(&self) -> &Evaluator {
        &self.description
    }

    /// Parameters for one request: the instance id plus, when inheritance is
    /// configured, each inherited scope keyed by its prefix. A solver error
    /// fails the whole resolution.
    pub fn resolve_parameters(&self, resource_id: &str) -> Result<Parameters> {
        let mut params = Parameters::new();
        params.insert(RESOURCE_ID_PARAM.to_string(), resource_id.to_string());
        if !self.config.has_inheritance() {
            return Ok(params);
        }
        let Some(solver) = self.config.inherited_scopes_solver.as_ref() else {
            return Ok(params);
        };

        let scopes = solver.resolve(resource_id).map_err(|e| {
            warn!(resource = %self.config.resource, resource_id, error = %e, "inherited scope solver failed");
            Error::InheritanceResolution(format!("{}:{}: {}", self.config.resource, resource_id, e))
        })?;
        for s in scopes {
            let prefix = scope::scope_prefix(&s);
            // solvers return the nearest container first; later scopes with the same prefix lose
            params.entry(prefix).or_insert(s);
        }
        debug!(resource = %self.config.resource, resource_id, params = ?params, "resolved scope parameters");
        Ok(params)
    }

    /// Resolve, then evaluate. Denials and solver failures both refuse access.
    pub fn authorize(&self, grants: &Grants, resource_id: &str, access: Access) -> Result<()> {
        let params = self.resolve_parameters(resource_id)?;
        let eval = self.evaluator(access);
        if eval.evaluate(grants, &params) {
            Ok(())
        } else {
            debug!(resource_id, evaluator = %eval, "access denied");
            Err(Error::NotAuthorized(format!(
                "{:?} on {}",
                access,
                self.config.scope(resource_id)
            )))
        }
    }

    pub fn authorize_description(&self, grants: &Grants) -> Result<()> {
        if self.description.evaluate(grants, &Parameters::new()) {
            Ok(())
        } else {
            Err(Error::NotAuthorized(format!("{} description", self.config.resource)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InheritedScopesSolver;

    fn grants(pairs: &[(&str, &str)]) -> Grants {
        let mut g = Grants::new();
        for (a, s) in pairs {
            g.entry(a.to_string()).or_default().push(s.to_string());
        }
        g
    }

    fn dashboards() -> ResourceTypeConfig {
        ResourceTypeConfig::new("dashboards", "uid").level("View", ["dashboards:read"])
    }

    fn inheriting(solver: Arc<dyn InheritedScopesSolver>) -> ScopeResolver {
        ScopeResolver::new(Arc::new(dashboards().inherit_from(solver, ["folders:uid:"])))
    }

    #[test]
    fn direct_evaluators_without_inheritance() {
        let config = dashboards();
        let (read, write) = build_evaluators(&config, &config.scope("42"));
        assert_eq!(read, Evaluator::permission("dashboards.permissions:read", "dashboards:uid:42"));
        assert_eq!(write, Evaluator::permission("dashboards.permissions:write", "dashboards:uid:42"));
    }

    #[test]
    fn inherited_alternatives_per_prefix() {
        let solver: Arc<dyn InheritedScopesSolver> = Arc::new(|_: &str| -> Result<Vec<String>> { Ok(vec![]) });
        let config = dashboards().inherit_from(solver, ["folders:uid:", "teams:id:"]);
        let (read, _) = build_evaluators(&config, "dashboards:uid:1");
        match read {
            Evaluator::Any(children) => {
                assert_eq!(children.len(), 3);
                assert_eq!(children[1], Evaluator::permission("dashboards.permissions:read", "{{folders:uid:}}"));
            }
            other => panic!("expected any, got {}", other),
        }
    }

    #[test]
    fn direct_grant_authorizes_only_its_instance() {
        let r = ScopeResolver::new(Arc::new(dashboards()));
        let g = grants(&[("dashboards.permissions:read", "dashboards:uid:42")]);
        assert!(r.authorize(&g, "42", Access::Read).is_ok());
        assert!(matches!(r.authorize(&g, "43", Access::Read), Err(Error::NotAuthorized(_))));
        assert!(r.authorize(&g, "42", Access::Write).is_err());
    }

    #[test]
    fn folder_grant_authorizes_child() {
        let r = inheriting(Arc::new(|id: &str| -> Result<Vec<String>> {
            Ok(if id == "42" { vec!["folders:uid:abc".to_string()] } else { vec![] })
        }));
        let g = grants(&[("dashboards.permissions:write", "folders:uid:abc")]);
        assert!(r.authorize(&g, "42", Access::Write).is_ok());
        assert!(r.authorize(&g, "42", Access::Read).is_err());
        assert!(r.authorize(&g, "7", Access::Write).is_err());
    }

    #[test]
    fn solver_failure_fails_closed() {
        let r = inheriting(Arc::new(|_: &str| -> Result<Vec<String>> {
            Err(Error::Persistence("down".into()))
        }));
        // even a direct grant is refused when resolution fails
        let g = grants(&[("dashboards.permissions:read", "dashboards:uid:42")]);
        assert!(matches!(r.authorize(&g, "42", Access::Read), Err(Error::InheritanceResolution(_))));
    }

    #[test]
    fn parameters_keep_nearest_container() {
        let r = inheriting(Arc::new(|_: &str| -> Result<Vec<String>> {
            Ok(vec!["folders:uid:child".to_string(), "folders:uid:parent".to_string()])
        }));
        let p = r.resolve_parameters("42").unwrap();
        assert_eq!(p.get(":resourceID").map(String::as_str), Some("42"));
        assert_eq!(p.get("folders:uid:").map(String::as_str), Some("folders:uid:child"));
    }

    #[test]
    fn description_needs_read_action_anywhere() {
        let r = ScopeResolver::new(Arc::new(dashboards()));
        assert!(r.authorize_description(&grants(&[("dashboards.permissions:read", "dashboards:uid:1")])).is_ok());
        assert!(r.authorize_description(&Grants::new()).is_err());
    }
}
