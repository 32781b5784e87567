//! resperm REST API Server
//!
//! Run with: cargo run --features server --bin resperm-server
//!
//! Environment:
//!   RESPERM_DB           - LMDB directory (default ./data/resperm.mdb)
//!   PORT                 - listen port (default 3000)
//!   RESPERM_ENFORCEMENT  - "true"/"1" licenses role-based enforcement
//!   RESPERM_RESOURCES    - JSON file with resource type definitions
//!   RUST_LOG             - log filter (default info)

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use resperm::api::{self, HeaderGrants};
use resperm::{
    Assignments, FeatureSet, LicenseChecker, ResourcePermissionService, ResourceTypeConfig, Store,
    StoreScopeSolver, ENFORCEMENT_FEATURE,
};

// ============================================================================
// Configuration
// ============================================================================

struct ServerConfig {
    db_path: String,
    port: String,
    enforcement: bool,
    resources_file: Option<String>,
}

impl ServerConfig {
    fn from_env() -> Self {
        let flag = |v: String| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        ServerConfig {
            db_path: std::env::var("RESPERM_DB").unwrap_or_else(|_| "./data/resperm.mdb".into()),
            port: std::env::var("PORT").unwrap_or_else(|_| "3000".into()),
            enforcement: std::env::var("RESPERM_ENFORCEMENT").map(flag).unwrap_or(false),
            resources_file: std::env::var("RESPERM_RESOURCES").ok(),
        }
    }
}

/// Folders, and dashboards that inherit from their folder
fn default_resources() -> Vec<ResourceTypeConfig> {
    vec![
        ResourceTypeConfig::new("folders", "uid")
            .level("View", ["folders:read", "dashboards:read"])
            .level("Edit", ["folders:read", "dashboards:read", "folders:write", "dashboards:write"])
            .level("Admin", [
                "folders:read", "dashboards:read", "folders:write", "dashboards:write",
                "folders.permissions:read", "folders.permissions:write",
            ])
            .assignments(Assignments::all()),
        ResourceTypeConfig {
            inherited_scope_prefixes: vec!["folders:uid:".into()],
            ..ResourceTypeConfig::new("dashboards", "uid")
                .level("View", ["dashboards:read"])
                .level("Edit", ["dashboards:read", "dashboards:write", "dashboards:delete"])
                .level("Admin", [
                    "dashboards:read", "dashboards:write", "dashboards:delete",
                    "dashboards.permissions:read", "dashboards.permissions:write",
                ])
                .assignments(Assignments::all())
        },
    ]
}

fn load_resources(cfg: &ServerConfig) -> Result<Vec<ResourceTypeConfig>, Box<dyn std::error::Error>> {
    match &cfg.resources_file {
        Some(path) => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => Ok(default_resources()),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServerConfig::from_env();
    info!(path = %cfg.db_path, "opening database");
    let store = Arc::new(Store::open(&cfg.db_path)?);

    let license: Arc<dyn LicenseChecker> = Arc::new(if cfg.enforcement {
        FeatureSet::with([ENFORCEMENT_FEATURE])
    } else {
        FeatureSet::none()
    });
    let auth = Arc::new(HeaderGrants);

    let mut app = Router::new();
    for resource in load_resources(&cfg)? {
        // prefixes from config are served by the store's parents table
        let resource = if resource.inherited_scope_prefixes.is_empty() {
            resource
        } else {
            let solver = Arc::new(StoreScopeSolver::new(store.clone(), resource.resource.clone()));
            resource.with_solver(solver)
        };
        info!(resource = %resource.resource, inheritance = resource.has_inheritance(), "mounting resource type");
        let service = Arc::new(ResourcePermissionService::new(resource, store.clone(), license.clone())?);
        app = app.merge(api::router(service, auth.clone()));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", cfg.port);
    info!(%addr, enforcement = cfg.enforcement, "resperm server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
