//! HTTP surface for resource permissions
//!
//! Mounted per resource type under `/api/access-control/{resource}`:
//!   GET  /description                            - levels (display order) and assignment flags
//!   GET  /:resourceID                            - grants on the instance
//!   POST /:resourceID/users/:userID              - set a user's level
//!   POST /:resourceID/teams/:teamID              - set a team's level
//!   POST /:resourceID/builtInRoles/:builtInRole  - set a built-in role's level
//!
//! Assignment routes exist only for subject kinds the resource type enables.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evaluator::Grants;
use crate::resolver::Access;
use crate::service::{Description, PermissionEntry, ResourcePermissionService};
use crate::store::PermissionStore;
use crate::subject::Subject;

/// Header carrying the caller's grants as `{"action": ["scope", ...]}`
pub const GRANTS_HEADER: &str = "x-resperm-grants";

// ============================================================================
// Authentication (external collaborator)
// ============================================================================

/// Turns request headers into the caller's granted permissions
pub trait Authenticator: Send + Sync {
    fn grants(&self, headers: &HeaderMap) -> Option<Grants>;
}

/// Trusts the grants header as-is. For development only.
pub struct HeaderGrants;

impl Authenticator for HeaderGrants {
    fn grants(&self, headers: &HeaderMap) -> Option<Grants> {
        let raw = headers.get(GRANTS_HEADER)?.to_str().ok()?;
        serde_json::from_str(raw).ok()
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SetPermissionCommand {
    permission: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
    code: &'static str,
}

/// An error already mapped to its HTTP outcome
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn unauthenticated() -> Self {
        ApiError { status: StatusCode::UNAUTHORIZED, code: "UNAUTHENTICATED", message: "missing or invalid credentials".into() }
    }

    fn internal(message: String) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, code: "INTERNAL", message }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let code = e.code();
        match e {
            Error::Validation(m) => ApiError { status: StatusCode::BAD_REQUEST, code, message: m },
            Error::NotAuthorized(m) => ApiError { status: StatusCode::FORBIDDEN, code, message: m },
            Error::InheritanceResolution(_) => {
                ApiError { status: StatusCode::NOT_FOUND, code, message: "Resource not found".into() }
            }
            Error::Persistence(_) => {
                tracing::error!(error = %e, "storage failure");
                ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, code, message: "internal error".into() }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { message: self.message, code: self.code })).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ============================================================================
// State
// ============================================================================

struct ApiState<S> {
    service: Arc<ResourcePermissionService<S>>,
    auth: Arc<dyn Authenticator>,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        ApiState { service: self.service.clone(), auth: self.auth.clone() }
    }
}

/// Routes for one resource type
pub fn router<S>(service: Arc<ResourcePermissionService<S>>, auth: Arc<dyn Authenticator>) -> Router
where
    S: PermissionStore + 'static,
{
    let base = format!("/api/access-control/{}", service.config().resource);
    let assignments = service.config().assignments;

    let mut routes = Router::new()
        .route("/description", get(get_description::<S>))
        .route("/:resourceID", get(get_permissions::<S>));
    if assignments.users {
        routes = routes.route("/:resourceID/users/:userID", post(set_user_permission::<S>));
    }
    if assignments.teams {
        routes = routes.route("/:resourceID/teams/:teamID", post(set_team_permission::<S>));
    }
    if assignments.built_in_roles {
        routes = routes.route("/:resourceID/builtInRoles/:builtInRole", post(set_built_in_role_permission::<S>));
    }
    Router::new().nest(&base, routes.with_state(ApiState { service, auth }))
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_description<S: PermissionStore + 'static>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
) -> ApiResult<Json<Description>> {
    let grants = state.auth.grants(&headers).ok_or_else(ApiError::unauthenticated)?;
    state.service.resolver().authorize_description(&grants)?;
    Ok(Json(state.service.description()))
}

async fn get_permissions<S: PermissionStore + 'static>(
    State(state): State<ApiState<S>>,
    Path(resource_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<PermissionEntry>>> {
    let grants = state.auth.grants(&headers).ok_or_else(ApiError::unauthenticated)?;
    let service = state.service.clone();
    let entries = blocking(move || {
        service.resolver().authorize(&grants, &resource_id, Access::Read)?;
        service.entries(&resource_id)
    })
    .await?;
    Ok(Json(entries))
}

async fn set_user_permission<S: PermissionStore + 'static>(
    State(state): State<ApiState<S>>,
    Path((resource_id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    set_permission(state, resource_id, headers, body, move || Subject::user(&user_id)).await
}

async fn set_team_permission<S: PermissionStore + 'static>(
    State(state): State<ApiState<S>>,
    Path((resource_id, team_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    set_permission(state, resource_id, headers, body, move || Subject::team(&team_id)).await
}

async fn set_built_in_role_permission<S: PermissionStore + 'static>(
    State(state): State<ApiState<S>>,
    Path((resource_id, role)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    set_permission(state, resource_id, headers, body, move || Subject::built_in_role(&role)).await
}

/// Authenticate, resolve + authorize write, parse subject and body, then set
async fn set_permission<S, P>(
    state: ApiState<S>,
    resource_id: String,
    headers: HeaderMap,
    body: Bytes,
    parse_subject: P,
) -> ApiResult<Json<MessageResponse>>
where
    S: PermissionStore + 'static,
    P: FnOnce() -> Result<Subject> + Send + 'static,
{
    let grants = state.auth.grants(&headers).ok_or_else(ApiError::unauthenticated)?;
    let service = state.service.clone();
    let level = blocking(move || {
        service.resolver().authorize(&grants, &resource_id, Access::Write)?;
        let subject = parse_subject()?;
        let cmd: SetPermissionCommand = serde_json::from_slice(&body)
            .map_err(|e| Error::validation(format!("bad request data: {}", e)))?;
        service.set_permission(&resource_id, &subject, &cmd.permission)?;
        Ok(cmd.permission)
    })
    .await?;
    Ok(Json(MessageResponse { message: status_message(&level).to_string() }))
}

/// Success message for a set call
pub fn status_message(level: &str) -> &'static str {
    if level.is_empty() {
        "Permission removed"
    } else {
        "Permission updated"
    }
}

/// Storage calls block; keep them off the async workers
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(ApiError::from)
}
