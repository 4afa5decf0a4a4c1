//!
//! imobi HTTP server
//! -----------------
//! Axum-based HTTP API in front of the authorization core.
//!
//! Responsibilities:
//! - Session management with a simple cookie + CSRF token model.
//! - Login/logout endpoints backed by the `identity` module.
//! - Permission and access-scoping check endpoints delegating to `authz`.
//! - User, role and hierarchy administration endpoints (admin-gated).
//!
//! Every access decision is routed through the four-operation `authz` surface;
//! no handler reads the role or relationship tables directly.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use getrandom::getrandom;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::authz::{self, Action, Resource, Role, RuleEvaluator, StoredRuleEvaluator};
use crate::error::AppError;
use crate::identity::{AuthProvider, DirectoryAuthProvider, LoginRequest, SessionManager};
use crate::store::SharedDirectory;

const SESSION_COOKIE: &str = "imobi_session";

/// Shared server state injected into all handlers.
///
/// Holds the directory handle, the session manager, the rule evaluator used by
/// every permission check, and the per-session CSRF tokens.
#[derive(Clone)]
pub struct AppState {
    pub dir: SharedDirectory,
    pub sessions: std::sync::Arc<SessionManager>,
    pub provider: std::sync::Arc<dyn AuthProvider>,
    pub evaluator: std::sync::Arc<dyn RuleEvaluator>,
    /// Session token -> CSRF token mapping
    pub csrf_tokens: std::sync::Arc<RwLock<HashMap<String, String>>>,
}

fn log_startup_folders(data_root: &str) {
    let cwd = std::env::current_dir().ok();
    let exe = std::env::current_exe().ok();
    let root_exists = std::path::Path::new(data_root).exists();
    info!(
        target: "startup",
        "imobi starting. cwd={:?}, exe={:?}, data_root='{}', data_root_exists={}",
        cwd, exe, data_root, root_exists
    );
}

/// Start the imobi HTTP server bound to the given port over the given data root.
pub async fn run_with_port(http_port: u16, data_root: &str) -> anyhow::Result<()> {
    log_startup_folders(data_root);

    let dir = SharedDirectory::new(data_root)?;
    let sessions = std::sync::Arc::new(SessionManager::default());
    let provider = std::sync::Arc::new(DirectoryAuthProvider::new(
        dir.clone(),
        SessionManager::default(),
    ));

    let app_state = AppState {
        dir,
        sessions,
        provider,
        evaluator: std::sync::Arc::new(StoredRuleEvaluator),
        csrf_tokens: std::sync::Arc::new(RwLock::new(HashMap::new())),
    };

    let app = router(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point reading `IMOBI_HTTP_PORT` and `IMOBI_DATA_FOLDER`.
pub async fn run() -> anyhow::Result<()> {
    let http_port: u16 = std::env::var("IMOBI_HTTP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(7878);
    let data_root = std::env::var("IMOBI_DATA_FOLDER").unwrap_or_else(|_| "data".to_string());
    run_with_port(http_port, &data_root).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "imobi ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/authz/permission", get(authz_permission))
        .route("/authz/access/{target_id}", get(authz_access))
        .route("/users/{user_id}/manager", get(user_manager))
        .route("/admin/users", post(admin_create_user))
        .route("/admin/roles/assign", post(admin_assign_role))
        .route("/admin/roles/remove", post(admin_remove_role))
        .route("/admin/managers/assign", post(admin_assign_manager))
        .route("/admin/managers/remove", post(admin_remove_manager))
        .route("/admin/managers/{manager_id}/subordinates", get(admin_subordinates))
        .with_state(state)
}

// ---- payloads ----

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct PermissionQuery {
    resource: String,
    action: String,
}

#[derive(Debug, Deserialize)]
struct CreateUserPayload {
    user_id: String,
    display_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    user_id: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct ManagerPayload {
    manager_id: String,
    subordinate_id: String,
}

// ---- session plumbing ----

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

fn current_user(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let token = session_token(headers)?;
    state.sessions.current_user(&token)
}

async fn validate_csrf(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(token) = session_token(headers) else { return false };
    let Some(provided) = headers.get("x-csrf-token").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let cmap = state.csrf_tokens.read().await;
    match cmap.get(&token) {
        Some(expected) => expected == provided,
        None => false,
    }
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // Secure, HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE, token
    ))
    .unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

fn hex_token(len: usize) -> anyhow::Result<String> {
    use std::fmt::Write as _;
    let mut bytes = vec![0u8; len];
    getrandom(&mut bytes).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let mut out = String::with_capacity(len * 2);
    for b in &bytes {
        let _ = write!(&mut out, "{:02x}", b);
    }
    Ok(out)
}

fn err_response(e: AppError) -> (StatusCode, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(serde_json::json!({"status":"error","code": e.code_str(), "error": e.message()})))
}

/// Gate for the /admin surface: authenticated caller whose permission check on
/// the `usuarios` resource passes (admins pass via the admin bypass).
fn require_user_admin(state: &AppState, headers: &HeaderMap, action: Action) -> Result<String, AppError> {
    let Some(user) = current_user(state, headers) else {
        return Err(AppError::auth("unauthenticated", "no active session"));
    };
    if !authz::has_permission(&state.dir, state.evaluator.as_ref(), &user, Resource::Usuarios, action) {
        return Err(AppError::forbidden("not_allowed", "user administration requires permission on usuarios"));
    }
    Ok(user)
}

// ---- handlers ----

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    let req = LoginRequest { username: payload.username, password: payload.password, ip: None };
    match state.provider.login(&req) {
        Ok(resp) => {
            let token = resp.session.token.clone();
            let csrf = match hex_token(32) {
                Ok(t) => t,
                Err(e) => {
                    error!("csrf token generation failed: {e}");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        HeaderMap::new(),
                        Json(serde_json::json!({"status":"error","error":"token generation failed"})),
                    );
                }
            };
            {
                let mut cmap = state.csrf_tokens.write().await;
                cmap.insert(token.clone(), csrf.clone());
            }
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&token));
            (
                StatusCode::OK,
                headers,
                Json(serde_json::json!({
                    "status": "ok",
                    "user_id": resp.session.principal.user_id,
                    "roles": resp.session.principal.roles,
                    "csrf": csrf,
                })),
            )
        }
        Err(e) if e.to_string() == "invalid_credentials" => (
            StatusCode::UNAUTHORIZED,
            HeaderMap::new(),
            Json(serde_json::json!({"status":"unauthorized"})),
        ),
        Err(e) => {
            error!("login error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                HeaderMap::new(),
                Json(serde_json::json!({"status":"error","error": e.to_string()})),
            )
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Require CSRF token
    if !validate_csrf(&state, &headers).await {
        return (
            StatusCode::FORBIDDEN,
            HeaderMap::new(),
            Json(serde_json::json!({"status":"forbidden","error":"invalid csrf"})),
        );
    }
    if let Some(token) = session_token(&headers) {
        state.sessions.logout(&token);
        let mut cmap = state.csrf_tokens.write().await;
        cmap.remove(&token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(serde_json::json!({"status":"ok"})))
}

/// Session-resolved permission check. Always answers 200 with an allow/deny
/// verdict (invalid vocabulary excepted); an absent session is a deny, not a
/// 401, matching the fail-closed contract of the resolver.
async fn authz_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<PermissionQuery>,
) -> impl IntoResponse {
    let resource: Resource = match q.resource.parse() {
        Ok(r) => r,
        Err(e) => return err_response(AppError::user("bad_resource".to_string(), e.to_string())),
    };
    let action: Action = match q.action.parse() {
        Ok(a) => a,
        Err(e) => return err_response(AppError::user("bad_action".to_string(), e.to_string())),
    };
    let token = session_token(&headers);
    let allowed = authz::has_permission_for_session(
        &state.dir,
        state.evaluator.as_ref(),
        &state.sessions,
        token.as_deref(),
        resource,
        action,
    );
    (StatusCode::OK, Json(serde_json::json!({"status":"ok","allowed": allowed})))
}

/// Session-resolved access-scoping check against a target user's data.
async fn authz_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target_id): Path<String>,
) -> impl IntoResponse {
    let allowed = match current_user(&state, &headers) {
        Some(actor) => authz::can_access_user_data(&state.dir, &actor, &target_id),
        None => false,
    };
    (StatusCode::OK, Json(serde_json::json!({"status":"ok","allowed": allowed})))
}

/// A user's manager, visible to callers who may access that user's data.
async fn user_manager(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let Some(actor) = current_user(&state, &headers) else {
        return err_response(AppError::auth("unauthenticated", "no active session"));
    };
    if !authz::can_access_user_data(&state.dir, &actor, &user_id) {
        return err_response(AppError::forbidden("not_allowed", "no access to this user's data"));
    }
    match authz::get_user_manager(&state.dir, &user_id) {
        Ok(manager) => (
            StatusCode::OK,
            Json(serde_json::json!({"status":"ok","manager": manager})),
        ),
        Err(e) => err_response(e),
    }
}

async fn admin_create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserPayload>,
) -> impl IntoResponse {
    if !validate_csrf(&state, &headers).await {
        return err_response(AppError::forbidden("invalid_csrf", "invalid csrf"));
    }
    if let Err(e) = require_user_admin(&state, &headers, Action::Create) {
        return err_response(e);
    }
    match authz::create_user(
        &state.dir,
        &payload.user_id,
        &payload.display_name,
        payload.email.as_deref(),
        payload.phone.as_deref(),
        &payload.password,
    ) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status":"ok"}))),
        Err(e) => err_response(e),
    }
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.parse::<Role>()
        .map_err(|e| AppError::user("bad_role".to_string(), e.to_string()))
}

async fn admin_assign_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RolePayload>,
) -> impl IntoResponse {
    if !validate_csrf(&state, &headers).await {
        return err_response(AppError::forbidden("invalid_csrf", "invalid csrf"));
    }
    if let Err(e) = require_user_admin(&state, &headers, Action::Update) {
        return err_response(e);
    }
    let role = match parse_role(&payload.role) {
        Ok(r) => r,
        Err(e) => return err_response(e),
    };
    match authz::assign_role(&state.dir, &payload.user_id, role) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status":"ok"}))),
        Err(e) => err_response(e),
    }
}

async fn admin_remove_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RolePayload>,
) -> impl IntoResponse {
    if !validate_csrf(&state, &headers).await {
        return err_response(AppError::forbidden("invalid_csrf", "invalid csrf"));
    }
    if let Err(e) = require_user_admin(&state, &headers, Action::Update) {
        return err_response(e);
    }
    let role = match parse_role(&payload.role) {
        Ok(r) => r,
        Err(e) => return err_response(e),
    };
    match authz::remove_role(&state.dir, &payload.user_id, role) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status":"ok"}))),
        Err(e) => err_response(e),
    }
}

async fn admin_assign_manager(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ManagerPayload>,
) -> impl IntoResponse {
    if !validate_csrf(&state, &headers).await {
        return err_response(AppError::forbidden("invalid_csrf", "invalid csrf"));
    }
    if let Err(e) = require_user_admin(&state, &headers, Action::Update) {
        return err_response(e);
    }
    match authz::assign_user_to_manager(&state.dir, &payload.manager_id, &payload.subordinate_id) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status":"ok"}))),
        Err(e) => err_response(e),
    }
}

async fn admin_remove_manager(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ManagerPayload>,
) -> impl IntoResponse {
    if !validate_csrf(&state, &headers).await {
        return err_response(AppError::forbidden("invalid_csrf", "invalid csrf"));
    }
    if let Err(e) = require_user_admin(&state, &headers, Action::Update) {
        return err_response(e);
    }
    match authz::remove_user_from_manager(&state.dir, &payload.manager_id, &payload.subordinate_id) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status":"ok"}))),
        Err(e) => err_response(e),
    }
}

async fn admin_subordinates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(manager_id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = require_user_admin(&state, &headers, Action::View) {
        return err_response(e);
    }
    match authz::get_manager_subordinates(&state.dir, &manager_id) {
        Ok(members) => (
            StatusCode::OK,
            Json(serde_json::json!({"status":"ok","subordinates": members})),
        ),
        Err(e) => err_response(e),
    }
}
