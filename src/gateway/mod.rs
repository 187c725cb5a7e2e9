//! Axum-based HTTP gateway over the account directory and item catalog.
//!
//! - Request body size limits (64KB max)
//! - Request timeouts (30s)
//! - Bearer-token gate on mutating routes, applied as a route layer
//! - Core calls that hash passwords or touch collection files run on the
//!   blocking pool

pub mod validation;

use crate::auth::gate::require_subject;
use crate::auth::{
    AccessGate, AccountDirectory, AccountPatch, AuthenticatedSubject, PasswordCodec, Role,
    TokenIssuer,
};
use crate::config::Config;
use crate::error::ServiceError;
use crate::items::catalog::{DEFAULT_PAGE_LIMIT, ItemCatalog};
use crate::store::{CollectionStore, IdSequence, LockRegistry};
use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::Json,
    routing::{get, post, MethodRouter},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use validation::{body_rejected, int_or, item_id, validate_credentials, CredentialsBody};

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Usernames whose `/api/users/<name>` path is also a fixed route. Static
/// segments win over `{username}`, so these get their own PUT/DELETE.
const FIXED_USER_PATHS: [&str; 4] = ["admin", "install", "login", "register"];

/// Concrete return type for handlers (avoids `impl IntoResponse` inference issues).
type ApiResponse = (StatusCode, Json<Value>);

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountDirectory,
    pub items: ItemCatalog,
    pub issuer: Arc<TokenIssuer>,
    pub gate: AccessGate,
    /// Require an admin token for `POST /api/users/admin`.
    pub guard_admin_creation: bool,
}

impl AppState {
    pub fn new(
        accounts: AccountDirectory,
        items: ItemCatalog,
        issuer: Arc<TokenIssuer>,
        guard_admin_creation: bool,
    ) -> Self {
        Self {
            accounts,
            items,
            gate: AccessGate::new(issuer.clone()),
            issuer,
            guard_admin_creation,
        }
    }

    /// File-backed state from configuration. Fails if no signing key is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key = config.signing_key()?;
        let issuer = Arc::new(TokenIssuer::with_ttl(&key, config.auth.token_ttl_secs));
        let locks = Arc::new(LockRegistry::new(config.lock_wait()));

        let accounts = AccountDirectory::new(
            CollectionStore::json_file(config.users_path(), locks.clone()),
            PasswordCodec::new(),
        );
        let items_path = config.items_path();
        let items = ItemCatalog::new(
            CollectionStore::json_file(&items_path, locks),
            IdSequence::beside(&items_path),
        );

        Ok(Self::new(
            accounts,
            items,
            issuer,
            config.auth.guard_admin_creation,
        ))
    }
}

/// All routes with middleware attached.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let open = Router::new()
        .route("/health", get(handle_health))
        .route("/api/users/register", post(handle_register))
        .route("/api/users/login", post(handle_login))
        .route("/api/users/admin", post(handle_create_admin))
        .route("/api/users/install", get(handle_install))
        .route("/api/items", get(handle_items_list));

    let mut gated = Router::new()
        .route("/api/users", get(handle_users_list))
        .route(
            "/api/users/{username}",
            axum::routing::put(handle_user_update).delete(handle_user_delete),
        )
        .route("/api/items", post(handle_item_create))
        .route(
            "/api/items/{id}",
            axum::routing::put(handle_item_update).delete(handle_item_delete),
        );
    for name in FIXED_USER_PATHS {
        gated = gated.route(&format!("/api/users/{name}"), fixed_user_route(name));
    }
    let gated = gated.route_layer(middleware::from_fn_with_state(
        state.gate.clone(),
        require_subject,
    ));

    open.merge(gated)
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Run the HTTP gateway until Ctrl+C.
pub async fn run_gateway(host: &str, port: u16, config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_port = listener.local_addr()?.port();

    tracing::info!(
        addr = %format!("{host}:{actual_port}"),
        users = %config.users_path().display(),
        items = %config.items_path().display(),
        guard_admin_creation = state.guard_admin_creation,
        "Gateway listening"
    );
    println!("recordkeep listening on http://{host}:{actual_port}");
    println!("  POST /api/users/register   — create an account");
    println!("  POST /api/users/login      — exchange credentials for a token");
    println!("  GET  /api/users/install    — create the default administrator");
    println!("  GET  /api/items            — list items (?page=&limit=)");
    println!("  Press Ctrl+C to stop.\n");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Run a core call on the blocking pool.
async fn blocking<R, F>(f: F) -> Result<R, ServiceError>
where
    F: FnOnce() -> Result<R, ServiceError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

fn respond(status: StatusCode, body: Value) -> ApiResponse {
    (status, Json(body))
}

/// GET /health — always public
async fn handle_health() -> ApiResponse {
    respond(StatusCode::OK, json!({"status": "ok"}))
}

// ══════════════════════════════════════════════════════════════════════════════
// ACCOUNT HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
struct LoginBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// POST /api/users/register — create a `user` account.
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<ApiResponse, ServiceError> {
    let Json(body) = body.map_err(|e| body_rejected(&e))?;
    let creds = validate_credentials(body)?;

    let accounts = state.accounts.clone();
    let account = blocking(move || {
        accounts.create_account(&creds.username, &creds.password, Role::User)
    })
    .await?;

    Ok(respond(
        StatusCode::CREATED,
        json!({"message": "User registered", "user": account}),
    ))
}

/// POST /api/users/login — exchange credentials for a bearer token.
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<ApiResponse, ServiceError> {
    let Json(body) = body.map_err(|e| body_rejected(&e))?;

    let accounts = state.accounts.clone();
    let username = blocking(move || accounts.authenticate(&body.username, &body.password)).await?;
    let token = state.issuer.issue(&username)?;

    tracing::info!(username = %username, "Token issued");
    Ok(respond(StatusCode::OK, json!({"token": token})))
}

/// GET /api/users — every account, hashes included.
async fn handle_users_list(State(state): State<AppState>) -> Result<ApiResponse, ServiceError> {
    let accounts = state.accounts.clone();
    let list = blocking(move || Ok(accounts.list_accounts())).await?;
    Ok(respond(StatusCode::OK, json!(list)))
}

/// PUT and DELETE for an account whose name collides with a fixed route.
fn fixed_user_route(username: &'static str) -> MethodRouter<AppState> {
    axum::routing::put(
        move |state: State<AppState>,
              subject: Extension<AuthenticatedSubject>,
              body: Result<Json<AccountPatch>, JsonRejection>| {
            update_user(state, subject, username.to_owned(), body)
        },
    )
    .delete(move |state: State<AppState>| delete_user(state, username.to_owned()))
}

/// PUT /api/users/{username} — merge the given fields.
async fn handle_user_update(
    state: State<AppState>,
    subject: Extension<AuthenticatedSubject>,
    Path(username): Path<String>,
    body: Result<Json<AccountPatch>, JsonRejection>,
) -> Result<ApiResponse, ServiceError> {
    update_user(state, subject, username, body).await
}

/// DELETE /api/users/{username}
async fn handle_user_delete(
    state: State<AppState>,
    Path(username): Path<String>,
) -> Result<ApiResponse, ServiceError> {
    delete_user(state, username).await
}

/// With `guard_admin_creation` on, only an administrator may change roles.
async fn update_user(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    username: String,
    body: Result<Json<AccountPatch>, JsonRejection>,
) -> Result<ApiResponse, ServiceError> {
    let Json(patch) = body.map_err(|e| body_rejected(&e))?;

    let accounts = state.accounts.clone();
    let guard_roles = state.guard_admin_creation;
    let account = blocking(move || {
        if guard_roles && patch.role.is_some() && !accounts.is_admin(&subject.username) {
            tracing::warn!(
                caller = %subject.username,
                account = %username,
                "Role change refused: caller is not an administrator"
            );
            return Err(ServiceError::Forbidden(
                "administrator role required".into(),
            ));
        }
        accounts.update_account(&username, patch)
    })
    .await?;

    Ok(respond(
        StatusCode::OK,
        json!({"message": "User updated", "user": account}),
    ))
}

async fn delete_user(
    State(state): State<AppState>,
    username: String,
) -> Result<ApiResponse, ServiceError> {
    let accounts = state.accounts.clone();
    let removed = blocking(move || accounts.delete_account(&username)).await?;

    Ok(respond(
        StatusCode::OK,
        json!({"message": format!("User {} deleted", removed.username)}),
    ))
}

/// POST /api/users/admin — create an `admin` account.
///
/// Open unless `guard_admin_creation` is set, in which case the caller must
/// present a token belonging to an existing administrator.
async fn handle_create_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<ApiResponse, ServiceError> {
    if state.guard_admin_creation {
        let subject = state.gate.admit(&headers)?;
        let accounts = state.accounts.clone();
        let username = subject.username.clone();
        if !blocking(move || Ok(accounts.is_admin(&username))).await? {
            tracing::warn!(username = %subject.username, "Admin creation refused: caller is not an administrator");
            return Err(ServiceError::Forbidden(
                "administrator role required".into(),
            ));
        }
    }

    let Json(body) = body.map_err(|e| body_rejected(&e))?;
    let creds = validate_credentials(body)?;

    let accounts = state.accounts.clone();
    let account = blocking(move || {
        accounts.create_account(&creds.username, &creds.password, Role::Admin)
    })
    .await?;

    Ok(respond(
        StatusCode::CREATED,
        json!({"message": "Administrator created", "user": account}),
    ))
}

/// GET /api/users/install — bootstrap the default administrator.
async fn handle_install(State(state): State<AppState>) -> Result<ApiResponse, ServiceError> {
    let accounts = state.accounts.clone();
    let admin = blocking(move || accounts.install_default_admin()).await?;

    Ok(respond(
        StatusCode::CREATED,
        json!({"message": "Default administrator created", "user": admin}),
    ))
}

// ══════════════════════════════════════════════════════════════════════════════
// ITEM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
struct ItemBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Raw query values; non-numeric input falls back to the defaults.
#[derive(Debug, Default, Deserialize)]
struct ItemListQuery {
    page: Option<String>,
    limit: Option<String>,
}

/// POST /api/items
async fn handle_item_create(
    State(state): State<AppState>,
    body: Result<Json<ItemBody>, JsonRejection>,
) -> Result<ApiResponse, ServiceError> {
    let Json(body) = body.map_err(|e| body_rejected(&e))?;
    let name = body.name.unwrap_or_default();
    let description = body.description.unwrap_or_default();

    let items = state.items.clone();
    let item = blocking(move || items.create_item(&name, &description)).await?;

    Ok(respond(
        StatusCode::CREATED,
        json!({"message": "Item created", "item": item}),
    ))
}

/// GET /api/items?page=&limit= — public, paginated.
async fn handle_items_list(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> Result<ApiResponse, ServiceError> {
    let page = int_or(query.page.as_deref(), 1);
    let limit = int_or(query.limit.as_deref(), DEFAULT_PAGE_LIMIT);

    let items = state.items.clone();
    let listing = blocking(move || Ok(items.list_items(page, limit))).await?;
    Ok(respond(StatusCode::OK, json!(listing)))
}

/// PUT /api/items/{id} — replace name and description.
async fn handle_item_update(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Result<Json<ItemBody>, JsonRejection>,
) -> Result<ApiResponse, ServiceError> {
    let id = item_id(&raw_id)?;
    let Json(body) = body.map_err(|e| body_rejected(&e))?;
    let name = body.name.unwrap_or_default();
    let description = body.description.unwrap_or_default();

    let items = state.items.clone();
    let item = blocking(move || items.update_item(id, &name, &description)).await?;

    Ok(respond(
        StatusCode::OK,
        json!({"message": "Item updated", "item": item}),
    ))
}

/// DELETE /api/items/{id}
async fn handle_item_delete(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse, ServiceError> {
    let id = item_id(&raw_id)?;

    let items = state.items.clone();
    let removed = blocking(move || items.delete_item(id)).await?;

    Ok(respond(
        StatusCode::OK,
        json!({"message": format!("Item {} deleted", removed.id)}),
    ))
}
