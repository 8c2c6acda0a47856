//! Axum-based HTTP gateway.
//!
//! Open routes: `/register`, `/login`, `/api/dashboard`, `/health`.
//! Everything under `/settings` runs behind the auth gate, which either
//! short-circuits with 401/403 or hands the handler an [`AuthContext`].

pub mod error;
pub mod extract;

use crate::account::{AccountService, Registration};
use crate::auth::gate::{self, GateDecision};
use crate::auth::{
    AuthContext, NotificationsPatch, PasswordHasher, ProfilePatch, SqliteUserStore, TokenIssuer,
    User, UserView,
};
use crate::config::Config;
use crate::dashboard::DashboardStore;
use crate::uploads::{DiskStorage, FileStorage};
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Extension, Router,
};
use error::{ApiError, Operation};
use extract::JsonOrForm;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Multipart field carrying the profile picture.
const PROFILE_PICTURE_FIELD: &str = "profilePicture";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    /// Verifies bearer tokens for the auth gate.
    pub tokens: Arc<TokenIssuer>,
    pub uploads: Arc<dyn FileStorage>,
    pub dashboard: Arc<DashboardStore>,
}

impl AppState {
    /// Open stores and build services from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = &config.storage.database_path;
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }

        let users = SqliteUserStore::open(db_path)
            .with_context(|| format!("Failed to open user DB: {}", db_path.display()))?;
        tracing::info!(
            "User store ready at {} ({} users)",
            db_path.display(),
            users.user_count()?
        );

        if config.auth.token_ttl_secs.is_none() {
            tracing::warn!(
                "Bearer tokens never expire; set auth.token_ttl_secs to bound their lifetime"
            );
        }
        let tokens = Arc::new(TokenIssuer::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.token_ttl_secs,
        ));

        let accounts = Arc::new(AccountService::new(
            Arc::new(users),
            Arc::new(PasswordHasher::new()),
            Arc::clone(&tokens),
        ));

        let uploads = DiskStorage::new(&config.storage.upload_dir)?;
        tracing::info!("Uploads stored in {}", uploads.dir().display());

        Ok(Self {
            accounts,
            tokens,
            uploads: Arc::new(uploads),
            dashboard: Arc::new(DashboardStore::open(db_path)?),
        })
    }
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let listener =
        tokio::net::TcpListener::bind((config.gateway.host.as_str(), config.gateway.port))
            .await
            .with_context(|| {
                format!(
                    "Failed to bind {}:{}",
                    config.gateway.host, config.gateway.port
                )
            })?;

    let state = AppState::from_config(&config)?;
    let app = build_router(state, config.gateway.max_body_bytes);

    tracing::info!("Server running on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Assemble routes, the auth gate and the tower-http layers.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    // ── CORS: browser dashboards connect from any origin ──
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

    let protected = Router::new()
        .route("/settings", get(handle_get_settings))
        .route("/settings/profile", put(handle_update_profile))
        .route("/settings/notifications", put(handle_update_notifications))
        .route("/settings/theme", put(handle_update_theme))
        .route("/settings/password", put(handle_change_password))
        .route("/settings/deactivate", delete(handle_deactivate))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(handle_health))
        .route("/register", post(handle_register))
        .route("/login", post(handle_login))
        .route("/api/dashboard", get(handle_dashboard))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

// ══════════════════════════════════════════════════════════════════════════════
// AUTH GATE
// ══════════════════════════════════════════════════════════════════════════════

/// Verify the bearer token, then either continue with an [`AuthContext`]
/// extension or answer 401/403 without running the handler.
async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match gate::evaluate(request.headers(), &state.tokens) {
        GateDecision::Continue(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        GateDecision::ShortCircuit(rejection) => ApiError::from(rejection).into_response(),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Concrete return type for JSON handlers (avoids `impl IntoResponse` inference issues).
type ApiResponse = (StatusCode, Json<serde_json::Value>);

type ApiResult = std::result::Result<ApiResponse, ApiError>;

fn settings_updated(message: &str, user: &User) -> ApiResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": message,
            "settings": UserView::from(user),
        })),
    )
}

/// GET /health: always public
async fn handle_health() -> ApiResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// GET /api/dashboard: first cargo summary, or `null` before seeding.
async fn handle_dashboard(State(state): State<AppState>) -> ApiResponse {
    match state.dashboard.first() {
        Ok(summary) => (StatusCode::OK, Json(serde_json::json!(summary))),
        Err(e) => {
            tracing::error!("Dashboard read failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"message": "Error fetching data"})),
            )
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
}

/// POST /register: create an account. No token is issued.
async fn handle_register(
    State(state): State<AppState>,
    JsonOrForm(body): JsonOrForm<RegisterBody>,
) -> ApiResult {

    let user = state
        .accounts
        .register(Registration {
            name: body.name,
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(|e| ApiError::from_account(e, Operation::Register))?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "User created",
            "id": user.id,
        })),
    ))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LoginBody {
    email: String,
    password: String,
}

/// POST /login: check credentials and return a bearer token.
async fn handle_login(
    State(state): State<AppState>,
    JsonOrForm(body): JsonOrForm<LoginBody>,
) -> ApiResult {

    let token = state
        .accounts
        .login(&body.email, &body.password)
        .await
        .map_err(|e| ApiError::from_account(e, Operation::Login))?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "token": token }))))
}

/// GET /settings: the caller's own record, without the password hash.
async fn handle_get_settings(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult {
    let user = state
        .accounts
        .current_user(&ctx)
        .await
        .map_err(|e| ApiError::from_account(e, Operation::ReadSettings))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "settings": UserView::from(&user) })),
    ))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ProfileBody {
    name: Option<String>,
    email: Option<String>,
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

/// Read `name`, `email` and the optional `profilePicture` file from a form.
/// The file is stored only after the whole form parsed cleanly.
async fn read_profile_form(
    mut multipart: Multipart,
    uploads: &dyn FileStorage,
) -> std::result::Result<ProfilePatch, ApiError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiError::bad_request(format!("Invalid form data: {}", e.body_text()))
    };

    let mut patch = ProfilePatch::default();
    let mut picture = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "name" => patch.name = Some(field.text().await.map_err(bad_form)?),
            "email" => patch.email = Some(field.text().await.map_err(bad_form)?),
            PROFILE_PICTURE_FIELD => {
                let file_name = field.file_name().unwrap_or("upload").to_owned();
                let bytes = field.bytes().await.map_err(bad_form)?;
                // Browsers send an empty part when no file was chosen
                if !bytes.is_empty() {
                    picture = Some((file_name, bytes));
                }
            }
            _ => {}
        }
    }

    if let Some((file_name, bytes)) = picture {
        let reference = uploads.store(&file_name, &bytes).await.map_err(|e| {
            tracing::error!("Profile picture upload failed: {e:#}");
            ApiError::bad_request(Operation::Profile.failure_message())
        })?;
        patch.profile_picture = Some(reference);
    }
    Ok(patch)
}

/// PUT /settings/profile: JSON or urlencoded `{name?, email?}`, or multipart with `profilePicture`.
async fn handle_update_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    request: Request,
) -> ApiResult {
    let patch = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e.body_text())))?;
        read_profile_form(multipart, state.uploads.as_ref()).await?
    } else {
        let JsonOrForm(body) = JsonOrForm::<ProfileBody>::from_request(request, &state).await?;
        ProfilePatch {
            name: body.name,
            email: body.email,
            profile_picture: None,
        }
    };

    let uploaded = patch.profile_picture.clone();
    match state.accounts.update_profile(&ctx, patch).await {
        Ok(user) => Ok(settings_updated("Profile updated", &user)),
        Err(e) => {
            if let Some(reference) = uploaded {
                state.uploads.discard(&reference).await;
            }
            Err(ApiError::from_account(e, Operation::Profile))
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct NotificationsBody {
    email_notifications: Option<bool>,
    sms_notifications: Option<bool>,
}

/// PUT /settings/notifications: flip either switch independently.
async fn handle_update_notifications(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    JsonOrForm(body): JsonOrForm<NotificationsBody>,
) -> ApiResult {

    let user = state
        .accounts
        .update_notifications(
            &ctx,
            NotificationsPatch {
                email: body.email_notifications,
                sms: body.sms_notifications,
            },
        )
        .await
        .map_err(|e| ApiError::from_account(e, Operation::Notifications))?;

    Ok(settings_updated("Notification settings updated", &user))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ThemeBody {
    theme: Option<String>,
}

/// PUT /settings/theme: `light` or `dark`.
async fn handle_update_theme(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    JsonOrForm(body): JsonOrForm<ThemeBody>,
) -> ApiResult {

    let user = state
        .accounts
        .update_theme(&ctx, body.theme)
        .await
        .map_err(|e| ApiError::from_account(e, Operation::Theme))?;

    Ok(settings_updated("Theme preferences updated", &user))
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct PasswordBody {
    old_password: String,
    new_password: String,
}

/// PUT /settings/password: requires the current password.
async fn handle_change_password(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    JsonOrForm(body): JsonOrForm<PasswordBody>,
) -> ApiResult {

    state
        .accounts
        .change_password(&ctx, &body.old_password, &body.new_password)
        .await
        .map_err(|e| ApiError::from_account(e, Operation::Password))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Password updated"})),
    ))
}

/// DELETE /settings/deactivate: irreversible hard delete.
async fn handle_deactivate(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult {
    let removed = state
        .accounts
        .deactivate(&ctx)
        .await
        .map_err(|e| ApiError::from_account(e, Operation::Deactivate))?;

    if let Some(picture) = removed.and_then(|user| user.profile_picture) {
        state.uploads.discard(&picture).await;
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Account deactivated"})),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::CargoSummary;
    use axum::body::Body;
    use axum::http::{self, Method};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const TEST_SECRET: &[u8] = b"gateway-test-secret";

    struct TestApp {
        app: Router,
        state: AppState,
        upload_dir: std::path::PathBuf,
        _tmp: TempDir,
    }

    fn test_app() -> TestApp {
        let tmp = TempDir::new().unwrap();
        let upload_dir = tmp.path().join("uploads");
        let tokens = Arc::new(TokenIssuer::new(TEST_SECRET, None));
        let accounts = Arc::new(AccountService::new(
            Arc::new(SqliteUserStore::open_in_memory().unwrap()),
            Arc::new(PasswordHasher::for_tests()),
            Arc::clone(&tokens),
        ));
        let state = AppState {
            accounts,
            tokens,
            uploads: Arc::new(DiskStorage::new(&upload_dir).unwrap()),
            dashboard: Arc::new(DashboardStore::open_in_memory().unwrap()),
        };
        TestApp {
            app: build_router(state.clone(), 1024 * 1024),
            state,
            upload_dir,
            _tmp: tmp,
        }
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: &Value) -> Request {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn bare_request(method: Method, uri: &str, token: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn upload_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    /// Multipart `PUT /settings/profile` with text fields and an optional picture.
    fn profile_form_request(
        token: &str,
        fields: &[(&str, &str)],
        picture: Option<(&str, &[u8])>,
    ) -> Request {
        let boundary = "cargodesk-test-boundary";
        let mut payload = Vec::new();
        for (name, value) in fields {
            payload.extend_from_slice(
                format!(
                    "--{boundary}\r\n\
                     Content-Disposition: form-data; name=\"{name}\"\r\n\r\n\
                     {value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = picture {
            payload.extend_from_slice(
                format!(
                    "--{boundary}\r\n\
                     Content-Disposition: form-data; name=\"profilePicture\"; filename=\"{file_name}\"\r\n\
                     Content-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            payload.extend_from_slice(bytes);
            payload.extend_from_slice(b"\r\n");
        }
        payload.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        http::Request::builder()
            .method(Method::PUT)
            .uri("/settings/profile")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(payload))
            .unwrap()
    }

    fn form_request(method: Method, uri: &str, token: Option<&str>, body: &'static str) -> Request {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn send(app: &Router, request: Request) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn register(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
        send(
            app,
            json_request(
                Method::POST,
                "/register",
                None,
                &json!({"name": "Test User", "email": email, "password": password}),
            ),
        )
        .await
    }

    async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
        send(
            app,
            json_request(
                Method::POST,
                "/login",
                None,
                &json!({"email": email, "password": password}),
            ),
        )
        .await
    }

    async fn register_and_login(app: &Router, email: &str) -> String {
        let (status, _) = register(app, email, "original-pass").await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = login(app, email, "original-pass").await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[test]
    fn app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn multipart_detection_reads_content_type() {
        let mut headers = HeaderMap::new();
        assert!(!is_multipart(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            "multipart/form-data; boundary=x".parse().unwrap(),
        );
        assert!(is_multipart(&headers));
    }

    #[tokio::test]
    async fn health_is_public() {
        let t = test_app();
        let (status, body) = send(&t.app, bare_request(Method::GET, "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_then_login_returns_verifiable_token() {
        let t = test_app();

        let (status, body) = register(&t.app, "ada@example.com", "s3cret").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created");
        assert!(body.get("token").is_none());

        let (status, body) = login(&t.app, "ada@example.com", "s3cret").await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap();
        let claims = t.state.tokens.verify(token).unwrap();
        assert_eq!(claims.email, "ada@example.com");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let t = test_app();

        assert_eq!(
            register(&t.app, "dup@example.com", "first").await.0,
            StatusCode::CREATED
        );
        let (status, body) = register(&t.app, "dup@example.com", "second").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email is already registered");

        // Only the first registration's credentials work.
        assert_eq!(
            login(&t.app, "dup@example.com", "first").await.0,
            StatusCode::OK
        );
        assert_eq!(
            login(&t.app, "dup@example.com", "second").await.0,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn registration_with_missing_fields_is_a_validation_error() {
        let t = test_app();

        let (status, body) = send(
            &t.app,
            json_request(
                Method::POST,
                "/register",
                None,
                &json!({"email": "x@example.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Name, email and password are required");
    }

    #[tokio::test]
    async fn login_with_wrong_password_issues_no_token() {
        let t = test_app();
        register(&t.app, "bob@example.com", "right").await;

        let (status, body) = login(&t.app, "bob@example.com", "wrong").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid password");
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    async fn protected_route_without_header_is_access_denied() {
        let t = test_app();
        let (status, body) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/settings/theme",
                None,
                &json!({"theme": "dark"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Access denied");
    }

    #[tokio::test]
    async fn protected_route_with_garbage_token_is_invalid() {
        let t = test_app();
        let (status, body) = send(
            &t.app,
            bare_request(Method::GET, "/settings", Some("not-a-jwt")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid token");
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_invalid() {
        let t = test_app();
        let foreign = TokenIssuer::new(b"someone-elses-secret", None)
            .issue("whoever", "x@example.com")
            .unwrap();
        let (status, _) = send(
            &t.app,
            bare_request(Method::GET, "/settings", Some(&foreign)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn raw_token_without_bearer_prefix_is_accepted() {
        let t = test_app();
        let token = register_and_login(&t.app, "raw@example.com").await;

        let request = http::Request::builder()
            .method(Method::GET)
            .uri("/settings")
            .header(header::AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["email"], "raw@example.com");
    }

    #[tokio::test]
    async fn valid_token_is_scoped_to_its_user() {
        let t = test_app();
        let alice = register_and_login(&t.app, "alice@example.com").await;
        let bob = register_and_login(&t.app, "bob@example.com").await;

        let (status, _) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/settings/theme",
                Some(&alice),
                &json!({"theme": "dark"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&t.app, bare_request(Method::GET, "/settings", Some(&alice))).await;
        assert_eq!(body["settings"]["email"], "alice@example.com");
        assert_eq!(body["settings"]["theme"], "dark");
        assert!(body["settings"].get("passwordHash").is_none());

        let (_, body) = send(&t.app, bare_request(Method::GET, "/settings", Some(&bob))).await;
        assert_eq!(body["settings"]["email"], "bob@example.com");
        assert_eq!(body["settings"]["theme"], "light");
    }

    #[tokio::test]
    async fn sms_only_update_keeps_email_notifications() {
        let t = test_app();
        let token = register_and_login(&t.app, "notify@example.com").await;

        let (status, body) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/settings/notifications",
                Some(&token),
                &json!({"smsNotifications": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Notification settings updated");
        assert_eq!(body["settings"]["notifications"]["email"], true);
        assert_eq!(body["settings"]["notifications"]["sms"], false);
    }

    #[tokio::test]
    async fn unknown_theme_is_rejected_without_change() {
        let t = test_app();
        let token = register_and_login(&t.app, "theme@example.com").await;

        let (status, _) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/settings/theme",
                Some(&token),
                &json!({"theme": "purple"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&t.app, bare_request(Method::GET, "/settings", Some(&token))).await;
        assert_eq!(body["settings"]["theme"], "light");
    }

    #[tokio::test]
    async fn wrong_old_password_keeps_original_login() {
        let t = test_app();
        let token = register_and_login(&t.app, "pw@example.com").await;

        let (status, body) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/settings/password",
                Some(&token),
                &json!({"oldPassword": "nope", "newPassword": "next-pass"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid old password");

        assert_eq!(
            login(&t.app, "pw@example.com", "original-pass").await.0,
            StatusCode::OK
        );
        assert_eq!(
            login(&t.app, "pw@example.com", "next-pass").await.0,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn password_change_swaps_working_credentials() {
        let t = test_app();
        let token = register_and_login(&t.app, "swap@example.com").await;

        let (status, body) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/settings/password",
                Some(&token),
                &json!({"oldPassword": "original-pass", "newPassword": "next-pass"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Password updated");

        let (status, body) = login(&t.app, "swap@example.com", "original-pass").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid password");
        assert_eq!(
            login(&t.app, "swap@example.com", "next-pass").await.0,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn deactivation_makes_login_report_missing_user() {
        let t = test_app();
        let token = register_and_login(&t.app, "gone@example.com").await;

        let (status, body) = send(
            &t.app,
            bare_request(Method::DELETE, "/settings/deactivate", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Account deactivated");

        let (status, body) = login(&t.app, "gone@example.com", "original-pass").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User not found");

        // The token still verifies, but there is nothing left to update.
        let (status, body) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/settings/notifications",
                Some(&token),
                &json!({"emailNotifications": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Error updating notification settings");
    }

    #[tokio::test]
    async fn profile_json_update_changes_only_name() {
        let t = test_app();
        let token = register_and_login(&t.app, "prof@example.com").await;

        let (status, body) = send(
            &t.app,
            json_request(
                Method::PUT,
                "/settings/profile",
                Some(&token),
                &json!({"name": "New Name"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Profile updated");
        assert_eq!(body["settings"]["name"], "New Name");
        assert_eq!(body["settings"]["email"], "prof@example.com");
        assert!(body["settings"]["profilePicture"].is_null());
    }

    #[tokio::test]
    async fn profile_multipart_upload_records_picture_reference() {
        let t = test_app();
        let token = register_and_login(&t.app, "pic@example.com").await;

        let request = profile_form_request(
            &token,
            &[("name", "Pictured")],
            Some(("me.png", &b"\x89PNG-fake-bytes"[..])),
        );

        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["name"], "Pictured");

        let reference = body["settings"]["profilePicture"].as_str().unwrap();
        assert!(reference.ends_with("-me.png"));
        assert_eq!(std::fs::read(reference).unwrap(), b"\x89PNG-fake-bytes");
    }

    #[tokio::test]
    async fn bearer_scheme_without_token_is_access_denied() {
        let t = test_app();
        let request = http::Request::builder()
            .method(Method::GET)
            .uri("/settings")
            .header(header::AUTHORIZATION, "Bearer ")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Access denied");
    }

    #[tokio::test]
    async fn urlencoded_register_and_login_are_accepted() {
        let t = test_app();

        let (status, _) = send(
            &t.app,
            form_request(
                Method::POST,
                "/register",
                None,
                "name=Form%20User&email=form%40example.com&password=pw",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &t.app,
            form_request(
                Method::POST,
                "/login",
                None,
                "email=form%40example.com&password=pw",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let claims = t
            .state
            .tokens
            .verify(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.email, "form@example.com");
    }

    #[tokio::test]
    async fn urlencoded_settings_updates_are_accepted() {
        let t = test_app();
        let token = register_and_login(&t.app, "formset@example.com").await;

        let (status, body) = send(
            &t.app,
            form_request(
                Method::PUT,
                "/settings/profile",
                Some(&token),
                "name=Plain%20Form",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["name"], "Plain Form");

        let (status, body) = send(
            &t.app,
            form_request(
                Method::PUT,
                "/settings/notifications",
                Some(&token),
                "smsNotifications=false",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["notifications"]["email"], true);
        assert_eq!(body["settings"]["notifications"]["sms"], false);
    }

    #[tokio::test]
    async fn failed_profile_save_discards_new_upload() {
        let t = test_app();
        register_and_login(&t.app, "taken@example.com").await;
        let token = register_and_login(&t.app, "mover@example.com").await;

        let (status, body) = send(
            &t.app,
            profile_form_request(
                &token,
                &[("email", "taken@example.com")],
                Some(("me.png", &b"picture-bytes"[..])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Error updating profile");
        assert_eq!(upload_count(&t.upload_dir), 0);

        let (_, body) = send(&t.app, bare_request(Method::GET, "/settings", Some(&token))).await;
        assert_eq!(body["settings"]["email"], "mover@example.com");
        assert!(body["settings"]["profilePicture"].is_null());
    }

    #[tokio::test]
    async fn deactivation_removes_stored_picture() {
        let t = test_app();
        let token = register_and_login(&t.app, "leaver@example.com").await;

        let (status, _) = send(
            &t.app,
            profile_form_request(&token, &[], Some(("me.png", &b"picture-bytes"[..]))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(upload_count(&t.upload_dir), 1);

        let (status, _) = send(
            &t.app,
            bare_request(Method::DELETE, "/settings/deactivate", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(upload_count(&t.upload_dir), 0);

        // Repeating the call still succeeds with nothing left to remove.
        let (status, _) = send(
            &t.app,
            bare_request(Method::DELETE, "/settings/deactivate", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn dashboard_serves_first_summary() {
        let t = test_app();

        let (status, body) = send(&t.app, bare_request(Method::GET, "/api/dashboard", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());

        t.state.dashboard.insert(CargoSummary::SEED).unwrap();
        let (status, body) = send(&t.app, bare_request(Method::GET, "/api/dashboard", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"totalCargo": 120, "inTransit": 50, "delivered": 70})
        );
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let t = test_app();
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    }
}
