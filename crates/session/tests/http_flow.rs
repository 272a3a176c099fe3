use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use shopfront_auth::{Credential, Role};
use shopfront_session::{
    AccessDecision, AppState, AuthState, ClientConfig, LoginOutcome, SessionError, StorageLocation,
};

const PASSWORD: &str = "correct horse";
const MFA_CODE: &str = "123456";

// ─────────────────────────────────────────────────────────────────────────────
// Fake backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct CodeBody {
    code: String,
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn issued(token: &str, mfa_required: bool) -> Response {
    let flag = if mfa_required { "true" } else { "false" };
    (
        [("x-mfa-required", flag)],
        Json(json!({ "access_token": token, "token_type": "bearer" })),
    )
        .into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn login(Json(body): Json<LoginBody>) -> Response {
    match (body.email.as_str(), body.password.as_str()) {
        ("plain@example.com", PASSWORD) => issued("full-plain", false),
        ("mfa@example.com", PASSWORD) => issued("temp-mfa", true),
        _ => detail(StatusCode::BAD_REQUEST, "User email or password is invalid"),
    }
}

async fn login_auth(headers: HeaderMap, Json(body): Json<CodeBody>) -> Response {
    if bearer(&headers) != Some("temp-mfa") {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    if body.code != MFA_CODE {
        return detail(StatusCode::FORBIDDEN, "Invalid authorization code.");
    }
    issued("full-mfa", false)
}

async fn users_me(headers: HeaderMap) -> Response {
    let (email, role, mfa_enabled) = match bearer(&headers) {
        Some("full-plain") => ("plain@example.com", "user", false),
        Some("full-mfa") => ("mfa@example.com", "admin", true),
        _ => return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
    };

    Json(json!({
        "email": email,
        "first_name": "Test",
        "last_name": null,
        "username": null,
        "role": role,
        "ukey": "TEST00000001",
        "mfa_enabled": mfa_enabled,
    }))
    .into_response()
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let app = Router::new()
            .route("/api/v1/login", post(login))
            .route("/api/v1/login/auth", post(login_auth))
            .route("/api/v1/users/me", get(users_me));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api/v1", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn config(&self, storage: StorageLocation) -> ClientConfig {
        ClientConfig {
            api_base_url: self.base_url.clone(),
            storage,
            ..ClientConfig::default()
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flows
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn password_only_account_signs_in() {
    let srv = TestServer::spawn().await;
    let state = AppState::new(srv.config(StorageLocation::Memory)).await.unwrap();

    let outcome = state.machine.login("plain@example.com", PASSWORD).await.unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::Authenticated {
            redirect_to: "/cabinet".to_string()
        }
    );

    let identity = state.store.identity().await.expect("identity cached after sign-in");
    assert_eq!(identity.role, "user");
    assert!(state.gate.guard("/cabinet", Role::User).await.is_allowed());
    assert!(!state.gate.guard("/moderation", Role::SupportModerator).await.is_allowed());
}

#[tokio::test]
async fn second_factor_account_signs_in_after_code() {
    let srv = TestServer::spawn().await;
    let state = AppState::new(srv.config(StorageLocation::Memory)).await.unwrap();

    let outcome = state.machine.login("mfa@example.com", PASSWORD).await.unwrap();
    assert_eq!(outcome, LoginOutcome::MfaRequired);
    assert_eq!(state.store.credential().await, None);

    let err = state.machine.submit_mfa_code("654321").await.unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidMfaCode {
            reason: "Invalid authorization code.".to_string(),
            attempts_remaining: 4,
        }
    );
    assert_eq!(state.machine.state().await, AuthState::MfaPending);

    state.machine.submit_mfa_code(MFA_CODE).await.unwrap();
    assert_eq!(state.machine.state().await, AuthState::Authenticated);
    assert_eq!(state.store.credential().await, Some(Credential::full("full-mfa")));
    assert!(state.gate.guard("/admin", Role::Admin).await.is_allowed());
}

#[tokio::test]
async fn wrong_password_surfaces_server_message() {
    let srv = TestServer::spawn().await;
    let state = AppState::new(srv.config(StorageLocation::Memory)).await.unwrap();

    let err = state.machine.login("plain@example.com", "nope").await.unwrap_err();
    assert_eq!(err.to_string(), "User email or password is invalid");
    assert_eq!(state.machine.state().await, AuthState::Anonymous);
}

#[tokio::test]
async fn denied_destination_is_resumed_after_sign_in() {
    let srv = TestServer::spawn().await;
    let state = AppState::new(srv.config(StorageLocation::Memory)).await.unwrap();

    assert_eq!(
        state.gate.guard("/cabinet/orders", Role::User).await,
        AccessDecision::Deny {
            redirect_to: "/login".to_string()
        }
    );

    let outcome = state.machine.login("plain@example.com", PASSWORD).await.unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::Authenticated {
            redirect_to: "/cabinet/orders".to_string()
        }
    );
    assert_eq!(state.store.pending_destination().await, None);
}

#[tokio::test]
async fn revoked_credential_expires_session() {
    let srv = TestServer::spawn().await;
    let state = AppState::new(srv.config(StorageLocation::Memory)).await.unwrap();
    state.store.set_credential(Credential::full("revoked")).await.unwrap();

    let err = state.machine.validate_session().await.unwrap_err();
    assert_eq!(
        err,
        SessionError::SessionExpired("Could not validate credentials".to_string())
    );
    assert_eq!(state.store.credential().await, None);
    assert!(!state.gate.guard("/cabinet", Role::PartiallyLoggedIn).await.is_allowed());
}

#[tokio::test]
async fn repeated_logout_leaves_every_role_denied() {
    let srv = TestServer::spawn().await;
    let state = AppState::new(srv.config(StorageLocation::Memory)).await.unwrap();
    state.machine.login("plain@example.com", PASSWORD).await.unwrap();
    assert!(state.gate.guard("/cabinet", Role::User).await.is_allowed());

    state.machine.logout().await.unwrap();
    state.machine.logout().await.unwrap();

    assert_eq!(state.machine.state().await, AuthState::Anonymous);
    assert_eq!(state.store.credential().await, None);
    for role in Role::ALL {
        assert_eq!(
            state.gate.guard("/cabinet", role).await,
            AccessDecision::Deny {
                redirect_to: "/login".to_string()
            },
            "{role}"
        );
    }
}

#[tokio::test]
async fn session_survives_restart() {
    let srv = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let location = StorageLocation::Path(dir.path().join("session.db"));

    {
        let state = AppState::new(srv.config(location.clone())).await.unwrap();
        state.machine.login("plain@example.com", PASSWORD).await.unwrap();
    }

    let state = AppState::new(srv.config(location.clone())).await.unwrap();
    assert_eq!(state.machine.state().await, AuthState::Anonymous);

    let identity = state.machine.validate_session().await.unwrap().unwrap();
    assert_eq!(identity.email, "plain@example.com");
    assert_eq!(state.machine.state().await, AuthState::Authenticated);

    state.machine.logout().await.unwrap();
    let state = AppState::new(srv.config(location)).await.unwrap();
    assert_eq!(state.store.credential().await, None);
}

#[tokio::test]
async fn unreachable_backend_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig {
        api_base_url: format!("http://{}/api/v1", addr),
        storage: StorageLocation::Memory,
        ..ClientConfig::default()
    };
    let state = AppState::new(config).await.unwrap();

    let err = state.machine.login("plain@example.com", PASSWORD).await.unwrap_err();
    assert!(matches!(err, SessionError::TransientNetwork(_)), "{err:?}");
    assert_eq!(state.machine.state().await, AuthState::Anonymous);
}
