//! Authentication endpoints of the backend, as seen by the client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shopfront_auth::{Credential, Identity};

use crate::config::ClientConfig;

/// Response header the backend sets on `POST /login`.
pub const MFA_REQUIRED_HEADER: &str = "x-mfa-required";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Non-2xx answer. `reason` is the server's message, verbatim.
    #[error("request rejected ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("network error: {0}")]
    Network(String),

    /// 2xx answer with a body this client cannot use.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// `{access_token, token_type}` as issued by the login endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl core::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: TokenResponse,
    /// The token is MFA-only and a code must follow.
    pub mfa_required: bool,
}

/// The three calls the sign-in flow makes.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /login {email, password}`.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// `POST /login/auth {code}` with the temporary bearer token.
    async fn complete_mfa(&self, temporary: &Credential, code: &str) -> Result<TokenResponse, ApiError>;

    /// `GET /users/me` with a full bearer token.
    async fn fetch_identity(&self, credential: &Credential) -> Result<Identity, ApiError>;
}

/// [`AuthApi`] over HTTPS/JSON.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct MfaBody<'a> {
    code: &'a str,
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.url("/login");
        let resp = self
            .client
            .post(&url)
            .json(&LoginBody { email, password })
            .send()
            .await
            .map_err(network_error)?;

        let resp = ensure_success(resp).await?;

        let mfa_required = resp
            .headers()
            .get(MFA_REQUIRED_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));

        let token = decode_token(resp).await?;
        Ok(LoginResponse { token, mfa_required })
    }

    async fn complete_mfa(&self, temporary: &Credential, code: &str) -> Result<TokenResponse, ApiError> {
        let url = self.url("/login/auth");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(temporary.token())
            .json(&MfaBody { code })
            .send()
            .await
            .map_err(network_error)?;

        let resp = ensure_success(resp).await?;
        decode_token(resp).await
    }

    async fn fetch_identity(&self, credential: &Credential) -> Result<Identity, ApiError> {
        let url = self.url("/users/me");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(network_error)?;

        let resp = ensure_success(resp).await?;
        resp.json::<Identity>()
            .await
            .map_err(|e| ApiError::Decode(format!("identity payload: {e}")))
    }
}

fn network_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        tracing::warn!("auth request timed out");
        ApiError::Network("request timed out".to_string())
    } else {
        tracing::warn!("auth request failed: {err}");
        ApiError::Network(err.to_string())
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Rejected {
        status: status.as_u16(),
        reason: rejection_reason(status, &body),
    })
}

async fn decode_token(resp: reqwest::Response) -> Result<TokenResponse, ApiError> {
    let token: TokenResponse = resp
        .json()
        .await
        .map_err(|e| ApiError::Decode(format!("token payload: {e}")))?;

    if token.access_token.trim().is_empty() {
        return Err(ApiError::Decode("empty access_token".to_string()));
    }
    Ok(token)
}

/// Pull the human-readable reason out of an error body.
///
/// The backend answers `{"detail": "..."}`; some proxies answer
/// `{"message": "..."}`. Anything else falls back to the status text.
fn rejection_reason(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "message"]
                .into_iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
        });

    from_json.unwrap_or_else(|| {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
    })
}
