//! Sign-in and user administration against the backend's JSON API, plus
//! the persisted session.
use crate::error::{ApiError, StoreError};
use crate::store::{load_versioned, save_versioned};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;
pub const SESSION_FILE_NAME: &str = "sf-auth-v2.json";
const SESSION_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(deserialize_with = "utc_or_naive")]
    pub joined_at: DateTime<Utc>,
}

/// The backend may send timestamps without an offset; those are UTC.
fn utc_or_naive<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(d)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateInput {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub password: String,
    pub role: Role,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let req = self
            .http_client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { identifier, password });
        self.send(req).await
    }

    pub async fn me(&self, token: &str) -> Result<AuthUser, ApiError> {
        let req = self.http_client.get(self.url("/auth/me")).bearer_auth(token);
        self.send(req).await
    }

    pub async fn list_users(&self, token: &str) -> Result<Vec<AuthUser>, ApiError> {
        let req = self.http_client.get(self.url("/users")).bearer_auth(token);
        self.send(req).await
    }

    pub async fn create_user(&self, token: &str, input: &UserCreateInput) -> Result<AuthUser, ApiError> {
        let req = self
            .http_client
            .post(self.url("/users"))
            .bearer_auth(token)
            .json(input);
        self.send(req).await
    }

    pub async fn update_user(
        &self,
        token: &str,
        id: i64,
        patch: &UserUpdateInput,
    ) -> Result<AuthUser, ApiError> {
        let req = self
            .http_client
            .put(self.url(&format!("/users/{id}")))
            .bearer_auth(token)
            .json(patch);
        self.send(req).await
    }

    pub async fn delete_user(&self, token: &str, id: i64) -> Result<(), ApiError> {
        let req = self
            .http_client
            .delete(self.url(&format!("/users/{id}")))
            .bearer_auth(token);
        let _: serde_json::Value = self.send(req).await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let response = req.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "API call rejected");
            let body = if text.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                text
            };
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
    }

    fn map_send_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout.as_secs())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Signed-in state. Last writer wins on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStore {
    token: Option<String>,
    user: Option<AuthUser>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&mut self, response: LoginResponse) {
        tracing::info!(user = %response.user.username, "Signed in");
        self.token = Some(response.access_token);
        self.user = Some(response.user);
    }

    pub fn logout(&mut self) {
        self.token = None;
        self.user = None;
    }

    pub fn is_authed(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.user(), Some(u) if u.role == Role::Admin)
    }

    /// Token of the signed-in administrator.
    pub fn require_admin(&self) -> Result<&str, ApiError> {
        let token = self.token().ok_or(ApiError::Unauthenticated)?;
        if !self.is_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(token)
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        Ok(load_versioned(path, SESSION_SCHEMA_VERSION)?.unwrap_or_default())
    }

    /// Like [`SessionStore::load`], but an unreadable file means signed out.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|error| {
            tracing::warn!(path = %path.display(), %error, "Ignoring unreadable session");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        save_versioned(path, SESSION_SCHEMA_VERSION, self)
    }
}
