use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("forbidden")]
    Forbidden,
    #[error("identity provider error: {0}")]
    Provider(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// A user as resolved from the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub role: String,
    pub metadata: Value,
}

impl UserRecord {
    /// Build a record, reading the role from `metadata.role` (default `"user"`).
    pub fn new(id: impl Into<String>, email: Option<String>, metadata: Value) -> Self {
        let role = role_from_metadata(&metadata);
        Self {
            id: id.into(),
            email,
            role,
            metadata,
        }
    }
}

pub fn role_from_metadata(metadata: &Value) -> String {
    metadata
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or("user")
        .to_string()
}

/// Shallow-merge `patch` into `target`: keys set to `null` are removed,
/// others replace. A non-object on either side replaces wholesale.
pub fn merge_metadata(target: &mut Value, patch: Value) {
    match (target.as_object_mut(), patch) {
        (Some(current), Value::Object(changes)) => {
            for (key, value) in changes {
                if value.is_null() {
                    current.remove(&key);
                } else {
                    current.insert(key, value);
                }
            }
        }
        (_, patch) => *target = patch,
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageParams {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a bearer token and return its subject id.
    async fn verify_token(&self, token: &str) -> Result<String, AuthError>;

    async fn get_user(&self, subject_id: &str) -> Result<UserRecord, AuthError>;

    async fn list_users(&self, page: PageParams) -> Result<Vec<UserRecord>, AuthError>;

    async fn update_user_metadata(
        &self,
        subject_id: &str,
        metadata: Value,
    ) -> Result<UserRecord, AuthError>;
}
