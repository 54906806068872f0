use super::identity::{merge_metadata, AuthError, IdentityProvider, PageParams, UserRecord};
use super::jwt::validate_token;
use crate::config::AuthConfig;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// HS256 tokens plus a user list from config. Metadata edits live in memory.
pub struct LocalIdentity {
    secret: String,
    users: RwLock<BTreeMap<String, UserRecord>>,
}

impl LocalIdentity {
    pub fn new(secret: impl Into<String>, users: Vec<UserRecord>) -> Self {
        Self {
            secret: secret.into(),
            users: RwLock::new(users.into_iter().map(|u| (u.id.clone(), u)).collect()),
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Result<Self, AppError> {
        let secret = auth
            .jwt_secret
            .clone()
            .ok_or_else(|| AppError::Config("auth.jwt_secret is required".into()))?;
        let users = auth
            .users
            .iter()
            .map(|u| {
                let metadata = match &u.role {
                    Some(role) => json!({ "role": role }),
                    None => json!({}),
                };
                UserRecord::new(u.id.clone(), u.email.clone(), metadata)
            })
            .collect();
        Ok(Self::new(secret, users))
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn verify_token(&self, token: &str) -> Result<String, AuthError> {
        validate_token(token, &self.secret).map(|claims| claims.sub)
    }

    async fn get_user(&self, subject_id: &str) -> Result<UserRecord, AuthError> {
        self.users
            .read()
            .await
            .get(subject_id)
            .cloned()
            .ok_or_else(|| AuthError::UserNotFound(subject_id.to_string()))
    }

    async fn list_users(&self, page: PageParams) -> Result<Vec<UserRecord>, AuthError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }

    async fn update_user_metadata(
        &self,
        subject_id: &str,
        metadata: Value,
    ) -> Result<UserRecord, AuthError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(subject_id)
            .ok_or_else(|| AuthError::UserNotFound(subject_id.to_string()))?;
        let mut merged = user.metadata.clone();
        merge_metadata(&mut merged, metadata);
        *user = UserRecord::new(user.id.clone(), user.email.clone(), merged);
        Ok(user.clone())
    }
}
