use super::identity::{AuthError, IdentityProvider, PageParams, UserRecord};
use super::jwt::JwtValidator;
use crate::config::AuthConfig;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RemoteEmail {
    id: String,
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email_addresses: Vec<RemoteEmail>,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    public_metadata: Value,
}

impl RemoteUser {
    fn into_record(self) -> UserRecord {
        let primary = self.primary_email_address_id.as_deref();
        let email = self
            .email_addresses
            .iter()
            .find(|e| Some(e.id.as_str()) == primary)
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.clone());
        let metadata = if self.public_metadata.is_null() {
            json!({})
        } else {
            self.public_metadata
        };
        UserRecord::new(self.id, email, metadata)
    }
}

/// Hosted identity provider: JWKS-verified session tokens and a REST user API
/// authorized with a backend secret key.
pub struct RemoteIdentity {
    validator: JwtValidator,
    http: reqwest::Client,
    api_url: Url,
    secret_key: String,
}

/// Append path segments to the API base. Each segment is percent-encoded, so
/// a subject id can never add or climb path levels.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, AuthError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AuthError::Provider(format!("{} cannot be used as a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// Dot segments are dropped while building the path, so they never name a user
fn user_endpoint(base: &Url, subject_id: &str, tail: &[&str]) -> Result<Url, AuthError> {
    if matches!(subject_id, "" | "." | "..") {
        return Err(AuthError::UserNotFound(subject_id.to_string()));
    }
    let mut segments = vec!["users", subject_id];
    segments.extend_from_slice(tail);
    endpoint(base, &segments)
}

impl RemoteIdentity {
    pub async fn from_config(auth: &AuthConfig) -> Result<Self, AuthError> {
        let missing = |field: &str| AuthError::Provider(format!("auth.{} is not configured", field));
        let jwks_url = auth.jwks_url.as_deref().ok_or_else(|| missing("jwks_url"))?;
        let issuer = auth.issuer.clone().ok_or_else(|| missing("issuer"))?;
        let api_url = auth.api_url.as_deref().ok_or_else(|| missing("api_url"))?;
        let api_url = Url::parse(api_url)
            .map_err(|e| AuthError::Provider(format!("auth.api_url is invalid: {}", e)))?;
        endpoint(&api_url, &[])?;
        let secret_key = auth.secret_key.clone().ok_or_else(|| missing("secret_key"))?;

        Ok(Self {
            validator: JwtValidator::new(jwks_url, issuer).await?,
            http: reqwest::Client::new(),
            api_url,
            secret_key,
        })
    }

    async fn read_user(
        &self,
        subject_id: &str,
        response: reqwest::Response,
    ) -> Result<UserRecord, AuthError> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(AuthError::UserNotFound(subject_id.to_string())),
            status if status.is_success() => response
                .json::<RemoteUser>()
                .await
                .map(RemoteUser::into_record)
                .map_err(|e| AuthError::Provider(format!("invalid user payload: {}", e))),
            status => Err(AuthError::Provider(format!(
                "user API returned {} for {}",
                status, subject_id
            ))),
        }
    }
}

fn provider_error(e: reqwest::Error) -> AuthError {
    AuthError::Provider(e.to_string())
}

#[async_trait]
impl IdentityProvider for RemoteIdentity {
    async fn verify_token(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.validator.validate_token(token).await.map_err(|e| {
            debug!("JWT validation failed: {:?}", e);
            AuthError::InvalidToken(format!("{:?}", e))
        })?;
        Ok(claims.sub)
    }

    async fn get_user(&self, subject_id: &str) -> Result<UserRecord, AuthError> {
        let response = self
            .http
            .get(user_endpoint(&self.api_url, subject_id, &[])?)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(provider_error)?;
        self.read_user(subject_id, response).await
    }

    async fn list_users(&self, page: PageParams) -> Result<Vec<UserRecord>, AuthError> {
        let response = self
            .http
            .get(endpoint(&self.api_url, &["users"])?)
            .query(&[("limit", page.limit()), ("offset", page.offset())])
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(provider_error)?;
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "user list returned {}",
                response.status()
            )));
        }
        let users: Vec<RemoteUser> = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid user list: {}", e)))?;
        Ok(users.into_iter().map(RemoteUser::into_record).collect())
    }

    async fn update_user_metadata(
        &self,
        subject_id: &str,
        metadata: Value,
    ) -> Result<UserRecord, AuthError> {
        let response = self
            .http
            .patch(user_endpoint(&self.api_url, subject_id, &["metadata"])?)
            .bearer_auth(&self.secret_key)
            .json(&json!({ "public_metadata": metadata }))
            .send()
            .await
            .map_err(provider_error)?;
        self.read_user(subject_id, response).await
    }
}
