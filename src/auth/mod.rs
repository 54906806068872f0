pub mod identity;
pub mod jwt;
pub mod local;
pub mod remote;

pub use identity::{AuthError, IdentityProvider, PageParams, UserRecord};
pub use local::LocalIdentity;
pub use remote::RemoteIdentity;

use crate::config::AuthConfig;
use crate::error::AppError;
use std::sync::Arc;

/// Pick the provider the config describes: JWKS settings select the hosted
/// provider, otherwise the local HS256 one.
pub async fn build_identity(auth: &AuthConfig) -> Result<Arc<dyn IdentityProvider>, AppError> {
    if auth.uses_remote_provider() {
        let remote = RemoteIdentity::from_config(auth)
            .await
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(Arc::new(remote))
    } else {
        Ok(Arc::new(LocalIdentity::from_config(auth)?))
    }
}
