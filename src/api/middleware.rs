use crate::api::AppState;
use crate::auth::{AuthError, UserRecord};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

// Resolved caller, inserted into request extensions by `require_user`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserRecord);

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

fn reject(err: AuthError) -> StatusCode {
    match err {
        // A valid token for a user the provider no longer knows
        AuthError::UserNotFound(ref id) => {
            debug!("Token subject not found: {}", id);
            StatusCode::UNAUTHORIZED
        }
        AuthError::Provider(ref msg) => {
            warn!("Identity provider error: {}", msg);
            err.status_code()
        }
        _ => {
            debug!("Authentication failed: {}", err);
            err.status_code()
        }
    }
}

// Verifies the Bearer token and loads the user from the identity provider
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&request)
        .ok_or_else(|| reject(AuthError::MissingToken))?
        .to_string();

    let subject = state.identity.verify_token(&token).await.map_err(reject)?;
    let user = state.identity.get_user(&subject).await.map_err(reject)?;

    debug!("Authenticated: sub={} role={}", user.id, user.role);
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

// Must run inside `require_user`
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if user.0.role != state.admin_role {
        debug!("Forbidden: {} has role {}", user.0.id, user.0.role);
        return Err(reject(AuthError::Forbidden));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(header: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/v1/me");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        let request = request_with(Some("Bearer token123"));
        assert_eq!(bearer_token(&request), Some("token123"));
    }

    #[test]
    fn test_bearer_token_extraction_edge_cases() {
        assert_eq!(bearer_token(&request_with(None)), None);
        assert_eq!(bearer_token(&request_with(Some("token123"))), None);
        assert_eq!(bearer_token(&request_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&request_with(Some("bearer token123"))), None);
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(reject(AuthError::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            reject(AuthError::UserNotFound("user_1".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(reject(AuthError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            reject(AuthError::Provider("timeout".into())),
            StatusCode::BAD_GATEWAY
        );
    }
}
