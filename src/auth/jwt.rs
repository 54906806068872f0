use super::identity::AuthError;
use alcoholic_jwt::{validate, Validation as JwksValidation, ValidationError, JWKS};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration as StdDuration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Minimum spacing between JWKS refetches triggered by unknown key ids.
pub const JWKS_REFRESH_INTERVAL: StdDuration = StdDuration::from_secs(60);

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // provider user id
    pub exp: usize,            // expiration time
    pub iat: Option<usize>,    // issued at (optional)
    pub iss: Option<String>,   // issuer (for JWKS validation)
    pub email: Option<String>, // present on some provider templates
}

// Allows one refetch per interval, whatever the outcome of the fetch
#[derive(Debug)]
struct RefreshGate {
    last: Mutex<Option<Instant>>,
    min_interval: StdDuration,
}

impl RefreshGate {
    fn new(min_interval: StdDuration) -> Self {
        Self {
            last: Mutex::new(None),
            min_interval,
        }
    }

    fn try_acquire(&self) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    fn last_refresh(&self) -> Option<Instant> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// JWKS-based validator for RS256 session tokens from the hosted identity provider
#[derive(Clone)]
pub struct JwtValidator {
    jwks: Arc<RwLock<JWKS>>,
    jwks_url: String,
    issuer: String,
    refresh: Arc<RefreshGate>,
}

impl JwtValidator {
    pub async fn new(jwks_url: &str, issuer: String) -> Result<Self, AuthError> {
        let jwks = fetch_jwks(jwks_url).await?;
        Ok(Self::with_jwks(jwks, jwks_url, issuer, JWKS_REFRESH_INTERVAL))
    }

    pub fn with_jwks(
        jwks: JWKS,
        jwks_url: &str,
        issuer: String,
        min_refresh_interval: StdDuration,
    ) -> Self {
        Self {
            jwks: Arc::new(RwLock::new(jwks)),
            jwks_url: jwks_url.to_string(),
            issuer,
            refresh: Arc::new(RefreshGate::new(min_refresh_interval)),
        }
    }

    pub async fn validate_token(&self, token: &str) -> Result<Claims, ValidationError> {
        let kid = alcoholic_jwt::token_kid(token)
            .map_err(|_| ValidationError::InvalidSignature)?
            .ok_or(ValidationError::InvalidSignature)?;

        // Keys rotate; refetch when the kid is unknown, at most once per interval
        if self.jwks.read().await.find(&kid).is_none() {
            if self.refresh.try_acquire() {
                match fetch_jwks(&self.jwks_url).await {
                    Ok(fresh) => *self.jwks.write().await = fresh,
                    Err(e) => warn!(error = %e, "JWKS refresh failed"),
                }
            } else {
                debug!(kid = %kid, "unknown kid, JWKS refresh throttled");
            }
        }

        let jwks = self.jwks.read().await;
        let jwk = jwks.find(&kid).ok_or(ValidationError::InvalidSignature)?;
        let validations = vec![
            JwksValidation::Issuer(self.issuer.clone()),
            JwksValidation::SubjectPresent,
            JwksValidation::NotExpired,
        ];
        let valid_jwt = validate(token, jwk, validations)?;

        serde_json::from_value(valid_jwt.claims).map_err(|_| ValidationError::InvalidSignature)
    }
}

async fn fetch_jwks(url: &str) -> Result<JWKS, AuthError> {
    let res = reqwest::get(url)
        .await
        .map_err(|e| AuthError::Provider(format!("failed to fetch JWKS: {}", e)))?;
    res.json::<JWKS>()
        .await
        .map_err(|e| AuthError::Provider(format!("invalid JWKS document: {}", e)))
}

/// Sign an HS256 token for a local user. Backs the `token` subcommand.
pub fn create_token(subject: &str, secret: &str, ttl: Duration) -> Result<String, AuthError> {
    if ttl <= Duration::zero() {
        return Err(AuthError::InvalidToken("token lifetime must be positive".into()));
    }
    let now = Utc::now();
    let exp = now
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::InvalidToken("token lifetime out of range".into()))?;

    let claims = Claims {
        sub: subject.to_string(),
        exp: exp.timestamp() as usize,
        iat: Some(now.timestamp() as usize),
        iss: None,
        email: None,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Provider(format!("failed to sign token: {}", e)))
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "local-dev-secret";

    fn sign(claims: &Claims, header: &Header) -> String {
        encode(header, claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn test_issued_token_carries_subject_and_lifetime() {
        let token = create_token("user_ops", SECRET, Duration::hours(8)).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "user_ops");
        let lifetime = claims.exp - claims.iat.unwrap();
        assert_eq!(lifetime, 8 * 3600);
    }

    #[test]
    fn test_non_positive_lifetime_is_refused() {
        assert!(create_token("user_ops", SECRET, Duration::zero()).is_err());
        assert!(create_token("user_ops", SECRET, Duration::minutes(-5)).is_err());
    }

    #[test]
    fn test_foreign_and_stale_tokens_are_invalid() {
        let token = create_token("user_ops", "someone-else", Duration::hours(1)).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET),
            Err(AuthError::InvalidToken(_))
        ));

        // Past the default 60s leeway
        let now = Utc::now();
        let stale = Claims {
            sub: "user_ops".into(),
            exp: (now - Duration::minutes(10)).timestamp() as usize,
            iat: Some((now - Duration::hours(1)).timestamp() as usize),
            iss: None,
            email: None,
        };
        assert!(validate_token(&sign(&stale, &Header::default()), SECRET).is_err());
        assert!(validate_token("header.payload", SECRET).is_err());
    }

    #[test]
    fn test_refresh_gate_spaces_attempts() {
        let gate = RefreshGate::new(StdDuration::from_millis(50));
        assert!(gate.last_refresh().is_none());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        std::thread::sleep(StdDuration::from_millis(60));
        assert!(gate.try_acquire());
    }

    #[tokio::test]
    async fn test_unknown_kids_refetch_at_most_once_per_interval() {
        let empty: JWKS = serde_json::from_value(json!({ "keys": [] })).unwrap();
        // Nothing listens on port 1, so every fetch fails fast
        let validator = JwtValidator::with_jwks(
            empty,
            "http://127.0.0.1:1/jwks",
            "https://issuer.example".into(),
            JWKS_REFRESH_INTERVAL,
        );
        let claims = Claims {
            sub: "user_ops".into(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
            iat: None,
            iss: None,
            email: None,
        };

        let first = Header {
            kid: Some("rotated-1".into()),
            ..Header::default()
        };
        assert!(validator
            .validate_token(&sign(&claims, &first))
            .await
            .is_err());
        let attempted = validator.refresh.last_refresh();
        assert!(attempted.is_some());

        let second = Header {
            kid: Some("rotated-2".into()),
            ..Header::default()
        };
        assert!(validator
            .validate_token(&sign(&claims, &second))
            .await
            .is_err());
        assert_eq!(validator.refresh.last_refresh(), attempted);
    }
}
