use crate::error::AppError;
use crate::local_time::parse_timezone;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DbConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Local wall time (`HH:MM`) from which device-local today may be finalized.
    #[serde(default = "default_finalize_cutoff")]
    pub finalize_cutoff: String,
    /// Trailing window of the backfill run, in device-local days.
    #[serde(default = "default_backfill_days")]
    pub backfill_days: u32,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Per-device IANA timezone overrides, keyed by serial.
    #[serde(default)]
    pub device_timezones: BTreeMap<String, String>,
    /// Devices processed at once by the daily pass.
    #[serde(default = "default_device_concurrency")]
    pub device_concurrency: usize,
    /// Upper bound on the number of dates a single daily run may cover.
    #[serde(default = "default_max_window_days")]
    pub max_window_days: u32,
}

fn default_finalize_cutoff() -> String {
    "23:00".into()
}

fn default_backfill_days() -> u32 {
    30
}

fn default_timezone() -> String {
    "UTC".into()
}

fn default_device_concurrency() -> usize {
    1
}

fn default_max_window_days() -> u32 {
    366
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            finalize_cutoff: default_finalize_cutoff(),
            backfill_days: default_backfill_days(),
            default_timezone: default_timezone(),
            device_timezones: BTreeMap::new(),
            device_concurrency: default_device_concurrency(),
            max_window_days: default_max_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_admin_role")]
    pub admin_role: String,

    // JWKS configuration (RS256 tokens from the hosted identity provider)
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    /// Base URL of the provider's user-management API.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,

    // Local HS256 configuration (development and tests)
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub users: Vec<LocalUser>,
}

fn default_admin_role() -> String {
    "admin".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl AuthConfig {
    /// Remote settings win when both are present.
    pub fn uses_remote_provider(&self) -> bool {
        self.jwks_url.is_some()
    }
}

impl AggregationConfig {
    pub fn cutoff_time(&self) -> Result<NaiveTime, AppError> {
        NaiveTime::parse_from_str(&self.finalize_cutoff, "%H:%M").map_err(|e| {
            AppError::Config(format!(
                "aggregation.finalize_cutoff '{}' is not HH:MM: {}",
                self.finalize_cutoff, e
            ))
        })
    }
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    /// Afterwards, if DATABASE_URL env is set, override `database.url`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, AppError> {
        let expanded = expand_env_placeholders(raw).map_err(|e| AppError::Config(e.to_string()))?;
        let mut cfg: Self =
            serde_yaml::from_str(&expanded).map_err(|e| AppError::Config(e.to_string()))?;

        // Optional: allow DATABASE_URL env to override whatever YAML had
        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database.url = url;
        }

        // Optional: allow JWT_SECRET env to override auth.jwt_secret
        if let Ok(jwt_secret) = std::env::var("JWT_SECRET") {
            if let Some(ref mut auth) = cfg.auth {
                auth.jwt_secret = Some(jwt_secret);
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.database.url.trim().is_empty() {
            return Err(AppError::Config(
                "database.url is empty (set it in the config file or DATABASE_URL)".into(),
            ));
        }

        let agg = &self.aggregation;
        agg.cutoff_time()?;
        parse_timezone(&agg.default_timezone)?;
        for (serial, tz) in &agg.device_timezones {
            parse_timezone(tz)
                .map_err(|e| AppError::Config(format!("device '{}': {}", serial, e)))?;
        }
        if agg.backfill_days == 0 {
            return Err(AppError::Config(
                "aggregation.backfill_days must be at least 1".into(),
            ));
        }
        if agg.max_window_days == 0 {
            return Err(AppError::Config(
                "aggregation.max_window_days must be at least 1".into(),
            ));
        }
        if agg.backfill_days > agg.max_window_days {
            return Err(AppError::Config(format!(
                "aggregation.backfill_days ({}) exceeds aggregation.max_window_days ({})",
                agg.backfill_days, agg.max_window_days
            )));
        }
        if agg.device_concurrency == 0 {
            return Err(AppError::Config(
                "aggregation.device_concurrency must be at least 1".into(),
            ));
        }

        if let Some(auth) = &self.auth {
            if auth.uses_remote_provider() {
                if auth.issuer.is_none() || auth.api_url.is_none() || auth.secret_key.is_none() {
                    return Err(AppError::Config(
                        "auth.jwks_url requires auth.issuer, auth.api_url and auth.secret_key"
                            .into(),
                    ));
                }
            } else if auth.jwt_secret.is_none() {
                return Err(AppError::Config(
                    "auth needs either jwks_url or jwt_secret".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c == '$' {
            match it.peek().copied() {
                Some('$') => {
                    // Escape "$$" -> "$"
                    it.next();
                    out.push('$');
                }
                Some(open @ ('(' | '{')) => {
                    it.next();
                    let close = if open == '(' { ')' } else { '}' };
                    let var = read_until(&mut it, close).with_context(|| {
                        format!("unterminated env placeholder: missing '{}'", close)
                    })?;
                    let val = std::env::var(&var)
                        .with_context(|| format!("missing environment variable: {}", var))?;
                    out.push_str(&val);
                }
                _ => out.push('$'),
            }
        } else {
            out.push(c);
        }
    }

    Ok(out)
}

/// Read characters until we hit `end`, returning the collected string.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}
