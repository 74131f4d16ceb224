use anyhow::{Context, Result, bail};
use chrono::Duration;
use std::{env, fmt::Display, str::FromStr};
use tracing::info;

use crate::services::token::TokenConfig;

pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub sentry_dsn: Option<String>,
    pub token: TokenConfig,
}

impl Config {
    /// Reads the whole configuration from the environment.
    ///
    /// A missing `JWT_SECRET` or an unparsable number is an error: the process
    /// should not come up half-configured.
    pub fn from_env() -> Result<Self> {
        let Some(secret) = var("JWT_SECRET") else {
            bail!("JWT_SECRET must be set");
        };

        let access_ttl: i64 = try_load("ACCESS_TOKEN_TTL_SECS", "900")?;
        let refresh_ttl: i64 = try_load("REFRESH_TOKEN_TTL_SECS", "86400")?;

        Ok(Self {
            port: try_load("PORT", "8080")?,
            database_url: var("DATABASE_URL"),
            sentry_dsn: var("SENTRY_DSN"),
            token: TokenConfig {
                issuer: load_or("JWT_ISSUER", "example.com"),
                audience: load_or("JWT_AUDIENCE", "example.com"),
                secret,
                access_ttl: Duration::seconds(access_ttl),
                refresh_ttl: Duration::seconds(refresh_ttl),
                cookie_name: load_or("COOKIE_NAME", "__Host-refresh_token"),
                cookie_path: load_or("COOKIE_PATH", "/"),
                cookie_domain: load_or("COOKIE_DOMAIN", "localhost"),
            },
        })
    }
}

/// An environment variable, treating empty as unset.
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn load_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = load_or(key, default);
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value: {raw:?}"))
}
