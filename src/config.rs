use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_in: Duration,
}

/// Argon2 work factor.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub host: String,
    pub port: u16,
    pub require_auth_for_writes: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "reliefhub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "reliefhub-users".into()),
            expires_in: match std::env::var("EXPIRES_IN") {
                Ok(v) => parse_expiry(&v).with_context(|| format!("EXPIRES_IN={v}"))?,
                Err(_) => Duration::from_secs(24 * 60 * 60),
            },
        };
        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: env_or("HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_or("HASH_ITERATIONS", defaults.iterations)?,
        };
        let port = match std::env::var("PORT").or_else(|_| std::env::var("APP_PORT")) {
            Ok(v) => v.parse().with_context(|| format!("invalid port {v:?}"))?,
            Err(_) => 5000,
        };
        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            jwt,
            hash,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            require_auth_for_writes: env_or("REQUIRE_AUTH_FOR_WRITES", false)?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}={v:?}: {e}")),
        Err(_) => Ok(default),
    }
}

const SECOND_MS: f64 = 1_000.0;
const MINUTE_MS: f64 = 60.0 * SECOND_MS;
const HOUR_MS: f64 = 60.0 * MINUTE_MS;
const DAY_MS: f64 = 24.0 * HOUR_MS;

/// Parses a token lifetime such as `3600000`, `90s`, `1.5h`, `2 days` or `7d`.
///
/// A bare number is milliseconds. Units are case-insensitive and may follow
/// the number after a space; a year is 365.25 days. The result is truncated
/// to whole seconds and must be at least one second.
pub fn parse_expiry(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    if number.is_empty() {
        bail!("missing amount");
    }
    let amount: f64 = number
        .parse()
        .with_context(|| format!("invalid amount {number:?}"))?;
    let ms_per_unit = match unit.trim_start().to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => SECOND_MS,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE_MS,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR_MS,
        "d" | "day" | "days" => DAY_MS,
        "w" | "week" | "weeks" => 7.0 * DAY_MS,
        "y" | "yr" | "yrs" | "year" | "years" => 365.25 * DAY_MS,
        other => bail!("unknown unit {other:?}"),
    };
    let secs = (amount * ms_per_unit / SECOND_MS).trunc();
    if !secs.is_finite() || secs > u64::MAX as f64 {
        bail!("duration overflows");
    }
    if secs < 1.0 {
        bail!("expiry must be at least one second");
    }
    Ok(Duration::from_secs(secs as u64))
}
