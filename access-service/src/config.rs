use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

const DEFAULT_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:3001", "http://localhost:5173"];

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    /// `None` selects the in-process cache backend.
    pub redis_url: Option<String>,
    pub cache_key_prefix: String,
    pub cache_ttl: Duration,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_public_key_pem: String,
    pub jwt_key_id: String,
    pub jwt_leeway_seconds: u32,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub run_migrations: bool,
}

pub fn load_access_config() -> Result<AccessConfig> {
    let database_url = required("DATABASE_URL")?;
    let database_max_connections = parsed_or("DATABASE_MAX_CONNECTIONS", 10u32)?;
    let redis_url = env::var("REDIS_URL").ok().and_then(|value| normalize_optional(&value));
    let cache_key_prefix = env::var("CACHE_KEY_PREFIX").unwrap_or_else(|_| "marketplace:cache".to_string());
    let cache_ttl = Duration::from_secs(parsed_or("CACHE_TTL_SECONDS", 900u64)?);

    let jwt_issuer = required("JWT_ISSUER")?;
    let jwt_audience = required("JWT_AUDIENCE")?;
    let jwt_public_key_pem = required("JWT_PUBLIC_KEY_PEM")?.replace("\\n", "\n");
    let jwt_key_id = required("JWT_KEY_ID")?;
    let jwt_leeway_seconds = parsed_or("JWT_LEEWAY_SECONDS", 30u32)?;

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = parsed_or("PORT", 8086u16)?;
    let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|value| parse_origins(&value))
        .filter(|origins| !origins.is_empty())
        .unwrap_or_else(|| DEFAULT_ORIGINS.iter().map(|origin| origin.to_string()).collect());
    let run_migrations = bool_from_env("RUN_MIGRATIONS").unwrap_or(true);

    Ok(AccessConfig {
        database_url,
        database_max_connections,
        redis_url,
        cache_key_prefix,
        cache_ttl,
        jwt_issuer,
        jwt_audience,
        jwt_public_key_pem,
        jwt_key_id,
        jwt_leeway_seconds,
        host,
        port,
        cors_allowed_origins,
        run_migrations,
    })
}

fn required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().with_context(|| format!("Failed to parse {key}")),
        Err(_) => Ok(default),
    }
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_from_env_parses() {
        std::env::set_var("ACCESS_TEST_BOOL_TRUE", "true");
        std::env::set_var("ACCESS_TEST_BOOL_ONE", "1");
        std::env::set_var("ACCESS_TEST_BOOL_FALSE", "no");
        assert_eq!(bool_from_env("ACCESS_TEST_BOOL_TRUE"), Some(true));
        assert_eq!(bool_from_env("ACCESS_TEST_BOOL_ONE"), Some(true));
        assert_eq!(bool_from_env("ACCESS_TEST_BOOL_FALSE"), Some(false));
        assert_eq!(bool_from_env("ACCESS_TEST_BOOL_UNSET"), None);
    }

    #[test]
    fn parse_origins_skips_blanks() {
        let origins = parse_origins(" https://shop.example , ,http://localhost:3000");
        assert_eq!(origins, vec!["https://shop.example".to_string(), "http://localhost:3000".to_string()]);
    }

    #[test]
    fn parsed_or_reports_bad_numbers() {
        std::env::set_var("ACCESS_TEST_PORT", "eighty");
        let err = parsed_or("ACCESS_TEST_PORT", 80u16).unwrap_err();
        assert!(err.to_string().contains("ACCESS_TEST_PORT"));
        assert_eq!(parsed_or("ACCESS_TEST_PORT_UNSET", 80u16).unwrap(), 80);
    }
}
