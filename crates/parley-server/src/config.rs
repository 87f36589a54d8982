use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
    "changeme",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// Empty, or a prefix like `/api` with no trailing slash.
    pub base_path: String,
    pub store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("PARLEY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PARLEY_JWT_SECRET must be set to a real secret");
        }

        let db_path = PathBuf::from(get("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into()));
        let host = get("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("PARLEY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("PARLEY_PORT is not a valid port")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let store_timeout_ms: u64 = get("PARLEY_STORE_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("PARLEY_STORE_TIMEOUT_MS is not a number")?;
        if store_timeout_ms == 0 {
            bail!("PARLEY_STORE_TIMEOUT_MS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            base_path: normalize_base_path(&get("PARLEY_BASE_PATH").unwrap_or_default()),
            store_timeout: Duration::from_millis(store_timeout_ms),
        })
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("PARLEY_JWT_SECRET", "s3cr3t-for-tests")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("parley.db"));
        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.base_path, "");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_placeholder_secrets_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[("PARLEY_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PARLEY_JWT_SECRET", "s3cr3t-for-tests"),
            ("PARLEY_HOST", "127.0.0.1"),
            ("PARLEY_PORT", "8080"),
            ("PARLEY_BASE_PATH", "api/v1/"),
            ("PARLEY_STORE_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.base_path, "/api/v1");
        assert_eq!(config.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_bad_numbers_rejected() {
        let secret = ("PARLEY_JWT_SECRET", "s3cr3t-for-tests");
        assert!(load(&[secret, ("PARLEY_PORT", "http")]).is_err());
        assert!(load(&[secret, ("PARLEY_STORE_TIMEOUT_MS", "0")]).is_err());
    }
}
