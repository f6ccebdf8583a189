use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::info;

/// Secrets shipped in sample `.env` files.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your_jwt_secret_key",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_hours: i64,
    pub admin_key: Option<String>,
    pub seed_db: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("STOREFRONT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("STOREFRONT_JWT_SECRET is unset or still a placeholder");
        }

        let db_path = PathBuf::from(get("STOREFRONT_DB_PATH").unwrap_or_else(|| "storefront.db".into()));
        let host = get("STOREFRONT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("STOREFRONT_PORT")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("invalid STOREFRONT_PORT")?;

        let token_ttl_hours: i64 = get("STOREFRONT_TOKEN_TTL_HOURS")
            .unwrap_or_else(|| "24".into())
            .parse()
            .context("invalid STOREFRONT_TOKEN_TTL_HOURS")?;
        if token_ttl_hours < 1 {
            bail!("STOREFRONT_TOKEN_TTL_HOURS must be at least 1");
        }

        let admin_key = get("STOREFRONT_ADMIN_KEY");
        let seed_db: bool = get("STOREFRONT_SEED_DB")
            .unwrap_or_else(|| "false".into())
            .to_lowercase()
            .parse()
            .context("invalid STOREFRONT_SEED_DB")?;

        if admin_key.is_none() {
            info!("STOREFRONT_ADMIN_KEY not set, admin routes disabled");
        }

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            token_ttl_hours,
            admin_key,
            seed_db,
        })
    }
}
