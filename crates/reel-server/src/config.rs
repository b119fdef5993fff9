use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use reel_api::Settings;
use reel_api::cookies::{CookiePolicy, SameSite, parse_same_site};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub settings: Settings,
    /// Empty means any origin is allowed (no credentials).
    pub cors_origins: Vec<String>,
    pub session_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = required_secret(var("REEL_JWT_SECRET"), "REEL_JWT_SECRET")?;
        let worker_secret = required_secret(var("REEL_WORKER_SECRET"), "REEL_WORKER_SECRET")?;

        let host = var("REEL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("REEL_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("REEL_PORT must be a port number")?;
        let db_path: PathBuf = var("REEL_DB_PATH").unwrap_or_else(|| "reel.db".into()).into();

        let secure = match var("REEL_COOKIE_SECURE") {
            Some(v) => parse_bool(&v).context("REEL_COOKIE_SECURE must be true or false")?,
            None => true,
        };
        let cookie = CookiePolicy {
            domain: var("REEL_COOKIE_DOMAIN"),
            secure,
            same_site: var("REEL_COOKIE_SAMESITE")
                .map(|v| parse_same_site(&v))
                .unwrap_or(SameSite::Lax),
        };

        let cors_origins = var("REEL_CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let session_sweep_secs = var("REEL_SESSION_SWEEP_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|&secs: &u64| secs > 0)
            .unwrap_or(3600);

        let mut settings = Settings::new(jwt_secret, worker_secret);
        settings.owner_open_id = var("REEL_OWNER_OPEN_ID");
        settings.cookie = cookie;

        Ok(Self {
            host,
            port,
            db_path,
            settings,
            cors_origins,
            session_sweep_secs,
        })
    }
}

fn required_secret(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !PLACEHOLDER_SECRETS.contains(&v.as_str()) => Ok(v),
        Some(_) => bail!("{} is still a placeholder; set a random value in your .env file", name),
        None => bail!("{} is unset; set it in your .env file", name),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
