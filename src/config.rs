use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::oauth::OAuthClientConfig;

/// Runtime settings, read from the environment (and `.env` via `dotenv`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_port: u16,
    pub server_host: String,
    /// Bucket capacity per client.
    pub rate_limit_burst: u32,
    /// Tokens added per second per client.
    pub rate_limit_per_second: f64,
    /// Buckets untouched this long are evicted by housekeeping.
    pub rate_limit_idle: Duration,
    /// Key clients by `X-Forwarded-For` / `Forwarded` instead of the socket peer.
    pub trust_forwarded_for: bool,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    pub google: Option<OAuthClientConfig>,
    pub github: Option<OAuthClientConfig>,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has invalid value {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let rate_limit_per_second: f64 = vars.parse_or("RATE_LIMIT_PER_SECOND", 40.0)?;
        if !rate_limit_per_second.is_finite() || rate_limit_per_second < 0.0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_PER_SECOND",
                value: rate_limit_per_second.to_string(),
            });
        }

        Ok(Self {
            database_url: vars.required("DATABASE_URL")?,
            jwt_secret: vars.required("JWT_SECRET")?,
            server_port: vars.parse_or("SERVER_PORT", 8080)?,
            server_host: vars.get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            rate_limit_burst: vars.parse_or("RATE_LIMIT_BURST", 60)?,
            rate_limit_per_second,
            rate_limit_idle: Duration::from_secs(vars.parse_or("RATE_LIMIT_IDLE_SECS", 600)?),
            trust_forwarded_for: vars.parse_or("TRUST_FORWARDED_FOR", false)?,
            cache_ttl: Duration::from_secs(vars.parse_or("CACHE_TTL_SECS", 300)?),
            cache_sweep_interval: Duration::from_secs(
                vars.parse_or("CACHE_SWEEP_SECS", 600u64)?.max(1),
            ),
            store_timeout: Duration::from_secs(vars.parse_or("STORE_TIMEOUT_SECS", 5)?),
            google: vars.oauth_client("GOOGLE"),
            github: vars.oauth_client("GITHUB"),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank are the same.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    key,
                    value: value.clone(),
                }),
            None => Ok(default),
        }
    }

    /// A provider is enabled only when all three settings are present.
    fn oauth_client(&self, prefix: &str) -> Option<OAuthClientConfig> {
        Some(OAuthClientConfig {
            client_id: self.get(&format!("{}_CLIENT_ID", prefix))?,
            client_secret: self.get(&format!("{}_CLIENT_SECRET", prefix))?,
            redirect_url: self.get(&format!("{}_REDIRECT_URL", prefix))?,
        })
    }
}
