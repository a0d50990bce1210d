use std::net::SocketAddr;
use std::path::Path;

use orgboard_auth::AuthConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authentication and authorization configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Bootstrap configuration (demo organization and sessions)
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.redis.enabled && self.redis.url.is_empty() {
            return Err("redis.enabled=true requires redis.url".into());
        }
        if self.cache.key_prefix.is_empty() {
            return Err("cache.key_prefix must not be empty".into());
        }
        if self.cache.max_body_bytes == 0 {
            return Err("cache.max_body_bytes must be > 0".into());
        }
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis connection settings for the shared response cache.
///
/// When disabled the server falls back to a per-instance in-memory cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Connection URL: `redis://host:port`
    #[serde(default)]
    pub url: String,
    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,
}

fn default_redis_pool_size() -> usize {
    8
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            pool_size: default_redis_pool_size(),
        }
    }
}

/// Response cache gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Logical namespace prepended to every derived cache key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// TTL in seconds for cached report responses. Zero disables the gate.
    #[serde(default = "default_report_ttl")]
    pub report_ttl_seconds: i64,
    /// Largest response body the gate will buffer for caching.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_key_prefix() -> String {
    "redis:cache".into()
}
fn default_report_ttl() -> i64 {
    300
}
fn default_max_body_bytes() -> usize {
    256 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            report_ttl_seconds: default_report_ttl(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Development bootstrap: seed a demo organization with one session per
/// role preset and log the ready-made claim cookies.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Load configuration from a TOML file.
///
/// A missing file yields the defaults; a present but malformed file is an
/// error, as is a config that fails validation.
pub fn load_config(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = match path {
        Some(p) if Path::new(p).exists() => {
            let raw = std::fs::read_to_string(p)?;
            toml::from_str(&raw)?
        }
        _ => AppConfig::default(),
    };
    cfg.validate().map_err(anyhow::Error::msg)?;
    Ok(cfg)
}
