use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// SQLite connection string, e.g. `sqlite:/var/lib/roster/roster.db`.
    pub database_url: String,

    /// Public blob directory; avatar files live under `<storage_path>/avatars`.
    pub storage_path: String,

    pub log_level: String,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Session inactivity expiry.
    pub session_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB.
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations).
    pub argon2_time_cost: u32,

    /// Argon2 lane count.
    pub argon2_parallelism: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roster");

        Self {
            database_url: format!("sqlite:{}", data_dir.join("roster.db").display()),
            storage_path: data_dir.join("public").display().to_string(),
            log_level: "info".to_string(),
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7878,
            cors_allowed_origins: vec!["*".to_string()],
            session_ttl_minutes: 60,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

impl Config {
    /// Load from `ROSTER_CONFIG`, or `<config dir>/roster/config.toml`,
    /// falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            let config: Self = toml::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            info!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    fn config_path() -> PathBuf {
        std::env::var("ROSTER_CONFIG").map_or_else(
            |_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("roster")
                    .join("config.toml")
            },
            PathBuf::from,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.general.database_url.is_empty() {
            anyhow::bail!("general.database_url must not be empty");
        }
        if self.security.argon2_parallelism == 0 {
            anyhow::bail!("security.argon2_parallelism must be at least 1");
        }
        if self.server.session_ttl_minutes <= 0 {
            anyhow::bail!("server.session_ttl_minutes must be positive");
        }
        Ok(())
    }
}
