//! Application configuration: `config.toml` under the data directory with
//! per-section defaults, plus environment overrides for the deploy-varying
//! values. Secrets (the OpenAI key) come from the environment only and are
//! never written to the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DB_FILE: &str = "seo_pm.sqlite";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_MAX_TOKENS: u32 = 2048;
const DEFAULT_FROM_ADDRESS: &str = "notifications@seo-pm.local";
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Exact origin allowed by CORS; `None` means allow any (dev mode).
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origin: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path; defaults to `seo_pm.sqlite` in the data directory.
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self, data_dir: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir.join(DEFAULT_DB_FILE))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: DEFAULT_OPENAI_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    /// Provider webhook that accepts our JSON message payload.
    pub endpoint: Option<String>,
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity; slow sockets lag past this and skip.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub openai: OpenAiConfig,
    pub email: EmailConfig,
    pub events: EventsConfig,
}

impl Config {
    /// Platform data directory for the app, created on demand by the caller.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("seo-pm")
    }

    /// Read `config.toml` from the data directory and apply env overrides.
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::data_dir());
        config.apply_env();
        config
    }

    /// Read `config.toml` from a specific directory. A missing file or a
    /// parse failure falls back to defaults; parse failures are logged.
    pub fn load_from(data_dir: &Path) -> Self {
        let path = data_dir.join("config.toml");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str::<Config>(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable config.toml, using defaults");
                Self::default()
            }
        }
    }

    /// `HOST`, `PORT` and `DATABASE_PATH` override the file.
    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(%port, "ignoring unparseable PORT override"),
            }
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = Some(PathBuf::from(path));
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
