use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

/// Command line options for the gigpal server.
#[derive(Parser, Debug, Default)]
#[command(name = "gigpal", about = "Concert matchmaking API server")]
pub struct Cli {
    /// Override bind address (host:port).
    #[arg(long)]
    pub bind: Option<String>,
    /// Override server port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory holding the database and the generated signing secret.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

/// Ticketmaster Discovery settings.
#[derive(Clone, Default)]
pub struct CatalogConfig {
    pub ticketmaster_key: Option<String>,
    /// Designated market area to restrict searches to.
    pub dma_id: Option<String>,
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("ticketmaster_key", &self.ticketmaster_key.as_ref().map(|_| "<redacted>"))
            .field("dma_id", &self.dma_id)
            .finish()
    }
}

/// Runtime configuration for the server resolved from file, env and CLI.
#[derive(Clone)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind: String,
    /// Base directory for the database file and the JWT secret.
    pub data_dir: PathBuf,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
    /// Base64 JWT signing secret. Generated and persisted when absent.
    pub jwt_secret: Option<String>,
    pub catalog: CatalogConfig,
    /// Browser origins allowed to call the API. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("data_dir", &self.data_dir)
            .field("logging_enabled", &self.logging_enabled)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("catalog", &self.catalog)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    logging: FileLogging,
    #[serde(default)]
    auth: FileAuth,
    #[serde(default)]
    catalog: FileCatalog,
}

#[derive(Deserialize)]
struct FileServer {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    cors_origins: Vec<String>,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

#[derive(Deserialize, Default)]
struct FileAuth {
    jwt_secret: Option<String>,
}

#[derive(Deserialize, Default)]
struct FileCatalog {
    ticketmaster_key: Option<String>,
    dma_id: Option<String>,
}

fn default_port() -> u16 {
    8787
}

fn default_logging() -> bool {
    true
}

impl Default for FileServer {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut port = default_port();
        let mut logging = default_logging();
        let mut jwt_secret = None;
        let mut catalog = CatalogConfig::default();
        let mut cors_origins = Vec::new();

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("GIGPAL_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/gigpal.toml"));

        if let Ok(bytes) = fs::read(&config_path) {
            let contents = String::from_utf8_lossy(&bytes);
            let file_cfg: FileConfig = toml::from_str(&contents)
                .with_context(|| format!("invalid config file {}", config_path.display()))?;
            port = file_cfg.server.port;
            cors_origins = file_cfg.server.cors_origins;
            logging = file_cfg.logging.enabled;
            jwt_secret = file_cfg.auth.jwt_secret;
            catalog.ticketmaster_key = file_cfg.catalog.ticketmaster_key;
            catalog.dma_id = file_cfg.catalog.dma_id;
        }

        // environment overrides
        if let Ok(p) = std::env::var("GIGPAL_PORT") {
            if let Ok(p) = p.parse::<u16>() {
                port = p;
            }
        }
        if let Ok(l) = std::env::var("GIGPAL_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }
        if let Ok(key) = std::env::var("TICKETMASTER_KEY") {
            if !key.trim().is_empty() {
                catalog.ticketmaster_key = Some(key);
            }
        }

        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect();
        }

        // CLI overrides
        if let Some(p) = cli.port {
            port = p;
        }
        if let Some(l) = cli.logging {
            logging = l;
        }

        if !(1024..=65535).contains(&port) {
            anyhow::bail!("invalid_port");
        }

        let bind = if let Some(b) = &cli.bind {
            b.clone()
        } else if let Ok(b) = std::env::var("BIND") {
            b
        } else {
            format!("127.0.0.1:{}", port)
        };

        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| std::env::var("DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        Ok(Self {
            bind,
            data_dir,
            logging_enabled: logging,
            jwt_secret,
            catalog,
            cors_origins,
        })
    }

    /// Location of the SQLite database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("gigpal.db")
    }
}

/// Determine the default data directory.
pub fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        let mut p = PathBuf::from(home);
        p.push(".local/share/gigpal");
        p
    } else {
        PathBuf::from("./gigpal_data")
    }
}
