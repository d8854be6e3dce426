use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS. Empty means allow all (local dev).
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Product store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Force-directed layout tuning.
///
/// Defaults match the simulation the 3D frontend expects: 100 passes of
/// inverse-square repulsion and linear spring attraction, damped Euler step.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_repulsion")]
    pub repulsion: f64,
    #[serde(default = "default_attraction")]
    pub attraction: f64,
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Half-extent of the cube used for random initial placement.
    #[serde(default = "default_init_extent")]
    pub init_extent: f64,
    /// Optional RNG seed for reproducible layouts (snapshot testing).
    /// Unset means a fresh entropy seed per build.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            repulsion: default_repulsion(),
            attraction: default_attraction(),
            damping: default_damping(),
            init_extent: default_init_extent(),
            seed: None,
        }
    }
}

/// Relationship classifier configuration.
///
/// `known_fields` and `compat_prefix` drive field-name based detection;
/// value-shape detection (arrays, comma strings) is always on.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_known_fields")]
    pub known_fields: Vec<String>,
    #[serde(default = "default_compat_prefix")]
    pub compat_prefix: String,
    /// Node size grows by this much per relationship target on the product.
    #[serde(default = "default_size_step")]
    pub size_step: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            known_fields: default_known_fields(),
            compat_prefix: default_compat_prefix(),
            size_step: default_size_step(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_iterations() -> usize {
    100
}

fn default_repulsion() -> f64 {
    15.0
}

fn default_attraction() -> f64 {
    0.1
}

fn default_damping() -> f64 {
    0.85
}

fn default_init_extent() -> f64 {
    10.0
}

fn default_known_fields() -> Vec<String> {
    [
        "mdcs",
        "nics",
        "Remotas",
        "protocolo",
        "comunicacao",
        "tipo_integracao",
        "modulos_hemera",
        "compativel_medidores",
        "compativel_remotas",
        "compativel_mdc",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_compat_prefix() -> String {
    "compativel_".to_string()
}

fn default_size_step() -> f64 {
    0.1
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in ECOGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("ECOGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.layout.iterations == 0 {
            anyhow::bail!("layout.iterations must be greater than 0");
        }

        if self.layout.repulsion <= 0.0 {
            anyhow::bail!("layout.repulsion must be positive");
        }

        if self.layout.attraction < 0.0 {
            anyhow::bail!("layout.attraction must not be negative");
        }

        if self.layout.damping <= 0.0 || self.layout.damping > 1.0 {
            anyhow::bail!("layout.damping must be in (0.0, 1.0]");
        }

        if self.layout.init_extent <= 0.0 {
            anyhow::bail!("layout.init_extent must be positive");
        }

        if self.classifier.size_step < 0.0 {
            anyhow::bail!("classifier.size_step must not be negative");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.store.db_path
    }
}
