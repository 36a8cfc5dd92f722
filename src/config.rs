use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::registry::{CatalogEntry, CatalogParam, ToolCatalog, ToolRegistry};
use crate::relay::{RelayClient, RelayClientConfig, register_relay_tools};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub host: HostConfig,
    pub relay: RelayConfig,
    pub registry: RegistryConfig,
    /// Relay tools declared inline
    pub tools: Vec<CatalogEntry>,
    /// Extra catalog file; inline entries win on name clashes
    pub tools_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Socket address; the listener answers on every path
    pub listen: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8765".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub base_url: String,
    pub namespace: Option<String>,
    pub timeout_ms: u64,
    pub ping_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let client = RelayClientConfig::default();
        Self {
            base_url: client.base_url,
            namespace: client.namespace,
            timeout_ms: client.timeout_ms,
            ping_timeout_ms: client.ping_timeout_ms,
        }
    }
}

impl RelayConfig {
    pub fn client_config(&self) -> RelayClientConfig {
        RelayClientConfig {
            base_url: self.base_url.clone(),
            namespace: self.namespace.clone(),
            timeout_ms: self.timeout_ms,
            ping_timeout_ms: self.ping_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub allow_overwrite: bool,
}

/// Diagnostic tools answered by any host running the `echo.*` actions
fn default_tools() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            name: "host_ping".to_string(),
            description: "Round-trip a ping through the office host".to_string(),
            category: Some("system".to_string()),
            method: Some("echo.ping".to_string()),
            params: Default::default(),
            required: Vec::new(),
            timeout_ms: None,
        },
        CatalogEntry {
            name: "host_echo".to_string(),
            description: "Send a message to the office host and get it back".to_string(),
            category: Some("system".to_string()),
            method: Some("echo.echo".to_string()),
            params: [(
                "message".to_string(),
                CatalogParam {
                    param_type: Some("string".to_string()),
                    description: Some("Text to echo".to_string()),
                },
            )]
            .into_iter()
            .collect(),
            required: vec!["message".to_string()],
            timeout_ms: None,
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            host: HostConfig::default(),
            relay: RelayConfig::default(),
            registry: RegistryConfig::default(),
            tools: default_tools(),
            tools_file: None,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let mut config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        // A relative catalog path is relative to the config file
        if let (Some(tools_file), Some(dir)) = (&config.tools_file, path.as_ref().parent()) {
            if tools_file.is_relative() {
                config.tools_file = Some(dir.join(tools_file));
            }
        }

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Catalog from `tools_file` overlaid with inline `tools`
    pub fn catalog(&self) -> Result<ToolCatalog> {
        let mut catalog = match &self.tools_file {
            Some(path) => ToolCatalog::from_file(path).context(format!("Failed to load tool catalog {}", path.display()))?,
            None => ToolCatalog::new(),
        };
        let inline = ToolCatalog::from_entries(self.tools.clone()).context("Invalid inline tool declaration")?;
        catalog.merge(inline);
        Ok(catalog)
    }

    pub fn relay_client(&self) -> Result<Arc<RelayClient>> {
        let client = RelayClient::new(self.relay.client_config()).context("Failed to create relay client")?;
        Ok(Arc::new(client))
    }

    /// Registry holding every catalog tool bound to `client`, plus `relay_status`
    pub fn build_registry(&self, client: &Arc<RelayClient>) -> Result<Arc<ToolRegistry>> {
        let catalog = self.catalog()?;
        let registry = ToolRegistry::new().with_overwrite(self.registry.allow_overwrite);
        let count = register_relay_tools(&registry, &catalog, client).context("Failed to register relay tools")?;
        log::info!("Registered {} tools against {}", count, client.endpoint());
        Ok(Arc::new(registry))
    }
}
