//! Tool catalog loading from YAML
//!
//! Relay tools are declared, not coded: each entry names the tool the agent
//! sees, its schema, and the remote action it forwards to.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::router::ActionName;

use super::definition::{InputSchema, ParamSchema, ParamType, ToolCategory, ToolDefinition};

/// YAML representation of a tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogParam {
    /// Omitted means any JSON value is accepted
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// YAML representation of a relay tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Remote action; defaults to the tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, CatalogParam>,
    #[serde(default)]
    pub required: Vec<String>,
    /// Per-tool budget overriding the relay default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// YAML file structure
#[derive(Debug, Deserialize)]
struct YamlCatalog {
    #[serde(default)]
    tools: Vec<CatalogEntry>,
}

/// A catalog tool resolved into a definition plus its remote binding
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTool {
    pub definition: ToolDefinition,
    pub method: ActionName,
    pub timeout_ms: Option<u64>,
}

/// Catalog of relay tools
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: HashMap<String, CatalogTool>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load catalog from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("Failed to read catalog file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Load catalog from a YAML string with a top-level `tools` list
    pub fn from_yaml(content: &str) -> Result<Self> {
        let catalog: YamlCatalog = serde_yaml::from_str(content)
            .map_err(|e| RelayError::Config(format!("Failed to parse catalog YAML: {}", e)))?;
        Self::from_entries(catalog.tools)
    }

    /// Build from already-parsed entries; later entries win on name clashes
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self> {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.add(Self::convert_entry(entry)?);
        }
        Ok(catalog)
    }

    fn convert_entry(entry: CatalogEntry) -> Result<CatalogTool> {
        let category = match entry.category.as_deref() {
            None => ToolCategory::default(),
            Some(raw) => ToolCategory::from_str(raw).ok_or_else(|| {
                RelayError::Config(format!("Invalid category '{}' for tool '{}'", raw, entry.name))
            })?,
        };

        let mut schema = InputSchema::default();
        for (name, param) in entry.params {
            let param_type = match param.param_type.as_deref() {
                None => None,
                Some(raw) => Some(ParamType::from_str(raw).ok_or_else(|| {
                    RelayError::Config(format!(
                        "Invalid type '{}' for parameter '{}' of tool '{}'",
                        raw, name, entry.name
                    ))
                })?),
            };
            schema.properties.insert(
                name,
                ParamSchema {
                    param_type,
                    description: param.description,
                },
            );
        }
        for key in &entry.required {
            schema.properties.entry(key.clone()).or_default();
        }
        schema.required = entry.required;

        let method = entry.method.unwrap_or_else(|| entry.name.clone());
        let method = ActionName::parse(method)
            .map_err(|e| RelayError::Config(format!("Tool '{}': {}", entry.name, e)))?;

        if !ToolDefinition::is_valid_name(&entry.name) {
            return Err(RelayError::InvalidToolName(entry.name));
        }

        Ok(CatalogTool {
            definition: ToolDefinition::new(entry.name, entry.description)
                .with_category(category)
                .with_schema(schema),
            method,
            timeout_ms: entry.timeout_ms,
        })
    }

    pub fn all(&self) -> impl Iterator<Item = &CatalogTool> {
        self.tools.values()
    }

    pub fn add(&mut self, tool: CatalogTool) {
        self.tools.insert(tool.definition.name.clone(), tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Fold another catalog in; its entries replace ours on name clashes
    pub fn merge(&mut self, other: ToolCatalog) {
        self.tools.extend(other.tools);
    }
}
