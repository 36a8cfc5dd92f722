//! Tool definitions and input schemas
//!
//! A definition is what the agent sees in `tools/list`; the schema is what the
//! registry checks arguments against before any handler runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::envelope::{EnvelopeError, ErrorKey};

/// Category a tool is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// Workbook, sheet and cell operations
    Spreadsheet,
    /// Word-processing document operations
    Document,
    /// Slide and shape operations
    Presentation,
    /// Relay and host housekeeping
    System,
}

impl Default for ToolCategory {
    fn default() -> Self {
        Self::System
    }
}

impl ToolCategory {
    /// Parse from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "spreadsheet" | "excel" | "sheet" => Some(Self::Spreadsheet),
            "document" | "word" | "doc" => Some(Self::Document),
            "presentation" | "powerpoint" | "ppt" | "slides" => Some(Self::Presentation),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spreadsheet => "spreadsheet",
            Self::Document => "document",
            Self::Presentation => "presentation",
            Self::System => "system",
        }
    }
}

/// JSON type a parameter must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" | "bool" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether a JSON value has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Schema of one parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<ParamType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSchema {
    pub fn new(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type: Some(param_type),
            description: Some(description.into()),
        }
    }
}

fn object_type() -> String {
    "object".to_string()
}

/// Object schema for a tool's arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, ParamSchema>,
    /// Required keys, in declaration order
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: object_type(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl InputSchema {
    /// Check arguments: required keys first, then declared types
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), EnvelopeError> {
        let missing = self
            .required
            .iter()
            .find(|key| arguments.get(key.as_str()).is_none_or(Value::is_null));
        if let Some(key) = missing {
            return Err(EnvelopeError::new(ErrorKey::ParamMissing)
                .with_message(format!("Missing required parameter: '{}'", key))
                .with_details(json!({ "parameter": key })));
        }

        for (key, schema) in &self.properties {
            let (Some(expected), Some(value)) = (schema.param_type, arguments.get(key)) else {
                continue;
            };
            if value.is_null() || expected.matches(value) {
                continue;
            }
            return Err(EnvelopeError::new(ErrorKey::ParamInvalid)
                .with_message(format!(
                    "Parameter '{}' must be of type {}, got {}",
                    key,
                    expected.as_str(),
                    json_type_name(value)
                ))
                .with_details(json!({
                    "parameter": key,
                    "expected": expected.as_str(),
                    "actual": json_type_name(value),
                })));
        }

        Ok(())
    }
}

/// An agent-callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Globally unique tool name (e.g., "excel_get_cell")
    pub name: String,
    /// Human-readable description for the agent
    pub description: String,
    /// Argument schema
    #[serde(default)]
    pub input_schema: InputSchema,
    #[serde(default)]
    pub category: ToolCategory,
}

impl ToolDefinition {
    /// Create a new tool definition with an empty schema
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: InputSchema::default(),
            category: ToolCategory::default(),
        }
    }

    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = schema;
        self
    }

    /// Add an optional parameter
    pub fn with_param(mut self, name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        self.input_schema
            .properties
            .insert(name.into(), ParamSchema::new(param_type, description));
        self
    }

    /// Add a required parameter
    pub fn with_required_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        if !self.input_schema.required.contains(&name) {
            self.input_schema.required.push(name.clone());
        }
        self.with_param(name, param_type, description)
    }

    /// Validate a tool name: 1-64 chars of `[A-Za-z0-9_.-]`
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 64
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn cell_tool() -> ToolDefinition {
        ToolDefinition::new("excel_set_cell", "Set a cell value")
            .with_category(ToolCategory::Spreadsheet)
            .with_required_param("sheet", ParamType::String, "Worksheet name")
            .with_required_param("address", ParamType::String, "A1-style address")
            .with_param("value", ParamType::Number, "Value to write")
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(ToolCategory::from_str("excel"), Some(ToolCategory::Spreadsheet));
        assert_eq!(ToolCategory::from_str("Word"), Some(ToolCategory::Document));
        assert_eq!(ToolCategory::from_str("ppt"), Some(ToolCategory::Presentation));
        assert_eq!(ToolCategory::from_str("system"), Some(ToolCategory::System));
        assert_eq!(ToolCategory::from_str("outlook"), None);
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ToolCategory::Presentation).unwrap();
        assert_eq!(json, "\"presentation\"");
        assert_eq!(ToolCategory::default(), ToolCategory::System);
    }

    #[test]
    fn test_param_type_matches() {
        assert!(ParamType::String.matches(&json!("a")));
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(ParamType::Number.matches(&json!(3.5)));
        assert!(ParamType::Boolean.matches(&json!(false)));
        assert!(ParamType::Array.matches(&json!([1])));
        assert!(!ParamType::Object.matches(&json!([1])));
    }

    #[test]
    fn test_builder() {
        let tool = cell_tool();
        assert_eq!(tool.category, ToolCategory::Spreadsheet);
        assert_eq!(tool.input_schema.required, vec!["sheet", "address"]);
        assert_eq!(tool.input_schema.properties.len(), 3);
    }

    #[test]
    fn test_validate_ok() {
        let tool = cell_tool();
        let result = tool
            .input_schema
            .validate(&args(json!({"sheet": "S1", "address": "B2", "value": 4})));
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_reports_first_missing_key() {
        let tool = cell_tool();
        let err = tool.input_schema.validate(&args(json!({"value": 1}))).unwrap_err();
        assert_eq!(err.code, "PARAM_MISSING");
        assert!(err.message.contains("'sheet'"));
        assert!(!err.message.contains("address"));
    }

    #[test]
    fn test_validate_null_counts_as_missing() {
        let tool = cell_tool();
        let err = tool
            .input_schema
            .validate(&args(json!({"sheet": "S1", "address": null})))
            .unwrap_err();
        assert!(err.message.contains("'address'"));
    }

    #[test]
    fn test_validate_type_mismatch() {
        let tool = cell_tool();
        let err = tool
            .input_schema
            .validate(&args(json!({"sheet": "S1", "address": "A1", "value": "four"})))
            .unwrap_err();
        assert_eq!(err.code, "PARAM_INVALID");
        assert_eq!(err.details.unwrap()["expected"], "number");
    }

    #[test]
    fn test_wire_shape() {
        let wire = serde_json::to_value(cell_tool()).unwrap();
        assert_eq!(wire["inputSchema"]["type"], "object");
        assert_eq!(wire["inputSchema"]["required"][0], "sheet");
        assert_eq!(wire["inputSchema"]["properties"]["value"]["type"], "number");
        assert_eq!(wire["category"], "spreadsheet");
    }

    #[test]
    fn test_deserialization_defaults() {
        let json = r#"{"name": "simple", "description": "Simple tool"}"#;
        let tool: ToolDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(tool.input_schema.schema_type, "object");
        assert!(tool.input_schema.required.is_empty());
        assert_eq!(tool.category, ToolCategory::System);
    }

    #[test]
    fn test_valid_names() {
        assert!(ToolDefinition::is_valid_name("excel_get_cell"));
        assert!(ToolDefinition::is_valid_name("host.ping"));
        assert!(!ToolDefinition::is_valid_name(""));
        assert!(!ToolDefinition::is_valid_name("has space"));
        assert!(!ToolDefinition::is_valid_name(&"x".repeat(65)));
    }
}
