//! Function tools offered to the realtime model.

use serde::{Deserialize, Serialize};

fn function_type() -> String {
    "function".to_string()
}

/// Tool definition sent in session or response configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: function_type(),
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
