//! Built-in tools available to every agent.

use serde_json::Value;

use maestro_domain::error::Result;
use maestro_domain::ToolSchema;

use crate::registry::Tool;

/// Returns the current wallclock time as an ISO-8601 UTC string.
pub struct CurrentTimeTool {
    schema: ToolSchema,
}

impl CurrentTimeTool {
    pub fn new() -> Self {
        Self {
            schema: ToolSchema {
                name: "get_current_time".into(),
                description: "Get the current date and time in UTC (ISO-8601).".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {},
                }),
            },
        }
    }
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for CurrentTimeTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, _arguments: &serde_json::Map<String, Value>) -> Result<Value> {
        let now = chrono::Utc::now();
        Ok(Value::String(
            now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ))
    }
}
