use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use maestro_domain::error::Result;
use maestro_domain::ToolSchema;

/// A callable tool. Executors receive the decoded argument object and
/// return any JSON-serializable value, or a categorized error.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> &ToolSchema;

    async fn execute(&self, arguments: &serde_json::Map<String, Value>) -> Result<Value>;
}

/// Name → tool mapping, populated at startup and frozen behind an `Arc`
/// for request-time use.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// A registry pre-loaded with the built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::builtin::CurrentTimeTool::new()));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name.clone();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool registered twice, replacing");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schemas for the given subset of tool names, preserving the input
    /// order. Unknown names are skipped (validation rejects them earlier).
    pub fn schemas_for(&self, names: &[String]) -> Vec<ToolSchema> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n).map(|t| t.schema().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builtins_include_current_time() {
        let registry = ToolRegistry::with_builtins();
        assert!(registry.contains("get_current_time"));
        let tool = registry.get("get_current_time").unwrap();
        let result = tool.execute(&serde_json::Map::new()).await.unwrap();
        assert!(result.is_string());
    }

    #[test]
    fn schemas_for_preserves_order_and_skips_unknown() {
        let registry = ToolRegistry::with_builtins();
        let schemas = registry.schemas_for(&[
            "missing".to_string(),
            "get_current_time".to_string(),
        ]);
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "get_current_time");
    }

    #[test]
    fn names_are_sorted() {
        let registry = ToolRegistry::with_builtins();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
