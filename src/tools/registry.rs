//! Tool registry - name to implementation lookup

use super::{
    CodeExecutionTool, ConditionalRouterTool, DataAggregatorTool, RegexParserTool,
    StructuredDataParserTool, Tool,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of available tools, keyed by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tools
    pub fn with_builtin_tools() -> Self {
        Self::new()
            .with_tool(Arc::new(ConditionalRouterTool))
            .with_tool(Arc::new(RegexParserTool))
            .with_tool(Arc::new(StructuredDataParserTool))
            .with_tool(Arc::new(DataAggregatorTool))
            .with_tool(Arc::new(CodeExecutionTool))
    }

    /// Add a tool, replacing any tool of the same name
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Add a tool in place, returning the one it replaced
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        self.tools.insert(tool.name().to_string(), tool)
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
