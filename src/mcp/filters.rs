//! Tool filtering for the MCP catalog.

use std::collections::HashSet;

use crate::tools::ToolDescriptor;

/// Static tool filter with allow/block lists.
///
/// Applied to every catalog refresh, so blocked operations never reach
/// the classifier or the dispatcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticToolFilter {
    /// Allowed tool names. If empty, all tools are allowed (unless blocked).
    pub allowed_tool_names: HashSet<String>,
    /// Blocked tool names. Blocked tools take precedence over allowed tools.
    pub blocked_tool_names: HashSet<String>,
}

impl StaticToolFilter {
    pub fn new(allowed_tool_names: Option<Vec<String>>, blocked_tool_names: Option<Vec<String>>) -> Self {
        Self {
            allowed_tool_names: allowed_tool_names.unwrap_or_default().into_iter().collect(),
            blocked_tool_names: blocked_tool_names.unwrap_or_default().into_iter().collect(),
        }
    }

    /// Whether the filter lets every tool through.
    pub fn is_empty(&self) -> bool {
        self.allowed_tool_names.is_empty() && self.blocked_tool_names.is_empty()
    }

    /// Whether the named tool passes the filter.
    pub fn allows(&self, tool_name: &str) -> bool {
        if self.blocked_tool_names.contains(tool_name) {
            return false;
        }
        if !self.allowed_tool_names.is_empty() {
            return self.allowed_tool_names.contains(tool_name);
        }
        true
    }

    /// Keep only the tools that pass the filter, preserving order.
    pub fn apply(&self, tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
        if self.is_empty() {
            return tools;
        }
        tools.into_iter().filter(|t| self.allows(&t.name)).collect()
    }
}
