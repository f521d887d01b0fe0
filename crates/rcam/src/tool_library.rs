use crate::types::Cutter;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Resolves an operation's tool reference to a cutter shape.
///
/// A negative id means no tool is assigned.
pub trait ToolResolver {
    fn resolve(&self, tool_id: i64) -> Option<Cutter>;
}

/// An in-memory collection of cutters, referenced by index.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolLibrary {
    pub tools: Vec<Cutter>,
}

impl ToolLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Append a new tool, returning its id.
    pub fn add_tool(&mut self, tool: Cutter) -> i64 {
        self.tools.push(tool);
        self.tools.len() as i64 - 1
    }

    /// Update an existing tool at the provided index.
    pub fn update_tool(&mut self, index: usize, tool: Cutter) -> Result<()> {
        let slot = self
            .tools
            .get_mut(index)
            .ok_or_else(|| anyhow!("invalid tool index {index}"))?;
        *slot = tool;
        Ok(())
    }

    /// Remove a tool at the provided index.
    pub fn remove_tool(&mut self, index: usize) -> Result<Cutter> {
        if index >= self.tools.len() {
            return Err(anyhow!("invalid tool index {index}"));
        }
        Ok(self.tools.remove(index))
    }
}

impl ToolResolver for ToolLibrary {
    fn resolve(&self, tool_id: i64) -> Option<Cutter> {
        let index = usize::try_from(tool_id).ok()?;
        self.tools.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CutterKind;

    #[test]
    fn test_resolve_by_index() {
        let mut library = ToolLibrary::new();
        let id = library.add_tool(Cutter::new(CutterKind::Ball, 3.0));
        assert_eq!(id, 0);
        assert_eq!(library.resolve(0).map(|c| c.kind), Some(CutterKind::Ball));
        assert!(library.resolve(-1).is_none(), "negative ids are unassigned");
        assert!(library.resolve(1).is_none());
    }

    #[test]
    fn test_update_and_remove_check_index() {
        let mut library = ToolLibrary::new();
        library.add_tool(Cutter::default());
        assert!(library.update_tool(3, Cutter::default()).is_err());
        library
            .update_tool(0, Cutter::new(CutterKind::Drill, 5.0))
            .expect("update tool");
        assert_eq!(library.tools[0].diameter, 5.0);
        assert!(library.remove_tool(1).is_err());
        assert_eq!(library.remove_tool(0).expect("remove tool").kind, CutterKind::Drill);
        assert!(library.tools.is_empty());
    }
}
