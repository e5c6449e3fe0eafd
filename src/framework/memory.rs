//! Shared note store attached to agents that should remember across runs.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use serde_json::{Value, json};

use super::tool::{FunctionTool, Tool};

pub const SAVE_MEMORY_TOOL_NAME: &str = "save_memory";

#[derive(Debug, Clone, Default)]
pub struct Memory {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.trim().to_string(), value.trim().to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key.trim())
            .cloned()
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Memory block injected into model requests; `None` when empty.
    pub fn render(&self) -> Option<String> {
        let entries = self.entries();
        if entries.is_empty() {
            return None;
        }
        Some(format!(
            "Saved memory:\n{}",
            entries
                .iter()
                .map(|(key, value)| format!("- {key}: {value}"))
                .collect::<Vec<String>>()
                .join("\n")
        ))
    }

    /// Tool that lets the agent write into this memory.
    pub fn save_tool(&self) -> std::sync::Arc<dyn Tool> {
        let memory = self.clone();
        FunctionTool::new(
            SAVE_MEMORY_TOOL_NAME,
            "Saves a fact for later runs. Args: key (required), value (required).",
            move |args| {
                let memory = memory.clone();
                async move { save_memory_response(&memory, &args) }
            },
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Short name of the fact" },
                "value": { "type": "string", "description": "Fact to remember" }
            },
            "required": ["key", "value"]
        }))
        .into_arc()
    }
}

fn save_memory_response(memory: &Memory, args: &Value) -> Result<Value> {
    let key = args
        .get("key")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow::anyhow!("save_memory requires a non-empty 'key'"))?;
    let value = args
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("save_memory requires a 'value'"))?;
    memory.save(key, value);
    tracing::debug!(key = %key, "memory entry saved");
    Ok(json!({ "status": "saved", "key": key }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_tool_writes_into_shared_memory() {
        let memory = Memory::new();
        let tool = memory.save_tool();
        let out = tool
            .call(json!({"key": "colour", "value": "blue"}))
            .await
            .expect("save should succeed");
        assert_eq!(out["status"], "saved");
        assert_eq!(memory.clone().get("colour").as_deref(), Some("blue"));
    }

    #[tokio::test]
    async fn save_tool_rejects_missing_key() {
        let memory = Memory::new();
        let err = memory
            .save_tool()
            .call(json!({"value": "blue"}))
            .await
            .expect_err("missing key should fail");
        assert!(err.to_string().contains("key"));
        assert!(memory.is_empty());
    }

    #[test]
    fn render_lists_entries_in_key_order() {
        let memory = Memory::new();
        assert!(memory.render().is_none());
        memory.save("b", "two");
        memory.save("a", "one");
        assert_eq!(
            memory.render().as_deref(),
            Some("Saved memory:\n- a: one\n- b: two")
        );
        memory.clear();
        assert!(memory.is_empty());
    }
}
