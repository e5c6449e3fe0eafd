//! Demo tools wired into the example agents.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::framework::{FunctionTool, Tool};

pub const LOOKUP_COMPANY_TOOL_NAME: &str = "lookup_company_name";
pub const ADD_NUMBERS_TOOL_NAME: &str = "add_numbers";
pub const SEND_NOTIFICATION_TOOL_NAME: &str = "send_notification";

/// Company directory lookup. Every id resolves to the same fictional
/// company so responses can be checked for a name no model would guess.
pub struct CompanyLookupTool;

impl CompanyLookupTool {
    pub const COMPANY_NAME: &'static str = "Nexxia";

    pub fn new() -> Self {
        Self
    }
}

impl Default for CompanyLookupTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CompanyLookupTool {
    fn name(&self) -> &str {
        LOOKUP_COMPANY_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Looks up the registered company name for a company id. Args: company_id (required)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "company_id": { "type": "string", "description": "Company identifier" }
            },
            "required": ["company_id"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let company_id = match args.get("company_id") {
            Some(Value::String(id)) => id.trim().to_string(),
            Some(other) => other.to_string(),
            None => return Err(anyhow::anyhow!("company_id is required")),
        };
        Ok(json!({
            "company_id": company_id,
            "company_name": Self::COMPANY_NAME
        }))
    }
}

pub fn lookup_company_tool() -> Arc<dyn Tool> {
    Arc::new(CompanyLookupTool::new())
}

pub fn add_numbers_tool() -> Arc<dyn Tool> {
    FunctionTool::new(
        ADD_NUMBERS_TOOL_NAME,
        "Adds two numbers. Args: a (required), b (required).",
        |args| async move {
            let a = number_arg(&args, "a")?;
            let b = number_arg(&args, "b")?;
            Ok(json!({ "sum": a + b }))
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "a": { "type": "number" },
            "b": { "type": "number" }
        },
        "required": ["a", "b"]
    }))
    .into_arc()
}

/// Side-effecting tool gated behind approval.
pub fn send_notification_tool() -> Arc<dyn Tool> {
    FunctionTool::new(
        SEND_NOTIFICATION_TOOL_NAME,
        "Sends a notification message to a recipient. Args: recipient (required), message (required).",
        |args| async move {
            let recipient = args
                .get("recipient")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            tracing::info!(recipient = %recipient, "notification sent");
            Ok(json!({ "status": "sent", "recipient": recipient }))
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "recipient": { "type": "string" },
            "message": { "type": "string" }
        },
        "required": ["recipient", "message"]
    }))
    .requiring_approval()
    .into_arc()
}

fn number_arg(args: &Value, key: &str) -> Result<f64> {
    match args.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("'{key}' is not a finite number")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("'{key}' must be a number, got '{s}'")),
        _ => Err(anyhow::anyhow!("'{key}' is required")),
    }
}
