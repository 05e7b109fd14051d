//! Calculator toolkit.
//!
//! Integer arithmetic exposed to the model: `add`, `multiply` and `divide`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::tool::{Tool, ToolRegistry};

/// Create a calculator toolkit with the three arithmetic tools.
pub fn calculator_toolkit() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(AddTool);
    registry.register(MultiplyTool);
    registry.register(DivideTool);
    registry
}

struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add a and b."
    }

    fn parameters(&self) -> Option<Value> {
        Some(pair_schema("first int", "second int"))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let (a, b) = operands(&input, "add")?;
        let sum = a
            .checked_add(b)
            .ok_or_else(|| AgentError::Protocol(format!("add overflowed for {a} + {b}")))?;
        Ok(json!(sum))
    }
}

struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply a and b."
    }

    fn parameters(&self) -> Option<Value> {
        Some(pair_schema("first int", "second int"))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let (a, b) = operands(&input, "multiply")?;
        let product = a
            .checked_mul(b)
            .ok_or_else(|| AgentError::Protocol(format!("multiply overflowed for {a} * {b}")))?;
        Ok(json!(product))
    }
}

struct DivideTool;

#[async_trait]
impl Tool for DivideTool {
    fn name(&self) -> &str {
        "divide"
    }

    fn description(&self) -> &str {
        "Divide a by b."
    }

    fn parameters(&self) -> Option<Value> {
        Some(pair_schema("dividend int", "divisor int"))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let (a, b) = operands(&input, "divide")?;
        if b == 0 {
            return Err(AgentError::Protocol("division by zero".into()));
        }
        Ok(json!(a as f64 / b as f64))
    }
}

fn pair_schema(a: &str, b: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "integer", "description": a},
            "b": {"type": "integer", "description": b},
        },
        "required": ["a", "b"],
    })
}

fn operands(input: &Value, tool_name: &str) -> Result<(i64, i64)> {
    Ok((
        integer(input, "a", tool_name)?,
        integer(input, "b", tool_name)?,
    ))
}

fn integer(input: &Value, field: &str, tool_name: &str) -> Result<i64> {
    input
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| AgentError::Protocol(format!("missing integer `{field}` for {tool_name}")))
}
