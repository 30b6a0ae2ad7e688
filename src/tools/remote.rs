//! Remote tool-protocol client: a long-lived subprocess speaking line-delimited JSON-RPC-like
//! messages over stdio (spec §6 "Remote tool protocol").
//!
//! Grounded in `examples/original_source/src/mcp/mcp_client.py`'s `MCPClient` for the
//! connect/list-tools/call-tool lifecycle shape, re-expressed over a hand-rolled
//! line-delimited protocol instead of the official MCP SDK (no such crate is in the pack's
//! dependency stack, and the core only needs `list_tools`/`call_tool`). Process management
//! follows `tokio::process::Command` the way the teacher's worker-pool code spawns and
//! awaits tasks under a timeout in `clients/common.rs`.

use std::error::Error;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

use crate::model::{InputSchema, PropertyType, SchemaProperty, ToolDescriptor};
use crate::tools::protocol::ToolProtocol;

/// Owns the subprocess and multiplexes `list_tools`/`call_tool` requests over its stdio
/// (spec §5 "Shared resources": "a long-lived subprocess; all callers multiplex on it").
pub struct RemoteToolClient {
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    _child: Mutex<Child>,
    next_id: AtomicU64,
}

impl RemoteToolClient {
    /// Spawn `command` with `args` and take ownership of its stdio pipes.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child.stdin.take().ok_or("remote tool process has no stdin pipe")?;
        let stdout = child.stdout.take().ok_or("remote tool process has no stdout pipe")?;

        Ok(Self {
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            _child: Mutex::new(child),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let envelope = json!({"id": id, "method": method, "params": params});
        let mut line = serde_json::to_string(&envelope)?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await?;
        }

        let mut response_line = String::new();
        {
            let mut stdout = self.stdout.lock().await;
            let bytes_read = stdout.read_line(&mut response_line).await?;
            if bytes_read == 0 {
                return Err("remote tool process closed its stdout".into());
            }
        }

        let response: Value = serde_json::from_str(response_line.trim())?;
        if let Some(error) = response.get("error") {
            return Err(format!("remote tool protocol error: {}", error).into());
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| "remote tool response missing 'result' field".into())
    }
}

#[async_trait]
impl ToolProtocol for RemoteToolClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Box<dyn Error + Send + Sync>> {
        let result = self.request("list_tools", json!({})).await?;
        let tools = result.as_array().ok_or("list_tools result is not an array")?;
        Ok(tools.iter().filter_map(parse_tool_descriptor).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let result = self.request("call_tool", json!({"name": name, "arguments": arguments})).await?;

        if let Some(content) = result.get("content").and_then(|c| c.as_array()) {
            let text = content
                .iter()
                .filter_map(|block| block.get("text"))
                .filter_map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            if !text.is_empty() {
                return Ok(Value::String(text));
            }
        }

        Ok(result)
    }
}

fn parse_tool_descriptor(value: &Value) -> Option<ToolDescriptor> {
    let name = value.get("name")?.as_str()?.to_string();
    let description = value.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string();

    let schema_value = value.get("inputSchema").or_else(|| value.get("input_schema"));
    let input_schema = schema_value.map(parse_input_schema).unwrap_or_default();

    Some(ToolDescriptor {
        name,
        description,
        input_schema,
    })
}

fn parse_input_schema(schema: &Value) -> InputSchema {
    let mut input_schema = InputSchema::default();

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        input_schema.required = required.iter().filter_map(|v| v.as_str()).map(str::to_string).collect();
    }

    if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
        for (name, def) in properties {
            let property_type = def
                .get("type")
                .and_then(|v| v.as_str())
                .and_then(PropertyType::parse)
                .unwrap_or(PropertyType::String);

            let mut property = SchemaProperty::new(property_type);
            property.enum_values = def.get("enum").and_then(|v| v.as_array()).map(|a| a.to_vec());
            property.any_of_enum = def.get("anyOf").and_then(|v| v.as_array()).and_then(|variants| {
                let values: Vec<Value> = variants
                    .iter()
                    .filter_map(|v| v.get("enum"))
                    .filter_map(|v| v.as_array())
                    .flat_map(|a| a.to_vec())
                    .collect();
                (!values.is_empty()).then_some(values)
            });
            property.description = def.get("description").and_then(|v| v.as_str()).map(str::to_string);
            property.default = def.get("default").cloned();

            input_schema.properties.insert(name.clone(), property);
        }
    }

    input_schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_descriptor_with_any_of_enum() {
        let raw = json!({
            "name": "createConfluencePage",
            "description": "Create a page",
            "inputSchema": {
                "properties": {
                    "contentFormat": {
                        "anyOf": [{"enum": ["markdown", "storage"]}]
                    }
                },
                "required": ["contentFormat"]
            }
        });
        let descriptor = parse_tool_descriptor(&raw).unwrap();
        let prop = &descriptor.input_schema.properties["contentFormat"];
        assert_eq!(prop.allowed_values().unwrap().len(), 2);
        assert!(descriptor.input_schema.required.contains(&"contentFormat".to_string()));
    }
}
