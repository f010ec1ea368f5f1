use log::debug;
use serde_json::{json, Value};

use crate::db::{Executor, Row};
use crate::error::GatewayError;
use crate::rpc::{TextContent, Tool};

/// The closed set of tools this server dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    ReadQuery,
    ListTables,
    DescribeTable,
    WriteQuery,
    CreateTable,
}

impl ToolName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "read-query" => Some(ToolName::ReadQuery),
            "list-tables" => Some(ToolName::ListTables),
            "describe-table" => Some(ToolName::DescribeTable),
            "write-query" => Some(ToolName::WriteQuery),
            "create-table" => Some(ToolName::CreateTable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ReadQuery => "read-query",
            ToolName::ListTables => "list-tables",
            ToolName::DescribeTable => "describe-table",
            ToolName::WriteQuery => "write-query",
            ToolName::CreateTable => "create-table",
        }
    }

    pub fn mutating(self) -> bool {
        matches!(self, ToolName::WriteQuery | ToolName::CreateTable)
    }
}

/// The advertised catalog. The mutating tools appear only when the server is
/// not read-only; the catalog never changes after startup.
pub fn catalog(readonly: bool) -> Vec<Tool> {
    let mut tools = vec![
        Tool {
            name: "read-query".to_string(),
            description: "Execute a SELECT query on the StarRocks database".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "SELECT SQL query to execute"
                    }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: "list-tables".to_string(),
            description: "List all tables in the StarRocks database".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "describe-table".to_string(),
            description: "Describe the schema of a specific table in the StarRocks database"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to describe"
                    }
                },
                "required": ["table_name"]
            }),
        },
    ];

    if !readonly {
        tools.push(Tool {
            name: "write-query".to_string(),
            description: "Execute an INSERT, UPDATE, or DELETE query on the StarRocks database"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "SQL query to execute"
                    }
                },
                "required": ["query"]
            }),
        });
        tools.push(Tool {
            name: "create-table".to_string(),
            description: "Create a new table in the StarRocks database".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "CREATE TABLE SQL query to execute"
                    }
                },
                "required": ["query"]
            }),
        });
    }

    tools
}

/// Validates and dispatches tool invocations against the database executor.
/// The read-only flag and catalog are fixed at construction.
pub struct Gateway<E> {
    executor: E,
    readonly: bool,
}

impl<E: Executor> Gateway<E> {
    pub fn new(executor: E, readonly: bool) -> Self {
        Gateway { executor, readonly }
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        catalog(self.readonly)
    }

    /// Runs one tool invocation to completion. Every failure comes back as
    /// `Err`; the transport boundary renders it as an `Error: ...` text block
    /// so the channel stays open.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<Vec<TextContent>, GatewayError> {
        let tool = ToolName::parse(name)
            .ok_or_else(|| GatewayError::Validation(format!("Unknown tool: {name}")))?;

        // Policy comes before argument validation: a mutating call in
        // read-only mode is rejected even when its arguments are malformed.
        if tool.mutating() && self.readonly {
            return Err(GatewayError::Policy(
                "Server is running in read-only mode".to_string(),
            ));
        }

        debug!("Dispatching tool {}", tool.as_str());
        match tool {
            ToolName::ListTables => {
                let rows = self.executor.execute("SHOW TABLES", &[]).await?;
                Ok(vec![TextContent::new(render_rows(&rows))])
            }
            ToolName::ReadQuery => {
                let query = require_string(arguments, "query")?;
                if !query.trim_start().to_uppercase().starts_with("SELECT") {
                    return Err(GatewayError::Validation(
                        "Only SELECT queries are allowed for read-query".to_string(),
                    ));
                }
                let rows = self.executor.execute(query, &[]).await?;
                Ok(vec![TextContent::new(render_rows(&rows))])
            }
            ToolName::DescribeTable => {
                let table_name = require_string(arguments, "table_name")?;
                // The table name lands in the statement text, not a bind
                // parameter, so it must pass the identifier allow-list.
                if !crate::db::is_valid_identifier(table_name) {
                    return Err(GatewayError::Validation(format!(
                        "Invalid table name '{table_name}': must contain only alphanumeric characters and underscores"
                    )));
                }
                let statement = format!("DESCRIBE `{table_name}`");
                let rows = self.executor.execute(&statement, &[]).await?;
                Ok(vec![TextContent::new(render_rows(&rows))])
            }
            ToolName::WriteQuery => {
                let query = require_string(arguments, "query")?;
                let rows = self.executor.execute(query, &[]).await?;
                Ok(vec![TextContent::new(render_rows(&rows))])
            }
            ToolName::CreateTable => {
                let query = require_string(arguments, "query")?;
                self.executor.execute(query, &[]).await?;
                Ok(vec![TextContent::new("Table created successfully.")])
            }
        }
    }
}

fn require_string<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, GatewayError> {
    let value = arguments
        .get(key)
        .ok_or_else(|| GatewayError::Validation(format!("Missing required argument: {key}")))?;
    let s = value
        .as_str()
        .ok_or_else(|| GatewayError::Validation(format!("Argument '{key}' must be a string")))?;
    if s.trim().is_empty() {
        return Err(GatewayError::Validation(format!(
            "Argument '{key}' must not be empty"
        )));
    }
    Ok(s)
}

/// Renders a whole result set as one text block: a compact JSON array of
/// row tuples, `[]` when empty. No column headers or type metadata.
fn render_rows(rows: &[Row]) -> String {
    serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string())
}
