use log::{debug, error, info, warn};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Args;
use crate::db::{Database, Executor};
use crate::rpc::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo,
    TextContent, ToolCallParams, ToolsCapability, ToolsList,
};
use crate::tools::Gateway;

pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("MCP StarRocks Server starting");
    info!(
        "Server config: host={}, port={}, user={}, database={}, readonly={}",
        args.host, args.port, args.user, args.database, args.readonly
    );
    info!("Server PID: {}", std::process::id());

    // Unreachable database or bad credentials abort here, before the serving
    // loop ever reads a request.
    let database = Database::connect(&args).await?;
    let gateway = Gateway::new(database, args.readonly);

    serve(&gateway).await;

    info!("MCP StarRocks Server shutdown complete");
    Ok(())
}

async fn serve<E: Executor>(gateway: &Gateway<E>) {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();

    info!("StarRocks MCP Server running with stdio transport");

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }

                debug!("Received message (len={}): {}", line.len(), line);
                match serde_json::from_str::<JsonRpcRequest>(&line) {
                    Ok(request) => {
                        debug!("Parsed request: method={}, id={:?}", request.method, request.id);
                        // Notifications need no response
                        if request.method == "notifications/initialized"
                            || request.method == "initialized"
                        {
                            debug!("Received initialization notification: {}", request.method);
                            continue;
                        }

                        let response = handle_request(gateway, request).await;
                        match serde_json::to_string(&response) {
                            Ok(response_str) => {
                                if let Err(e) = write_response(&mut stdout, &response_str).await {
                                    error!("Failed to write response: {e}");
                                }
                            }
                            Err(e) => {
                                error!("Failed to serialize response: {e}");
                                let error_response = JsonRpcResponse::error(
                                    None,
                                    -32603,
                                    "Internal error".to_string(),
                                );
                                if let Ok(error_str) = serde_json::to_string(&error_response) {
                                    let _ = write_response(&mut stdout, &error_str).await;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse request: {e}");
                        let error_response =
                            JsonRpcResponse::error(None, -32700, "Parse error".to_string());
                        if let Ok(response_str) = serde_json::to_string(&error_response) {
                            let _ = write_response(&mut stdout, &response_str).await;
                        }
                    }
                }
            }
            Ok(None) => {
                info!("stdin closed - client disconnected, shutting down server");
                break;
            }
            Err(e) => {
                warn!("Error reading from stdin: {e} (error kind: {:?})", e.kind());
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    info!("Unexpected EOF - client may have terminated");
                    break;
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        }
    }
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    response: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    stdout.write_all(response.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

async fn handle_request<E: Executor>(
    gateway: &Gateway<E>,
    request: JsonRpcRequest,
) -> JsonRpcResponse {
    match request.method.as_str() {
        "initialize" => {
            debug!("Handling initialize request");
            JsonRpcResponse::success(
                request.id,
                json!(InitializeResult {
                    protocol_version: "2025-03-26".to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability {
                            // The catalog is fixed at startup.
                            list_changed: false,
                        }),
                    },
                    server_info: ServerInfo {
                        name: env!("CARGO_PKG_NAME").to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                }),
            )
        }
        "tools/list" => {
            debug!("Listing available tools");
            JsonRpcResponse::success(
                request.id,
                json!(ToolsList {
                    tools: gateway.list_tools()
                }),
            )
        }
        "tools/call" => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return JsonRpcResponse::error(
                        request.id,
                        -32602,
                        "Missing parameters".to_string(),
                    );
                }
            };
            let tool_params: ToolCallParams = match serde_json::from_value(params) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(
                        request.id,
                        -32602,
                        format!("Invalid tool call parameters: {e}"),
                    );
                }
            };

            debug!("Handling tool call: {}", tool_params.name);
            let content = match gateway
                .call_tool(&tool_params.name, &tool_params.arguments)
                .await
            {
                Ok(content) => content,
                Err(e) => {
                    // Reported as a normal response so the channel stays
                    // open for further requests.
                    warn!("Tool call '{}' failed: {e}", tool_params.name);
                    vec![TextContent::new(format!("Error: {e}"))]
                }
            };
            JsonRpcResponse::success(request.id, json!({ "content": content }))
        }
        _ => {
            warn!("Unknown method: {}", request.method);
            JsonRpcResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Row;
    use crate::error::GatewayError;
    use async_trait::async_trait;
    use serde_json::Value;

    struct EmptyExecutor;

    #[async_trait]
    impl Executor for EmptyExecutor {
        async fn execute(
            &self,
            _statement: &str,
            _parameters: &[Value],
        ) -> Result<Vec<Row>, GatewayError> {
            Ok(vec![])
        }
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let gateway = Gateway::new(EmptyExecutor, false);
        let response = handle_request(&gateway, request("initialize", None)).await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], json!("2025-03-26"));
        assert_eq!(result["serverInfo"]["name"], json!("mcp-server-starrocks"));
        assert_eq!(result["capabilities"]["tools"]["listChanged"], json!(false));
    }

    #[tokio::test]
    async fn tools_list_respects_readonly() {
        let gateway = Gateway::new(EmptyExecutor, true);
        let response = handle_request(&gateway, request("tools/list", None)).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 3);
    }

    #[tokio::test]
    async fn failed_tool_call_is_a_result_not_a_protocol_error() {
        let gateway = Gateway::new(EmptyExecutor, false);
        let response = handle_request(
            &gateway,
            request("tools/call", Some(json!({"name": "unknown-tool", "arguments": {}}))),
        )
        .await;
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(
            result["content"][0]["text"],
            json!("Error: Unknown tool: unknown-tool")
        );
    }

    #[tokio::test]
    async fn successful_tool_call_returns_content_blocks() {
        let gateway = Gateway::new(EmptyExecutor, false);
        let response = handle_request(
            &gateway,
            request(
                "tools/call",
                Some(json!({"name": "read-query", "arguments": {"query": "SELECT 1"}})),
            ),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["type"], json!("text"));
        assert_eq!(result["content"][0]["text"], json!("[]"));
    }

    #[tokio::test]
    async fn malformed_tool_call_params_are_invalid_params() {
        let gateway = Gateway::new(EmptyExecutor, false);

        let response = handle_request(&gateway, request("tools/call", None)).await;
        assert_eq!(response.error.unwrap().code, -32602);

        let response = handle_request(
            &gateway,
            request("tools/call", Some(json!({"arguments": {}}))),
        )
        .await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let gateway = Gateway::new(EmptyExecutor, false);
        let response = handle_request(&gateway, request("resources/list", None)).await;
        assert_eq!(response.error.unwrap().code, -32601);
    }
}
