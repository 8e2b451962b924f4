//! Line-delimited JSON-RPC server.
//!
//! One message per line in, one response per line out. Requests are handled
//! synchronously in arrival order.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::io::{BufRead, Write};
use tracing::{debug, error, info, trace, warn};

use super::types::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    InitializeParams, InitializeResult, ListToolsResult, METHOD_NOT_FOUND, Notification,
    PARSE_ERROR, PROTOCOL_VERSION, Request, RequestId, Response, ServerCapabilities, ServerInfo,
    Tool, ToolsCapability,
};

/// Trait for handling tool calls.
pub trait ToolHandler: Send + Sync {
    /// Returns the list of available tools.
    fn list_tools(&self) -> Vec<Tool>;

    /// Handles a tool call and returns the result. An `Err` is reported to
    /// the client as an error result, not as a protocol error.
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be carried out.
    fn call_tool(&self, name: &str, arguments: Option<serde_json::Value>)
    -> Result<CallToolResult>;
}

/// Server that communicates over a line-oriented byte stream.
pub struct McpServer<H: ToolHandler> {
    handler: H,
    initialized: bool,
}

/// A request that failed before reaching a handler.
struct Rejected {
    code: i64,
    message: String,
}

fn parse_params<T: DeserializeOwned>(
    params: Option<serde_json::Value>,
    method: &str,
) -> Result<T, Rejected> {
    let value = params.ok_or_else(|| Rejected {
        code: INVALID_PARAMS,
        message: format!("Missing {method} params"),
    })?;
    serde_json::from_value(value).map_err(|e| Rejected {
        code: INVALID_PARAMS,
        message: format!("Invalid {method} params: {e}"),
    })
}

impl<H: ToolHandler> McpServer<H> {
    /// Creates a server dispatching tool calls to `handler`.
    pub const fn new(handler: H) -> Self {
        Self {
            handler,
            initialized: false,
        }
    }

    /// Whether the client has completed the `initialize` handshake.
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Runs the server, reading from stdin and writing to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin cannot be read or stdout cannot be written.
    pub fn run(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        self.run_with(stdin.lock(), stdout.lock())
    }

    /// Runs the server over arbitrary streams until `input` is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub fn run_with<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        info!("Server starting, waiting for requests");

        for line in input.lines() {
            let line = line.context("Failed to read request")?;
            if line.trim().is_empty() {
                continue;
            }
            trace!("Received: {line}");

            if let Some(response) = self.handle_line(&line) {
                let response_json = serde_json::to_string(&response)?;
                trace!("Sending: {response_json}");
                writeln!(output, "{response_json}")?;
                output.flush()?;
            }
        }

        info!("Server shutting down (input closed)");
        Ok(())
    }

    /// Handles one raw message. Returns `None` for notifications.
    pub fn handle_line(&mut self, line: &str) -> Option<Response> {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unparseable message: {e}");
                return Some(Response::error(
                    RequestId::Null,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        if value.get("id").is_none() {
            match serde_json::from_value::<Notification>(value) {
                Ok(notification) => self.handle_notification(&notification),
                Err(e) => warn!("Ignoring malformed notification: {e}"),
            }
            return None;
        }

        let request = match serde_json::from_value::<Request>(value.clone()) {
            Ok(request) => request,
            Err(e) => {
                let id = value
                    .get("id")
                    .and_then(|id| serde_json::from_value(id.clone()).ok())
                    .unwrap_or(RequestId::Null);
                return Some(Response::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                ));
            }
        };

        let id = request.id.clone();
        match self.handle_request(request) {
            Ok(response) => Some(response),
            Err(e) => {
                error!("Error handling request: {e:#}");
                Some(Response::error(id, INTERNAL_ERROR, e.to_string()))
            }
        }
    }

    fn handle_request(&mut self, request: Request) -> Result<Response> {
        debug!("Handling request: {} (id={:?})", request.method, request.id);

        let outcome = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params),
            "ping" => Ok(serde_json::json!({})),
            _ => {
                warn!("Unknown method: {}", request.method);
                Err(Rejected {
                    code: METHOD_NOT_FOUND,
                    message: format!("Unknown method: {}", request.method),
                })
            }
        };

        match outcome {
            Ok(result) => Ok(Response::success(request.id, result)?),
            Err(rejected) => Ok(Response::error(
                request.id,
                rejected.code,
                rejected.message,
            )),
        }
    }

    fn handle_notification(&self, notification: &Notification) {
        debug!("Handling notification: {}", notification.method);

        match notification.method.as_str() {
            "notifications/initialized" => info!("Client ready"),
            "notifications/cancelled" => debug!("Request cancelled"),
            _ => debug!("Ignoring unknown notification: {}", notification.method),
        }
    }

    fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, Rejected> {
        let params: InitializeParams = parse_params(params, "initialize")?;

        info!(
            "Client connecting: {} v{}",
            params.client_info.name,
            params.client_info.version.as_deref().unwrap_or("unknown")
        );
        info!("Protocol version: {}", params.protocol_version);
        self.initialized = true;

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: None }),
            },
            server_info: ServerInfo {
                name: "flow-studio".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            instructions: Some(
                "Paths passed to file tools are resolved inside the project root; \
                 anything outside it is refused."
                    .to_string(),
            ),
        };
        to_value(&result)
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, Rejected> {
        let tools = self.handler.list_tools();
        debug!("Listing {} tools", tools.len());
        to_value(&ListToolsResult { tools })
    }

    fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, Rejected> {
        let params: CallToolParams = parse_params(params, "tools/call")?;
        debug!("Calling tool: {}", params.name);

        let result = match self.handler.call_tool(&params.name, params.arguments) {
            Ok(result) => result,
            Err(e) => {
                error!("Tool call failed: {e:#}");
                CallToolResult::error(e.to_string())
            }
        };
        to_value(&result)
    }
}

fn to_value(value: &impl serde::Serialize) -> Result<serde_json::Value, Rejected> {
    serde_json::to_value(value).map_err(|e| Rejected {
        code: INTERNAL_ERROR,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::{Value, json};

    struct TestHandler;

    impl ToolHandler for TestHandler {
        fn list_tools(&self) -> Vec<Tool> {
            vec![Tool {
                name: "echo".to_string(),
                description: Some("Echo the input".to_string()),
                input_schema: json!({"type": "object", "properties": {}}),
            }]
        }

        fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
            match name {
                "echo" => Ok(CallToolResult::text(
                    arguments.unwrap_or(Value::Null).to_string(),
                )),
                _ => Err(anyhow!("Unknown tool: {name}")),
            }
        }
    }

    fn call(server: &mut McpServer<TestHandler>, message: &Value) -> Result<Value> {
        let response = server
            .handle_line(&message.to_string())
            .ok_or_else(|| anyhow!("no response"))?;
        Ok(serde_json::to_value(response)?)
    }

    #[test]
    fn test_handle_initialize() -> Result<()> {
        let mut server = McpServer::new(TestHandler);
        let response = call(
            &mut server,
            &json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "1.0.0"}
                }
            }),
        )?;
        assert_eq!(response["result"]["serverInfo"]["name"], "flow-studio");
        assert!(server.is_initialized());
        Ok(())
    }

    #[test]
    fn test_initialize_without_params_is_invalid_params() -> Result<()> {
        let mut server = McpServer::new(TestHandler);
        let response = call(
            &mut server,
            &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
        )?;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert!(!server.is_initialized());
        Ok(())
    }

    #[test]
    fn test_handle_tools_list() -> Result<()> {
        let mut server = McpServer::new(TestHandler);
        let response = call(
            &mut server,
            &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )?;
        assert_eq!(response["result"]["tools"][0]["name"], "echo");
        Ok(())
    }

    #[test]
    fn test_tool_error_is_a_result() -> Result<()> {
        let mut server = McpServer::new(TestHandler);
        let response = call(
            &mut server,
            &json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "nope"}}),
        )?;
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        Ok(())
    }

    #[test]
    fn test_unknown_method() -> Result<()> {
        let mut server = McpServer::new(TestHandler);
        let response = call(
            &mut server,
            &json!({"jsonrpc": "2.0", "id": "x", "method": "unknown/method"}),
        )?;
        assert_eq!(response["id"], "x");
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
        Ok(())
    }

    #[test]
    fn test_garbage_is_parse_error() -> Result<()> {
        let mut server = McpServer::new(TestHandler);
        let response = server
            .handle_line("{not json")
            .ok_or_else(|| anyhow!("no response"))?;
        assert_eq!(response.id, RequestId::Null);
        assert_eq!(response.error.map(|e| e.code), Some(PARSE_ERROR));
        Ok(())
    }

    #[test]
    fn test_notification_has_no_response() {
        let mut server = McpServer::new(TestHandler);
        let line = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(server.handle_line(line).is_none());
    }

    #[test]
    fn test_run_with_streams() -> Result<()> {
        let mut server = McpServer::new(TestHandler);
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"a":1}}}"#,
            "\n",
        );
        let mut output = Vec::new();
        server.run_with(input.as_bytes(), &mut output)?;

        let lines: Vec<Value> = String::from_utf8(output)?
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["result"]["content"][0]["text"], r#"{"a":1}"#);
        Ok(())
    }
}
