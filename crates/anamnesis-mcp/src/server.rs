//! MCP server core (C18, §6.2): routes the three JSON-RPC methods a
//! client drives (`initialize`, `tools/list`, `tools/call`) to the
//! three service operations `anamnesis-core` exposes — Write, Recall,
//! Manage — each surfaced as one MCP tool.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use anamnesis_core::manage::{ManageOptions, ManageResult};
use anamnesis_core::read::{MemoryReader, RecallArgs, RecallResult};
use anamnesis_core::write::{MemoryWriter, WriteMetadata, WriteResult};
use anamnesis_core::MemoryError;

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};

/// Argument shape for the `write` tool: `anamnesis_core::write::MemoryWriter::write`
/// takes content and metadata as separate parameters, so the tool call
/// carries both in one JSON object.
#[derive(Debug, Deserialize)]
struct WriteToolArgs {
    content: String,
    #[serde(default)]
    metadata: WriteMetadata,
}

/// MCP server implementation: one `McpServer` per stdio connection,
/// wrapping the three long-lived service objects plus the admission
/// semaphore (§5's `MaxConcurrentRequests`).
pub struct McpServer {
    writer: Arc<MemoryWriter>,
    reader: Arc<MemoryReader>,
    manager: Arc<anamnesis_core::manage::MemoryManager>,
    admission: Arc<Semaphore>,
    initialized: bool,
}

impl McpServer {
    pub fn new(
        writer: Arc<MemoryWriter>,
        reader: Arc<MemoryReader>,
        manager: Arc<anamnesis_core::manage::MemoryManager>,
        admission: Arc<Semaphore>,
    ) -> Self {
        Self {
            writer,
            reader,
            manager,
            admission,
            initialized: false,
        }
    }

    fn tool_descriptions() -> Vec<ToolDescription> {
        vec![
            ToolDescription {
                name: "write".into(),
                description: "Ingest free-form text: chunk it, extract entities and claims, resolve entities against existing memory, and persist across the vector, graph and keyword stores with provenance.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "content": {"type": "string"},
                        "metadata": {
                            "type": "object",
                            "properties": {
                                "source": {"type": "string"},
                                "userId": {"type": "string"},
                                "tags": {"type": "array", "items": {"type": "string"}},
                                "confidence": {"type": "number"},
                                "requireEvidence": {"type": "boolean"}
                            },
                            "required": ["source"]
                        }
                    },
                    "required": ["content", "metadata"]
                }),
            },
            ToolDescription {
                name: "recall".into(),
                description: "Answer a natural-language query by fanning out across the vector, keyword and graph retrievers, fusing with reciprocal rank fusion, and re-ranking on relevance/freshness/authority/quality/diversity/personalization.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "maxResults": {"type": "integer"},
                        "timeBudgetMs": {"type": "integer"},
                        "filters": {"type": "object"},
                        "includeGraph": {"type": "boolean"},
                        "minConfidence": {"type": "number"}
                    },
                    "required": ["query"]
                }),
            },
            ToolDescription {
                name: "manage".into(),
                description: "Apply a lifecycle operation (pin, forget, decay, merge) to a batch of previously written memory ids.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "operation": {"type": "string", "enum": ["pin", "forget", "decay", "merge"]},
                        "memoryIds": {"type": "array", "items": {"type": "string"}},
                        "ttlMs": {"type": "integer"},
                        "force": {"type": "boolean"},
                        "dryRun": {"type": "boolean"},
                        "batchSize": {"type": "integer"}
                    },
                    "required": ["operation", "memoryIds"]
                }),
            },
        ]
    }

    /// Dispatches one JSON-RPC request. Returns `None` for
    /// notifications, which carry no response.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "handling request");

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!(method = %request.method, "rejecting request: server not initialized");
            return Some(JsonRpcResponse::error(request.id, JsonRpcError::server_not_initialized()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => Ok(serde_json::to_value(ListToolsResult { tools: Self::tool_descriptions() }).unwrap()),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!(method, "unknown method");
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e),
        })
    }

    fn handle_initialize(&mut self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        info!(client_protocol_version = %request.protocol_version, "initializing");
        self.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo {
                name: "anamnesis-mcp".into(),
                version: anamnesis_core::VERSION.to_string(),
            },
        };
        Ok(serde_json::to_value(result).unwrap())
    }

    async fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("tools/call requires params")),
        };

        // §5's admission semaphore: reject rather than queue indefinitely.
        let _permit = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return Err(JsonRpcError::overloaded()),
        };

        let result = match request.name.as_str() {
            "write" => self.call_write(request.arguments).await,
            "recall" => self.call_recall(request.arguments).await,
            "manage" => self.call_manage(request.arguments).await,
            other => return Err(JsonRpcError::method_not_found_with_message(&format!("unknown tool '{other}'"))),
        };

        Ok(serde_json::to_value(result).unwrap())
    }

    async fn call_write(&self, args: serde_json::Value) -> CallToolResult {
        let parsed: WriteToolArgs = match serde_json::from_value(args) {
            Ok(p) => p,
            Err(e) => return CallToolResult::error(format!("invalid write arguments: {e}")),
        };

        match self.writer.write(&parsed.content, parsed.metadata).await {
            Ok(result) => CallToolResult::ok(&result as &WriteResult),
            Err(e) => CallToolResult::error(format_error(&e)),
        }
    }

    async fn call_recall(&self, args: serde_json::Value) -> CallToolResult {
        let parsed: RecallArgs = match serde_json::from_value(args) {
            Ok(p) => p,
            Err(e) => return CallToolResult::error(format!("invalid recall arguments: {e}")),
        };

        match self.reader.recall(parsed).await {
            Ok(result) => CallToolResult::ok(&result as &RecallResult),
            Err(e) => CallToolResult::error(format_error(&e)),
        }
    }

    async fn call_manage(&self, args: serde_json::Value) -> CallToolResult {
        let parsed: ManageOptions = match serde_json::from_value(args) {
            Ok(p) => p,
            Err(e) => return CallToolResult::error(format!("invalid manage arguments: {e}")),
        };

        match self.manager.manage(parsed).await {
            Ok(result) => CallToolResult::ok(&result as &ManageResult),
            Err(e) => CallToolResult::error(format_error(&e)),
        }
    }
}

fn format_error(e: &MemoryError) -> String {
    e.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_core::config::AnamnesisConfig;
    use anamnesis_core::embed::{Embedder, HashEmbedder};
    use anamnesis_core::manage::MemoryManager;
    use anamnesis_core::stores::{InMemoryGraphStore, InMemorySearchIndex, InMemoryVectorStore};

    fn build_server() -> McpServer {
        let config = AnamnesisConfig::default();
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let graph_store = Arc::new(InMemoryGraphStore::new());
        let search_index = Arc::new(InMemorySearchIndex::new());

        let writer = Arc::new(
            MemoryWriter::new(
                config.memory_writer.clone(),
                config.content_processor.clone(),
                config.entity_resolver.clone(),
                embedder.clone(),
                vector_store.clone(),
                graph_store.clone(),
                search_index.clone(),
            )
            .unwrap(),
        );
        let reader = Arc::new(MemoryReader::new(config.clone(), embedder, vector_store.clone(), graph_store.clone(), search_index.clone()));
        let manager = Arc::new(MemoryManager::new(vector_store, graph_store, search_index));
        let admission = Arc::new(Semaphore::new(config.service.max_concurrent_requests));

        McpServer::new(writer, reader, manager, admission)
    }

    fn request(method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(serde_json::json!(1)),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn requests_before_initialize_are_rejected() {
        let mut server = build_server();
        let response = server.handle_request(request("tools/list", None)).await.unwrap();
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32003);
    }

    #[tokio::test]
    async fn initialize_then_list_tools_succeeds() {
        let mut server = build_server();
        let init = server.handle_request(request("initialize", None)).await.unwrap();
        assert!(init.result.is_some());

        let listed = server.handle_request(request("tools/list", None)).await.unwrap();
        let result = listed.result.unwrap();
        let tools = result.get("tools").unwrap().as_array().unwrap();
        assert_eq!(tools.len(), 3);
    }

    #[tokio::test]
    async fn write_then_recall_round_trip() {
        let mut server = build_server();
        server.handle_request(request("initialize", None)).await;

        let write_params = serde_json::json!({
            "name": "write",
            "arguments": {
                "content": "Dr. Smith works at Acme Inc.",
                "metadata": {"source": "test", "confidence": 0.9}
            }
        });
        let write_resp = server.handle_request(request("tools/call", Some(write_params))).await.unwrap();
        assert!(write_resp.result.is_some());
        let write_result = write_resp.result.unwrap();
        assert_eq!(write_result.get("isError").unwrap(), false);

        let recall_params = serde_json::json!({
            "name": "recall",
            "arguments": {"query": "Smith"}
        });
        let recall_resp = server.handle_request(request("tools/call", Some(recall_params))).await.unwrap();
        let recall_result = recall_resp.result.unwrap();
        assert_eq!(recall_result.get("isError").unwrap(), false);
    }

    #[tokio::test]
    async fn unknown_tool_reports_error_content_not_protocol_error() {
        let mut server = build_server();
        server.handle_request(request("initialize", None)).await;

        let params = serde_json::json!({"name": "nonexistent", "arguments": {}});
        let response = server.handle_request(request("tools/call", Some(params))).await.unwrap();
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn admission_semaphore_rejects_past_capacity() {
        let mut config = AnamnesisConfig::default();
        config.service.max_concurrent_requests = 0;
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let graph_store = Arc::new(InMemoryGraphStore::new());
        let search_index = Arc::new(InMemorySearchIndex::new());
        let writer = Arc::new(
            MemoryWriter::new(
                config.memory_writer.clone(),
                config.content_processor.clone(),
                config.entity_resolver.clone(),
                embedder.clone(),
                vector_store.clone(),
                graph_store.clone(),
                search_index.clone(),
            )
            .unwrap(),
        );
        let reader = Arc::new(MemoryReader::new(config.clone(), embedder, vector_store.clone(), graph_store.clone(), search_index.clone()));
        let manager = Arc::new(MemoryManager::new(vector_store, graph_store, search_index));
        let admission = Arc::new(Semaphore::new(0));
        let mut server = McpServer::new(writer, reader, manager, admission);
        server.handle_request(request("initialize", None)).await;

        let params = serde_json::json!({"name": "recall", "arguments": {"query": "anything"}});
        let response = server.handle_request(request("tools/call", Some(params))).await.unwrap();
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32004);
    }
}
