//! RPC stdio Server
//!
//! Async Tokio task that handles JSON-RPC 2.0 requests over stdin/stdout.
//! Pure protocol implementation with no framework dependencies; this is
//! the surface the app's route layer drives.
//!
//! Method dispatch is a single exhaustive `match` on the method name, so
//! no route registration order exists and adding a method cannot shadow
//! another.

use crate::rpc::handlers::references;
use crate::rpc::types::{RpcError, RpcRequest, RpcResponse};
use crate::services::{NotificationPublisher, ReferenceService};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, error, info, instrument, warn};

/// Callback type for handling successful responses
///
/// Receives (method_name, result_value) after successful operation
/// execution. The app shell uses this to fan events out to its UI layer.
pub type ResponseCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Shared service handles the RPC handlers operate on
#[derive(Clone)]
pub struct RpcServices {
    pub reference_service: Arc<ReferenceService>,
    pub publisher: Arc<NotificationPublisher>,
}

/// Initialize tracing for server runs
///
/// Filter from `RUST_LOG` (default `info`). Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

/// Run the RPC stdio server
///
/// Reads JSON-RPC requests from stdin, processes them via handlers, and
/// writes responses to stdout. Runs until EOF on stdin.
#[instrument(skip(services))]
pub async fn run_rpc_server(services: RpcServices) -> anyhow::Result<()> {
    run_rpc_server_with_callback(services, None).await
}

/// Run the RPC stdio server with an optional response callback
///
/// Same as `run_rpc_server` but invokes `callback` with
/// (method, result) after each successful operation.
#[instrument(skip(services, callback))]
pub async fn run_rpc_server_with_callback(
    services: RpcServices,
    callback: Option<ResponseCallback>,
) -> anyhow::Result<()> {
    info!("🔌 reference RPC server started");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let reader = BufReader::new(stdin);
    let mut writer = BufWriter::new(stdout);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        debug!("📥 RPC request: {}", line);

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                warn!("❌ Failed to parse JSON-RPC request: {}", e);
                let error_response = RpcResponse::error(
                    0, // Unknown ID since parsing failed
                    RpcError::parse_error(format!("Invalid JSON: {}", e)),
                );
                write_response(&mut writer, &error_response).await?;
                continue;
            }
        };

        let request_id = request.id;
        let method = request.method.clone();

        let response = handle_request(&services, request).await;

        if let Some(ref callback) = callback {
            if let Some(ref result) = response.result {
                callback(&method, result);
            }
        }

        debug!(
            "📤 RPC response for method '{}' (id={})",
            method, request_id
        );

        write_response(&mut writer, &response).await?;
    }

    info!("🔌 reference RPC server stopped (stdin closed)");
    Ok(())
}

/// Handle a JSON-RPC request and return a response
#[instrument(skip(services), fields(method = %request.method, id = %request.id))]
pub async fn handle_request(services: &RpcServices, request: RpcRequest) -> RpcResponse {
    let result = match request.method.as_str() {
        "reconcile_note" => references::handle_reconcile_note(services, request.params).await,
        "get_references" => references::handle_get_references(services, request.params).await,
        "delete_reference" => references::handle_delete_reference(services, request.params).await,
        "detect_markers" => references::handle_detect_markers(services, request.params).await,
        "sweep_orphans" => references::handle_sweep_orphans(services, request.params).await,
        _ => {
            warn!("⚠️  Unknown RPC method: {}", request.method);
            Err(RpcError::method_not_found(&request.method))
        }
    };

    match result {
        Ok(result) => {
            debug!("✅ RPC request {} succeeded", request.id);
            RpcResponse::success(request.id, result)
        }
        Err(error) => {
            error!(
                "❌ RPC request {} failed: {} (code: {})",
                request.id, error.message, error.code
            );
            RpcResponse::error(request.id, error)
        }
    }
}

/// Write a JSON-RPC response to stdout
async fn write_response(
    writer: &mut BufWriter<tokio::io::Stdout>,
    response: &RpcResponse,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseService, LibsqlNoteStore, ReferenceStore};
    use crate::services::{InMemorySessionRegistry, ReferenceService};
    use crate::rpc::types::METHOD_NOT_FOUND;
    use tempfile::TempDir;

    async fn create_test_services() -> (RpcServices, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            DatabaseService::new(temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        let note_store = Arc::new(LibsqlNoteStore::new(db.clone()));
        let reference_store = Arc::new(ReferenceStore::new(db));
        let services = RpcServices {
            reference_service: Arc::new(ReferenceService::new(note_store, reference_store)),
            publisher: Arc::new(NotificationPublisher::new(Arc::new(
                InMemorySessionRegistry::new(),
            ))),
        };
        (services, temp_dir)
    }

    fn request(id: i64, method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_unknown_method_rejected() {
        let (services, _temp_dir) = create_test_services().await;

        let response =
            handle_request(&services, request(7, "create_note", Value::Null)).await;

        assert_eq!(response.id, 7);
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_reaches_handler() {
        let (services, _temp_dir) = create_test_services().await;

        let response = handle_request(
            &services,
            request(1, "sweep_orphans", serde_json::json!({"userId": "u"})),
        )
        .await;

        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["deletedCount"], 0);
    }
}
