//! Reference RPC Handlers
//!
//! Handlers for the reference engine's exposed operations:
//!
//! - `reconcile_note` - recompute a note's edges and annotations after save
//! - `get_references` - both directions of the graph around a note
//! - `delete_reference` - remove the edges between an ordered note pair
//! - `detect_markers` - marker counts for one note's content
//! - `sweep_orphans` - delete edges whose endpoints no longer exist
//!
//! ## Wire Format (JSON Serialization)
//!
//! Params and results use `#[serde(rename_all = "camelCase")]`: the route
//! layer speaks JavaScript conventions (`userId`, `noteId`,
//! `affectedNoteIds`).

use crate::rpc::server::RpcServices;
use crate::rpc::types::RpcError;
use crate::services::ReferenceServiceError;
use serde::Deserialize;
use serde_json::{json, Value};

// ============================================================================
// Request Types
// ============================================================================

/// Parameters for reconcile_note
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileNoteParams {
    /// Owner of the saved note
    pub user_id: String,
    /// The note that was just saved
    pub note_id: String,
    /// The note's saved content
    pub content: String,
}

/// Parameters for get_references and detect_markers
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteAddressParams {
    pub user_id: String,
    pub note_id: String,
}

/// Parameters for delete_reference
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReferenceParams {
    pub user_id: String,
    pub from_note_id: String,
    pub to_note_id: String,
}

/// Parameters for sweep_orphans
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepOrphansParams {
    pub user_id: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle reconcile_note: run the reconciliation pass, then publish the
/// affected notes to the user's live sessions
///
/// Publication is strictly after the successful pass and can never fail the
/// call.
pub async fn handle_reconcile_note(
    services: &RpcServices,
    params: Value,
) -> Result<Value, RpcError> {
    let params: ReconcileNoteParams = parse_params(params)?;

    let outcome = services
        .reference_service
        .reconcile(&params.user_id, &params.note_id, &params.content)
        .await
        .map_err(map_service_error)?;

    services
        .publisher
        .publish(&params.user_id, &params.note_id, &outcome.affected_note_ids)
        .await;

    to_result(&outcome)
}

/// Handle get_references: both directions of the graph around a note
pub async fn handle_get_references(
    services: &RpcServices,
    params: Value,
) -> Result<Value, RpcError> {
    let params: NoteAddressParams = parse_params(params)?;

    let references = services
        .reference_service
        .get_references(&params.user_id, &params.note_id)
        .await
        .map_err(map_service_error)?;

    to_result(&references)
}

/// Handle delete_reference: remove all edges between an ordered pair
pub async fn handle_delete_reference(
    services: &RpcServices,
    params: Value,
) -> Result<Value, RpcError> {
    let params: DeleteReferenceParams = parse_params(params)?;

    let deleted = services
        .reference_service
        .delete_reference(&params.user_id, &params.from_note_id, &params.to_note_id)
        .await
        .map_err(map_service_error)?;

    Ok(json!({ "deletedCount": deleted }))
}

/// Handle detect_markers: marker counts for one note's stored content
pub async fn handle_detect_markers(
    services: &RpcServices,
    params: Value,
) -> Result<Value, RpcError> {
    let params: NoteAddressParams = parse_params(params)?;

    let scan = services
        .reference_service
        .detect_markers(&params.user_id, &params.note_id)
        .await
        .map_err(map_service_error)?;

    to_result(&scan)
}

/// Handle sweep_orphans: delete edges whose endpoints no longer exist
pub async fn handle_sweep_orphans(
    services: &RpcServices,
    params: Value,
) -> Result<Value, RpcError> {
    let params: SweepOrphansParams = parse_params(params)?;

    let deleted = services
        .reference_service
        .sweep_orphans(&params.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(json!({ "deletedCount": deleted }))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_params<P: serde::de::DeserializeOwned>(params: Value) -> Result<P, RpcError> {
    serde_json::from_value(params)
        .map_err(|e| RpcError::invalid_params(format!("Invalid parameters: {}", e)))
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| RpcError::internal_error(format!("Failed to serialize result: {}", e)))
}

fn map_service_error(error: ReferenceServiceError) -> RpcError {
    match error {
        ReferenceServiceError::NoteNotFound { .. } => RpcError::note_not_found(error.to_string()),
        ReferenceServiceError::DatabaseError(_) => RpcError::internal_error(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseService, LibsqlNoteStore, ReferenceStore};
    use crate::models::Note;
    use crate::rpc::types::NOTE_NOT_FOUND;
    use crate::services::{
        InMemorySessionRegistry, NotificationPublisher, ReferenceService,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn create_test_services() -> (RpcServices, Arc<LibsqlNoteStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            DatabaseService::new(temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        let note_store = Arc::new(LibsqlNoteStore::new(db.clone()));
        let reference_store = Arc::new(ReferenceStore::new(db));
        let services = RpcServices {
            reference_service: Arc::new(ReferenceService::new(
                note_store.clone(),
                reference_store,
            )),
            publisher: Arc::new(NotificationPublisher::new(Arc::new(
                InMemorySessionRegistry::new(),
            ))),
        };
        (services, note_store, temp_dir)
    }

    #[tokio::test]
    async fn test_reconcile_note_round_trip() {
        let (services, store, _temp_dir) = create_test_services().await;
        store
            .create_note(&Note::new_with_id(
                "a",
                "user-1",
                "[b](http://h.io/note/b)",
            ))
            .await
            .unwrap();
        store
            .create_note(&Note::new_with_id("b", "user-1", "target"))
            .await
            .unwrap();

        let result = handle_reconcile_note(
            &services,
            json!({
                "userId": "user-1",
                "noteId": "a",
                "content": "[b](http://h.io/note/b)"
            }),
        )
        .await
        .unwrap();

        assert_eq!(result["createdEdgeCount"], 1);
        assert_eq!(result["annotatedTargetCount"], 1);
        assert_eq!(result["affectedNoteIds"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_get_references_shape() {
        let (services, store, _temp_dir) = create_test_services().await;
        store
            .create_note(&Note::new_with_id(
                "a",
                "user-1",
                "[b](http://h.io/note/b)",
            ))
            .await
            .unwrap();
        store
            .create_note(&Note::new_with_id("b", "user-1", "target"))
            .await
            .unwrap();

        handle_reconcile_note(
            &services,
            json!({"userId": "user-1", "noteId": "a", "content": "[b](http://h.io/note/b)"}),
        )
        .await
        .unwrap();

        let result = handle_get_references(
            &services,
            json!({"userId": "user-1", "noteId": "b"}),
        )
        .await
        .unwrap();

        assert_eq!(result["outgoing"], json!([]));
        assert_eq!(result["incoming"][0]["fromNoteId"], "a");
        assert_eq!(result["incoming"][0]["toNoteId"], "b");
    }

    #[tokio::test]
    async fn test_invalid_params_rejected() {
        let (services, _store, _temp_dir) = create_test_services().await;

        let err = handle_reconcile_note(&services, json!({"userId": "user-1"}))
            .await
            .unwrap_err();

        assert_eq!(err.code, crate::rpc::types::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_detect_markers_missing_note() {
        let (services, _store, _temp_dir) = create_test_services().await;

        let err = handle_detect_markers(
            &services,
            json!({"userId": "user-1", "noteId": "ghost"}),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, NOTE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sweep_orphans_reports_count() {
        let (services, _store, _temp_dir) = create_test_services().await;

        let result = handle_sweep_orphans(&services, json!({"userId": "user-1"}))
            .await
            .unwrap();

        assert_eq!(result["deletedCount"], 0);
    }
}
