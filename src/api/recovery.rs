// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator endpoints for leftovers of interrupted transforms.
//!
//! Restoring is a manual decision: a backup is only the right content when
//! the document record was never updated for that transform. Both endpoints
//! answer 409 while a case batch is running.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    archive::atomic::{RecoveryArtifact, RecoveryOutcome},
    error::ApiError,
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestoreRequest {
    /// Logical path of the target file, as stored on the document record.
    pub path: String,
    /// Operator performing the restore.
    pub actor_id: String,
}

#[utoipa::path(
    get,
    path = "/v1/recovery/artifacts",
    tag = "Recovery",
    responses(
        (status = 200, body = [RecoveryArtifact]),
        (status = 409, description = "A case batch is running")
    )
)]
pub async fn list_artifacts(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecoveryArtifact>>, ApiError> {
    let archiver = state.archiver.clone();
    let artifacts = tokio::task::spawn_blocking(move || archiver.recovery_artifacts())
        .await
        .map_err(|e| ApiError::internal("transform", e.to_string()))??;
    Ok(Json(artifacts))
}

#[utoipa::path(
    post,
    path = "/v1/recovery/restore",
    request_body = RestoreRequest,
    tag = "Recovery",
    responses(
        (status = 200, body = RecoveryOutcome),
        (status = 400, description = "Path is invalid or escapes the data directory"),
        (status = 409, description = "A case batch is running")
    )
)]
pub async fn restore_target(
    State(state): State<AppState>,
    Json(request): Json<RestoreRequest>,
) -> Result<Json<RecoveryOutcome>, ApiError> {
    if request.actor_id.trim().is_empty() {
        return Err(ApiError::bad_request("actor_id must not be empty"));
    }
    let archiver = state.archiver.clone();
    let path = request.path.clone();
    let outcome = tokio::task::spawn_blocking(move || archiver.recover_target(&path))
        .await
        .map_err(|e| ApiError::internal("transform", e.to_string()))??;

    tracing::info!(
        path = %request.path,
        actor_id = %request.actor_id,
        outcome = ?outcome,
        "Recovery run for target"
    );
    AuditRepository::new(state.storage()).record(
        AuditEvent::new(AuditEventType::RecoveryRestored)
            .with_actor(request.actor_id.trim())
            .with_details(json!({ "path": request.path, "outcome": outcome })),
    );

    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn restore_puts_backup_back() {
        let temp = TempDir::new().unwrap();
        let (state, _db) = AppState::for_tests(temp.path());
        let fs = state.storage();
        let target = fs.resolve("cases/c1/a.pdf").unwrap();
        fs.write_raw(&target, b"half-transformed").unwrap();
        fs.write_raw(StoragePaths::backup_path(&target), b"original")
            .unwrap();

        let Json(artifacts) = list_artifacts(State(state.clone())).await.unwrap();
        assert_eq!(artifacts.len(), 1);

        let Json(outcome) = restore_target(
            State(state.clone()),
            Json(RestoreRequest {
                path: "cases/c1/a.pdf".into(),
                actor_id: "ops".into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(outcome, RecoveryOutcome::Restored);
        assert_eq!(fs.read_raw(&target).unwrap(), b"original");
        let Json(artifacts) = list_artifacts(State(state)).await.unwrap();
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn restore_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let (state, _db) = AppState::for_tests(temp.path());

        let err = restore_target(
            State(state),
            Json(RestoreRequest {
                path: "../../etc/passwd".into(),
                actor_id: "ops".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "invalid_path");
    }
}
