// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    archive::{on_case_archived, on_case_unarchived, BatchResult},
    error::ApiError,
    models::CaseTransitionRequest,
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/cases/{case_id}/archive",
    params(
        ("case_id" = String, Path, description = "Case whose documents are encrypted")
    ),
    request_body = CaseTransitionRequest,
    tag = "Archive",
    responses(
        (status = 200, description = "Batch finished; per-document failures are listed", body = BatchResult),
        (status = 400, description = "Missing actor id"),
        (status = 409, description = "A batch for this case is already running"),
        (status = 503, description = "Record store unavailable")
    )
)]
pub async fn archive_case(
    Path(case_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<CaseTransitionRequest>,
) -> Result<Json<BatchResult>, ApiError> {
    let actor_id = validate_actor(request)?;
    let result = on_case_archived(state.archiver.clone(), case_id, actor_id).await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/v1/cases/{case_id}/unarchive",
    params(
        ("case_id" = String, Path, description = "Case whose documents are decrypted")
    ),
    request_body = CaseTransitionRequest,
    tag = "Archive",
    responses(
        (status = 200, description = "Batch finished; per-document failures are listed", body = BatchResult),
        (status = 400, description = "Missing actor id"),
        (status = 409, description = "A batch for this case is already running"),
        (status = 503, description = "Record store unavailable")
    )
)]
pub async fn unarchive_case(
    Path(case_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<CaseTransitionRequest>,
) -> Result<Json<BatchResult>, ApiError> {
    let actor_id = validate_actor(request)?;
    let result = on_case_unarchived(state.archiver.clone(), case_id, actor_id).await?;
    Ok(Json(result))
}

fn validate_actor(request: CaseTransitionRequest) -> Result<String, ApiError> {
    let actor_id = request.actor_id.trim();
    if actor_id.is_empty() {
        return Err(ApiError::bad_request("actor_id must not be empty"));
    }
    Ok(actor_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    fn request(actor: &str) -> Json<CaseTransitionRequest> {
        Json(CaseTransitionRequest {
            actor_id: actor.to_string(),
        })
    }

    #[tokio::test]
    async fn archive_and_unarchive_case() {
        let temp = TempDir::new().unwrap();
        let (state, db) = AppState::for_tests(temp.path());
        let fs = state.storage();
        fs.write_raw(fs.resolve("cases/c1/brief.pdf").unwrap(), b"brief")
            .unwrap();
        db.upsert_document(&Document::new("d1", "c1", Some("cases/c1/brief.pdf".into())))
            .unwrap();

        let Json(result) = archive_case(Path("c1".into()), State(state.clone()), request("u1"))
            .await
            .expect("archive succeeds");
        assert_eq!(result.succeeded_document_ids, vec!["d1".to_string()]);
        assert_eq!(
            db.get_document("d1").unwrap().unwrap().last_updated_by.as_deref(),
            Some("u1")
        );

        let Json(result) = unarchive_case(Path("c1".into()), State(state.clone()), request("u2"))
            .await
            .expect("unarchive succeeds");
        assert_eq!(result.total_count, 1);
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_reported_in_body() {
        let temp = TempDir::new().unwrap();
        let (state, db) = AppState::for_tests(temp.path());
        db.upsert_document(&Document::new("d1", "c1", Some("cases/c1/gone.pdf".into())))
            .unwrap();

        let Json(result) = archive_case(Path("c1".into()), State(state), request("u1"))
            .await
            .expect("batch returns a result");
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].error, "file_not_found");
    }

    #[tokio::test]
    async fn blank_actor_is_rejected() {
        let temp = TempDir::new().unwrap();
        let (state, _db) = AppState::for_tests(temp.path());

        let err = archive_case(Path("c1".into()), State(state), request("   "))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
