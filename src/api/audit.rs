// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    state::AppState,
    storage::{AuditEvent, AuditRepository, StorageError},
};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Deserialize, IntoParams)]
pub struct AuditQuery {
    /// UTC day to read, `YYYY-MM-DD`. Defaults to today.
    pub date: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/cases/{case_id}/audit",
    params(
        ("case_id" = String, Path, description = "Case whose audit events are listed"),
        AuditQuery
    ),
    tag = "Archive",
    responses(
        (status = 200, body = [AuditEvent]),
        (status = 400, description = "Date is not YYYY-MM-DD")
    )
)]
pub async fn case_audit(
    Path(case_id): Path<String>,
    Query(params): Query<AuditQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AuditEvent>>, ApiError> {
    // The date names a directory; only a parsed date is allowed through.
    let date = match params.date {
        Some(date) => NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|_| ApiError::bad_request(format!("invalid date {date:?}, expected YYYY-MM-DD")))?,
        None => Utc::now().date_naive(),
    }
    .format(DATE_FORMAT)
    .to_string();

    let storage = state.storage().clone();
    let events = tokio::task::spawn_blocking(move || {
        match AuditRepository::new(&storage).search_by_case(&case_id, &date) {
            Err(StorageError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    })
    .await
    .map_err(|e| ApiError::internal("storage", e.to_string()))?
    .map_err(|e| ApiError::internal("storage", e.to_string()))?;

    Ok(Json(events))
}
