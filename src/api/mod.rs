// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    archive::{
        atomic::{ArtifactKind, RecoveryArtifact, RecoveryOutcome},
        BatchFailure, BatchResult,
    },
    models::CaseTransitionRequest,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

pub mod audit;
pub mod cases;
pub mod health;
pub mod recovery;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/cases/{case_id}/archive", post(cases::archive_case))
        .route("/cases/{case_id}/unarchive", post(cases::unarchive_case))
        .route("/cases/{case_id}/audit", get(audit::case_audit))
        .route("/recovery/artifacts", get(recovery::list_artifacts))
        .route("/recovery/restore", post(recovery::restore_target));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        cases::archive_case,
        cases::unarchive_case,
        audit::case_audit,
        recovery::list_artifacts,
        recovery::restore_target
    ),
    components(
        schemas(
            BatchResult,
            BatchFailure,
            CaseTransitionRequest,
            AuditEvent,
            AuditEventType,
            RecoveryArtifact,
            ArtifactKind,
            RecoveryOutcome,
            recovery::RestoreRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Archive", description = "Case archive and un-archive"),
        (name = "Recovery", description = "Leftovers of interrupted file transforms")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn liveness_responds_with_request_id() {
        let temp = TempDir::new().unwrap();
        let (state, _db) = AppState::for_tests(temp.path());

        let response = router(state)
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn readiness_checks_data_dir() {
        let temp = TempDir::new().unwrap();
        let (state, _db) = AppState::for_tests(temp.path());

        let response = router(state)
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["checks"]["data_dir"], "ok");
    }

    #[tokio::test]
    async fn archive_route_returns_batch_result() {
        let temp = TempDir::new().unwrap();
        let (state, _db) = AppState::for_tests(temp.path());

        let response = router(state)
            .oneshot(post_json(
                "/v1/cases/c-empty/archive",
                r#"{"actor_id":"u1"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["totalCount"], 0);
    }

    #[tokio::test]
    async fn unarchive_route_rejects_blank_actor() {
        let temp = TempDir::new().unwrap();
        let (state, _db) = AppState::for_tests(temp.path());

        let response = router(state)
            .oneshot(post_json("/v1/cases/c1/unarchive", r#"{"actor_id":""}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn audit_route_rejects_bad_date() {
        let temp = TempDir::new().unwrap();
        let (state, _db) = AppState::for_tests(temp.path());

        let response = router(state)
            .oneshot(
                Request::get("/v1/cases/c1/audit?date=not-a-date")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn openapi_lists_case_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/cases/{case_id}/archive"));
        assert!(doc.paths.paths.contains_key("/v1/cases/{case_id}/unarchive"));
        assert!(doc.paths.paths.contains_key("/v1/cases/{case_id}/audit"));
    }
}
