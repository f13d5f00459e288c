// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use records_archive_server::{
    api::router,
    archive::{CaseArchiver, EnvelopeCipher, MetadataStore},
    config::{Config, LogFormat, DEFAULT_LOG_FILTER},
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, DocumentDatabase, DocumentFs, StoragePaths,
    },
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    // The master key is validated here; nothing listens until it is.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration, refusing to start");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(?config, "Configuration loaded");

    let storage = DocumentFs::new(StoragePaths::new(&config.data_dir));
    if let Err(e) = storage.initialize() {
        tracing::error!(error = %e, data_dir = %config.data_dir.display(), "Failed to initialize data directory");
        return ExitCode::FAILURE;
    }

    let db = match DocumentDatabase::open(&config.document_db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(error = %e, path = %config.document_db_path.display(), "Failed to open record store");
            return ExitCode::FAILURE;
        }
    };

    let bind_addr = config.bind_addr;
    let cipher = Arc::new(EnvelopeCipher::new(config.master_key));
    let archiver = CaseArchiver::new(storage, cipher, MetadataStore::new(db))
        .with_decrypt_rollback(config.decrypt_rollback);
    report_recovery_artifacts(&archiver);
    let app = router(AppState::new(archiver));

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %bind_addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%bind_addr, "Records archive server listening (docs at /docs)");

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Log and audit backup or temp files left by an interrupted run.
///
/// They are not restored automatically: whether the backup or the current
/// file matches the record depends on whether the record was updated.
fn report_recovery_artifacts(archiver: &CaseArchiver) {
    let artifacts = match archiver.recovery_artifacts() {
        Ok(artifacts) => artifacts,
        Err(e) => {
            tracing::warn!(error = %e, "Recovery artifact scan failed");
            return;
        }
    };

    let audit = AuditRepository::new(archiver.storage());
    for artifact in &artifacts {
        tracing::warn!(
            target_file = %artifact.target.display(),
            artifact = %artifact.artifact.display(),
            kind = ?artifact.kind,
            "Recovery artifact found from an interrupted transform"
        );
        audit.record(
            AuditEvent::new(AuditEventType::RecoveryArtifactFound).with_details(json!({
                "target": artifact.target.display().to_string(),
                "artifact": artifact.artifact.display().to_string(),
                "kind": artifact.kind,
            })),
        );
    }
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "Failed to listen for shutdown signal"),
    }
}
