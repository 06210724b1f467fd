//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the entity store and blob dir

use crate::services::product_service::ProductService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness probe — always 200, never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe covering both backing stores:
/// 1. A `SELECT 1` against SQLite.
/// 2. A best-effort write/read/delete under the blob base directory.
///
/// 200 when all checks pass, 503 otherwise.
pub async fn readyz(State(service): State<ProductService>) -> impl IntoResponse {
    let sqlite = check_sqlite(&service).await;
    let disk = check_blob_dir(&service).await;

    let overall_ok = sqlite.ok && disk.ok;
    let mut checks = HashMap::new();
    checks.insert("sqlite", sqlite);
    checks.insert("disk", disk);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn check_sqlite(service: &ProductService) -> CheckStatus {
    match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*service.entities.db)
        .await
    {
        Ok(1) => CheckStatus { ok: true, error: None },
        Ok(other) => CheckStatus {
            ok: false,
            error: Some(format!("unexpected result: {other}")),
        },
        Err(err) => CheckStatus {
            ok: false,
            error: Some(format!("error: {err}")),
        },
    }
}

async fn check_blob_dir(service: &ProductService) -> CheckStatus {
    let tmp_path = service
        .images
        .blobs
        .base_path
        .join(format!(".readyz-{}", Uuid::new_v4()));

    let result: Result<(), String> = async {
        fs::write(&tmp_path, b"readyz")
            .await
            .map_err(|e| format!("could not write tmp file: {e}"))?;
        let bytes = fs::read(&tmp_path)
            .await
            .map_err(|e| format!("could not read tmp file: {e}"))?;
        if bytes != b"readyz" {
            return Err("file content mismatch".into());
        }
        Ok(())
    }
    .await;
    let _ = fs::remove_file(&tmp_path).await;

    match result {
        Ok(()) => CheckStatus { ok: true, error: None },
        Err(message) => CheckStatus {
            ok: false,
            error: Some(message),
        },
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
