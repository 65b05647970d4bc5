//! Liveness and readiness probes.
//!
//! - GET /healthz -> process is up
//! - GET /readyz  -> metadata database answers and a bucket is configured

use crate::services::drive_service::DriveService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct Probe {
    status: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn from_result(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self { ok: true, error: None },
            Err(error) => Self {
                ok: false,
                error: Some(error),
            },
        }
    }
}

/// `GET /healthz`. Never touches the database or the object store.
pub async fn healthz() -> impl IntoResponse {
    Json(Probe {
        status: "ok",
        checks: BTreeMap::new(),
    })
}

/// `GET /readyz`. 200 when every check passes, 503 otherwise.
pub async fn readyz(State(service): State<DriveService>) -> impl IntoResponse {
    let sqlite = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*service.db)
        .await
        .map_err(|err| format!("error: {err}"))
        .and_then(|v| match v {
            1 => Ok(()),
            other => Err(format!("unexpected result: {other}")),
        });
    let object_store = service
        .objects
        .as_ref()
        .map(|_| ())
        .ok_or_else(|| "bucket not configured".to_string());

    let checks = BTreeMap::from([
        ("sqlite", CheckStatus::from_result(sqlite)),
        ("object_store", CheckStatus::from_result(object_store)),
    ]);
    let ready = checks.values().all(|c| c.ok);

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(Probe {
            status: if ready { "ok" } else { "error" },
            checks,
        }),
    )
}
