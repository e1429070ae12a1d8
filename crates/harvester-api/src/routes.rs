//! HTTP route handlers.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use harvester_vendors::{InvoiceRecord, RunOptions};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Build the router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs).post(start_all_jobs))
        .route("/jobs/{vendor_id}", get(get_job).post(start_job))
        .route("/invoices", get(list_invoices))
        .route("/file", get(get_file))
        .route("/vendors", get(list_vendors))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceQuery {
    pub vendor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct InvoiceListResponse {
    pub count: usize,
    pub invoices: Vec<InvoiceRecord>,
}

/// An absent or empty body means default options.
fn parse_options(body: &Bytes) -> Result<RunOptions, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunOptions::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid options: {}", e)))
}

/// Start a job for one vendor.
///
/// POST /jobs/{vendorId}
pub async fn start_job(
    State(state): State<Arc<AppState>>,
    Path(vendor_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let options = parse_options(&body)?;
    let job = state.orchestrator.start_job(&vendor_id, options)?;
    info!(vendor = %vendor_id, "Job accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "started", "job": job})),
    ))
}

/// Run every vendor one after another.
///
/// POST /jobs
pub async fn start_all_jobs(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let options = parse_options(&body)?;
    let batch = state.orchestrator.start_all_jobs(options);
    info!(vendors = ?batch.vendors, "Batch accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "started",
            "vendors": batch.vendors,
            "conflicts": batch.conflicts,
        })),
    ))
}

/// GET /jobs
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let jobs = state.orchestrator.statuses();
    Json(serde_json::json!({"count": jobs.len(), "jobs": jobs}))
}

/// GET /jobs/{vendorId}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(vendor_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.orchestrator.registry().contains(&vendor_id) {
        return Err(ApiError::NotFound(format!("Unknown vendor: {}", vendor_id)));
    }
    Ok(Json(state.orchestrator.status(&vendor_id)))
}

/// List ledger records.
///
/// GET /invoices[?vendorId=]
pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<InvoiceListResponse>, ApiError> {
    let invoices = match query.vendor_id.as_deref().filter(|v| !v.is_empty()) {
        Some(vendor_id) => state.ledger.list_by_vendor(vendor_id).await?,
        None => state.ledger.list_all().await?,
    };
    Ok(Json(InvoiceListResponse {
        count: invoices.len(),
        invoices,
    }))
}

/// Serve a stored artifact by its path relative to the downloads root.
///
/// GET /file?path=
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let path = state.artifacts.resolve(&query.path).inspect_err(|_| {
        warn!(path = %query.path, "Rejected artifact path");
    })?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("File not found: {}", query.path)));
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("invoice")
        .to_string();
    Ok((
        [
            (header::CONTENT_TYPE, content_type(&file_name).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}

/// GET /vendors
pub async fn list_vendors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let vendors = state.orchestrator.registry().descriptors();
    Json(serde_json::json!({"count": vendors.len(), "vendors": vendors}))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.uptime().as_secs(),
        "vendors": state.orchestrator.registry().len(),
    }))
}

fn content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
