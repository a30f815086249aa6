use crate::models::vendor::Vendor;
use crate::services::audit::{AuditPage, AuditQuery};
use crate::services::export::{export_audit, ExportFile};
use crate::services::metrics;
use crate::services::session::SessionContext;
use crate::services::vendors::ImportSummary;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct VendorSearch {
    #[serde(default)]
    pub q: Option<String>,
}

pub async fn list_vendors(
    State(state): State<AppState>,
    session: SessionContext,
    Query(search): Query<VendorSearch>,
) -> Result<Json<Vec<Vendor>>, AppError> {
    Ok(Json(
        state.vendors.list(&session, search.q.as_deref()).await?,
    ))
}

pub async fn create_vendor(
    State(state): State<AppState>,
    session: SessionContext,
    Json(vendor): Json<Vendor>,
) -> Result<(StatusCode, Json<Vec<Vendor>>), AppError> {
    let vendors = state.vendors.create(&session, vendor).await?;
    Ok((StatusCode::CREATED, Json(vendors)))
}

pub async fn update_vendor(
    State(state): State<AppState>,
    session: SessionContext,
    Path(vendor_id): Path<String>,
    Json(vendor): Json<Vendor>,
) -> Result<Json<Vec<Vendor>>, AppError> {
    Ok(Json(
        state.vendors.update(&session, &vendor_id, vendor).await?,
    ))
}

pub async fn delete_vendor(
    State(state): State<AppState>,
    session: SessionContext,
    Path(vendor_id): Path<String>,
) -> Result<Json<Vec<Vendor>>, AppError> {
    Ok(Json(state.vendors.delete(&session, &vendor_id).await?))
}

/// Raw workbook bytes in the request body.
pub async fn import_vendors(
    State(state): State<AppState>,
    session: SessionContext,
    body: Bytes,
) -> Result<Json<ImportSummary>, AppError> {
    if body.is_empty() {
        return Err(AppError::invalid("Please choose a spreadsheet to import"));
    }
    Ok(Json(
        state.vendors.bulk_import(&session, body.to_vec()).await?,
    ))
}

pub async fn audit_logs(
    State(state): State<AppState>,
    session: SessionContext,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditPage>, AppError> {
    let entries = state.audit.fetch(&session).await?;
    Ok(Json(AuditPage::build(&entries, &query)))
}

/// CSV of the audit entries matching the current filters, every page included.
pub async fn export_audit_logs(
    State(state): State<AppState>,
    session: SessionContext,
    Query(query): Query<AuditQuery>,
) -> Result<ExportFile, AppError> {
    let entries = state.audit.fetch(&session).await?;
    let file = export_audit(&query.apply(&entries), chrono::Utc::now())?;
    metrics::record_export("audit_csv");
    tracing::info!(file_name = %file.file_name, "Audit export generated");
    Ok(file)
}
