use crate::models::invoice::{Invoice, InvoiceStatus};
use crate::services::export::{export_invoices, ExportFile};
use crate::services::inbox::{FinanceInbox, InvoiceFilter};
use crate::services::metrics;
use crate::services::session::SessionContext;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;

fn pending() -> InvoiceStatus {
    InvoiceStatus::Pending
}

#[derive(Debug, Deserialize)]
pub struct InboxParams {
    /// The tab: which status the backend is asked for.
    #[serde(default = "pending")]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub search: String,
    /// Optional extra status filter; empty or `all` disables it.
    #[serde(default)]
    pub status_filter: Option<String>,
}

impl InboxParams {
    fn filter(&self) -> Result<InvoiceFilter, AppError> {
        let status_filter = match self.status_filter.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(value) => Some(value.parse::<InvoiceStatus>().map_err(AppError::invalid)?),
        };
        Ok(InvoiceFilter {
            search: self.search.clone(),
            status_filter,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RemarkForm {
    #[serde(default = "pending")]
    pub tab: InvoiceStatus,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentForm {
    #[serde(default = "pending")]
    pub tab: InvoiceStatus,
    #[serde(default)]
    pub message: Option<String>,
}

fn find<'a>(invoices: &'a [Invoice], id: &str) -> Option<&'a Invoice> {
    invoices.iter().find(|invoice| invoice.id() == id)
}

pub async fn list_invoices(
    State(state): State<AppState>,
    session: SessionContext,
    Query(params): Query<InboxParams>,
) -> Result<Json<FinanceInbox>, AppError> {
    let filter = params.filter()?;
    let invoices = state
        .workflow
        .finance_invoices(&session, params.status)
        .await?;
    Ok(Json(FinanceInbox::build(params.status, &invoices, &filter)))
}

pub async fn send_remark(
    State(state): State<AppState>,
    session: SessionContext,
    Path(invoice_id): Path<String>,
    Json(form): Json<RemarkForm>,
) -> Result<Json<FinanceInbox>, AppError> {
    let invoices = state.workflow.finance_invoices(&session, form.tab).await?;
    let refreshed = state
        .workflow
        .send_remark(&session, find(&invoices, &invoice_id), &form.remark, form.tab)
        .await?;
    Ok(Json(FinanceInbox::build(
        form.tab,
        &refreshed,
        &InvoiceFilter::default(),
    )))
}

pub async fn send_for_payment(
    State(state): State<AppState>,
    session: SessionContext,
    Path(invoice_id): Path<String>,
    Json(form): Json<PaymentForm>,
) -> Result<Json<FinanceInbox>, AppError> {
    let invoices = state.workflow.finance_invoices(&session, form.tab).await?;
    let refreshed = state
        .workflow
        .send_for_payment(
            &session,
            find(&invoices, &invoice_id),
            form.message.as_deref(),
            form.tab,
        )
        .await?;
    Ok(Json(FinanceInbox::build(
        form.tab,
        &refreshed,
        &InvoiceFilter::default(),
    )))
}

/// Spreadsheet of the tab's invoices after the current filters.
pub async fn export(
    State(state): State<AppState>,
    session: SessionContext,
    Query(params): Query<InboxParams>,
) -> Result<ExportFile, AppError> {
    let filter = params.filter()?;
    let invoices = state
        .workflow
        .finance_invoices(&session, params.status)
        .await?;
    let file = export_invoices(params.status, &filter.apply(&invoices), chrono::Utc::now())?;
    metrics::record_export("invoices_xlsx");
    tracing::info!(file_name = %file.file_name, "Invoice export generated");
    Ok(file)
}
