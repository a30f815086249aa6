use crate::models::invoice::{InvoiceFields, InvoiceStatus, PdfField};
use crate::services::draft::InvoiceDraft;
use crate::services::session::SessionContext;
use crate::services::uploader::{UploadFile, UploadReport};
use crate::services::workflow::{ReuploadOutcome, VendorInbox};
use crate::AppState;
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tower_sessions::Session;

#[derive(Debug, Deserialize)]
pub struct AutofillForm {
    pub gst_number: String,
}

#[derive(Debug, Deserialize)]
pub struct DetachForm {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AttachReply {
    pub upload: UploadReport,
    pub draft: InvoiceDraft,
}

#[derive(Debug, Serialize)]
pub struct ClearReply {
    pub deleted: usize,
    pub draft: InvoiceDraft,
}

#[derive(Debug, Serialize)]
pub struct SubmitReply {
    pub message: &'static str,
    pub status: InvoiceStatus,
    pub draft: InvoiceDraft,
}

fn pdf_field(raw: &str) -> Result<PdfField, AppError> {
    raw.parse().map_err(AppError::invalid)
}

fn malformed(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::invalid(format!("Malformed upload: {}", e))
}

async fn read_file(field: Field<'_>) -> Result<UploadFile, AppError> {
    let file_name = field.file_name().unwrap_or("file.pdf").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field.bytes().await.map_err(malformed)?;
    Ok(UploadFile {
        file_name,
        content_type,
        data,
    })
}

pub async fn get_draft(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<InvoiceDraft>, AppError> {
    let draft = state.drafts.open(&session).await?;
    Ok(Json(draft.clone()))
}

/// Replace the draft's form fields; attached files are kept.
pub async fn update_fields(
    State(state): State<AppState>,
    session: Session,
    Json(fields): Json<InvoiceFields>,
) -> Result<Json<InvoiceDraft>, AppError> {
    let mut draft = state.drafts.open(&session).await?;
    draft.fields = fields;
    Ok(Json(draft.clone()))
}

pub async fn autofill(
    State(state): State<AppState>,
    context: SessionContext,
    session: Session,
    Json(form): Json<AutofillForm>,
) -> Result<Json<InvoiceDraft>, AppError> {
    let mut draft = state.drafts.open(&session).await?;
    state
        .workflow
        .autofill(&context, &mut draft, &form.gst_number)
        .await?;
    Ok(Json(draft.clone()))
}

/// Upload every file part of the request into one PDF slot of the draft.
pub async fn attach_pdfs(
    State(state): State<AppState>,
    session: Session,
    Path(field): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<AttachReply>, AppError> {
    let field = pdf_field(&field)?;

    let mut files = Vec::new();
    while let Some(part) = multipart.next_field().await.map_err(malformed)? {
        if part.file_name().is_some() {
            files.push(read_file(part).await?);
        }
    }

    let mut draft = state.drafts.open(&session).await?;
    let upload = state.workflow.attach(&mut draft, field, files).await?;
    Ok(Json(AttachReply {
        upload,
        draft: draft.clone(),
    }))
}

pub async fn detach_pdf(
    State(state): State<AppState>,
    session: Session,
    Path(field): Path<String>,
    Json(form): Json<DetachForm>,
) -> Result<Json<InvoiceDraft>, AppError> {
    let field = pdf_field(&field)?;
    let mut draft = state.drafts.open(&session).await?;
    state.workflow.detach(&mut draft, field, &form.url).await?;
    Ok(Json(draft.clone()))
}

pub async fn clear_draft(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ClearReply>, AppError> {
    let mut draft = state.drafts.open(&session).await?;
    let deleted = state.workflow.clear(&mut draft).await;
    Ok(Json(ClearReply {
        deleted,
        draft: draft.clone(),
    }))
}

pub async fn submit_draft(
    State(state): State<AppState>,
    context: SessionContext,
    session: Session,
) -> Result<Json<SubmitReply>, AppError> {
    let mut draft = state.drafts.open(&session).await?;
    let status = state.workflow.submit(&context, &mut draft).await?;
    Ok(Json(SubmitReply {
        message: "Invoice submitted successfully",
        status,
        draft: draft.clone(),
    }))
}

pub async fn inbox(
    State(state): State<AppState>,
    context: SessionContext,
) -> Result<Json<VendorInbox>, AppError> {
    Ok(Json(state.workflow.vendor_inbox(&context).await?))
}

/// Multipart body: a `fields` part holding the corrected fields as JSON, plus
/// any number of `po_pdf` / `invoice_pdf` file parts.
pub async fn reupload(
    State(state): State<AppState>,
    context: SessionContext,
    Path(invoice_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ReuploadOutcome>, AppError> {
    let mut fields: Option<InvoiceFields> = None;
    let mut po_pdf = Vec::new();
    let mut invoice_pdf = Vec::new();

    while let Some(part) = multipart.next_field().await.map_err(malformed)? {
        match part.name() {
            Some("fields") => {
                let text = part.text().await.map_err(malformed)?;
                fields = Some(serde_json::from_str(&text).map_err(|e| {
                    AppError::invalid(format!("Invalid invoice fields: {}", e))
                })?);
            }
            Some("po_pdf") => po_pdf.push(read_file(part).await?),
            Some("invoice_pdf") => invoice_pdf.push(read_file(part).await?),
            _ => {}
        }
    }
    let fields = fields.ok_or_else(|| AppError::invalid("Missing invoice fields"))?;

    let inbox = state.workflow.vendor_inbox(&context).await?;
    let selected = inbox.invoices.iter().find(|i| i.id() == invoice_id);

    let outcome = state
        .workflow
        .reupload(
            &context,
            selected,
            fields,
            vec![
                (PdfField::PoPdf, po_pdf),
                (PdfField::InvoicePdf, invoice_pdf),
            ],
        )
        .await?;
    Ok(Json(outcome))
}
