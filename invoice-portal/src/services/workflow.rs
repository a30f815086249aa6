//! Invoice lifecycle operations: vendor submission, finance review and the
//! vendor reupload loop.
//!
//! Each mutation is checked locally against [`next_status`] before any
//! network call, then sent to the backend, which stays authoritative. The
//! affected list is fetched again afterwards and returned as-is.

use crate::models::invoice::{
    next_status, Invoice, InvoiceAction, InvoiceFields, InvoiceStatus, NewInvoice, PaymentRequest,
    PdfField, RemarkRequest, ReuploadRequest,
};
use crate::services::backend_client::BackendClient;
use crate::services::draft::InvoiceDraft;
use crate::services::metrics;
use crate::services::session::SessionContext;
use crate::services::uploader::{PdfUploader, UploadFile, UploadReport, UploadScope};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use validator::Validate;

/// The vendor's flagged invoices.
#[derive(Debug, Clone, Serialize)]
pub struct VendorInbox {
    pub invoices: Vec<Invoice>,
    pub has_new: bool,
}

impl From<Vec<Invoice>> for VendorInbox {
    fn from(invoices: Vec<Invoice>) -> Self {
        Self {
            has_new: !invoices.is_empty(),
            invoices,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReuploadOutcome {
    pub uploads: Vec<UploadReport>,
    pub inbox: VendorInbox,
}

fn check_transition(
    from: Option<InvoiceStatus>,
    action: InvoiceAction,
) -> Result<InvoiceStatus, AppError> {
    next_status(from, action).map_err(|e| {
        tracing::warn!(action = %action, error = %e, "Transition refused locally");
        metrics::record_transition(action.as_str(), "refused");
        AppError::Conflict(anyhow::anyhow!("{}", e))
    })
}

fn selected(invoice: Option<&Invoice>) -> Result<&Invoice, AppError> {
    invoice.ok_or_else(|| AppError::invalid("Please select an invoice first."))
}

pub struct InvoiceWorkflow {
    backend: Arc<BackendClient>,
    uploader: PdfUploader,
}

impl InvoiceWorkflow {
    pub fn new(backend: Arc<BackendClient>, uploader: PdfUploader) -> Self {
        Self { backend, uploader }
    }

    /// Fill the draft's vendor identity from the vendor master.
    pub async fn autofill(
        &self,
        session: &SessionContext,
        draft: &mut InvoiceDraft,
        gst_number: &str,
    ) -> Result<(), AppError> {
        let gst_number = gst_number.trim();
        if gst_number.is_empty() {
            return Err(AppError::invalid("Please enter a Vendor GSTN to search."));
        }

        let vendor = self
            .backend
            .vendor_by_gst(session, gst_number)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Vendor not found")))?;

        draft.fields.apply_vendor(&vendor);
        tracing::info!(vendor_id = %vendor.id, "Draft autofilled from vendor master");
        Ok(())
    }

    pub async fn attach(
        &self,
        draft: &mut InvoiceDraft,
        field: PdfField,
        files: Vec<UploadFile>,
    ) -> Result<UploadReport, AppError> {
        if files.is_empty() {
            return Err(AppError::invalid("No files selected"));
        }
        let report = self
            .uploader
            .upload_batch(UploadScope::Submission, field, files)
            .await;
        draft.record(&report);
        Ok(report)
    }

    /// Delete one of the draft's files from storage and drop it from the draft.
    pub async fn detach(
        &self,
        draft: &mut InvoiceDraft,
        field: PdfField,
        url: &str,
    ) -> Result<(), AppError> {
        if !draft.holds(field, url) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "File is not attached to this invoice"
            )));
        }
        let key = self.uploader.remove(url).await?;
        draft.forget(field, url, &key);
        Ok(())
    }

    /// Delete every file uploaded for the draft, then reset it. Returns how
    /// many objects were deleted.
    pub async fn clear(&self, draft: &mut InvoiceDraft) -> usize {
        let deleted = self
            .uploader
            .sweep(draft.pending_keys.iter().map(String::as_str))
            .await;
        tracing::info!(
            deleted,
            pending = draft.pending_keys.len(),
            "Cleared invoice draft"
        );
        draft.reset();
        deleted
    }

    /// Create the invoice from the draft. The draft is reset on success only.
    pub async fn submit(
        &self,
        session: &SessionContext,
        draft: &mut InvoiceDraft,
    ) -> Result<InvoiceStatus, AppError> {
        let user = session.require_user()?;
        draft.fields.validate()?;
        let status = check_transition(None, InvoiceAction::Submit)?;

        let body = NewInvoice {
            fields: draft.fields.clone(),
            pdfs: draft.pdfs.clone(),
            email: user.email.clone(),
        };
        self.backend.submit_invoice(session, &body).await?;

        metrics::record_transition(InvoiceAction::Submit.as_str(), "ok");
        tracing::info!(
            po_number = %body.fields.po_number,
            po_pdfs = body.pdfs.po_pdf.len(),
            invoice_pdfs = body.pdfs.invoice_pdf.len(),
            "Invoice submitted"
        );
        draft.reset();
        Ok(status)
    }

    pub async fn finance_invoices(
        &self,
        session: &SessionContext,
        tab: InvoiceStatus,
    ) -> Result<Vec<Invoice>, AppError> {
        self.backend.list_invoices(session, tab).await
    }

    /// Ask the vendor for changes. Returns the refreshed `tab` list.
    pub async fn send_remark(
        &self,
        session: &SessionContext,
        invoice: Option<&Invoice>,
        remark: &str,
        tab: InvoiceStatus,
    ) -> Result<Vec<Invoice>, AppError> {
        let invoice = selected(invoice)?;
        if remark.trim().is_empty() {
            return Err(AppError::invalid("Please enter a remark."));
        }
        check_transition(Some(invoice.status), InvoiceAction::SendRemark)?;

        let body = RemarkRequest {
            remark: remark.to_string(),
            pdfs: invoice.pdfs.clone(),
        };
        self.backend
            .send_remark(session, invoice.id(), &body)
            .await?;

        metrics::record_transition(InvoiceAction::SendRemark.as_str(), "ok");
        tracing::info!(invoice_id = %invoice.id(), "Remark sent to vendor");
        self.finance_invoices(session, tab).await
    }

    /// Approve for payment. Returns the refreshed `tab` list.
    pub async fn send_for_payment(
        &self,
        session: &SessionContext,
        invoice: Option<&Invoice>,
        message: Option<&str>,
        tab: InvoiceStatus,
    ) -> Result<Vec<Invoice>, AppError> {
        let invoice = selected(invoice)?;
        check_transition(Some(invoice.status), InvoiceAction::SendForPayment)?;

        let body = PaymentRequest {
            message: message.unwrap_or_default().to_string(),
        };
        self.backend
            .send_for_payment(session, invoice.id(), &body)
            .await?;

        metrics::record_transition(InvoiceAction::SendForPayment.as_str(), "ok");
        tracing::info!(invoice_id = %invoice.id(), "Invoice sent for payment");
        self.finance_invoices(session, tab).await
    }

    pub async fn vendor_inbox(&self, session: &SessionContext) -> Result<VendorInbox, AppError> {
        let user = session.require_user()?;
        let invoices = self.backend.vendor_inbox(session, &user.email).await?;
        Ok(VendorInbox::from(invoices))
    }

    /// Resubmit a flagged invoice with corrected fields and any new files.
    ///
    /// Files are uploaded first; if the backend then refuses the resubmission
    /// the freshly uploaded objects are deleted again.
    pub async fn reupload(
        &self,
        session: &SessionContext,
        invoice: Option<&Invoice>,
        mut fields: InvoiceFields,
        files: Vec<(PdfField, Vec<UploadFile>)>,
    ) -> Result<ReuploadOutcome, AppError> {
        let invoice = selected(invoice)?;
        check_transition(Some(invoice.status), InvoiceAction::Reupload)?;
        fields.keep_identity_from(&invoice.fields);
        fields.validate()?;

        let (uploads, pdfs) = self.uploader.upload_fields(UploadScope::Reupload, files).await;

        let body = ReuploadRequest {
            pdfs,
            fields,
            reupload: true,
            remark: String::new(),
        };
        if let Err(e) = self
            .backend
            .reupload_invoice(session, invoice.id(), &body)
            .await
        {
            let orphaned: Vec<&str> = uploads
                .iter()
                .flat_map(|report| report.uploaded().map(|(_, key)| key))
                .collect();
            let deleted = self.uploader.sweep(orphaned).await;
            tracing::warn!(invoice_id = %invoice.id(), deleted, "Reupload refused, uploads removed");
            return Err(e);
        }

        metrics::record_transition(InvoiceAction::Reupload.as_str(), "ok");
        tracing::info!(
            invoice_id = %invoice.id(),
            new_files = body.pdfs.count(),
            "Invoice reuploaded"
        );

        let inbox = self.vendor_inbox(session).await?;
        Ok(ReuploadOutcome { uploads, inbox })
    }
}
