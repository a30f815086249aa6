//! Spreadsheet export of the finance inbox and CSV export of the audit trail.

use crate::models::audit::AuditLogEntry;
use crate::models::invoice::{Invoice, InvoiceStatus};
use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_xlsxwriter::{Format, Workbook};
use service_core::error::AppError;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CSV_MIME: &str = "text/csv; charset=utf-8";

pub const INVOICE_SHEET: &str = "Invoices";

pub const INVOICE_COLUMNS: [&str; 26] = [
    "Vendor Code",
    "Vendor Name",
    "Vendor Address",
    "Vendor State",
    "GST Number",
    "PAN Number",
    "TIL Billing Location",
    "TIL Billing Address",
    "TIL State",
    "PO Number",
    "PO Date",
    "Cost Center",
    "HSN/SAC Code",
    "Service/Goods Description",
    "Taxable Amount",
    "GST Rate",
    "CGST",
    "SGST",
    "IGST",
    "Place of Supply",
    "Business Name",
    "PO PDFs",
    "Invoice PDFs",
    "Status",
    "Remark",
    "Reupload",
];

pub const AUDIT_COLUMNS: [&str; 8] = [
    "Timestamp",
    "GST Number",
    "PO Number",
    "Invoice ID",
    "Action",
    "Details",
    "Performed By",
    "Role",
];

/// A generated file, sent to the browser as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl IntoResponse for ExportFile {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.file_name);
        (
            [
                (header::CONTENT_TYPE, self.content_type.to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Failed to build spreadsheet: {}", e))
}

pub fn invoice_row(invoice: &Invoice) -> [String; 26] {
    let f = &invoice.fields;
    [
        f.id.clone(),
        f.name.clone(),
        f.address.clone(),
        f.state.clone(),
        f.gst_number.clone(),
        f.pan.clone(),
        f.billing_location_til.clone(),
        f.til_billing_address.clone(),
        f.til_state.clone(),
        f.po_number.clone(),
        f.po_date.clone(),
        f.cost_center.clone(),
        f.sac_code.clone(),
        f.service_desc.clone(),
        f.taxable_amt.clone(),
        f.gst_rate.clone(),
        f.cgst.clone(),
        f.sgst.clone(),
        f.igst.clone(),
        f.supply_place.clone(),
        f.business_name.clone(),
        invoice.pdfs.po_pdf.join(", "),
        invoice.pdfs.invoice_pdf.join(", "),
        invoice.status.as_str().to_string(),
        invoice.remark.clone().unwrap_or_default(),
        if invoice.reupload { "Yes" } else { "" }.to_string(),
    ]
}

pub fn invoices_xlsx(invoices: &[&Invoice]) -> Result<Vec<u8>, AppError> {
    if invoices.is_empty() {
        return Err(AppError::invalid("No invoices to export."));
    }

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(INVOICE_SHEET).map_err(xlsx_error)?;

    for (col, title) in INVOICE_COLUMNS.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *title, &bold)
            .map_err(xlsx_error)?;
    }
    for (row, invoice) in invoices.iter().enumerate() {
        for (col, value) in invoice_row(invoice).iter().enumerate() {
            sheet
                .write_string(row as u32 + 1, col as u16, value)
                .map_err(xlsx_error)?;
        }
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

pub fn invoice_export_name(tab: InvoiceStatus, now: DateTime<Utc>) -> String {
    format!(
        "invoices_{}_{}.xlsx",
        tab.as_str(),
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

pub fn export_invoices(
    tab: InvoiceStatus,
    invoices: &[&Invoice],
    now: DateTime<Utc>,
) -> Result<ExportFile, AppError> {
    Ok(ExportFile {
        bytes: invoices_xlsx(invoices)?,
        file_name: invoice_export_name(tab, now),
        content_type: XLSX_MIME,
    })
}

fn audit_row(entry: &AuditLogEntry) -> [String; 8] {
    [
        entry.display_timestamp(),
        entry.gst_number.clone(),
        entry.po_number.clone(),
        entry.invoice_id.clone(),
        entry.action.clone(),
        entry.details.clone(),
        entry.performed_by.clone(),
        entry.role.clone(),
    ]
}

/// Every field quoted, embedded quotes doubled, `\n` line ends.
pub fn audit_csv(entries: &[&AuditLogEntry]) -> Result<Vec<u8>, AppError> {
    if entries.is_empty() {
        return Err(AppError::invalid("No audit logs to export."));
    }

    let csv_error =
        |e: csv::Error| AppError::InternalError(anyhow::anyhow!("Failed to write CSV: {}", e));

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(AUDIT_COLUMNS).map_err(csv_error)?;
    for entry in entries {
        writer.write_record(audit_row(entry)).map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to flush CSV: {}", e)))
}

pub fn audit_export_name(now: DateTime<Utc>) -> String {
    format!("audit-logs-{}.csv", now.timestamp_millis())
}

pub fn export_audit(entries: &[&AuditLogEntry], now: DateTime<Utc>) -> Result<ExportFile, AppError> {
    Ok(ExportFile {
        bytes: audit_csv(entries)?,
        file_name: audit_export_name(now),
        content_type: CSV_MIME,
    })
}
