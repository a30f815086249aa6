//! Invoice records and the status lifecycle.
//!
//! The backend owns every invoice; this module only describes the wire shape
//! and the four lifecycle edges the portal is allowed to request.

use super::{opaque, vendor::Vendor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    ChangesRequested,
    SentForPayment,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 3] = [
        InvoiceStatus::Pending,
        InvoiceStatus::ChangesRequested,
        InvoiceStatus::SentForPayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::ChangesRequested => "changes_requested",
            InvoiceStatus::SentForPayment => "sent_for_payment",
        }
    }

    /// Actions that have an edge out of this status.
    pub const fn valid_actions(&self) -> &'static [InvoiceAction] {
        match self {
            InvoiceStatus::Pending => &[InvoiceAction::SendRemark, InvoiceAction::SendForPayment],
            InvoiceStatus::ChangesRequested => &[InvoiceAction::Reupload],
            InvoiceStatus::SentForPayment => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_actions().is_empty()
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "changes_requested" => Ok(InvoiceStatus::ChangesRequested),
            "sent_for_payment" => Ok(InvoiceStatus::SentForPayment),
            _ => Err(format!("Invalid invoice status: {}", s)),
        }
    }
}

/// Something a user can ask the backend to do to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceAction {
    Submit,
    SendRemark,
    SendForPayment,
    Reupload,
}

impl InvoiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceAction::Submit => "submit",
            InvoiceAction::SendRemark => "send_remark",
            InvoiceAction::SendForPayment => "send_for_payment",
            InvoiceAction::Reupload => "reupload",
        }
    }
}

impl fmt::Display for InvoiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("a new invoice can only be submitted, not {action}")]
    NotCreated { action: InvoiceAction },

    #[error("cannot {action} an invoice that is {from}")]
    NotAllowed {
        from: InvoiceStatus,
        action: InvoiceAction,
    },
}

/// The lifecycle table. `from` is `None` for an invoice that does not exist yet.
pub fn next_status(
    from: Option<InvoiceStatus>,
    action: InvoiceAction,
) -> Result<InvoiceStatus, TransitionError> {
    match (from, action) {
        (None, InvoiceAction::Submit) => Ok(InvoiceStatus::Pending),
        (None, action) => Err(TransitionError::NotCreated { action }),
        (Some(InvoiceStatus::Pending), InvoiceAction::SendRemark) => {
            Ok(InvoiceStatus::ChangesRequested)
        }
        (Some(InvoiceStatus::Pending), InvoiceAction::SendForPayment) => {
            Ok(InvoiceStatus::SentForPayment)
        }
        (Some(InvoiceStatus::ChangesRequested), InvoiceAction::Reupload) => {
            Ok(InvoiceStatus::Pending)
        }
        (Some(from), action) => Err(TransitionError::NotAllowed { from, action }),
    }
}

/// The two PDF slots on an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfField {
    PoPdf,
    InvoicePdf,
}

impl PdfField {
    pub const ALL: [PdfField; 2] = [PdfField::PoPdf, PdfField::InvoicePdf];

    pub fn as_str(&self) -> &'static str {
        match self {
            PdfField::PoPdf => "po_pdf",
            PdfField::InvoicePdf => "invoice_pdf",
        }
    }
}

impl fmt::Display for PdfField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PdfField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "po_pdf" => Ok(PdfField::PoPdf),
            "invoice_pdf" => Ok(PdfField::InvoicePdf),
            _ => Err(format!("Unknown PDF field: {}", s)),
        }
    }
}

/// Ordered storage URLs per PDF slot. URLs are only ever appended or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfSet {
    #[serde(default, deserialize_with = "opaque::or_default")]
    pub po_pdf: Vec<String>,
    #[serde(default, deserialize_with = "opaque::or_default")]
    pub invoice_pdf: Vec<String>,
}

impl PdfSet {
    pub fn urls(&self, field: PdfField) -> &[String] {
        match field {
            PdfField::PoPdf => &self.po_pdf,
            PdfField::InvoicePdf => &self.invoice_pdf,
        }
    }

    fn urls_mut(&mut self, field: PdfField) -> &mut Vec<String> {
        match field {
            PdfField::PoPdf => &mut self.po_pdf,
            PdfField::InvoicePdf => &mut self.invoice_pdf,
        }
    }

    pub fn append(&mut self, field: PdfField, url: String) {
        self.urls_mut(field).push(url);
    }

    /// Drop every occurrence of `url`; returns whether anything was removed.
    pub fn remove(&mut self, field: PdfField, url: &str) -> bool {
        let urls = self.urls_mut(field);
        let before = urls.len();
        urls.retain(|u| u != url);
        urls.len() != before
    }

    /// Append newly uploaded URLs after the existing ones, per field.
    pub fn merge(&mut self, new: &NewPdfs) {
        for (field, urls) in &new.0 {
            self.urls_mut(*field).extend(urls.iter().cloned());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.po_pdf.is_empty() && self.invoice_pdf.is_empty()
    }
}

/// URLs uploaded during a reupload, keyed by the slot they belong to. Only
/// slots that received files appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewPdfs(pub BTreeMap<PdfField, Vec<String>>);

impl NewPdfs {
    pub fn push(&mut self, field: PdfField, url: String) {
        self.0.entry(field).or_default().push(url);
    }

    pub fn count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

fn numeric_text(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_digit() || c == '.') {
        Ok(())
    } else {
        let mut err = ValidationError::new("numeric");
        err.message = Some("only digits and '.' are allowed".into());
        Err(err)
    }
}

/// The editable part of an invoice: vendor identity copy plus tax and billing
/// details. All values are opaque text to the portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InvoiceFields {
    /// Vendor code.
    #[serde(deserialize_with = "opaque::text")]
    pub id: String,
    #[serde(deserialize_with = "opaque::text")]
    pub name: String,
    #[serde(deserialize_with = "opaque::text")]
    pub address: String,
    #[serde(deserialize_with = "opaque::text")]
    pub state: String,
    #[serde(deserialize_with = "opaque::text")]
    #[validate(length(min = 1, message = "GST number is required"))]
    pub gst_number: String,
    #[serde(deserialize_with = "opaque::text")]
    pub pan: String,
    #[serde(deserialize_with = "opaque::text")]
    pub billing_location_til: String,
    #[serde(deserialize_with = "opaque::text")]
    pub til_billing_address: String,
    #[serde(deserialize_with = "opaque::text")]
    pub til_state: String,
    #[serde(deserialize_with = "opaque::text")]
    #[validate(length(min = 1, message = "PO number is required"))]
    pub po_number: String,
    #[serde(deserialize_with = "opaque::text")]
    pub po_date: String,
    #[serde(deserialize_with = "opaque::text")]
    pub cost_center: String,
    #[serde(deserialize_with = "opaque::text")]
    pub sac_code: String,
    #[serde(deserialize_with = "opaque::text")]
    pub service_desc: String,
    #[serde(deserialize_with = "opaque::text")]
    #[validate(custom(function = "numeric_text"))]
    pub taxable_amt: String,
    #[serde(deserialize_with = "opaque::text")]
    #[validate(custom(function = "numeric_text"))]
    pub gst_rate: String,
    #[serde(deserialize_with = "opaque::text")]
    #[validate(custom(function = "numeric_text"))]
    pub cgst: String,
    #[serde(deserialize_with = "opaque::text")]
    #[validate(custom(function = "numeric_text"))]
    pub sgst: String,
    #[serde(deserialize_with = "opaque::text")]
    #[validate(custom(function = "numeric_text"))]
    pub igst: String,
    #[serde(deserialize_with = "opaque::text")]
    pub supply_place: String,
    #[serde(deserialize_with = "opaque::text")]
    pub business_name: String,
}

impl InvoiceFields {
    /// Copy the vendor master's identity fields over the form's.
    pub fn apply_vendor(&mut self, vendor: &Vendor) {
        self.id = vendor.id.clone();
        self.name = vendor.name.clone();
        self.address = vendor.address.clone();
        self.state = vendor.state.clone();
        self.gst_number = vendor.gst_number.clone();
        self.pan = vendor.pan.clone();
    }

    /// Vendor identity is read-only once submitted; take it from `original`.
    pub fn keep_identity_from(&mut self, original: &InvoiceFields) {
        self.id = original.id.clone();
        self.name = original.name.clone();
        self.address = original.address.clone();
        self.state = original.state.clone();
        self.gst_number = original.gst_number.clone();
        self.pan = original.pan.clone();
    }
}

/// An invoice as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(flatten)]
    pub fields: InvoiceFields,
    #[serde(default, deserialize_with = "opaque::or_default")]
    pub pdfs: PdfSet,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default, deserialize_with = "opaque::or_default")]
    pub reupload: bool,
}

impl Invoice {
    pub fn id(&self) -> &str {
        &self.fields.id
    }
}

/// Body of `POST /vendor/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    #[serde(flatten)]
    pub fields: InvoiceFields,
    pub pdfs: PdfSet,
    pub email: String,
}

/// Body of `POST /reupload/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReuploadRequest {
    pub pdfs: NewPdfs,
    #[serde(flatten)]
    pub fields: InvoiceFields,
    pub reupload: bool,
    /// Always empty: a resubmitted invoice starts its new review cycle without
    /// the previous remark.
    pub remark: String,
}

/// Body of `POST /remark/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemarkRequest {
    pub remark: String,
    pub pdfs: PdfSet,
}

/// Body of `POST /send-for-payment/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub message: String,
}
