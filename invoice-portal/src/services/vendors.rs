use crate::models::vendor::Vendor;
use crate::services::backend_client::BackendClient;
use crate::services::session::SessionContext;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;
use service_core::error::AppError;
use std::io::Cursor;
use std::sync::Arc;
use validator::Validate;

/// Column headers of the bulk-import sheet, matched case-insensitively.
pub const IMPORT_HEADERS: [&str; 6] = ["ID", "Name", "Address", "State", "GST Number", "PAN"];

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub vendors: Vec<Vendor>,
}

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(value) => value.to_string().trim().to_string(),
    }
}

/// Read vendor rows from the first sheet of an xlsx/xls/ods workbook. The
/// first row is the header; blank rows are skipped.
pub fn parse_vendor_sheet(bytes: Vec<u8>) -> Result<Vec<Vendor>, AppError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::invalid(format!("Unreadable spreadsheet: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::invalid("The spreadsheet has no sheets"))?
        .map_err(|e| AppError::invalid(format!("Unreadable spreadsheet: {}", e)))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| AppError::invalid("The spreadsheet is empty"))?
        .iter()
        .map(|c| c.to_string().trim().to_lowercase())
        .collect();

    let mut columns = [0usize; 6];
    for (slot, name) in columns.iter_mut().zip(IMPORT_HEADERS) {
        *slot = header
            .iter()
            .position(|h| h == &name.to_lowercase())
            .ok_or_else(|| AppError::invalid(format!("Missing column: {}", name)))?;
    }

    let mut vendors = Vec::new();
    for row in rows {
        let [id, name, address, state, gst_number, pan] =
            columns.map(|index| cell_text(row.get(index)));
        if [&id, &name, &address, &state, &gst_number, &pan]
            .iter()
            .all(|v| v.is_empty())
        {
            continue;
        }
        vendors.push(Vendor {
            id,
            name,
            address,
            state,
            gst_number,
            pan,
        });
    }
    Ok(vendors)
}

/// Vendor master administration.
pub struct VendorAdmin {
    backend: Arc<BackendClient>,
}

impl VendorAdmin {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    /// All vendors, narrowed by `query` across every field when given.
    pub async fn list(
        &self,
        session: &SessionContext,
        query: Option<&str>,
    ) -> Result<Vec<Vendor>, AppError> {
        let vendors = self.backend.list_vendors(session).await?;
        Ok(match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => vendors.into_iter().filter(|v| v.matches(q)).collect(),
            None => vendors,
        })
    }

    pub async fn create(
        &self,
        session: &SessionContext,
        vendor: Vendor,
    ) -> Result<Vec<Vendor>, AppError> {
        vendor.validate()?;
        self.backend.create_vendor(session, &vendor).await?;
        tracing::info!(vendor_id = %vendor.id, "Vendor created");
        self.list(session, None).await
    }

    pub async fn update(
        &self,
        session: &SessionContext,
        vendor_id: &str,
        mut vendor: Vendor,
    ) -> Result<Vec<Vendor>, AppError> {
        vendor.id = vendor_id.to_string();
        vendor.validate()?;
        self.backend.update_vendor(session, &vendor).await?;
        tracing::info!(vendor_id = %vendor.id, "Vendor updated");
        self.list(session, None).await
    }

    pub async fn delete(&self, session: &SessionContext, vendor_id: &str) -> Result<Vec<Vendor>, AppError> {
        self.backend.delete_vendor(session, vendor_id).await?;
        tracing::info!(vendor_id = %vendor_id, "Vendor deleted");
        self.list(session, None).await
    }

    /// Parse the uploaded workbook, check every row, then create them in one call.
    pub async fn bulk_import(
        &self,
        session: &SessionContext,
        workbook: Vec<u8>,
    ) -> Result<ImportSummary, AppError> {
        let vendors = parse_vendor_sheet(workbook)?;
        if vendors.is_empty() {
            return Err(AppError::invalid("No vendor rows found in the spreadsheet"));
        }
        for (index, vendor) in vendors.iter().enumerate() {
            vendor.validate().map_err(|e| {
                // Row 1 is the header.
                AppError::invalid(format!("Row {}: {}", index + 2, e))
            })?;
        }

        self.backend.bulk_create_vendors(session, &vendors).await?;
        tracing::info!(count = vendors.len(), "Vendors imported");

        Ok(ImportSummary {
            imported: vendors.len(),
            vendors: self.list(session, None).await?,
        })
    }
}
