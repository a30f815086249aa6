pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use services::{
    audit::AuditTrail, backend_client::BackendClient, draft::DraftStore, storage::Storage,
    uploader::PdfUploader, vendors::VendorAdmin, workflow::InvoiceWorkflow,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state: clients plus the vendors' drafts, cloned into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
    pub workflow: Arc<InvoiceWorkflow>,
    pub vendors: Arc<VendorAdmin>,
    pub audit: Arc<AuditTrail>,
    pub drafts: DraftStore,
}

impl AppState {
    pub fn new(backend: Arc<BackendClient>, storage: Arc<dyn Storage>, draft_ttl: Duration) -> Self {
        let uploader = PdfUploader::new(storage);
        Self {
            workflow: Arc::new(InvoiceWorkflow::new(backend.clone(), uploader)),
            vendors: Arc::new(VendorAdmin::new(backend.clone())),
            audit: Arc::new(AuditTrail::new(backend.clone())),
            drafts: DraftStore::new(draft_ttl),
            backend,
        }
    }
}
