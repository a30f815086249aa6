use crate::models::invoice::{InvoiceFields, PdfField, PdfSet};
use crate::services::uploader::UploadReport;
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as DraftLock, OwnedMutexGuard};
use tower_sessions::Session;

/// An invoice the vendor is still filling in. Lives server side, keyed by the
/// login that started it, until it is submitted or cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceDraft {
    pub fields: InvoiceFields,
    pub pdfs: PdfSet,
    /// Storage keys uploaded for this draft and not yet submitted.
    #[serde(skip_serializing)]
    pub pending_keys: Vec<String>,
}

/// Exclusive access to one login's draft. Held from read to write so that
/// overlapping requests of the same browser apply one after the other.
pub type DraftGuard = OwnedMutexGuard<InvoiceDraft>;

struct Slot {
    draft: Arc<DraftLock<InvoiceDraft>>,
    touched: Instant,
}

/// Drafts of every signed-in vendor. Slots idle for longer than the session
/// lifetime are dropped.
#[derive(Clone)]
pub struct DraftStore {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    idle_ttl: Duration,
}

impl DraftStore {
    /// Session key holding the draft key of the current login.
    pub const SESSION_KEY: &'static str = "draft_key";

    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
        }
    }

    /// A fresh key; written into the session at login.
    pub fn new_key() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Lock the draft of the session's login, creating an empty one on first use.
    pub async fn open(&self, session: &Session) -> Result<DraftGuard, AppError> {
        let key = Self::key_of(session).await?;
        Ok(self.lock(key).await)
    }

    /// Forget the draft of the session's login. Uploaded objects are not touched.
    pub async fn discard(&self, session: &Session) -> Result<(), AppError> {
        if let Some(key) = session.get::<String>(Self::SESSION_KEY).await.map_err(store_error)? {
            self.slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
        Ok(())
    }

    async fn key_of(session: &Session) -> Result<String, AppError> {
        session
            .get::<String>(Self::SESSION_KEY)
            .await
            .map_err(store_error)?
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not signed in")))
    }

    async fn lock(&self, key: String) -> DraftGuard {
        let draft = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            slots.retain(|_, slot| {
                Arc::strong_count(&slot.draft) > 1 || now.duration_since(slot.touched) < self.idle_ttl
            });
            let slot = slots.entry(key).or_insert_with(|| Slot {
                draft: Arc::new(DraftLock::new(InvoiceDraft::default())),
                touched: now,
            });
            slot.touched = now;
            slot.draft.clone()
        };
        draft.lock_owned().await
    }
}

fn store_error(e: tower_sessions::session::Error) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Session store error: {}", e))
}

impl InvoiceDraft {
    /// Append every stored file of the batch, in order.
    pub fn record(&mut self, report: &UploadReport) {
        for (url, key) in report.uploaded() {
            self.pdfs.append(report.field, url.to_string());
            self.pending_keys.push(key.to_string());
        }
    }

    pub fn holds(&self, field: PdfField, url: &str) -> bool {
        self.pdfs.urls(field).iter().any(|u| u == url)
    }

    /// Drop a file the vendor removed; `key` is its storage key.
    pub fn forget(&mut self, field: PdfField, url: &str, key: &str) -> bool {
        let removed = self.pdfs.remove(field, url);
        self.pending_keys.retain(|k| k != key);
        removed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
