use crate::models::audit::AuditLogEntry;
use crate::services::backend_client::BackendClient;
use crate::services::session::SessionContext;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::Arc;

pub const PAGE_SIZE: usize = 10;

/// Role/action filters and the requested page. `"all"` or nothing means no filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
}

fn active(filter: &Option<String>) -> Option<&str> {
    filter
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty() && !f.eq_ignore_ascii_case("all"))
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        active(&self.role).map_or(true, |role| entry.role == role)
            && active(&self.action).map_or(true, |action| entry.action == action)
    }

    pub fn apply<'a>(&self, entries: &'a [AuditLogEntry]) -> Vec<&'a AuditLogEntry> {
        entries.iter().filter(|e| self.matches(e)).collect()
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !value.is_empty() && !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    /// Filter choices, taken from the unfiltered log.
    pub roles: Vec<String>,
    pub actions: Vec<String>,
}

impl AuditPage {
    /// Filter, then cut out one page. Out-of-range pages are clamped.
    pub fn build(entries: &[AuditLogEntry], query: &AuditQuery) -> Self {
        let filtered = query.apply(entries);
        let total = filtered.len();
        let total_pages = total.div_ceil(PAGE_SIZE).max(1);
        let page = query.page.unwrap_or(1).clamp(1, total_pages);

        Self {
            entries: filtered
                .into_iter()
                .skip((page - 1) * PAGE_SIZE)
                .take(PAGE_SIZE)
                .cloned()
                .collect(),
            page,
            total_pages,
            total,
            roles: distinct(entries.iter().map(|e| e.role.as_str())),
            actions: distinct(entries.iter().map(|e| e.action.as_str())),
        }
    }
}

/// Read access to the backend's audit trail.
pub struct AuditTrail {
    backend: Arc<BackendClient>,
}

impl AuditTrail {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    pub async fn fetch(&self, session: &SessionContext) -> Result<Vec<AuditLogEntry>, AppError> {
        self.backend.audit_logs(session).await
    }
}
