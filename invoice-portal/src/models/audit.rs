use super::opaque;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// One entry of the externally maintained audit trail. Read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditLogEntry {
    #[serde(deserialize_with = "opaque::text")]
    pub timestamp: String,
    #[serde(deserialize_with = "opaque::text")]
    pub gst_number: String,
    #[serde(deserialize_with = "opaque::text")]
    pub po_number: String,
    #[serde(deserialize_with = "opaque::text")]
    pub invoice_id: String,
    #[serde(deserialize_with = "opaque::text")]
    pub action: String,
    #[serde(deserialize_with = "opaque::text")]
    pub details: String,
    #[serde(deserialize_with = "opaque::text")]
    pub performed_by: String,
    #[serde(deserialize_with = "opaque::text")]
    pub role: String,
}

impl AuditLogEntry {
    /// `YYYY-MM-DD HH:MM:SS` for RFC 3339 timestamps, the raw value otherwise.
    pub fn display_timestamp(&self) -> String {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| self.timestamp.clone())
    }
}
