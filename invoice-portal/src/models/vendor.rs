use super::opaque;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Vendor master record, owned by administrators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Vendor {
    #[serde(deserialize_with = "opaque::text")]
    #[validate(length(min = 1, message = "Vendor code is required"))]
    pub id: String,
    #[serde(deserialize_with = "opaque::text")]
    #[validate(length(min = 1, message = "Vendor name is required"))]
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
}

impl Vendor {
    /// Case-insensitive substring match against every field.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        [
            &self.id,
            &self.name,
            &self.address,
            &self.state,
            &self.gst_number,
            &self.pan,
        ]
        .iter()
        .any(|value| value.to_lowercase().contains(&query))
    }
}

/// Answer to `GET /vendor/gst/:gst_number`.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorLookup {
    #[serde(default)]
    pub vendor: Option<Vendor>,
}

/// Answer to `GET /vendor`.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorList {
    #[serde(default)]
    pub vendors: Vec<Vendor>,
}

/// Body of `POST /vendor/bulk-create`.
#[derive(Debug, Clone, Serialize)]
pub struct BulkCreateVendors<'a> {
    pub vendors: &'a [Vendor],
}
