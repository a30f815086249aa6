pub mod audit;
pub mod invoice;
pub mod user;
pub mod vendor;

pub use audit::AuditLogEntry;
pub use invoice::{
    next_status, Invoice, InvoiceAction, InvoiceFields, InvoiceStatus, NewPdfs, PdfField, PdfSet,
    TransitionError,
};
pub use user::{Role, UserProfile};
pub use vendor::Vendor;

/// Deserializers for backend fields whose JSON type is not stable.
pub(crate) mod opaque {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        UInt(u64),
        Float(f64),
        Bool(bool),
    }

    /// Accept a string, a number, a boolean or null and keep it as text.
    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None => String::new(),
            Some(Raw::Text(s)) => s,
            Some(Raw::Int(n)) => n.to_string(),
            Some(Raw::UInt(n)) => n.to_string(),
            Some(Raw::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
            Some(Raw::Float(f)) => f.to_string(),
            Some(Raw::Bool(b)) => b.to_string(),
        })
    }

    /// A missing key and an explicit null both give the default.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

}
