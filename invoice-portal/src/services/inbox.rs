use crate::models::invoice::{Invoice, InvoiceStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Finance inbox filters. Both are optional and independent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    /// Case-insensitive substring of the GST number.
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub status_filter: Option<InvoiceStatus>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        let term = self.search.to_lowercase();
        let search_ok = term.is_empty() || invoice.fields.gst_number.to_lowercase().contains(&term);
        let status_ok = self.status_filter.map_or(true, |s| invoice.status == s);
        search_ok && status_ok
    }

    pub fn apply<'a>(&self, invoices: &'a [Invoice]) -> Vec<&'a Invoice> {
        invoices.iter().filter(|i| self.matches(i)).collect()
    }
}

/// Invoices sharing one raw `po_date` value.
#[derive(Debug, Clone, Serialize)]
pub struct PoDateGroup {
    pub po_date: String,
    pub vendors: BTreeSet<String>,
    pub invoices: Vec<Invoice>,
}

/// Group by `po_date` in first-seen order. Dates are compared as text.
pub fn group_by_po_date(invoices: &[&Invoice]) -> Vec<PoDateGroup> {
    let mut groups: Vec<PoDateGroup> = Vec::new();
    for invoice in invoices {
        let po_date = &invoice.fields.po_date;
        let position = match groups.iter().position(|g| &g.po_date == po_date) {
            Some(position) => position,
            None => {
                groups.push(PoDateGroup {
                    po_date: po_date.clone(),
                    vendors: BTreeSet::new(),
                    invoices: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[position];
        group.vendors.insert(invoice.fields.name.clone());
        group.invoices.push((*invoice).clone());
    }
    groups
}

#[derive(Debug, Clone, Serialize)]
pub struct FinanceInbox {
    pub tab: InvoiceStatus,
    /// Invoices in the tab before filtering.
    pub total: usize,
    pub matched: usize,
    pub groups: Vec<PoDateGroup>,
}

impl FinanceInbox {
    pub fn build(tab: InvoiceStatus, invoices: &[Invoice], filter: &InvoiceFilter) -> Self {
        let filtered = filter.apply(invoices);
        Self {
            tab,
            total: invoices.len(),
            matched: filtered.len(),
            groups: group_by_po_date(&filtered),
        }
    }
}
