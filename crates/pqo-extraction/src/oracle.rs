//! The extraction-oracle boundary: a supplier-reply text extractor is an
//! opaque external collaborator (spec §6). This crate defines only the
//! contract and a deterministic fallback; a production deployment wires in
//! its own `Extractor` (an LLM call, a managed NLP service, ...) and falls
//! back to [`crate::regex_fallback::RegexFallbackExtractor`] when that
//! primary oracle is unreachable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub name: String,
    pub unit_price: Option<f64>,
    pub available_quantity: Option<i64>,
    pub unit: Option<String>,
    pub available: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedQuote {
    pub has_quote: bool,
    pub items: Vec<ExtractedItem>,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_days: Option<i64>,
    pub payment_terms: Option<String>,
    pub total_quote: Option<f64>,
    pub supplier_notes: Option<String>,
    pub confidence: f64,
    pub extraction_method: String,
}

/// `expected_items` names the line items the quotation requested, so an
/// implementation can anchor its search (or skip reply text that doesn't
/// mention any of them) instead of free-associating over the whole body.
pub trait Extractor: Send + Sync {
    fn extract(&self, email_body: &str, expected_items: &[String]) -> ExtractedQuote;
}
