//! pqo-extraction — the supplier-reply extraction oracle boundary (spec §6)
//! plus its deterministic regex fallback (spec §9).

pub mod oracle;
pub mod regex_fallback;

pub use oracle::{ExtractedItem, ExtractedQuote, Extractor};
pub use regex_fallback::RegexFallbackExtractor;
