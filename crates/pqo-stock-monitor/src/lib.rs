//! pqo-stock-monitor — watches inventory for low-stock conditions and fans
//! out debounced, dedup-locked auto-quotation requests per supplier (spec
//! §4.8).

pub mod auto_quote;
pub mod buffer;
pub mod monitor;

pub use auto_quote::{create_or_reset_auto_quotation, AutoQuoteOutcome};
pub use buffer::DebounceBuffers;
pub use monitor::StockMonitor;
