//! Per-supplier debounce buffer (spec §4.8): low-stock products accumulate
//! per supplier and fire as one burst after `debounceMs` of inactivity.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use pqo_schemas::inventory::Product;

struct SupplierBuffer {
    products: HashMap<String, Product>,
    last_activity: Instant,
}

pub struct DebounceBuffers {
    by_supplier: HashMap<String, SupplierBuffer>,
    debounce: Duration,
}

impl DebounceBuffers {
    pub fn new(debounce: Duration) -> Self {
        Self { by_supplier: HashMap::new(), debounce }
    }

    /// Record a low-stock product under its supplier's buffer, resetting
    /// that supplier's inactivity timer.
    pub fn push(&mut self, supplier_id: &str, product: Product) {
        let entry = self.by_supplier.entry(supplier_id.to_string()).or_insert_with(|| SupplierBuffer {
            products: HashMap::new(),
            last_activity: Instant::now(),
        });
        entry.products.insert(product.id.clone(), product);
        entry.last_activity = Instant::now();
    }

    /// Pop every supplier buffer that has been quiet for at least
    /// `debounceMs`, draining its products.
    pub fn drain_ready(&mut self) -> Vec<(String, Vec<Product>)> {
        let now = Instant::now();
        let ready: Vec<String> = self
            .by_supplier
            .iter()
            .filter(|(_, buf)| now.duration_since(buf.last_activity) >= self.debounce)
            .map(|(supplier_id, _)| supplier_id.clone())
            .collect();

        ready
            .into_iter()
            .filter_map(|supplier_id| {
                self.by_supplier.remove(&supplier_id).map(|buf| (supplier_id, buf.products.into_values().collect()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqo_schemas::inventory::StockLevel;

    fn product(id: &str) -> Product {
        Product { id: id.to_string(), name: id.to_string(), stock: StockLevel::Direct { current_stock: 1 }, min_stock: 10, supplier: None }
    }

    #[test]
    fn buffer_is_not_ready_before_debounce_elapses() {
        let mut buffers = DebounceBuffers::new(Duration::from_secs(60));
        buffers.push("sup-1", product("p1"));
        assert!(buffers.drain_ready().is_empty());
    }

    #[test]
    fn buffer_is_ready_once_debounce_elapses() {
        let mut buffers = DebounceBuffers::new(Duration::from_millis(1));
        buffers.push("sup-1", product("p1"));
        std::thread::sleep(Duration::from_millis(10));
        let ready = buffers.drain_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, "sup-1");
        assert_eq!(ready[0].1.len(), 1);
    }

    #[test]
    fn repeated_push_resets_the_timer() {
        let mut buffers = DebounceBuffers::new(Duration::from_millis(30));
        buffers.push("sup-1", product("p1"));
        std::thread::sleep(Duration::from_millis(20));
        buffers.push("sup-1", product("p2"));
        std::thread::sleep(Duration::from_millis(20));
        // Only 40ms since the *first* push, but 20ms since the latest one —
        // still under the 30ms debounce from p2's activity.
        assert!(buffers.drain_ready().is_empty());
    }
}
