//! Inventory/product types watched by the Stock Monitor (spec §4.8).

use serde::{Deserialize, Serialize};

/// A supplier configured on a product, with auto-request opt-in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSupplier {
    pub supplier_id: String,
    pub email: String,
    pub auto_request: bool,
}

/// Stock is either a direct field or `packageQuantity × packageCount`; the
/// product carries whichever shape its source system uses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StockLevel {
    Direct { current_stock: i64 },
    Packaged { package_quantity: i64, package_count: i64 },
}

impl StockLevel {
    pub fn current_stock(&self) -> i64 {
        match self {
            Self::Direct { current_stock } => *current_stock,
            Self::Packaged { package_quantity, package_count } => package_quantity * package_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub stock: StockLevel,
    pub min_stock: i64,
    pub supplier: Option<ProductSupplier>,
}

impl Product {
    pub fn is_below_min_stock(&self) -> bool {
        self.stock.current_stock() <= self.min_stock
    }

    pub fn eligible_for_auto_request(&self) -> bool {
        self.is_below_min_stock() && self.supplier.as_ref().is_some_and(|s| s.auto_request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packaged_stock_multiplies() {
        let stock = StockLevel::Packaged { package_quantity: 12, package_count: 3 };
        assert_eq!(stock.current_stock(), 36);
    }

    #[test]
    fn eligible_requires_auto_request_supplier_and_low_stock() {
        let mut product = Product {
            id: "p1".into(),
            name: "Widget".into(),
            stock: StockLevel::Direct { current_stock: 5 },
            min_stock: 10,
            supplier: Some(ProductSupplier { supplier_id: "s1".into(), email: "s@ex.com".into(), auto_request: true }),
        };
        assert!(product.eligible_for_auto_request());

        product.supplier.as_mut().unwrap().auto_request = false;
        assert!(!product.eligible_for_auto_request());

        product.supplier.as_mut().unwrap().auto_request = true;
        product.stock = StockLevel::Direct { current_stock: 20 };
        assert!(!product.eligible_for_auto_request());
    }
}
