//! Input to `CreateOrderFromQuotation` and its fail-fast validation (spec §4.7).

use crate::error::ValidationError;

#[derive(Clone, Debug)]
pub struct RequestedItem {
    pub product_id: String,
    pub quantity_to_order: i64,
    pub quoted_unit_price: f64,
}

#[derive(Clone, Debug)]
pub struct CreateOrderRequest {
    pub quotation_id: String,
    pub supplier_id: String,
    pub items: Vec<RequestedItem>,
    pub delivery_terms: Option<String>,
}

impl CreateOrderRequest {
    /// Checks run in a fixed order, so the first violated invariant is
    /// always the one reported.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quotation_id.trim().is_empty() {
            return Err(ValidationError::MissingQuotationId);
        }
        if self.supplier_id.trim().is_empty() {
            return Err(ValidationError::MissingSupplierId);
        }
        if self.items.is_empty() {
            return Err(ValidationError::EmptyItems);
        }
        for item in &self.items {
            if !item.quoted_unit_price.is_finite() {
                return Err(ValidationError::InvalidUnitPrice { product_id: item.product_id.clone() });
            }
            if item.quantity_to_order <= 0 {
                return Err(ValidationError::InvalidQuantity { product_id: item.product_id.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CreateOrderRequest {
        CreateOrderRequest {
            quotation_id: "quotation_abc".into(),
            supplier_id: "sup-1".into(),
            items: vec![RequestedItem { product_id: "p1".into(), quantity_to_order: 5, quoted_unit_price: 2.5 }],
            delivery_terms: None,
        }
    }

    #[test]
    fn rejects_empty_quotation_id() {
        let mut req = base();
        req.quotation_id = "".into();
        assert_eq!(req.validate(), Err(ValidationError::MissingQuotationId));
    }

    #[test]
    fn rejects_empty_items() {
        let mut req = base();
        req.items.clear();
        assert_eq!(req.validate(), Err(ValidationError::EmptyItems));
    }

    #[test]
    fn rejects_nan_unit_price() {
        let mut req = base();
        req.items[0].quoted_unit_price = f64::NAN;
        assert_eq!(req.validate(), Err(ValidationError::InvalidUnitPrice { product_id: "p1".into() }));
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let mut req = base();
        req.items[0].quantity_to_order = 0;
        assert_eq!(req.validate(), Err(ValidationError::InvalidQuantity { product_id: "p1".into() }));
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(base().validate().is_ok());
    }
}
