//! Deterministic regex extraction used when the primary oracle is
//! unreachable (spec §9). Confidence accumulates: 0.5 base + 0.2 for at
//! least one priced item + 0.1 each for payment terms and delivery days +
//! 0.05 for supplier notes.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::oracle::{ExtractedItem, ExtractedQuote, Extractor};

fn payment_terms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(pagamento[^\n,.;]*|net\s+\d+|\d+\s+dias\s+boleto)").unwrap())
}

fn delivery_days_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:em\s+)?(\d+)\s+dias\s+(?:uteis|úteis)|(\d+)\s+business\s+days").unwrap())
}

fn delivery_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2})/(\d{2})/(\d{4})|(\d{4})-(\d{2})-(\d{2})").unwrap())
}

fn item_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^-?\s*([\p{L}][\p{L}\s]*?):\s*R\$\s*([\d.,]+)(?:\s*/\s*(\w+))?").unwrap())
}

fn supplier_notes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:observa[cç][aã]o|note)\s*:\s*(.+)").unwrap())
}

/// Parses a price written either `5,80` (comma decimal) or `1.234,56`
/// (dot thousands, comma decimal). A bare `.` is treated as the decimal
/// point, matching plain ASCII float notation.
fn parse_price(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let normalized = if raw.contains(',') && raw.contains('.') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw.replace(',', ".")
    };
    normalized.parse().ok()
}

pub struct RegexFallbackExtractor;

impl Extractor for RegexFallbackExtractor {
    fn extract(&self, email_body: &str, _expected_items: &[String]) -> ExtractedQuote {
        let mut confidence: f64 = 0.5;

        let items: Vec<ExtractedItem> = item_price_re()
            .captures_iter(email_body)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str().trim().to_string();
                let unit_price = parse_price(caps.get(2)?.as_str());
                let unit = caps.get(3).map(|m| m.as_str().to_string());
                Some(ExtractedItem { name, unit_price, available_quantity: None, unit, available: true })
            })
            .collect();
        if !items.is_empty() {
            confidence += 0.2;
        }

        let payment_terms = payment_terms_re().find(email_body).map(|m| m.as_str().trim().to_string());
        if payment_terms.is_some() {
            confidence += 0.1;
        }

        let delivery_days = delivery_days_re().captures(email_body).and_then(|caps| {
            caps.get(1).or_else(|| caps.get(2)).and_then(|m| m.as_str().parse::<i64>().ok())
        });
        if delivery_days.is_some() {
            confidence += 0.1;
        }

        let delivery_date = delivery_date_re().captures(email_body).and_then(parse_delivery_date);

        let supplier_notes = supplier_notes_re().captures(email_body).map(|caps| caps[1].trim().to_string());
        if supplier_notes.is_some() {
            confidence += 0.05;
        }

        let total_quote = items.iter().filter_map(|i| i.unit_price).fold(None, |acc, p| Some(acc.unwrap_or(0.0) + p));

        ExtractedQuote {
            has_quote: !items.is_empty(),
            items,
            delivery_date,
            delivery_days,
            payment_terms,
            total_quote,
            supplier_notes,
            confidence: confidence.min(1.0),
            extraction_method: "regex_fallback".to_string(),
        }
    }
}

fn parse_delivery_date(caps: regex::Captures) -> Option<NaiveDate> {
    if let (Some(d), Some(m), Some(y)) = (caps.get(1), caps.get(2), caps.get(3)) {
        return NaiveDate::from_ymd_opt(y.as_str().parse().ok()?, m.as_str().parse().ok()?, d.as_str().parse().ok()?);
    }
    if let (Some(y), Some(m), Some(d)) = (caps.get(4), caps.get(5), caps.get(6)) {
        return NaiveDate::from_ymd_opt(y.as_str().parse().ok()?, m.as_str().parse().ok()?, d.as_str().parse().ok()?);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_price_delivery_days_and_confidence() {
        let extractor = RegexFallbackExtractor;
        let quote = extractor.extract("Price: R$ 5,80/kg, delivery 3 dias úteis", &[]);
        assert!(quote.has_quote);
        assert_eq!(quote.items.len(), 1);
        assert_eq!(quote.items[0].unit_price, Some(5.80));
        assert_eq!(quote.items[0].unit.as_deref(), Some("kg"));
        assert_eq!(quote.delivery_days, Some(3));
        assert_eq!(quote.extraction_method, "regex_fallback");
        assert!((quote.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn extracts_payment_terms_and_notes() {
        let extractor = RegexFallbackExtractor;
        let body = "pagamento: 30 dias boleto\nobservação: estoque limitado";
        let quote = extractor.extract(body, &[]);
        assert!(quote.payment_terms.is_some());
        assert_eq!(quote.supplier_notes.as_deref(), Some("estoque limitado"));
        assert!((quote.confidence - 0.65).abs() < 1e-9);
    }

    #[test]
    fn no_match_yields_base_confidence_and_no_quote() {
        let extractor = RegexFallbackExtractor;
        let quote = extractor.extract("Sorry, no stock available right now.", &[]);
        assert!(!quote.has_quote);
        assert!(quote.items.is_empty());
        assert_eq!(quote.confidence, 0.5);
    }

    #[test]
    fn parses_dotted_thousands_comma_decimal_prices() {
        assert_eq!(parse_price("1.234,56"), Some(1234.56));
        assert_eq!(parse_price("5,80"), Some(5.80));
        assert_eq!(parse_price("12.5"), Some(12.5));
    }

    #[test]
    fn parses_both_date_formats() {
        let extractor = RegexFallbackExtractor;
        let br = extractor.extract("Entrega em 15/03/2026", &[]);
        assert_eq!(br.delivery_date, NaiveDate::from_ymd_opt(2026, 3, 15));

        let iso = extractor.extract("Delivery on 2026-03-15", &[]);
        assert_eq!(iso.delivery_date, NaiveDate::from_ymd_opt(2026, 3, 15));
    }

    #[test]
    fn multiple_itemized_lines_sum_into_total_quote() {
        let extractor = RegexFallbackExtractor;
        let body = "- Rice: R$ 4,50\n- Beans: R$ 6,00";
        let quote = extractor.extract(body, &[]);
        assert_eq!(quote.items.len(), 2);
        assert_eq!(quote.total_quote, Some(10.50));
    }
}
