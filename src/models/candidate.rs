use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{ImageRole, PriceSource};
use crate::parsers::Currency;

/// One unverified price observation from one source. Ephemeral: produced by
/// a parser, consumed by the aggregator, never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidatePrice {
    pub amount: Decimal,
    pub currency: Currency,
    pub source: PriceSource,
}

impl CandidatePrice {
    pub fn new(amount: Decimal, currency: Currency, source: PriceSource) -> Self {
        Self {
            amount,
            currency,
            source,
        }
    }
}

/// One unverified size observation, with the text it was read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateFormat {
    pub size_ml: u32,
    pub raw_text: String,
}

impl CandidateFormat {
    pub fn new(size_ml: u32, raw_text: impl Into<String>) -> Self {
        Self {
            size_ml,
            raw_text: raw_text.into(),
        }
    }
}

/// One image observation, keyed by URL for deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateImage {
    pub url: String,
    pub role: ImageRole,
}

impl CandidateImage {
    pub fn new(url: impl Into<String>, role: ImageRole) -> Self {
        Self {
            url: url.into(),
            role,
        }
    }
}

/// A (label, price) pair read from a rendered product page, one per variant
/// the cascade managed to select.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantQuote {
    pub label: String,
    pub price: Decimal,
    pub currency: Currency,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_price_roundtrip() {
        let price = CandidatePrice::new(
            "89.00".parse().unwrap(),
            Currency::Eur,
            PriceSource::SearchSnippet,
        );
        let json = serde_json::to_string(&price).unwrap();
        assert!(json.contains("\"search-snippet\""));
        assert!(json.contains("\"EUR\""));
        let back: CandidatePrice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);
    }

    #[test]
    fn candidate_format_keeps_raw_text() {
        let format = CandidateFormat::new(100, "Eau de Parfum 100ML");
        assert_eq!(format.size_ml, 100);
        assert_eq!(format.raw_text, "Eau de Parfum 100ML");
    }
}
