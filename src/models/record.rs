use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{CandidateFormat, CandidateImage, CandidatePrice};

/// The reconciled output of one brand/product query, combining every source
/// consulted. Built once by the aggregator; the derived statistics are pure
/// functions of the candidate lists and are never set by hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub brand: String,
    pub product: String,

    pub descriptions: Vec<String>,
    pub full_description: String,

    pub prices: Vec<CandidatePrice>,
    pub price_mean: Option<Decimal>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,

    pub formats: Vec<CandidateFormat>,
    pub modal_format_ml: Option<u32>,

    pub images: Vec<CandidateImage>,

    pub retrieved_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Catalog-facing title, `"<brand> <product>"`.
    pub fn title(&self) -> String {
        format!("{} {}", self.brand, self.product)
    }

    /// True when no source contributed any price or format observation.
    /// Still a valid, representable outcome, not an error.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.formats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_joins_brand_and_product() {
        let record = ProductRecord {
            brand: "Xerjoff".to_string(),
            product: "Naxos".to_string(),
            descriptions: vec![],
            full_description: String::new(),
            prices: vec![],
            price_mean: None,
            price_min: None,
            price_max: None,
            formats: vec![],
            modal_format_ml: None,
            images: vec![],
            retrieved_at: Utc::now(),
        };
        assert_eq!(record.title(), "Xerjoff Naxos");
        assert!(record.is_empty());
    }
}
