use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{CandidateFormat, CandidateImage, CandidatePrice, ProductRecord};

/// Everything gathered for one brand/product query across every source,
/// in collection order.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub descriptions: Vec<String>,
    pub prices: Vec<CandidatePrice>,
    pub formats: Vec<CandidateFormat>,
    pub images: Vec<CandidateImage>,
}

impl CandidateSet {
    pub fn merge(&mut self, other: CandidateSet) {
        self.descriptions.extend(other.descriptions);
        self.prices.extend(other.prices);
        self.formats.extend(other.formats);
        self.images.extend(other.images);
    }
}

/// Reconcile all candidates into the canonical record. Pure: no I/O, no
/// catalog writes, deterministic for a given input order.
pub fn reconcile(brand: &str, product: &str, candidates: CandidateSet) -> ProductRecord {
    let (price_mean, price_min, price_max) = price_stats(&candidates.prices);
    let modal_format_ml = modal_format(&candidates.formats);
    let images = dedup_images(candidates.images);

    let descriptions: Vec<String> = candidates
        .descriptions
        .into_iter()
        .filter(|d| !d.trim().is_empty())
        .collect();
    let full_description = descriptions.join(" ");

    debug!(
        brand,
        product,
        prices = candidates.prices.len(),
        formats = candidates.formats.len(),
        images = images.len(),
        "candidates reconciled"
    );

    ProductRecord {
        brand: brand.to_string(),
        product: product.to_string(),
        descriptions,
        full_description,
        prices: candidates.prices,
        price_mean,
        price_min,
        price_max,
        formats: candidates.formats,
        modal_format_ml,
        images,
        retrieved_at: chrono::Utc::now(),
    }
}

/// Mean, min and max over the parsed prices. An empty list produces `None`
/// across the board; zero is a price, not an absence.
fn price_stats(prices: &[CandidatePrice]) -> (Option<Decimal>, Option<Decimal>, Option<Decimal>) {
    if prices.is_empty() {
        return (None, None, None);
    }

    let amounts: Vec<Decimal> = prices.iter().map(|p| p.amount).collect();
    let sum: Decimal = amounts.iter().copied().sum();
    let mean = sum / Decimal::from(amounts.len());
    let min = amounts.iter().copied().min();
    let max = amounts.iter().copied().max();

    (Some(mean), min, max)
}

/// The most frequent size in milliliters. Ties break by first observation
/// order: the size seen earliest among the tied counts wins. This is a
/// deliberate, documented rule, not an artifact of map iteration.
fn modal_format(formats: &[CandidateFormat]) -> Option<u32> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    let mut first_seen: Vec<u32> = Vec::new();

    for format in formats {
        let count = counts.entry(format.size_ml).or_insert(0);
        if *count == 0 {
            first_seen.push(format.size_ml);
        }
        *count += 1;
    }

    let best = first_seen.iter().map(|size| counts[size]).max()?;
    first_seen.into_iter().find(|size| counts[size] == best)
}

/// Drop repeated URLs, keeping the first occurrence and its role.
fn dedup_images(images: Vec<CandidateImage>) -> Vec<CandidateImage> {
    let mut seen = HashSet::new();
    images
        .into_iter()
        .filter(|image| seen.insert(image.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRole, PriceSource};
    use crate::parsers::Currency;

    fn price(amount: &str) -> CandidatePrice {
        CandidatePrice::new(
            amount.parse().unwrap(),
            Currency::Eur,
            PriceSource::SearchSnippet,
        )
    }

    fn format(size: u32) -> CandidateFormat {
        CandidateFormat::new(size, format!("{}ml", size))
    }

    #[test]
    fn single_price_collapses_all_statistics() {
        let mut candidates = CandidateSet::default();
        candidates.prices.push(price("89.00"));

        let record = reconcile("Xerjoff", "Naxos", candidates);
        let expected: Decimal = "89.00".parse().unwrap();
        assert_eq!(record.price_mean, Some(expected));
        assert_eq!(record.price_min, Some(expected));
        assert_eq!(record.price_max, Some(expected));
    }

    #[test]
    fn empty_prices_mean_none_not_zero() {
        let record = reconcile("Brand", "Product", CandidateSet::default());
        assert_eq!(record.price_mean, None);
        assert_eq!(record.price_min, None);
        assert_eq!(record.price_max, None);
        assert_eq!(record.modal_format_ml, None);
        assert!(record.is_empty());
    }

    #[test]
    fn price_statistics_over_several_candidates() {
        let mut candidates = CandidateSet::default();
        for amount in ["80.00", "90.00", "100.00"] {
            candidates.prices.push(price(amount));
        }

        let record = reconcile("Brand", "Product", candidates);
        assert_eq!(record.price_mean, Some("90.00".parse().unwrap()));
        assert_eq!(record.price_min, Some("80.00".parse().unwrap()));
        assert_eq!(record.price_max, Some("100.00".parse().unwrap()));
    }

    #[test]
    fn modal_format_tie_breaks_by_first_seen() {
        let mut candidates = CandidateSet::default();
        for size in [100, 50, 100, 50] {
            candidates.formats.push(format(size));
        }
        let record = reconcile("Brand", "Product", candidates);
        assert_eq!(record.modal_format_ml, Some(100));

        // Same multiset, opposite arrival order: the other side wins.
        let mut candidates = CandidateSet::default();
        for size in [50, 100, 50, 100] {
            candidates.formats.push(format(size));
        }
        let record = reconcile("Brand", "Product", candidates);
        assert_eq!(record.modal_format_ml, Some(50));
    }

    #[test]
    fn modal_format_prefers_strict_majority() {
        let mut candidates = CandidateSet::default();
        for size in [50, 100, 100] {
            candidates.formats.push(format(size));
        }
        let record = reconcile("Brand", "Product", candidates);
        assert_eq!(record.modal_format_ml, Some(100));
    }

    #[test]
    fn images_deduplicate_by_url() {
        let mut candidates = CandidateSet::default();
        candidates.images.extend([
            CandidateImage::new("https://img/a.jpg", ImageRole::ResultThumbnail),
            CandidateImage::new("https://img/b.jpg", ImageRole::ResultThumbnail),
            CandidateImage::new("https://img/a.jpg", ImageRole::KnowledgePanel),
        ]);

        let record = reconcile("Brand", "Product", candidates);
        assert_eq!(record.images.len(), 2);
        // First occurrence wins, role included.
        assert_eq!(record.images[0].role, ImageRole::ResultThumbnail);
        assert_eq!(record.images[0].url, "https://img/a.jpg");
        assert_eq!(record.images[1].url, "https://img/b.jpg");
    }

    #[test]
    fn full_description_joins_in_collection_order() {
        let mut candidates = CandidateSet::default();
        candidates.descriptions.extend([
            "First snippet.".to_string(),
            "  ".to_string(),
            "Second snippet.".to_string(),
        ]);

        let record = reconcile("Brand", "Product", candidates);
        assert_eq!(record.descriptions.len(), 2);
        assert_eq!(record.full_description, "First snippet. Second snippet.");
    }

    #[test]
    fn merge_preserves_collection_order() {
        let mut first = CandidateSet::default();
        first.descriptions.push("one".to_string());
        let mut second = CandidateSet::default();
        second.descriptions.push("two".to_string());

        first.merge(second);
        assert_eq!(first.descriptions, vec!["one", "two"]);
    }
}
