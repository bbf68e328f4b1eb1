use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregator::{reconcile, CandidateSet};
use crate::cascade::{CascadeEngine, RenderedPage};
use crate::config::{AppConfig, ScraperConfig};
use crate::models::{CandidateFormat, CandidatePrice, PriceSource, ProductRecord};
use crate::parsers::{parse_currency, parse_price, parse_size_ml, Currency};
use crate::profiles::ProfileRegistry;
use crate::search::{normalize, HitBundle, SearchClient};
use crate::utils::error::Result;

/// One brand/product query. A known product URL switches on the rendered
/// page refinement step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    pub brand: String,
    pub product: String,
    pub product_url: Option<String>,
}

impl QueryRequest {
    pub fn new(brand: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            product: product.into(),
            product_url: None,
        }
    }

    pub fn query(&self) -> String {
        format!("{} {}", self.brand, self.product)
    }
}

/// Outcome of one entry in a batch run. Failed queries keep their input and
/// the failure text instead of aborting the batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub brand: String,
    pub product: String,
    pub record: Option<ProductRecord>,
    pub error: Option<String>,
}

/// Orchestrates one query end to end: search, normalize, parse, optionally
/// refine against the rendered page, reconcile. Strictly sequential: one
/// search call, then one page interaction sequence, per query.
pub struct ProductAggregator {
    search: SearchClient,
    registry: ProfileRegistry,
    scraper_config: ScraperConfig,
}

impl ProductAggregator {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            search: SearchClient::new(config.search.clone())?,
            registry: ProfileRegistry::new(),
            scraper_config: config.scraper.clone(),
        })
    }

    pub fn with_registry(mut self, registry: ProfileRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Run one query. The search call is the mandatory first step: its
    /// failure fails the query. Every other source degrades to an empty
    /// contribution. Zero extractable data is a valid outcome: the record
    /// comes back well-formed with `None` statistics.
    pub async fn run_query(
        &self,
        request: &QueryRequest,
        page: Option<&dyn RenderedPage>,
    ) -> Result<ProductRecord> {
        let query = request.query();
        info!(%query, "aggregating product");

        let response = self.search.search(&query).await?;
        let bundles = normalize(&response);

        let mut candidates = CandidateSet::default();
        for bundle in &bundles {
            candidates.merge(bundle_to_candidates(bundle));
        }

        if let (Some(url), Some(page)) = (&request.product_url, page) {
            candidates.merge(self.page_candidates(page, url));
        }

        Ok(reconcile(&request.brand, &request.product, candidates))
    }

    /// Cascade contribution for a known product page. Outright page failure
    /// means this source contributes nothing; the query goes on.
    fn page_candidates(&self, page: &dyn RenderedPage, url: &str) -> CandidateSet {
        let profile = self.registry.profile_for(url);
        let engine = CascadeEngine::new(profile, &self.scraper_config);

        let quotes = match engine.extract(page, url) {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(%url, error = %e, "rendered page unavailable");
                return CandidateSet::default();
            }
        };

        let mut candidates = CandidateSet::default();
        for quote in quotes {
            candidates.prices.push(CandidatePrice::new(
                quote.price,
                quote.currency,
                PriceSource::DomSelector,
            ));
            if let Some(size_ml) = parse_size_ml(&quote.label) {
                candidates
                    .formats
                    .push(CandidateFormat::new(size_ml, quote.label));
            }
        }
        candidates
    }

    /// Run a parsed batch sequentially. Per-entry failures land in the
    /// outcome list; the batch never aborts early.
    pub async fn run_batch(
        &self,
        requests: &[QueryRequest],
        page: Option<&dyn RenderedPage>,
    ) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            match self.run_query(request, page).await {
                Ok(record) => outcomes.push(BatchOutcome {
                    brand: request.brand.clone(),
                    product: request.product.clone(),
                    record: Some(record),
                    error: None,
                }),
                Err(e) => {
                    warn!(query = %request.query(), error = %e, "query failed");
                    outcomes.push(BatchOutcome {
                        brand: request.brand.clone(),
                        product: request.product.clone(),
                        record: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        outcomes
    }
}

/// Turn one normalized hit into typed candidates. Unparseable raw strings
/// are silently excluded; they never reach the statistics.
fn bundle_to_candidates(bundle: &HitBundle) -> CandidateSet {
    let mut candidates = CandidateSet::default();
    candidates.descriptions.extend(bundle.descriptions.clone());

    for (raws, source) in [
        (&bundle.prices, PriceSource::SearchSnippet),
        (&bundle.rich_prices, PriceSource::RichSnippet),
    ] {
        for raw in raws {
            if let Some(amount) = parse_price(raw) {
                let currency = parse_currency(raw).unwrap_or(Currency::Eur);
                candidates
                    .prices
                    .push(CandidatePrice::new(amount, currency, source));
            }
        }
    }

    for raw in &bundle.formats {
        if let Some(size_ml) = parse_size_ml(raw) {
            candidates
                .formats
                .push(CandidateFormat::new(size_ml, raw.clone()));
        }
    }

    candidates.images.extend(bundle.images.iter().cloned());
    candidates
}

// ---------------------------------------------------------------------------
// Batch input parsing
// ---------------------------------------------------------------------------

/// Parse the batch input format: a `Name:` line opens a brand, following
/// lines are its products, until the next brand line.
pub fn parse_batch_input(input: &str) -> Vec<QueryRequest> {
    let mut requests = Vec::new();
    let mut current_brand: Option<String> = None;

    for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(brand) = line.strip_suffix(':') {
            current_brand = Some(normalize_name(brand));
        } else if let Some(brand) = &current_brand {
            requests.push(QueryRequest::new(brand.clone(), normalize_name(line)));
        }
    }

    requests
}

/// Words that stay lowercase when title-casing product names.
const LOWERCASE_WORDS: &[&str] = &[
    "de", "di", "da", "del", "della", "delle", "e", "ed", "la", "le", "il", "lo", "gli", "un",
    "una", "uno",
];

/// Title-case a name, keeping connective words lowercase:
/// "eau de parfum" -> "Eau de Parfum".
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            if LOWERCASE_WORDS.contains(&word) {
                word.to_string()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageRole;

    #[test]
    fn batch_input_groups_products_under_brands() {
        let input = "Xerjoff:\nNaxos\nErba Pura\n\nCreed:\nAventus\n";
        let requests = parse_batch_input(input);

        assert_eq!(
            requests,
            vec![
                QueryRequest::new("Xerjoff", "Naxos"),
                QueryRequest::new("Xerjoff", "Erba Pura"),
                QueryRequest::new("Creed", "Aventus"),
            ]
        );
    }

    #[test]
    fn batch_input_ignores_products_before_any_brand() {
        let requests = parse_batch_input("orphan product\nBrand:\nReal Product\n");
        assert_eq!(requests, vec![QueryRequest::new("Brand", "Real Product")]);
    }

    #[test]
    fn normalize_name_title_cases_with_stop_words() {
        assert_eq!(normalize_name("eau de parfum"), "Eau de Parfum");
        assert_eq!(normalize_name("ACQUA DI PARMA"), "Acqua di Parma");
        assert_eq!(normalize_name("  naxos  "), "Naxos");
    }

    #[test]
    fn bundle_parsing_excludes_unparseable_raw_strings() {
        let bundle = HitBundle {
            descriptions: vec!["desc".to_string()],
            prices: vec!["89,00 €".to_string(), "???".to_string()],
            rich_prices: vec!["120 €".to_string()],
            formats: vec!["100ml".to_string(), "no size".to_string()],
            images: vec![crate::models::CandidateImage::new(
                "https://img/x.jpg",
                ImageRole::ResultThumbnail,
            )],
        };

        let candidates = bundle_to_candidates(&bundle);
        assert_eq!(candidates.prices.len(), 2);
        assert_eq!(candidates.prices[0].source, PriceSource::SearchSnippet);
        assert_eq!(candidates.prices[1].source, PriceSource::RichSnippet);
        assert_eq!(candidates.formats.len(), 1);
        assert_eq!(candidates.formats[0].size_ml, 100);
        assert_eq!(candidates.images.len(), 1);
    }

    #[test]
    fn query_request_builds_search_query() {
        let request = QueryRequest::new("Xerjoff", "Naxos");
        assert_eq!(request.query(), "Xerjoff Naxos");
    }
}
