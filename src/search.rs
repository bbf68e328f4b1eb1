use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::models::{CandidateImage, ImageRole};
use crate::parsers::{extract_format_strings, extract_price_strings};
use crate::utils::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Wire types. Every field defaults: the search API omits anything it likes.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
    #[serde(default)]
    pub knowledge_graph: Option<KnowledgeGraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub rich_snippet: Option<RichSnippet>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichSnippet {
    #[serde(default)]
    pub top: Option<RichSnippetBlock>,
    #[serde(default)]
    pub bottom: Option<RichSnippetBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichSnippetBlock {
    #[serde(default)]
    pub detected_extensions: DetectedExtensions,
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Structured price data Google sometimes detects in a result. Numbers may
/// arrive as numbers or strings depending on the locale, hence `Value`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectedExtensions {
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub original_price: Option<serde_json::Value>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<String>,
}

// ---------------------------------------------------------------------------
// Normalized output
// ---------------------------------------------------------------------------

/// What one search hit contributes to the query: description candidates,
/// raw price/format strings (parsed downstream) and image observations.
/// Prices keep their provenance: free-text snippet matches and structured
/// rich-snippet values are separate fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitBundle {
    pub descriptions: Vec<String>,
    pub prices: Vec<String>,
    pub rich_prices: Vec<String>,
    pub formats: Vec<String>,
    pub images: Vec<CandidateImage>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SearchClient {
    http: reqwest::Client,
    config: SearchConfig,
}

impl SearchClient {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;
        Ok(Self { http, config })
    }

    /// Issue one search query. Transport failures are retried with backoff;
    /// a final failure surfaces as `SourceUnavailable`.
    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        info!(query, "issuing search query");

        let strategy = ExponentialBackoff::from_millis(50)
            .max_delay(Duration::from_secs(2))
            .map(tokio_retry::strategy::jitter)
            .take(self.config.retry_attempts as usize);

        let response = Retry::spawn(strategy, || async {
            self.http
                .get(self.config.endpoint.as_str())
                .query(&[
                    ("engine", "google"),
                    ("q", query),
                    ("hl", self.config.hl.as_str()),
                    ("gl", self.config.gl.as_str()),
                    ("api_key", self.config.api_key.as_str()),
                ])
                .send()
                .await?
                .error_for_status()
        })
        .await
        .map_err(|e| AppError::SourceUnavailable {
            source_name: "search-api".to_string(),
            reason: e.to_string(),
        })?;

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::SourceUnavailable {
                    source_name: "search-api".to_string(),
                    reason: format!("malformed response: {}", e),
                })?;

        debug!(
            results = parsed.organic_results.len(),
            has_knowledge_graph = parsed.knowledge_graph.is_some(),
            "search response decoded"
        );
        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Normalize a full response into per-hit bundles. The knowledge-graph
/// description is shared context and joins every hit's description list;
/// knowledge-graph thumbnails attach only to hits without their own image.
pub fn normalize(response: &SearchResponse) -> Vec<HitBundle> {
    let knowledge = response.knowledge_graph.as_ref();
    response
        .organic_results
        .iter()
        .map(|hit| normalize_hit(hit, knowledge))
        .collect()
}

fn normalize_hit(hit: &OrganicResult, knowledge: Option<&KnowledgeGraph>) -> HitBundle {
    let mut descriptions = Vec::new();
    for text in [&hit.snippet, &hit.title] {
        if !text.is_empty() {
            descriptions.push(strip_markup(text));
        }
    }
    if let Some(desc) = knowledge.and_then(|k| k.description.as_ref()) {
        if !desc.is_empty() {
            descriptions.push(strip_markup(desc));
        }
    }

    let mut prices = Vec::new();
    let mut rich_prices = Vec::new();
    let mut formats = Vec::new();

    // Snippet and title: collect every match, not just the first. A single
    // snippet can legitimately carry a whole size/price table.
    prices.extend(extract_price_strings(&hit.snippet));
    prices.extend(extract_price_strings(&hit.title));
    formats.extend(extract_format_strings([
        hit.snippet.as_str(),
        hit.title.as_str(),
    ]));

    if let Some(rich) = &hit.rich_snippet {
        for block in [&rich.top, &rich.bottom].into_iter().flatten() {
            collect_detected_extensions(&block.detected_extensions, &mut rich_prices);
            for ext in &block.extensions {
                if ext.contains('€') {
                    rich_prices.push(ext.clone());
                }
                if ext.to_lowercase().contains("ml") {
                    formats.extend(extract_format_strings([ext.as_str()]));
                }
            }
        }
    }

    // Uniqueness matters per field, order does not.
    dedup_unordered(&mut prices);
    dedup_unordered(&mut rich_prices);
    dedup_unordered(&mut formats);

    let mut images = Vec::new();
    if let Some(thumbnail) = &hit.thumbnail {
        images.push(CandidateImage::new(
            thumbnail.clone(),
            ImageRole::ResultThumbnail,
        ));
    } else if let Some(k) = knowledge {
        // Only hits without their own image borrow the shared panel shots,
        // otherwise every hit drowns in the same generic photo.
        images.extend(
            k.thumbnails
                .iter()
                .map(|url| CandidateImage::new(url.clone(), ImageRole::KnowledgePanel)),
        );
    }

    HitBundle {
        descriptions,
        prices,
        rich_prices,
        formats,
        images,
    }
}

fn collect_detected_extensions(detected: &DetectedExtensions, prices: &mut Vec<String>) {
    if let Some(price) = &detected.price {
        prices.push(format!("{} €", render_value(price)));
        if let Some(currency) = &detected.currency {
            prices.push(format!("{} {}", render_value(price), currency));
        }
    }
    if let Some(original) = &detected.original_price {
        prices.push(format!("{} €", render_value(original)));
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn dedup_unordered(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

/// Snippets arrive with highlight markup (`<b>`, `<em>`) baked in; keep the
/// text only. Plain strings pass through unchanged.
fn strip_markup(text: &str) -> String {
    if !text.contains('<') {
        return text.to_string();
    }
    let fragment = scraper::Html::parse_fragment(text);
    let stripped = fragment.root_element().text().collect::<Vec<_>>().join("");
    let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if stripped.is_empty() {
        text.to_string()
    } else {
        stripped
    }
}
