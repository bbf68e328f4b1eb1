use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::CatalogConfig;
use crate::images::StoredImage;
use crate::models::ProductRecord;
use crate::utils::error::{AppError, Result};

/// Handle of a catalog entry after an upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogProduct {
    pub id: u64,
    pub title: String,
    pub created: bool,
}

/// The catalog collaborator: idempotent upsert of a reconciled record.
/// The aggregator never calls this; the binary wires it in after
/// reconciliation.
#[async_trait]
pub trait CatalogSync: Send + Sync {
    async fn upsert(
        &self,
        record: &ProductRecord,
        images: &[StoredImage],
    ) -> Result<CatalogProduct>;
}

/// Shopify-admin-shaped REST implementation.
pub struct RestCatalog {
    http: reqwest::Client,
    config: CatalogConfig,
}

impl RestCatalog {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/admin/api/{}/{}",
            self.config.shop_url.trim_end_matches('/'),
            self.config.api_version,
            path
        )
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<RemoteProduct>> {
        let response = self
            .http
            .get(self.endpoint("products.json"))
            .header("X-Shopify-Access-Token", &self.config.access_token)
            .query(&[("title", title), ("limit", "1")])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Catalog(format!("product lookup failed: {}", e)))?;

        let body: ProductListResponse = response.json().await?;
        Ok(body.products.into_iter().next())
    }

    async fn attach_image(&self, product_id: u64, image: &StoredImage) -> Result<()> {
        let bytes = std::fs::read(&image.path)?;
        let payload = json!({
            "image": {
                "attachment": base64::engine::general_purpose::STANDARD.encode(bytes),
                "filename": image.path.file_name().and_then(|n| n.to_str()),
            }
        });

        self.http
            .post(self.endpoint(&format!("products/{}/images.json", product_id)))
            .header("X-Shopify-Access-Token", &self.config.access_token)
            .json(&payload)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Catalog(format!("image attach failed: {}", e)))?;
        Ok(())
    }

    fn build_variants(record: &ProductRecord) -> Vec<serde_json::Value> {
        let price = record.price_mean;
        distinct_sizes(record)
            .into_iter()
            .map(|size| {
                json!({
                    "title": format!("{}ml", size),
                    "option1": format!("{}ml", size),
                    "price": price.map(|p| p.to_string()),
                    "inventory_management": "shopify",
                    "inventory_quantity": 0,
                    "requires_shipping": true,
                    "taxable": true,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CatalogSync for RestCatalog {
    async fn upsert(
        &self,
        record: &ProductRecord,
        images: &[StoredImage],
    ) -> Result<CatalogProduct> {
        let title = record.title();
        let existing = self.find_by_title(&title).await?;

        let payload = json!({
            "product": {
                "title": title,
                "vendor": record.brand,
                "product_type": "Fragrance",
                "tags": [record.brand],
                "status": "active",
                "body_html": record.full_description,
                "variants": Self::build_variants(record),
            }
        });

        let (remote, created) = match existing {
            Some(found) => {
                let response = self
                    .http
                    .put(self.endpoint(&format!("products/{}.json", found.id)))
                    .header("X-Shopify-Access-Token", &self.config.access_token)
                    .json(&payload)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| AppError::Catalog(format!("product update failed: {}", e)))?;
                let body: ProductResponse = response.json().await?;
                (body.product, false)
            }
            None => {
                let response = self
                    .http
                    .post(self.endpoint("products.json"))
                    .header("X-Shopify-Access-Token", &self.config.access_token)
                    .json(&payload)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| AppError::Catalog(format!("product create failed: {}", e)))?;
                let body: ProductResponse = response.json().await?;
                (body.product, true)
            }
        };

        for image in images {
            if let Err(e) = self.attach_image(remote.id, image).await {
                warn!(path = %image.path.display(), error = %e, "image attach skipped");
            }
        }

        info!(id = remote.id, %remote.title, created, "catalog upsert complete");
        Ok(CatalogProduct {
            id: remote.id,
            title: remote.title,
            created,
        })
    }
}

/// Distinct sizes in first-seen order, the same discipline the aggregator
/// uses for the modal format.
fn distinct_sizes(record: &ProductRecord) -> Vec<u32> {
    let mut seen = std::collections::HashSet::new();
    record
        .formats
        .iter()
        .map(|f| f.size_ml)
        .filter(|size| seen.insert(*size))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
struct RemoteProduct {
    id: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ProductListResponse {
    #[serde(default)]
    products: Vec<RemoteProduct>,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    product: RemoteProduct,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateFormat;

    fn record_with_formats(sizes: &[u32]) -> ProductRecord {
        ProductRecord {
            brand: "Xerjoff".to_string(),
            product: "Naxos".to_string(),
            descriptions: vec![],
            full_description: String::new(),
            prices: vec![],
            price_mean: Some("89.00".parse().unwrap()),
            price_min: None,
            price_max: None,
            formats: sizes
                .iter()
                .map(|s| CandidateFormat::new(*s, format!("{}ml", s)))
                .collect(),
            modal_format_ml: None,
            images: vec![],
            retrieved_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn variants_are_distinct_sizes_in_first_seen_order() {
        let record = record_with_formats(&[100, 50, 100, 30]);
        let variants = RestCatalog::build_variants(&record);
        let titles: Vec<&str> = variants
            .iter()
            .map(|v| v["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["100ml", "50ml", "30ml"]);
        assert_eq!(variants[0]["price"], serde_json::json!("89.00"));
    }

    #[test]
    fn variants_carry_null_price_when_no_statistics_exist() {
        let mut record = record_with_formats(&[50]);
        record.price_mean = None;
        let variants = RestCatalog::build_variants(&record);
        assert!(variants[0]["price"].is_null());
    }
}
