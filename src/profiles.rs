use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// The selector sets used to extract variants and prices from one site.
/// Strategies are data: adding a site means adding selector lists, never code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Modern attribute-based variant triggers, tried before anything else.
    pub data_variant_selectors: Vec<String>,
    /// Attribute-based price displays read after a variant activation.
    pub data_price_selectors: Vec<String>,
    /// Generic CSS-class variant triggers.
    pub variant_selectors: Vec<String>,
    /// Generic CSS-class price displays.
    pub price_selectors: Vec<String>,
}

impl SiteProfile {
    /// Every price selector known to this profile, generic plus attribute
    /// based. Used by the no-interaction multi-price fallback.
    pub fn all_price_selectors(&self) -> impl Iterator<Item = &str> {
        self.price_selectors
            .iter()
            .chain(self.data_price_selectors.iter())
            .map(String::as_str)
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            data_variant_selectors: vec![
                "[data-variant-selector]".to_string(),
                "[data-variant]".to_string(),
                "[data-option]".to_string(),
                "[data-format]".to_string(),
            ],
            data_price_selectors: vec![
                "[data-price]".to_string(),
                "[data-product-price]".to_string(),
                "[data-current-price]".to_string(),
            ],
            variant_selectors: vec![
                // Select elements
                "select option".to_string(),
                ".product-variant-selector option".to_string(),
                ".variant-selector option".to_string(),
                ".product-options select option".to_string(),
                // Radio buttons
                "input[type='radio'][name*='variant']".to_string(),
                "input[type='radio'][name*='option']".to_string(),
                ".product-form__input input[type='radio']".to_string(),
                // Buttons and links
                ".product-variant".to_string(),
                ".variant-option".to_string(),
                ".product-options__value".to_string(),
                ".swatch-element".to_string(),
                ".product-options__selector".to_string(),
                // Generic selectors
                ".product-option".to_string(),
                ".variant-selector".to_string(),
            ],
            price_selectors: vec![
                ".product-price".to_string(),
                ".price".to_string(),
                ".product__price".to_string(),
                "[itemprop='price']".to_string(),
                ".product-single__price".to_string(),
                ".price-item--regular".to_string(),
                ".product-form__price".to_string(),
                ".product__price--regular".to_string(),
                ".product-price__regular".to_string(),
                ".current-price".to_string(),
                ".product-current-price".to_string(),
                ".product-price__value".to_string(),
            ],
        }
    }
}

/// Registry mapping normalized domains to their extraction profiles.
/// Lookup is total: unknown domains fall back to the built-in default.
/// Immutable after construction; share it freely.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, SiteProfile>,
    default_profile: SiteProfile,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            default_profile: SiteProfile::default(),
        }
    }

    /// Builder-style registration, used at construction time only.
    pub fn with_profile(mut self, domain: &str, profile: SiteProfile) -> Self {
        self.profiles
            .insert(normalize_domain(domain).to_string(), profile);
        self
    }

    /// Resolve the profile for a URL. Never fails: unregistered domains get
    /// the default profile, and so do unparseable URLs.
    pub fn profile_for(&self, url: &str) -> &SiteProfile {
        match host_of(url) {
            Some(host) => self
                .profiles
                .get(normalize_domain(&host))
                .unwrap_or(&self.default_profile),
            None => &self.default_profile,
        }
    }

    pub fn default_profile(&self) -> &SiteProfile {
        &self.default_profile
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Strip the leading `www.` so `www.example.com` and `example.com` share one
/// registry entry. Scheme never reaches here (host extraction drops it).
fn normalize_domain(domain: &str) -> &str {
    domain.strip_prefix("www.").unwrap_or(domain)
}
