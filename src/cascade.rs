use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::models::VariantQuote;
use crate::parsers::{extract_price_strings, parse_currency, parse_price, parse_size_ml, Currency};
use crate::profiles::SiteProfile;
use crate::utils::error::Result;

/// One element on a rendered page. Every operation can fail: elements go
/// stale, activations get intercepted, reads race re-renders.
pub trait PageElement {
    fn text(&self) -> Result<String>;
    fn get_attribute(&self, name: &str) -> Result<Option<String>>;
    fn click(&self) -> Result<()>;
    /// Programmatic activation for elements a plain click cannot reach.
    fn force_click(&self) -> Result<()>;
    fn scroll_into_view(&self) -> Result<()>;
}

/// The rendering capability the cascade drives. One page handle serves one
/// query at a time; parallel queries need their own sessions.
pub trait RenderedPage {
    fn goto(&self, url: &str) -> Result<()>;
    fn wait_for_network_idle(&self) -> Result<()>;
    /// All elements currently matching `selector`. Waiting for the selector
    /// to appear is the implementation's business; a wait timeout is
    /// reported as an empty list or a `SelectorTimeout` error, and the
    /// cascade treats both as "zero matches".
    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement + '_>>>;
    fn select_value(&self, selector: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeState {
    TryDataAttributes,
    TryGenericSelectors,
    TryMultiPriceFallback,
    Done,
}

/// Extraction cascade over one rendered product page. Strategies run in
/// fixed priority order; the first one yielding at least one (label, price)
/// pair wins and the rest never execute.
pub struct CascadeEngine<'a> {
    profile: &'a SiteProfile,
    settle_grace: Duration,
}

impl<'a> CascadeEngine<'a> {
    pub fn new(profile: &'a SiteProfile, config: &ScraperConfig) -> Self {
        Self {
            profile,
            settle_grace: Duration::from_millis(config.settle_grace_ms),
        }
    }

    /// Navigate to `url` and run the cascade. Per-element failures are
    /// logged and skipped; only the initial navigation can fail the whole
    /// page, and the caller treats that as "this source contributed
    /// nothing".
    pub fn extract(&self, page: &dyn RenderedPage, url: &str) -> Result<Vec<VariantQuote>> {
        page.goto(url)?;
        self.settle(page);
        Ok(self.run(page))
    }

    fn run(&self, page: &dyn RenderedPage) -> Vec<VariantQuote> {
        let mut quotes = Vec::new();
        let mut state = CascadeState::TryDataAttributes;

        while state != CascadeState::Done {
            state = match state {
                CascadeState::TryDataAttributes => {
                    quotes = self.interactive_pass(
                        page,
                        &self.profile.data_variant_selectors,
                        &self.profile.data_price_selectors,
                        false,
                    );
                    if quotes.is_empty() {
                        CascadeState::TryGenericSelectors
                    } else {
                        CascadeState::Done
                    }
                }
                CascadeState::TryGenericSelectors => {
                    quotes = self.interactive_pass(
                        page,
                        &self.profile.variant_selectors,
                        &self.profile.price_selectors,
                        true,
                    );
                    if quotes.is_empty() {
                        CascadeState::TryMultiPriceFallback
                    } else {
                        CascadeState::Done
                    }
                }
                CascadeState::TryMultiPriceFallback => {
                    quotes = self.multi_price_pass(page);
                    CascadeState::Done
                }
                CascadeState::Done => CascadeState::Done,
            };
        }

        quotes
    }

    /// Activation/settle/read loop over one variant selector list. Stops at
    /// the first selector producing at least one valid pair.
    fn interactive_pass(
        &self,
        page: &dyn RenderedPage,
        variant_selectors: &[String],
        price_selectors: &[String],
        drive_selects: bool,
    ) -> Vec<VariantQuote> {
        let mut quotes = Vec::new();

        for variant_selector in variant_selectors {
            let elements = match page.query_all(variant_selector) {
                Ok(elements) => elements,
                Err(e) => {
                    debug!(selector = %variant_selector, error = %e, "variant selector unavailable");
                    continue;
                }
            };
            if elements.is_empty() {
                continue;
            }
            debug!(
                selector = %variant_selector,
                count = elements.len(),
                "trying variant selector"
            );

            for element in &elements {
                let label = match element.text() {
                    Ok(text) => text.trim().to_string(),
                    Err(e) => {
                        warn!(selector = %variant_selector, error = %e, "label read failed");
                        continue;
                    }
                };
                if label.is_empty() {
                    continue;
                }

                if let Err(e) = element.scroll_into_view() {
                    debug!(selector = %variant_selector, error = %e, "scroll failed");
                }

                if !self.activate(page, element.as_ref(), variant_selector, drive_selects) {
                    continue;
                }
                self.settle(page);

                if let Some((price, currency)) = self.read_price(page, price_selectors) {
                    debug!(label = %label, %price, "variant quote recorded");
                    quotes.push(VariantQuote {
                        label,
                        price,
                        currency,
                    });
                }
            }

            if !quotes.is_empty() {
                break;
            }
        }

        quotes
    }

    /// Activate one variant control. Select-backed options are driven by
    /// value; everything else gets a click, then a forced click, before we
    /// give up on the element.
    fn activate(
        &self,
        page: &dyn RenderedPage,
        element: &dyn PageElement,
        selector: &str,
        drive_selects: bool,
    ) -> bool {
        if drive_selects && selector.trim_start().starts_with("select") {
            let value = match element.get_attribute("value") {
                Ok(Some(value)) if !value.is_empty() => value,
                Ok(_) => return false,
                Err(e) => {
                    warn!(%selector, error = %e, "option value read failed");
                    return false;
                }
            };
            return match page.select_value(selector, &value) {
                Ok(()) => true,
                Err(e) => {
                    warn!(%selector, %value, error = %e, "select activation failed");
                    false
                }
            };
        }

        if element.click().is_ok() {
            return true;
        }
        match element.force_click() {
            Ok(()) => true,
            Err(e) => {
                warn!(%selector, error = %e, "activation failed after forced click");
                false
            }
        }
    }

    /// Read the current price display through an ordered selector list.
    fn read_price(
        &self,
        page: &dyn RenderedPage,
        price_selectors: &[String],
    ) -> Option<(rust_decimal::Decimal, Currency)> {
        for price_selector in price_selectors {
            let elements = match page.query_all(price_selector) {
                Ok(elements) => elements,
                Err(e) => {
                    debug!(selector = %price_selector, error = %e, "price selector unavailable");
                    continue;
                }
            };
            for element in &elements {
                let text = match element.text() {
                    Ok(text) => text,
                    Err(e) => {
                        debug!(selector = %price_selector, error = %e, "price read failed");
                        continue;
                    }
                };
                if let Some(price) = parse_price(&text) {
                    let currency = parse_currency(&text).unwrap_or(Currency::Eur);
                    return Some((price, currency));
                }
            }
        }
        None
    }

    /// Last resort for pages listing every variant price at once: no
    /// interaction, just scan everything matching any known price selector
    /// and keep the ones that carry a size marker.
    fn multi_price_pass(&self, page: &dyn RenderedPage) -> Vec<VariantQuote> {
        let mut quotes = Vec::new();

        for selector in self.profile.all_price_selectors() {
            let elements = match page.query_all(selector) {
                Ok(elements) => elements,
                Err(e) => {
                    debug!(%selector, error = %e, "fallback selector unavailable");
                    continue;
                }
            };
            for element in &elements {
                let text = match element.text() {
                    Ok(text) => text.trim().to_string(),
                    Err(_) => continue,
                };
                if parse_size_ml(&text).is_none() {
                    continue;
                }
                if let Some(price) = price_from_combined_text(&text) {
                    let currency = parse_currency(&text).unwrap_or(Currency::Eur);
                    quotes.push(VariantQuote {
                        label: text,
                        price,
                        currency,
                    });
                }
            }
        }

        quotes
    }

    fn settle(&self, page: &dyn RenderedPage) {
        if let Err(e) = page.wait_for_network_idle() {
            debug!(error = %e, "network idle wait failed");
        }
        if !self.settle_grace.is_zero() {
            std::thread::sleep(self.settle_grace);
        }
    }
}

/// Pull a price out of a text that also carries the size, e.g.
/// "100 ml - 89,00 €". A currency-anchored fragment wins; otherwise parse
/// the text with the size fragment removed so the size digits cannot
/// masquerade as the price.
fn price_from_combined_text(text: &str) -> Option<rust_decimal::Decimal> {
    if let Some(fragment) = extract_price_strings(text).first() {
        return parse_price(fragment);
    }
    let without_size = match crate::parsers::extract_format_strings([text]).first() {
        Some(size_fragment) => text.replacen(size_fragment.as_str(), "", 1),
        None => text.to_string(),
    };
    parse_price(&without_size)
}
