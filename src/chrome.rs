use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use tracing::debug;

use crate::cascade::{PageElement, RenderedPage};
use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// One Chromium session driving one tab. The session is reused across the
/// sequential operations of a single pipeline; never share it between
/// concurrent queries; spin up one session per worker instead.
pub struct ChromeSession {
    // Keeps the browser process alive for as long as the tab is in use.
    _browser: Browser,
    tab: Arc<Tab>,
    selector_timeout: Duration,
}

impl ChromeSession {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Internal(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Internal(format!("Failed to create tab: {}", e)))?;

        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| AppError::Internal(format!("Failed to set user agent: {}", e)))?;
        tab.set_default_timeout(Duration::from_secs(config.request_timeout));

        Ok(Self {
            _browser: browser,
            tab,
            selector_timeout: Duration::from_millis(config.selector_timeout_ms),
        })
    }
}

impl RenderedPage for ChromeSession {
    fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| AppError::SourceUnavailable {
                source_name: url.to_string(),
                reason: format!("navigation failed: {}", e),
            })?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::SourceUnavailable {
                source_name: url.to_string(),
                reason: format!("page load failed: {}", e),
            })?;
        Ok(())
    }

    fn wait_for_network_idle(&self) -> Result<()> {
        // The CDP wrapper reports readiness through navigation state; treat a
        // completed navigation wait as the idle signal. The cascade adds its
        // own grace delay on top for renders that never touch the network.
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::Internal(format!("idle wait failed: {}", e)))?;
        Ok(())
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement + '_>>> {
        // Wait for the selector to show up at all; a timeout here means this
        // strategy has nothing on this page.
        if self
            .tab
            .wait_for_element_with_custom_timeout(selector, self.selector_timeout)
            .is_err()
        {
            debug!(%selector, "selector never appeared");
            return Err(AppError::SelectorTimeout {
                selector: selector.to_string(),
            });
        }

        let elements = self.tab.find_elements(selector).unwrap_or_default();
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromeElement { element }) as Box<dyn PageElement>)
            .collect())
    }

    fn select_value(&self, selector: &str, value: &str) -> Result<()> {
        // Drive the owning <select> directly; option elements are not
        // clickable targets in Chromium.
        let js = format!(
            r#"
            (function() {{
                const probe = document.querySelector("{selector}");
                const select = probe && probe.closest ? probe.closest("select") : null;
                if (!select) {{ return false; }}
                select.value = "{value}";
                select.dispatchEvent(new Event("input", {{ bubbles: true }}));
                select.dispatchEvent(new Event("change", {{ bubbles: true }}));
                return true;
            }})()
            "#,
            selector = selector.replace('"', "\\\""),
            value = value.replace('"', "\\\""),
        );

        let result = self
            .tab
            .evaluate(&js, false)
            .map_err(|e| AppError::ElementInteraction {
                selector: selector.to_string(),
                reason: format!("select evaluation failed: {}", e),
            })?;

        match result.value {
            Some(serde_json::Value::Bool(true)) => Ok(()),
            _ => Err(AppError::ElementInteraction {
                selector: selector.to_string(),
                reason: "no owning <select> found".to_string(),
            }),
        }
    }
}

struct ChromeElement<'a> {
    element: Element<'a>,
}

impl PageElement for ChromeElement<'_> {
    fn text(&self) -> Result<String> {
        self.element
            .get_inner_text()
            .map_err(|e| AppError::ElementInteraction {
                selector: "<element>".to_string(),
                reason: format!("text read failed: {}", e),
            })
    }

    fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        let js = format!(
            r#"function() {{ return this.getAttribute("{}"); }}"#,
            name.replace('"', "\\\"")
        );
        let result = self
            .element
            .call_js_fn(&js, vec![], false)
            .map_err(|e| AppError::ElementInteraction {
                selector: "<element>".to_string(),
                reason: format!("attribute read failed: {}", e),
            })?;

        Ok(match result.value {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        })
    }

    fn click(&self) -> Result<()> {
        self.element
            .click()
            .map(|_| ())
            .map_err(|e| AppError::ElementInteraction {
                selector: "<element>".to_string(),
                reason: format!("click failed: {}", e),
            })
    }

    fn force_click(&self) -> Result<()> {
        self.element
            .call_js_fn("function() { this.click(); }", vec![], false)
            .map(|_| ())
            .map_err(|e| AppError::ElementInteraction {
                selector: "<element>".to_string(),
                reason: format!("forced click failed: {}", e),
            })
    }

    fn scroll_into_view(&self) -> Result<()> {
        self.element
            .scroll_into_view()
            .map(|_| ())
            .map_err(|e| AppError::ElementInteraction {
                selector: "<element>".to_string(),
                reason: format!("scroll failed: {}", e),
            })
    }
}
