use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

/// Matches the first contiguous numeric token in a text, separators included.
fn numeric_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d.,]*").unwrap())
}

/// Matches a 1-4 digit number directly followed by an "ml" unit marker.
/// Word boundaries on both sides keep it from firing inside larger numbers.
fn size_ml_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,4})\s*(?i:ml)\b").unwrap())
}

/// Matches price fragments anchored on a trailing euro mark, e.g. "89,00 €"
/// or "1.234,50€". Used to carve raw price strings out of free text.
fn price_fragment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,3}(?:[.,]\d{3})*(?:[.,]\d{1,2})?\s*€").unwrap())
}

/// Parse a price out of free text.
///
/// Takes the first contiguous numeric token, then resolves the separator
/// style: when both separators appear the last one is the decimal mark, and
/// a lone comma followed by exactly three digits is thousands grouping.
/// Returns `None` when no numeric token exists; never panics.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let token = numeric_token_regex().find(text)?.as_str();
    // Trailing separators ("12." from "12. ") carry no information.
    let token = token.trim_end_matches(['.', ',']);

    let has_dot = token.contains('.');
    let has_comma = token.contains(',');

    let normalized = if has_dot && has_comma {
        let last_dot = token.rfind('.').unwrap();
        let last_comma = token.rfind(',').unwrap();
        if last_comma > last_dot {
            // European style: 1.234,50
            token.replace('.', "").replacen(',', ".", 1)
        } else {
            // US style: 1,234.50
            token.replace(',', "")
        }
    } else if has_comma {
        let after = &token[token.rfind(',').unwrap() + 1..];
        if after.len() == 3 {
            // "1,000" reads as thousands grouping
            token.replace(',', "")
        } else {
            token.replacen(',', ".", 1)
        }
    } else if has_dot {
        let after = &token[token.rfind('.').unwrap() + 1..];
        if after.len() == 3 && token.matches('.').count() > 1 {
            // "1.234.000" reads as thousands grouping
            token.replace('.', "")
        } else {
            token.to_string()
        }
    } else {
        token.to_string()
    };

    normalized.parse().ok()
}

/// Parse a size in milliliters out of free text. First match wins.
pub fn parse_size_ml(text: &str) -> Option<u32> {
    size_ml_regex()
        .captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// ISO currency code recognised in source text. EUR is the working default
/// for the markets this crate targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Currency {
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "GBP")]
    Gbp,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EUR" | "€" => Ok(Currency::Eur),
            "USD" | "$" => Ok(Currency::Usd),
            "GBP" | "£" => Ok(Currency::Gbp),
            _ => Err(()),
        }
    }
}

/// Detect an explicit currency mark in the text. Symbol beats code.
pub fn parse_currency(text: &str) -> Option<Currency> {
    if text.contains('€') {
        Some(Currency::Eur)
    } else if text.contains('$') {
        Some(Currency::Usd)
    } else if text.contains('£') {
        Some(Currency::Gbp)
    } else if text.contains("EUR") {
        Some(Currency::Eur)
    } else if text.contains("USD") {
        Some(Currency::Usd)
    } else if text.contains("GBP") {
        Some(Currency::Gbp)
    } else {
        None
    }
}

/// Carve every euro-anchored price fragment out of a text.
pub fn extract_price_strings(text: &str) -> Vec<String> {
    price_fragment_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Carve every "NNN ml" fragment out of any number of texts.
pub fn extract_format_strings<'a, I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut formats = Vec::new();
    for text in texts {
        for cap in size_ml_regex().find_iter(text) {
            formats.push(cap.as_str().to_string());
        }
    }
    formats
}
