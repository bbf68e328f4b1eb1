use serde::{Deserialize, Serialize};

pub mod candidate;
pub mod record;

// Re-exports for convenience
pub use candidate::*;
pub use record::*;

// Common enums used across models

/// Where a candidate price observation came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PriceSource {
    SearchSnippet,
    RichSnippet,
    DomSelector,
}

/// Where a candidate image observation came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ImageRole {
    ResultThumbnail,
    KnowledgePanel,
}
