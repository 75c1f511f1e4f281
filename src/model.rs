//! Shapes handed out by the engine.

use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_COVER: &str = "Unknown Cover";
pub const ANONYMOUS: &str = "Anonymous";

/// A favorable review. Only [`crate::normalize`] builds these, so `rating` is 4 or 5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub rating: u8,
    pub reviewer: String,
    pub reviewer_url: String,
    pub date: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInfo {
    pub title: String,
    pub author: String,
    pub cover_url: String,
}

impl Default for BookInfo {
    fn default() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            cover_url: UNKNOWN_COVER.to_string(),
        }
    }
}

/// One batch of filtered reviews plus the cursor addressing the batch after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewBatch {
    pub reviews: Vec<Review>,
    pub next_page_token: Option<String>,
    /// Upstream's total, counted before filtering.
    pub total_count: u64,
}

/// Everything scraped from a book's detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrap {
    pub work_id: String,
    pub book: BookInfo,
    pub batch: ReviewBatch,
    /// Credential found in the page, if any. Fallbacks are resolved by the coordinator.
    pub api_key: Option<String>,
}
