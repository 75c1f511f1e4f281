//! Turns raw upstream review records into [`Review`]s, dropping unfavorable ones.
//!
//! Both fetch paths feed this module: the bootstrapper after resolving entity
//! references, the query client straight from the response edges.

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::model::{Review, ANONYMOUS};
use crate::MIN_RATING;

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// A review record as the upstream hands it out.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReview {
    #[serde(default)]
    pub id: String,
    pub rating: Option<u8>,
    pub creator: Option<RawCreator>,
    /// Epoch milliseconds.
    pub created_at: Option<f64>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCreator {
    pub name: Option<String>,
    pub web_url: Option<String>,
}

/// Returns `None` for reviews rated below 4.
pub fn normalize(raw: RawReview) -> Option<Review> {
    let rating = raw.rating.filter(|r| (MIN_RATING..=5).contains(r))?;
    let creator = raw.creator.unwrap_or_default();

    Some(Review {
        id: raw.id,
        rating,
        reviewer: creator.name.unwrap_or_else(|| ANONYMOUS.to_string()),
        reviewer_url: creator.web_url.unwrap_or_default(),
        // Zero means unset.
        date: raw
            .created_at
            .filter(|ms| *ms != 0.0)
            .map(human_date)
            .unwrap_or_default(),
        content: raw.text.map(|t| strip_all_tags(&t)).unwrap_or_default(),
    })
}

/// Removes every `<...>` substring, left to right, without recursing into the result.
///
/// A `<` that survives has no `>` anywhere after it, so the output never
/// contains a tag-delimited substring.
pub fn strip_all_tags(text: &str) -> String {
    RE_TAG.replace_all(text, "").into_owned()
}

/// Formats epoch milliseconds as e.g. `Jan 17, 2023` (UTC). Out-of-range input gives "".
pub fn human_date(epoch_ms: f64) -> String {
    if !epoch_ms.is_finite() {
        return String::new();
    }
    DateTime::from_timestamp_millis(epoch_ms as i64)
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_default()
}
