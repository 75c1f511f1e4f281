//! Reads a book page's embedded hydration state.
//!
//! The state is undocumented and unversioned, so every structural assumption made
//! here is pinned to [`HYDRATION_SHAPE`]. When one of them fails the parse fails
//! with [`BootstrapError::ShapeDrift`] instead of guessing.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::task::spawn_blocking;

use crate::error::BootstrapError;
use crate::model::{BookInfo, Bootstrap, ReviewBatch, UNKNOWN_AUTHOR, UNKNOWN_COVER, UNKNOWN_TITLE};
use crate::normalize::{normalize, RawCreator, RawReview};
use crate::REVIEWS_OPERATION;

/// The hydration state layout this module understands.
pub const HYDRATION_SHAPE: &str = "next-data/apollo-v1";

const STATE_SELECTOR: &str = r#"script[id="__NEXT_DATA__"]"#;
const SCRIPT_SELECTOR: &str = "script";
const ENTITY_CACHE_POINTER: &str = "/props/pageProps/apolloState";
const ROOT_QUERY: &str = "ROOT_QUERY";
/// Credential fields looked up in the state's runtime configuration, in order.
const RUNTIME_KEY_FIELDS: [&str; 3] = ["graphqlApiKey", "apiKey", "appSyncApiKey"];

static RE_API_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"da2-[a-z0-9]{26}").unwrap());

/// Parses raw book page HTML into a bootstrap result, or fails.
pub trait BookPageAdapter: Send + Sync {
    fn parse(&self, html: &str) -> Result<Bootstrap, BootstrapError>;
}

/// Adapter for pages hydrated from a `__NEXT_DATA__` script holding an Apollo entity cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NextDataAdapter;

impl BookPageAdapter for NextDataAdapter {
    fn parse(&self, html: &str) -> Result<Bootstrap, BootstrapError> {
        let doc = Html::parse_document(html);

        let state_selector = create_selector(STATE_SELECTOR)?;
        let script_selector = create_selector(SCRIPT_SELECTOR)?;

        let state_text = doc
            .select(&state_selector)
            .next()
            .ok_or(BootstrapError::MissingHydrationState)?
            .text()
            .collect::<String>();
        let state: Value = serde_json::from_str(&state_text)?;
        let entities = EntityCache::from_state(&state)?;

        let work_id = entities
            .work_id()
            .ok_or_else(|| drift("a Work: entity"))?
            .to_string();

        let (next_page_token, total_count) = entities.reviews_query();
        let batch = ReviewBatch {
            reviews: entities.reviews()?.into_iter().filter_map(normalize).collect(),
            next_page_token,
            total_count,
        };

        // Inline scripts first; the runtime configuration only if none of them matches.
        let api_key = doc
            .select(&script_selector)
            .find_map(|script| find_api_key(&script.text().collect::<String>()))
            .or_else(|| runtime_api_key(&state));

        Ok(Bootstrap {
            work_id,
            book: entities.book_info(),
            batch,
            api_key,
        })
    }
}

/// Runs the adapter off the async runtime. `Html` isn't `Send`, so the whole parse
/// happens inside one blocking task.
pub(crate) async fn parse_book_page(
    adapter: Arc<dyn BookPageAdapter>,
    html: String,
) -> Result<Bootstrap, BootstrapError> {
    let bootstrap = spawn_blocking(move || adapter.parse(&html)).await??;
    Ok(bootstrap)
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector, BootstrapError> {
    Selector::parse(sel_str).map_err(|_| BootstrapError::Selector(sel_str.into()))
}

#[inline]
fn drift(expected: &'static str) -> BootstrapError {
    BootstrapError::ShapeDrift {
        shape: HYDRATION_SHAPE,
        expected,
    }
}

pub fn find_api_key(text: &str) -> Option<String> {
    RE_API_KEY.find(text).map(|m| m.as_str().to_string())
}

fn runtime_api_key(state: &Value) -> Option<String> {
    let config = state.get("runtimeConfig")?.as_object()?;
    RUNTIME_KEY_FIELDS
        .iter()
        .filter_map(|field| config.get(*field)?.as_str())
        .find(|key| !key.is_empty())
        .map(str::to_string)
}

/// The flattened entity cache, keyed `"<Type>:<address>"`.
struct EntityCache<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> EntityCache<'a> {
    fn from_state(state: &'a Value) -> Result<Self, BootstrapError> {
        let map = state
            .pointer(ENTITY_CACHE_POINTER)
            .and_then(Value::as_object)
            .ok_or_else(|| drift("an entity cache at props.pageProps.apolloState"))?;
        Ok(Self { map })
    }

    /// Entities of one type in document order, with the key's address part.
    fn of_type(&self, type_name: &'a str) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.map.iter().filter_map(move |(key, value)| {
            let address = key.strip_prefix(type_name)?.strip_prefix(':')?;
            Some((address, value))
        })
    }

    /// Follows a `{"__ref": key}` object to the entity it names.
    fn deref(&self, reference: Option<&Value>) -> Option<&'a Value> {
        let key = reference?.get("__ref")?.as_str()?;
        self.map.get(key)
    }

    fn work_id(&self) -> Option<&'a str> {
        self.of_type("Work").map(|(address, _)| address).next()
    }

    fn book_info(&self) -> BookInfo {
        let Some((_, book)) = self.of_type("Book").next() else {
            return BookInfo::default();
        };

        let author = book
            .get("primaryContributorEdge")
            .and_then(|edge| self.deref(edge.get("node")))
            .and_then(|contributor| str_field(contributor, "name"));

        BookInfo {
            title: str_field(book, "title").unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            author: author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            cover_url: str_field(book, "imageUrl").unwrap_or_else(|| UNKNOWN_COVER.to_string()),
        }
    }

    /// A rating that isn't a small integer fails the page, as it does in a query response.
    fn reviews(&self) -> Result<Vec<RawReview>, BootstrapError> {
        self.of_type("Review")
            .map(|(address, review)| -> Result<RawReview, BootstrapError> {
                let creator = self.deref(review.get("creator")).map(|user| RawCreator {
                    name: str_field(user, "name"),
                    web_url: str_field(user, "webUrl"),
                });
                let rating = match review.get("rating") {
                    Some(rating) => Option::<u8>::deserialize(rating)?,
                    None => None,
                };

                Ok(RawReview {
                    id: str_field(review, "id").unwrap_or_else(|| address.to_string()),
                    rating,
                    creator,
                    created_at: review.get("createdAt").and_then(Value::as_f64),
                    text: str_field(review, "text"),
                })
            })
            .collect()
    }

    /// Next-page cursor and total count from the root query's reviews entry.
    fn reviews_query(&self) -> (Option<String>, u64) {
        let Some(entry) = self
            .map
            .get(ROOT_QUERY)
            .and_then(Value::as_object)
            .and_then(|root| {
                root.iter()
                    .find(|(key, _)| key.starts_with(REVIEWS_OPERATION))
                    .map(|(_, entry)| entry)
            })
        else {
            return (None, 0);
        };

        let next = entry
            .pointer("/pageInfo/nextPageToken")
            .or_else(|| entry.get("nextPageToken"))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        let total = entry.get("totalCount").and_then(Value::as_u64).unwrap_or(0);
        (next, total)
    }
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    value.get(field)?.as_str().map(str::to_string)
}
