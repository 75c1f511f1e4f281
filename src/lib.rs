//! Favorable-review scraper for book-catalog pages.
//!
//! A page request enters [`process::PaginationCoordinator`], which either bootstraps a
//! session from the book's detail page ([`bootstrap`]) or continues it through the
//! review query service ([`query`]). Both paths run their raw records through
//! [`normalize`], so every [`model::Review`] handed out is rated 4 or 5.

mod macros;

pub mod api;
pub mod bootstrap;
pub mod browser;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod process;
pub mod query;
mod request;

pub use error::{Error, Result};

/// Domain every accepted book URL must belong to.
pub const SITE_DOMAIN: &str = "goodreads.com";
/// Origin sent along with review queries.
pub const SITE_ORIGIN: &str = "https://www.goodreads.com";
/// GraphQL endpoint of the review query service.
pub const DEFAULT_QUERY_ENDPOINT: &str =
    "https://kxbwmqov6jgg3daaamb744ycu4.appsync-api.us-east-1.amazonaws.com/graphql";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
/// Operation name of the reviews query; also the prefix of its root-query cache key.
pub const REVIEWS_OPERATION: &str = "getReviews";
/// The query service always returns at most this many reviews per batch.
pub const PAGE_SIZE: u32 = 30;
/// Reviews rated below this are dropped.
pub const MIN_RATING: u8 = 4;
