use std::sync::Arc;

use chrono::Local;
use reqwest::Client;

use crate::error::BootstrapError;
use crate::info_time;
use crate::model::Bootstrap;
use crate::parse::{parse_book_page, BookPageAdapter, NextDataAdapter};
use crate::request::request_page_html;

/// Starts a browsing session from a book's detail page.
#[derive(Clone)]
pub struct SessionBootstrapper {
    client: Client,
    user_agent: String,
    adapter: Arc<dyn BookPageAdapter>,
}

impl SessionBootstrapper {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self::with_adapter(client, user_agent, Arc::new(NextDataAdapter))
    }

    pub fn with_adapter(
        client: Client,
        user_agent: impl Into<String>,
        adapter: Arc<dyn BookPageAdapter>,
    ) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            adapter,
        }
    }

    /// Fetches and parses the page. Any failure along the way discards the whole result.
    pub async fn bootstrap(&self, book_url: &str) -> Result<Bootstrap, BootstrapError> {
        let start_time = Local::now();

        let html = request_page_html(&self.client, book_url, &self.user_agent).await?;
        let boot = parse_book_page(self.adapter.clone(), html).await?;

        info_time!(
            start_time,
            "Bootstrapped {}: {} favorable reviews, next cursor: {}",
            book_url,
            boot.batch.reviews.len(),
            boot.batch.next_page_token.is_some()
        );
        Ok(boot)
    }
}
