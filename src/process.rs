//! Page requests and the coordinator that serves them.
//!
//! A request is served either by bootstrapping from the book page or by resuming the
//! review query from a cursor. Which one is decided up front by [`PageRequest::mode`].
//! The coordinator keeps no session of its own: the work id, credential and cursors
//! travel back to the caller, who holds them in a [`PageTokenCache`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::bootstrap::SessionBootstrapper;
use crate::config::Config;
use crate::model::{BookInfo, Bootstrap, Review, ReviewBatch};
use crate::parse::{BookPageAdapter, NextDataAdapter};
use crate::query::ReviewQueryClient;
use crate::{Error, Result, SITE_DOMAIN};

/// The two upstream fetch strategies.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn bootstrap(&self, book_url: &str) -> Result<Bootstrap>;

    async fn fetch_reviews(
        &self,
        work_id: &str,
        api_key: &str,
        cursor: Option<&str>,
    ) -> Result<ReviewBatch>;
}

/// The live site: book pages plus the review query service.
#[derive(Clone)]
pub struct GoodreadsSource {
    bootstrapper: SessionBootstrapper,
    query: ReviewQueryClient,
}

impl GoodreadsSource {
    pub fn new(config: &Config) -> Self {
        Self::with_adapter(config, Arc::new(NextDataAdapter))
    }

    /// Reads book pages with `adapter` instead of the current page layout.
    pub fn with_adapter(config: &Config, adapter: Arc<dyn BookPageAdapter>) -> Self {
        // Client uses Arc so both halves share one connection pool.
        let client = Client::new();
        Self {
            bootstrapper: SessionBootstrapper::with_adapter(
                client.clone(),
                config.user_agent.clone(),
                adapter,
            ),
            query: ReviewQueryClient::new(client, config.query_endpoint.clone(), config.user_agent.clone()),
        }
    }
}

#[async_trait]
impl ReviewSource for GoodreadsSource {
    async fn bootstrap(&self, book_url: &str) -> Result<Bootstrap> {
        Ok(self.bootstrapper.bootstrap(book_url).await?)
    }

    async fn fetch_reviews(
        &self,
        work_id: &str,
        api_key: &str,
        cursor: Option<&str>,
    ) -> Result<ReviewBatch> {
        Ok(self.query.fetch(work_id, api_key, cursor).await?)
    }
}

/// Query parameters exactly as a caller sends them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub url: Option<String>,
    pub page: Option<String>,
    pub page_token: Option<String>,
    pub work_id: Option<String>,
    pub api_key: Option<String>,
}

/// A validated page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub book_url: String,
    pub page: u32,
    pub page_token: Option<String>,
    pub work_id: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode<'a> {
    Bootstrap,
    CursorFetch { work_id: &'a str, cursor: &'a str },
}

impl PageRequest {
    pub fn first_page(book_url: impl Into<String>) -> Self {
        Self {
            book_url: book_url.into(),
            page: 1,
            page_token: None,
            work_id: None,
            api_key: None,
        }
    }

    pub fn from_params(params: PageParams) -> Result<Self> {
        let book_url = validate_book_url(params.url.as_deref())?;
        let page = match non_blank(params.page) {
            None => 1,
            Some(page) => page
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or(Error::InvalidParam("page"))?,
        };

        Ok(Self {
            book_url,
            page,
            page_token: non_blank(params.page_token),
            work_id: non_blank(params.work_id),
            api_key: non_blank(params.api_key),
        })
    }

    /// Page 1, or no work id yet, means bootstrap. Anything else resumes from the
    /// caller's cursor, which must be present.
    pub fn mode(&self) -> Result<FetchMode<'_>> {
        match (self.page, self.work_id.as_deref()) {
            (1, _) | (_, None) => Ok(FetchMode::Bootstrap),
            (_, Some(work_id)) => {
                let cursor = self
                    .page_token
                    .as_deref()
                    .ok_or(Error::MissingParam("pageToken"))?;
                Ok(FetchMode::CursorFetch { work_id, cursor })
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accepts URLs on the site's domain or any of its subdomains.
pub fn validate_book_url(url: Option<&str>) -> Result<String> {
    let url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(Error::MissingParam("url"))?;

    let parsed = Url::parse(url).map_err(|_| Error::NotSiteUrl)?;
    let on_site = matches!(parsed.scheme(), "http" | "https")
        && parsed.host_str().is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            host == SITE_DOMAIN
                || host
                    .strip_suffix(SITE_DOMAIN)
                    .is_some_and(|sub| sub.ends_with('.'))
        });
    if !on_site {
        return Err(Error::NotSiteUrl);
    }
    Ok(url.to_string())
}

/// Credential priority: found in the page, then supplied by the caller, then configured.
pub fn resolve_api_key(
    extracted: Option<String>,
    supplied: Option<String>,
    configured: Option<String>,
) -> Option<String> {
    extracted.or(supplied).or(configured)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub current_page: u32,
    pub has_next: bool,
    pub has_prev: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// One served page. `book` is only filled in by bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsPage {
    pub book: Option<BookInfo>,
    pub reviews: Vec<Review>,
    pub total_filtered: usize,
    pub total_count: u64,
    pub pagination: PaginationState,
}

impl ReviewsPage {
    fn new(
        book: Option<BookInfo>,
        batch: ReviewBatch,
        current_page: u32,
        work_id: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            book,
            total_filtered: batch.reviews.len(),
            total_count: batch.total_count,
            pagination: PaginationState {
                current_page,
                has_next: batch.next_page_token.is_some(),
                has_prev: current_page > 1,
                next_page_token: batch.next_page_token,
                work_id: Some(work_id),
                api_key,
            },
            reviews: batch.reviews,
        }
    }
}

/// Cursors recorded while paging forward: page P maps to the cursor of page P + 1,
/// or `None` when P was the last page.
///
/// Entries only ever get added, and only for pages actually fetched. Jumping back to
/// a page whose predecessor was never fetched isn't possible; see
/// [`PageTokenCache::cursor_for`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTokenCache {
    tokens: BTreeMap<u32, Option<String>>,
}

impl PageTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records what fetching `page` returned. Recording page 1 starts a new chain.
    pub fn record(&mut self, page: u32, next_page_token: Option<String>) {
        if page == 1 {
            self.tokens.clear();
        }
        self.tokens.entry(page).or_insert(next_page_token);
    }

    /// The cursor needed to fetch `page`; `None` for page 1, which bootstraps.
    pub fn cursor_for(&self, page: u32) -> Result<Option<&str>> {
        match page {
            0 => Err(Error::InvalidParam("page")),
            1 => Ok(None),
            _ => match self.tokens.get(&(page - 1)) {
                Some(Some(cursor)) => Ok(Some(cursor.as_str())),
                _ => Err(Error::PageNotResolvable(page)),
            },
        }
    }

    pub fn contains(&self, page: u32) -> bool {
        self.tokens.contains_key(&page)
    }

    /// Highest page fetched in this chain.
    pub fn last_page(&self) -> Option<u32> {
        self.tokens.keys().next_back().copied()
    }
}

pub struct PaginationCoordinator<S> {
    source: S,
    fallback_api_key: Option<String>,
}

impl<S: ReviewSource> PaginationCoordinator<S> {
    pub fn new(source: S, fallback_api_key: Option<String>) -> Self {
        Self {
            source,
            fallback_api_key,
        }
    }

    /// Serves one page with at most one upstream call.
    pub async fn handle(&self, request: &PageRequest) -> Result<ReviewsPage> {
        match request.mode()? {
            FetchMode::Bootstrap => {
                let boot = self.source.bootstrap(&request.book_url).await?;
                let api_key = resolve_api_key(
                    boot.api_key,
                    request.api_key.clone(),
                    self.fallback_api_key.clone(),
                );
                Ok(ReviewsPage::new(
                    Some(boot.book),
                    boot.batch,
                    1,
                    boot.work_id,
                    api_key,
                ))
            }
            FetchMode::CursorFetch { work_id, cursor } => {
                let api_key = resolve_api_key(
                    None,
                    request.api_key.clone(),
                    self.fallback_api_key.clone(),
                )
                .ok_or(Error::MissingCredential)?;
                let batch = self
                    .source
                    .fetch_reviews(work_id, &api_key, Some(cursor))
                    .await?;
                Ok(ReviewsPage::new(
                    None,
                    batch,
                    request.page,
                    work_id.to_string(),
                    Some(api_key),
                ))
            }
        }
    }

    /// Like [`handle`](Self::handle), recording the result in the caller's cache.
    /// The cache is left untouched when the request fails.
    pub async fn navigate(
        &self,
        cache: &mut PageTokenCache,
        request: &PageRequest,
    ) -> Result<ReviewsPage> {
        let page = self.handle(request).await?;
        cache.record(
            page.pagination.current_page,
            page.pagination.next_page_token.clone(),
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::QueryError;

    const BOOK_URL: &str = "https://www.goodreads.com/book/show/18423.The_Left_Hand_of_Darkness";

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Bootstrap,
        Fetch(String, Option<String>),
    }

    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<Call>>,
        page_key: Option<String>,
        fail_fetch: bool,
    }

    fn batch(next: Option<&str>) -> ReviewBatch {
        ReviewBatch {
            reviews: vec![],
            next_page_token: next.map(str::to_string),
            total_count: 60,
        }
    }

    #[async_trait]
    impl ReviewSource for FakeSource {
        async fn bootstrap(&self, _book_url: &str) -> Result<Bootstrap> {
            self.calls.lock().unwrap().push(Call::Bootstrap);
            Ok(Bootstrap {
                work_id: "kca://work/1".into(),
                book: BookInfo::default(),
                batch: batch(Some("c1")),
                api_key: self.page_key.clone(),
            })
        }

        async fn fetch_reviews(
            &self,
            _work_id: &str,
            api_key: &str,
            cursor: Option<&str>,
        ) -> Result<ReviewBatch> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Fetch(api_key.into(), cursor.map(str::to_string)));
            if self.fail_fetch {
                return Err(QueryError::MissingConnection.into());
            }
            let next = match cursor {
                Some("c1") => Some("c2"),
                _ => None,
            };
            Ok(batch(next))
        }
    }

    fn request(page: u32, token: Option<&str>, work_id: Option<&str>, key: Option<&str>) -> PageRequest {
        PageRequest {
            book_url: BOOK_URL.into(),
            page,
            page_token: token.map(str::to_string),
            work_id: work_id.map(str::to_string),
            api_key: key.map(str::to_string),
        }
    }

    #[test]
    fn mode_selection() {
        assert_eq!(
            request(1, Some("c1"), Some("w"), Some("k")).mode().unwrap(),
            FetchMode::Bootstrap
        );
        assert_eq!(request(3, Some("c2"), None, None).mode().unwrap(), FetchMode::Bootstrap);
        assert_eq!(
            request(2, Some("c1"), Some("w"), None).mode().unwrap(),
            FetchMode::CursorFetch {
                work_id: "w",
                cursor: "c1"
            }
        );
        assert!(matches!(
            request(2, None, Some("w"), None).mode(),
            Err(Error::MissingParam("pageToken"))
        ));
    }

    #[test]
    fn params_validation() {
        let params = |url: Option<&str>, page: Option<&str>| PageParams {
            url: url.map(str::to_string),
            page: page.map(str::to_string),
            work_id: Some("".into()),
            ..Default::default()
        };

        let req = PageRequest::from_params(params(Some(BOOK_URL), None)).unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.work_id, None);
        assert_eq!(PageRequest::from_params(params(Some(BOOK_URL), Some("4"))).unwrap().page, 4);

        assert!(matches!(
            PageRequest::from_params(params(None, None)),
            Err(Error::MissingParam("url"))
        ));
        assert!(matches!(
            PageRequest::from_params(params(Some("  "), None)),
            Err(Error::MissingParam("url"))
        ));
        for page in ["0", "-1", "two"] {
            assert!(matches!(
                PageRequest::from_params(params(Some(BOOK_URL), Some(page))),
                Err(Error::InvalidParam("page"))
            ));
        }
    }

    #[test]
    fn only_site_urls_pass() {
        for url in [
            "https://www.goodreads.com/book/show/1",
            "https://goodreads.com/book/show/1",
            "http://m.GOODREADS.com/work/1",
        ] {
            assert!(validate_book_url(Some(url)).is_ok(), "{url}");
        }
        for url in [
            "https://example.com/book/show/1",
            "https://notgoodreads.com/book/show/1",
            "https://goodreads.com.evil.io/book/1",
            "ftp://www.goodreads.com/book/1",
            "goodreads.com/book/show/1",
        ] {
            assert!(
                matches!(validate_book_url(Some(url)), Err(Error::NotSiteUrl)),
                "{url}"
            );
        }
    }

    #[test]
    fn credential_priority() {
        let s = |v: &str| Some(v.to_string());
        assert_eq!(resolve_api_key(s("page"), s("caller"), s("conf")), s("page"));
        assert_eq!(resolve_api_key(None, s("caller"), s("conf")), s("caller"));
        assert_eq!(resolve_api_key(None, None, s("conf")), s("conf"));
        assert_eq!(resolve_api_key(None, None, None), None);
    }

    #[tokio::test]
    async fn first_page_always_bootstraps() {
        let coordinator = PaginationCoordinator::new(FakeSource::default(), Some("conf".into()));
        let page = coordinator
            .handle(&request(1, Some("c9"), Some("w"), Some("caller")))
            .await
            .unwrap();

        assert_eq!(coordinator.source.calls.lock().unwrap().as_slice(), &[Call::Bootstrap]);
        assert!(page.book.is_some());
        assert_eq!(page.pagination.current_page, 1);
        assert!(!page.pagination.has_prev);
        assert!(page.pagination.has_next);
        assert_eq!(page.pagination.next_page_token.as_deref(), Some("c1"));
        assert_eq!(page.pagination.work_id.as_deref(), Some("kca://work/1"));
        // Nothing in the page, so the caller's key wins over the configured one.
        assert_eq!(page.pagination.api_key.as_deref(), Some("caller"));
    }

    #[tokio::test]
    async fn extracted_key_beats_caller_key() {
        let source = FakeSource {
            page_key: Some("from-page".into()),
            ..Default::default()
        };
        let coordinator = PaginationCoordinator::new(source, None);
        let page = coordinator
            .handle(&request(1, None, None, Some("caller")))
            .await
            .unwrap();
        assert_eq!(page.pagination.api_key.as_deref(), Some("from-page"));
    }

    #[tokio::test]
    async fn later_pages_resume_from_cursor_without_book() {
        let coordinator = PaginationCoordinator::new(FakeSource::default(), Some("conf".into()));
        let page = coordinator
            .handle(&request(2, Some("c1"), Some("kca://work/1"), None))
            .await
            .unwrap();

        assert_eq!(
            coordinator.source.calls.lock().unwrap().as_slice(),
            &[Call::Fetch("conf".into(), Some("c1".into()))]
        );
        assert_eq!(page.book, None);
        assert_eq!(page.pagination.current_page, 2);
        assert!(page.pagination.has_prev);
        assert!(page.pagination.has_next);
        assert_eq!(page.pagination.api_key.as_deref(), Some("conf"));

        let last = coordinator
            .handle(&request(3, Some("c2"), Some("kca://work/1"), Some("k")))
            .await
            .unwrap();
        assert!(!last.pagination.has_next);
        assert_eq!(last.pagination.next_page_token, None);
    }

    #[tokio::test]
    async fn cursor_fetch_needs_a_credential() {
        let coordinator = PaginationCoordinator::new(FakeSource::default(), None);
        let err = coordinator
            .handle(&request(2, Some("c1"), Some("w"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential));
        assert!(coordinator.source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn navigate_records_only_successes() {
        let coordinator = PaginationCoordinator::new(FakeSource::default(), Some("k".into()));
        let mut cache = PageTokenCache::new();

        coordinator.navigate(&mut cache, &request(1, None, None, None)).await.unwrap();
        assert_eq!(cache.cursor_for(2).unwrap(), Some("c1"));

        coordinator
            .navigate(&mut cache, &request(2, Some("c1"), Some("w"), None))
            .await
            .unwrap();
        assert_eq!(cache.cursor_for(3).unwrap(), Some("c2"));

        let failing = PaginationCoordinator::new(
            FakeSource {
                fail_fetch: true,
                ..Default::default()
            },
            Some("k".into()),
        );
        let before = cache.clone();
        assert!(failing
            .navigate(&mut cache, &request(3, Some("c2"), Some("w"), None))
            .await
            .is_err());
        assert_eq!(cache, before);
    }

    #[test]
    fn cache_is_forward_only() {
        let mut cache = PageTokenCache::new();
        assert_eq!(cache.cursor_for(1).unwrap(), None);
        assert!(matches!(cache.cursor_for(2), Err(Error::PageNotResolvable(2))));

        cache.record(1, Some("c1".into()));
        cache.record(2, Some("c2".into()));
        cache.record(2, Some("other".into()));
        assert_eq!(cache.cursor_for(3).unwrap(), Some("c2"));
        assert!(matches!(cache.cursor_for(5), Err(Error::PageNotResolvable(5))));
        assert_eq!(cache.last_page(), Some(2));

        cache.record(3, None);
        assert!(matches!(cache.cursor_for(4), Err(Error::PageNotResolvable(4))));

        // Back to page 1 restarts the chain.
        cache.record(1, Some("fresh".into()));
        assert_eq!(cache.cursor_for(2).unwrap(), Some("fresh"));
        assert!(!cache.contains(2));
        assert!(matches!(cache.cursor_for(0), Err(Error::InvalidParam("page"))));
    }
}
