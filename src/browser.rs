//! The caller's side of a browsing session.
//!
//! The coordinator is stateless, so whoever pages through reviews has to keep the
//! book, work id, credential and cursors it hands back. [`ReviewBrowser`] does that
//! bookkeeping and only ever replaces it with the result of a successful request.

use crate::model::BookInfo;
use crate::process::{
    validate_book_url, PageRequest, PageTokenCache, PaginationCoordinator, ReviewSource,
    ReviewsPage,
};
use crate::{Error, Result};

pub struct ReviewBrowser<'c, S> {
    coordinator: &'c PaginationCoordinator<S>,
    book_url: String,
    book: Option<BookInfo>,
    work_id: Option<String>,
    api_key: Option<String>,
    cache: PageTokenCache,
    current: Option<ReviewsPage>,
}

impl<'c, S: ReviewSource> ReviewBrowser<'c, S> {
    pub fn new(coordinator: &'c PaginationCoordinator<S>, book_url: &str) -> Result<Self> {
        Ok(Self {
            coordinator,
            book_url: validate_book_url(Some(book_url))?,
            book: None,
            work_id: None,
            api_key: None,
            cache: PageTokenCache::new(),
            current: None,
        })
    }

    /// Loads page 1, starting the session over.
    pub async fn open(&mut self) -> Result<&ReviewsPage> {
        self.goto(1).await
    }

    pub async fn next(&mut self) -> Result<&ReviewsPage> {
        let page = self.current_page().map_or(1, |p| p + 1);
        self.goto(page).await
    }

    /// Fails with [`Error::NoPreviousPage`] on page 1 or before anything is loaded.
    pub async fn prev(&mut self) -> Result<&ReviewsPage> {
        match self.current_page() {
            Some(p) if p > 1 => self.goto(p - 1).await,
            _ => Err(Error::NoPreviousPage),
        }
    }

    /// Page 1 always bootstraps. Any other page needs the cursor recorded when its
    /// predecessor was fetched; without one the call fails before any request is made.
    /// Pages are numbered from 1.
    pub async fn goto(&mut self, page: u32) -> Result<&ReviewsPage> {
        if page == 0 {
            return Err(Error::InvalidParam("page"));
        }
        let request = if page == 1 {
            PageRequest {
                api_key: self.api_key.clone(),
                ..PageRequest::first_page(self.book_url.clone())
            }
        } else {
            let cursor = self.cache.cursor_for(page)?.map(str::to_string);
            let work_id = self.work_id.clone().ok_or(Error::PageNotResolvable(page))?;
            PageRequest {
                book_url: self.book_url.clone(),
                page,
                page_token: cursor,
                work_id: Some(work_id),
                api_key: self.api_key.clone(),
            }
        };

        let fetched = self.coordinator.navigate(&mut self.cache, &request).await?;

        if let Some(book) = &fetched.book {
            self.book = Some(book.clone());
        }
        self.work_id = fetched.pagination.work_id.clone().or(self.work_id.take());
        self.api_key = fetched.pagination.api_key.clone().or(self.api_key.take());
        Ok(self.current.insert(fetched))
    }

    pub fn book(&self) -> Option<&BookInfo> {
        self.book.as_ref()
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current.as_ref().map(|p| p.pagination.current_page)
    }

    pub fn work_id(&self) -> Option<&str> {
        self.work_id.as_deref()
    }

    pub fn cache(&self) -> &PageTokenCache {
        &self.cache
    }
}
