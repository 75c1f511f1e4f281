#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use review_scrap::error::{BootstrapError, QueryError};
use review_scrap::model::{BookInfo, Bootstrap, ReviewBatch};
use review_scrap::normalize::{normalize, RawCreator, RawReview};
use review_scrap::process::ReviewSource;
use review_scrap::Result;

pub const BOOK_URL: &str = "https://www.goodreads.com/book/show/18423.The_Left_Hand_of_Darkness";
pub const WORK_ID: &str = "kca://work/amzn1.gr.work.v1.lhod";
pub const PAGE_KEY: &str = "da2-abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Bootstrap(String),
    Fetch {
        work_id: String,
        api_key: String,
        cursor: Option<String>,
    },
}

#[derive(Default)]
pub struct FakeState {
    pub calls: Mutex<Vec<Call>>,
    pub fail: AtomicBool,
    pub no_favorable_reviews: AtomicBool,
}

impl FakeState {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

/// Three pages of reviews: bootstrap hands out cursor `c1`, `c1` leads to `c2`,
/// and `c2` is the last page.
#[derive(Clone, Default)]
pub struct FakeSource {
    pub state: Arc<FakeState>,
}

fn batch(tag: &str, next: Option<&str>, favorable: bool) -> ReviewBatch {
    let ratings: &[u8] = if favorable { &[5, 2, 4] } else { &[1, 3] };
    let reviews = ratings
        .iter()
        .enumerate()
        .filter_map(|(i, rating)| {
            normalize(RawReview {
                id: format!("{tag}-{i}"),
                rating: Some(*rating),
                creator: Some(RawCreator {
                    name: Some(format!("reader {i}")),
                    web_url: None,
                }),
                created_at: Some(1_673_913_600_000.0),
                text: Some(format!("<p>review {tag}-{i}</p>")),
            })
        })
        .collect();

    ReviewBatch {
        reviews,
        next_page_token: next.map(str::to_string),
        total_count: 75,
    }
}

#[async_trait]
impl ReviewSource for FakeSource {
    async fn bootstrap(&self, book_url: &str) -> Result<Bootstrap> {
        self.state
            .calls
            .lock()
            .unwrap()
            .push(Call::Bootstrap(book_url.to_string()));
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(BootstrapError::MissingHydrationState.into());
        }

        let favorable = !self.state.no_favorable_reviews.load(Ordering::SeqCst);
        Ok(Bootstrap {
            work_id: WORK_ID.to_string(),
            book: BookInfo {
                title: "The Left Hand of Darkness".into(),
                author: "Ursula K. Le Guin".into(),
                cover_url: "https://images.gr-assets.com/books/lhod.jpg".into(),
            },
            batch: batch("p1", Some("c1"), favorable),
            api_key: Some(PAGE_KEY.to_string()),
        })
    }

    async fn fetch_reviews(
        &self,
        work_id: &str,
        api_key: &str,
        cursor: Option<&str>,
    ) -> Result<ReviewBatch> {
        self.state.calls.lock().unwrap().push(Call::Fetch {
            work_id: work_id.to_string(),
            api_key: api_key.to_string(),
            cursor: cursor.map(str::to_string),
        });
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(QueryError::MissingConnection.into());
        }

        match cursor {
            Some("c1") => Ok(batch("p2", Some("c2"), true)),
            Some("c2") => Ok(batch("p3", None, true)),
            _ => Err(QueryError::MissingConnection.into()),
        }
    }
}
