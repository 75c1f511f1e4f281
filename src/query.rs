//! Client for the review query service.
//!
//! Every request has the same shape: reviews of one work, [`PAGE_SIZE`] at a time,
//! optionally resuming after a continuation cursor.

use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::QueryError;
use crate::info_time;
use crate::model::ReviewBatch;
use crate::normalize::{normalize, RawReview};
use crate::request::request_query;
use crate::{PAGE_SIZE, REVIEWS_OPERATION};

const REVIEWS_QUERY: &str = "query getReviews($filters: BookReviewsFilterInput!, $pagination: PaginationInput) {
  getReviews(filters: $filters, pagination: $pagination) {
    totalCount
    edges {
      node {
        id
        rating
        text
        createdAt
        creator { name webUrl }
      }
    }
    pageInfo { prevPageToken nextPageToken }
  }
}";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub operation_name: &'static str,
    pub query: &'static str,
    pub variables: QueryVariables<'a>,
}

#[derive(Debug, Serialize)]
pub struct QueryVariables<'a> {
    pub filters: Filters<'a>,
    pub pagination: Pagination<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters<'a> {
    pub resource_type: &'static str,
    pub resource_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Pagination<'a> {
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<&'a str>,
}

impl<'a> QueryRequest<'a> {
    pub fn reviews_of_work(work_id: &'a str, after: Option<&'a str>) -> Self {
        Self {
            operation_name: REVIEWS_OPERATION,
            query: REVIEWS_QUERY,
            variables: QueryVariables {
                filters: Filters {
                    resource_type: "WORK",
                    resource_id: work_id,
                },
                pagination: Pagination {
                    limit: PAGE_SIZE,
                    after,
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: Option<QueryData>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "getReviews")]
    connection: Option<Connection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: RawReview,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    next_page_token: Option<String>,
}

/// Maps a raw service response to a filtered batch.
pub fn parse_query_response(body: &str) -> Result<ReviewBatch, QueryError> {
    let response: QueryResponse = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        warn!("Review service reported errors: {:?}", response.errors);
    }

    let connection = response
        .data
        .and_then(|data| data.connection)
        .ok_or(QueryError::MissingConnection)?;

    Ok(ReviewBatch {
        reviews: connection
            .edges
            .into_iter()
            .filter_map(|edge| normalize(edge.node))
            .collect(),
        next_page_token: connection
            .page_info
            .next_page_token
            .filter(|token| !token.is_empty()),
        total_count: connection.total_count,
    })
}

#[derive(Clone)]
pub struct ReviewQueryClient {
    client: Client,
    endpoint: String,
    user_agent: String,
}

impl ReviewQueryClient {
    pub fn new(client: Client, endpoint: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            user_agent: user_agent.into(),
        }
    }

    pub async fn fetch(
        &self,
        work_id: &str,
        api_key: &str,
        cursor: Option<&str>,
    ) -> Result<ReviewBatch, QueryError> {
        let start_time = Local::now();

        let body = QueryRequest::reviews_of_work(work_id, cursor);
        let text = request_query(&self.client, &self.endpoint, api_key, &self.user_agent, &body).await?;
        let batch = parse_query_response(&text)?;

        info_time!(
            start_time,
            "Fetched reviews of {} after {:?}: {} favorable of {} total",
            work_id,
            cursor,
            batch.reviews.len(),
            batch.total_count
        );
        Ok(batch)
    }
}
