use reqwest::{header, Client};
use serde::Serialize;

use crate::error::{BootstrapError, QueryError};
use crate::SITE_ORIGIN;

/// Requests a book page the way a browser would and returns the HTML.
pub(crate) async fn request_page_html(
    client: &Client,
    url: &str,
    user_agent: &str,
) -> Result<String, BootstrapError> {
    let res = client
        .get(url)
        .header(header::USER_AGENT, user_agent)
        .header(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        return Err(BootstrapError::Status(status));
    }
    let html = res.text().await?;
    Ok(html)
}

/// Posts an authenticated query and returns the raw response body.
pub(crate) async fn request_query<B: Serialize + ?Sized>(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    user_agent: &str,
    body: &B,
) -> Result<String, QueryError> {
    let res = client
        .post(endpoint)
        .header("x-api-key", api_key)
        .header(header::USER_AGENT, user_agent)
        .header(header::ACCEPT, "application/json")
        .header(header::ORIGIN, SITE_ORIGIN)
        .header(header::REFERER, format!("{SITE_ORIGIN}/"))
        .json(body)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        return Err(QueryError::Status(status));
    }
    let text = res.text().await?;
    Ok(text)
}
