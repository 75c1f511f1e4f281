use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Caller-facing message for every bootstrap failure, whatever the sub-cause.
pub const BOOTSTRAP_FAILED: &str = "Failed to fetch book data from Goodreads";
/// Caller-facing message for every review query failure.
pub const QUERY_FAILED: &str = "Failed to fetch reviews from Goodreads";
pub const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing '{0}' query parameter")]
    MissingParam(&'static str),
    #[error("Invalid '{0}' query parameter")]
    InvalidParam(&'static str),
    #[error("URL must be a Goodreads URL")]
    NotSiteUrl,
    #[error("Missing 'apiKey' query parameter")]
    MissingCredential,
    /// The query string itself couldn't be read, e.g. a repeated parameter.
    #[error("Malformed query string: {0}")]
    MalformedQuery(String),

    /// No cursor for the page before this one was recorded going forward.
    #[error("Page {0} can't be reached from the pages visited so far")]
    PageNotResolvable(u32),
    #[error("Already on the first page, there is no previous page")]
    NoPreviousPage,

    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error("Review query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingParam(_)
            | Error::InvalidParam(_)
            | Error::NotSiteUrl
            | Error::MissingCredential
            | Error::MalformedQuery(_)
            | Error::PageNotResolvable(_)
            | Error::NoPreviousPage => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to callers. Server-side detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::Bootstrap(_) => BOOTSTRAP_FAILED.to_string(),
            Error::Query(_) => QUERY_FAILED.to_string(),
            Error::Io(_) | Error::RuntimeJoin(_) => INTERNAL_ERROR.to_string(),
            validation => validation.to_string(),
        }
    }
}

/// Why a session couldn't be bootstrapped from a book page.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Reqwest Error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Book page responded with {0}")]
    Status(StatusCode),

    #[error("The page has no hydration state script")]
    MissingHydrationState,
    #[error("Hydration state isn't valid JSON: {0}")]
    MalformedHydrationState(#[from] serde_json::Error),
    /// A structural assumption about the hydration state no longer holds.
    #[error("Hydration state shape {shape} drifted, expected {expected}")]
    ShapeDrift {
        shape: &'static str,
        expected: &'static str,
    },

    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    Selector(String),
    #[error("Tokio Join Error, couldn't await the parser! {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a review query failed.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Reqwest Error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Review service responded with {0}")]
    Status(StatusCode),
    #[error("Review service response has no review connection")]
    MissingConnection,
    #[error("Review service response is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests_with_their_own_message() {
        let err = Error::MissingParam("url");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Missing 'url' query parameter");

        let err = Error::NotSiteUrl;
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "URL must be a Goodreads URL");

        let err = Error::MalformedQuery("duplicate field `url`".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Malformed query string: duplicate field `url`");

        assert_eq!(Error::NoPreviousPage.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bootstrap_sub_causes_collapse_to_one_message() {
        let causes = [
            BootstrapError::MissingHydrationState,
            BootstrapError::Status(StatusCode::NOT_FOUND),
            BootstrapError::ShapeDrift {
                shape: "x",
                expected: "y",
            },
        ];
        for cause in causes {
            let err = Error::from(cause);
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.public_message(), BOOTSTRAP_FAILED);
        }
    }

    #[test]
    fn query_failures_are_generic_500s() {
        let err = Error::from(QueryError::MissingConnection);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), QUERY_FAILED);
    }
}
