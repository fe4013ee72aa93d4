use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedctlError {
    /// Network-level failure: connection refused, timeout, bad TLS.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// An error reported by the server inside an otherwise successful response.
    #[error("{0}")]
    Remote(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A list of ids was passed to an operation that accepts only one.
    #[error("Can't get multiple {0}.")]
    MultipleIds(&'static str),

    /// The response decoded fine but did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(&'static str),
}

pub type Result<T> = std::result::Result<T, FeedctlError>;
