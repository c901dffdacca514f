use thiserror::Error;

#[derive(Debug, Error)]
pub enum GcpError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google Cloud API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Credentials unavailable: {0}")]
    Auth(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}
