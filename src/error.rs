use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovdeltaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Too many redirects (max {max}) starting from {url}")]
    RedirectLoop { url: String, max: u32 },

    #[error("Malformed JSON from {url}: {source}")]
    MalformedJson {
        url: String,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, CovdeltaError>;
