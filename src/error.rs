use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP {status} for {url}\n{body}")]
    Status { status: u16, url: String, body: String },

    #[error("Rate limited: gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("No index found at {0}; run a harvest first")]
    MissingIndex(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
