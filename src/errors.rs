use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error : {0}")]
    Config(String),

    #[error("Parse error : {0}")]
    Parse(String),

    #[error("SQLite error : {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error : {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error : {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error : {0}")]
    Http(String),

    #[error("Audio tag error : {0}")]
    AudioTag(String),

    #[error("Image error : {0}")]
    Image(String),

    #[error("Audio cut error : {0}")]
    AudioCut(String),

    #[error("Extraction error : {0}")]
    Extraction(String),

    #[error("Could not create path : {0}")]
    PathCreationFailed(String),

    #[error("Operating System is not supported : {0}")]
    UnsupportedOS(String),

    #[error("Could not get env value : {0}")]
    UnavailableEnvVariable(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

impl From<regex::Error> for SyncError {
    fn from(value: regex::Error) -> Self {
        Self::Config(format!("invalid pattern : {value}"))
    }
}
