use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied something the engine cannot work with
    /// (too few periods, short >= long, malformed series).
    #[error("Invalid input: {0}")]
    Input(String),

    /// The market-data source returned no usable prices for a ticker.
    #[error("No market data available for {ticker}")]
    DataUnavailable { ticker: String },

    #[error("Alert {0} not found")]
    AlertNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn input(msg: impl Into<String>) -> Self {
        Error::Input(msg.into())
    }

    pub fn data_unavailable(ticker: impl Into<String>) -> Self {
        Error::DataUnavailable {
            ticker: ticker.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
