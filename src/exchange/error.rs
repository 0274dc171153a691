use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("client not initialized")]
    NotInitialized,

    #[error("numeric parse error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),

    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },
}
