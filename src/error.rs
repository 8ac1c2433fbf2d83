use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A setting could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// The endpoint is not an absolute `http://` URL.
    #[error("invalid endpoint {value:?}: {reason}")]
    Url { value: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    /// The request with the given 1-based index never got a response.
    #[error("message {index} failed after {sent} sent: {source}")]
    Transport {
        index: usize,
        sent: usize,
        #[source]
        source: hyper::Error,
    },
    /// The request could not be assembled.
    #[error("can't build request: {0}")]
    Request(#[from] hyper::http::Error),
    /// Writing a result line failed.
    #[error("can't write output: {0}")]
    Output(#[from] io::Error),
}
