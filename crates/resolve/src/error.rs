use thiserror::Error;

/// Failures talking to the knowledge base.
#[derive(Error, Debug)]
pub enum KbError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("knowledge base answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("knowledge base error {code}: {info}")]
    Api { code: String, info: String },

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl KbError {
    /// Whether another attempt could succeed.
    ///
    /// Only a request that cannot even be built is permanent; timeouts,
    /// transport failures, non-2xx statuses and bad payloads are retried.
    pub fn is_transient(&self) -> bool {
        match self {
            KbError::Http(e) => !e.is_builder(),
            KbError::Status(_) | KbError::Api { .. } | KbError::Malformed(_) => true,
        }
    }
}
