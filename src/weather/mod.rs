pub mod types;
pub mod visualcrossing;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use types::WeatherRecord;
pub use visualcrossing::VisualCrossingClient;

#[derive(Error, Debug)]
pub enum OriginError {
    #[error("Location must not be empty")]
    InvalidKey,
    #[error("Weather provider unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    /// The request deadline ran out before the origin answered.
    #[error("Weather provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Weather provider returned HTTP {code}")]
    UpstreamStatus { code: u16 },
    #[error("Weather provider response could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

impl OriginError {
    /// Failures worth another attempt: the origin may answer next time.
    pub fn is_transient(&self) -> bool {
        match self {
            OriginError::Transport(_) | OriginError::Timeout(_) => true,
            OriginError::UpstreamStatus { code } => *code == 429 || *code >= 500,
            OriginError::InvalidKey | OriginError::Decode(_) => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            OriginError::InvalidKey => "INVALID_KEY",
            OriginError::Transport(_) => "UPSTREAM_UNREACHABLE",
            OriginError::Timeout(_) => "UPSTREAM_TIMEOUT",
            OriginError::UpstreamStatus { .. } => "UPSTREAM_STATUS",
            OriginError::Decode(_) => "UPSTREAM_DECODE",
        }
    }
}

/// The authoritative source consulted on a cache miss.
///
/// One call is one outbound request; implementations never retry.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<WeatherRecord, OriginError>;
}
