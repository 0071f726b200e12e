use thiserror::Error;

/// Top-level error type for wabot.
#[derive(Debug, Error)]
pub enum WabotError {
    /// A raw identifier could not be turned into a target.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Outbound delivery exhausted its attempts.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// The text/image generation backend failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Media exceeds the upload ceiling.
    #[error("payload too large: {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// Error from the messaging transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Error from a market-data source.
    #[error("market data error: {0}")]
    MarketData(String),

    /// Image decoding or encoding failed.
    #[error("media error: {0}")]
    Media(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Conversation memory error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a raw identifier could not be resolved. Terminal: never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("empty target")]
    Empty,

    #[error("invalid group identifier: {0}")]
    InvalidGroupFormat(String),
}

/// Delivery to one target failed on every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery to {target} failed after {attempts} attempt(s): {last_error}")]
pub struct DeliveryError {
    /// Display form of the target.
    pub target: String,
    /// Number of attempts actually made.
    pub attempts: u32,
    /// Error text of the final attempt.
    pub last_error: String,
}

/// Failure of the generation backend.
///
/// `NotConfigured` and `RateLimited` get tailored replies; everything else
/// is reported as a generic apology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation API key not configured")]
    NotConfigured,

    #[error("generation quota exhausted or rate limited")]
    RateLimited,

    #[error("generation failed: {0}")]
    Failed(String),
}
