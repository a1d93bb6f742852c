use thiserror::Error;

pub type BotResult<T> = std::result::Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    /// Reaching or reading AniList or Discord failed, including shape mismatches.
    #[error("transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
    /// A required setting is missing or unusable. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),
}
