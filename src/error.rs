use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildIdError {
    #[error("digest tool unavailable: {0}")]
    MissingDigestTool(String),
    #[error("digest tool failed: {0}")]
    DigestToolFailed(String),
    #[error("digest tool printed no sha256 token: {0}")]
    MalformedDigest(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
}
