pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`stages` must be a non-empty list of {{ duration, target }}")]
    InvalidStages,

    #[error("`stages` must have a positive total duration")]
    ZeroDuration,

    #[error("at least one stage must have a positive `target`")]
    InvalidVus,

    #[error("`timeout` must be a positive duration")]
    InvalidTimeout,

    #[error("invalid base url `{0}` (expected http:// or https://)")]
    InvalidBaseUrl(String),

    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),
}
