use thiserror::Error;

/// Engine errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A gate denied the request.
    #[error(transparent)]
    NotAuthorized(#[from] policy::NotAuthorized),

    /// The caller broke the calling contract.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Policy(#[from] policy::Error),

    #[error(transparent)]
    Metadata(#[from] metadata::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is a security decision rather than a failure.
    pub fn is_not_authorized(&self) -> bool {
        matches!(
            self,
            Self::NotAuthorized(_) | Self::Policy(policy::Error::NotAuthorized(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
