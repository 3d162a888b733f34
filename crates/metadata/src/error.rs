use thiserror::Error;

/// Metadata boundary errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No instance with the given GUID is known to the provider.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider could not produce a snapshot.
    #[error("snapshot unavailable: {0}")]
    Unavailable(String),

    /// A type definition refers to itself through its supertype chain.
    #[error("type hierarchy cycle at {0}")]
    TypeCycle(String),
}

pub type Result<T> = std::result::Result<T, Error>;
