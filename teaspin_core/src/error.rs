use crate::item::ItemId;

/// Failures surfaced by the reconciler and its collaborators.
///
/// Every operation that returns one of these has left the core library and
/// the active set exactly as they were before the call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReelError {
    #[error("item store failed: {0}")]
    Persistence(String),
    #[error("item {0} is not in the core library")]
    InvalidReference(ItemId),
    #[error("active set position {index} is out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("item name must not be empty")]
    InvalidName,
}

impl ReelError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        ReelError::Persistence(err.to_string())
    }
}

pub type ReelResult<T> = Result<T, ReelError>;
