use crate::Status;

/// Errors returned by the settling side of a [`Deferred`](crate::Deferred).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// `resolve` or `reject` was called on a deferred that already settled.
    #[error("deferred is already {status}")]
    InvalidState { status: Status },
}

/// Why an [`Awaitable`](crate::Awaitable) finished without a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AwaitError<E> {
    /// The deferred was rejected. Holds the rejection as it was given.
    #[error("deferred was rejected")]
    Rejected(E),
    /// Every handle to the deferred was dropped while it was still pending.
    #[error("deferred was dropped before it settled")]
    Dropped,
}

impl<E> AwaitError<E> {
    pub fn rejection(self) -> Option<E> {
        match self {
            AwaitError::Rejected(err) => Some(err),
            AwaitError::Dropped => None,
        }
    }
}

#[cfg(test)]
mod tests {
use super::{AwaitError, Error};
use crate::Status;

#[test]
fn test_invalid_state_message() {
    let err = Error::InvalidState { status: Status::Resolved };
    assert_eq!(err.to_string(), "deferred is already resolved");
}

#[test]
fn test_rejection_payload() {
    assert_eq!(AwaitError::Rejected("💥").rejection(), Some("💥"));
    assert_eq!(AwaitError::<&str>::Dropped.rejection(), None);
}
}
