/// Cooperative locking for translation work.
///
/// One worker at a time holds an exclusive, non-expiring lease on a
/// document. This crate talks to the translation backend, acquires the lease
/// with bounded retries, runs the handover and completion protocols that
/// release it, and autosaves in-progress work while it is held.
use document::{DocumentError, DocumentId, LockLease, UserRef};
use thiserror::Error;

mod backend;
pub use backend::*;

mod http;
pub use http::*;

mod memory;
pub use memory::*;

mod lock;
pub use lock::*;

mod session;
pub use session::*;

mod autosave;
pub use autosave::*;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("document is locked by {holder}")]
    HeldByOther {
        holder: UserRef,
        lease: Option<LockLease>,
    },

    #[error("lock not acquired after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: BackendError },

    #[error("session for {0} no longer holds the lease")]
    NotHeld(DocumentId),

    #[error("invalid handover: {0}")]
    InvalidHandover(#[from] DocumentError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LockError {
    /// Text shown to the user when the action that triggered this failed.
    pub fn user_message(&self) -> String {
        match self {
            Self::HeldByOther { holder, .. } => format!(
                "{} is currently working on this document. It can be opened read-only until they hand it over.",
                holder.name
            ),
            Self::RetriesExhausted { .. } => {
                "The document could not be locked right now. Please try again later.".to_string()
            }
            Self::NotHeld(_) => {
                "You no longer hold the lock on this document. Reopen it to continue.".to_string()
            }
            Self::InvalidHandover(err) => format!("Handover was not sent: {}.", err),
            Self::Backend(err) => err.user_message(),
        }
    }

    /// Whether retrying the same action later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RetriesExhausted { .. } => true,
            Self::Backend(err) => err.is_transient() || matches!(err, BackendError::Transport(_)),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_holder() {
        let err = LockError::HeldByOther {
            holder: UserRef::new("y", "Yuki"),
            lease: None,
        };
        assert!(err.user_message().contains("Yuki"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_exhausted_retries_ask_to_try_later() {
        let err = LockError::RetriesExhausted {
            attempts: 3,
            last: BackendError::LockContention("busy".into()),
        };
        assert!(err.user_message().contains("try again later"));
        assert!(err.is_retryable());
    }
}
