/// Translation backend abstraction
///
/// The REST surface the workbench consumes, independent of transport. The
/// calling worker's identity is part of the backend instance.
use async_trait::async_trait;
use document::{
    Ack, CreateVersionRequest, Document, DocumentId, DocumentVersion, HandoverRequest, LockLease,
    LockStatus, SaveRequest, UserRef,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Another worker holds the lease.
    #[error("document is locked by {holder}")]
    Conflict { holder: UserRef },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The lock could not be taken right now; worth retrying.
    #[error("lock contention: {0}")]
    LockContention(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Failures the lock manager retries with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::LockContention(_))
    }

    /// HTTP status the reference server answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Conflict { .. } => 409,
            Self::LockContention(_) => 423,
            Self::Unavailable(_) => 503,
            Self::NotFound(_) => 404,
            Self::Rejected { status, .. } => *status,
            Self::Transport(_) | Self::Decode(_) => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Conflict { holder } => {
                format!("{} is currently working on this document.", holder.name)
            }
            Self::Unavailable(_) | Self::LockContention(_) => {
                "The server is busy. Please try again later.".to_string()
            }
            Self::NotFound(what) => format!("{} could not be found.", what),
            Self::Rejected { message, .. } => format!("The server rejected the request: {}", message),
            Self::Transport(_) | Self::Decode(_) => {
                "The server could not be reached. Your changes are still here; please retry."
                    .to_string()
            }
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Worker on whose behalf calls are made
    fn user(&self) -> &UserRef;

    /// `GET /documents/{id}`
    async fn document(&self, id: &DocumentId) -> BackendResult<Document>;

    /// `GET /documents/{id}/versions`
    async fn versions(&self, id: &DocumentId) -> BackendResult<Vec<DocumentVersion>>;

    /// `POST /documents/{id}/versions`
    async fn create_version(
        &self,
        id: &DocumentId,
        request: &CreateVersionRequest,
    ) -> BackendResult<DocumentVersion>;

    /// `POST /translation-work/{id}/lock`
    async fn acquire_lock(&self, id: &DocumentId) -> BackendResult<LockLease>;

    /// `GET /translation-work/{id}/lock/status`
    async fn lock_status(&self, id: &DocumentId) -> BackendResult<LockStatus>;

    /// `POST /translation-work/{id}/save`
    async fn save(&self, id: &DocumentId, request: &SaveRequest) -> BackendResult<Ack>;

    /// `POST /translation-work/{id}/handover`; releases the lease.
    async fn handover(&self, id: &DocumentId, request: &HandoverRequest) -> BackendResult<Ack>;

    /// `POST /translation-work/{id}/complete`; releases the lease.
    async fn complete(&self, id: &DocumentId, request: &SaveRequest) -> BackendResult<Ack>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_contention_and_unavailability_are_transient() {
        assert!(BackendError::Unavailable("down".into()).is_transient());
        assert!(BackendError::LockContention("busy".into()).is_transient());
        assert!(!BackendError::Conflict {
            holder: UserRef::new("y", "Y")
        }
        .is_transient());
        assert!(!BackendError::NotFound("doc".into()).is_transient());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BackendError::LockContention(String::new()).status_code(), 423);
        assert_eq!(
            BackendError::Rejected {
                status: 400,
                message: "bad".into()
            }
            .status_code(),
            400
        );
    }
}
