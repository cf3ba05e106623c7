/// Translation document data model.
///
/// Documents, their immutable versions, edit leases and handover records as
/// exchanged with the translation backend. Paragraphs are not stored here;
/// they are derived from version content at load time.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod version;
pub use version::*;

mod progress;
pub use progress::*;

mod lease;
pub use lease::*;

mod payloads;
pub use payloads::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("handover memo must not be empty")]
    EmptyMemo,

    #[error("no usable version found for document {0}")]
    VersionNotFound(DocumentId),

    #[error("document {0} has no content")]
    EmptyDocument(DocumentId),

    #[error("paragraph {index} out of range (document has {total})")]
    ParagraphOutOfRange { index: usize, total: usize },

    #[error("cannot move document from {from:?} to {to:?}")]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Backend document identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Version identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub String);

impl VersionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A worker as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
}

impl UserRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Document lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    PendingTranslation,
    InTranslation,
    PendingReview,
    Approved,
    Published,
}

impl DocumentStatus {
    /// Forward step in the pipeline.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Draft => Some(Self::PendingTranslation),
            Self::PendingTranslation => Some(Self::InTranslation),
            Self::InTranslation => Some(Self::PendingReview),
            Self::PendingReview => Some(Self::Approved),
            Self::Approved => Some(Self::Published),
            Self::Published => None,
        }
    }

    pub fn is_editable(self) -> bool {
        matches!(self, Self::PendingTranslation | Self::InTranslation)
    }

    /// Status after a completion call: translation work goes to review.
    pub fn complete_translation(self) -> Result<Self> {
        match self {
            Self::PendingTranslation | Self::InTranslation => Ok(Self::PendingReview),
            from => Err(DocumentError::InvalidTransition {
                from,
                to: Self::PendingReview,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub latest_handover: Option<HandoverRecord>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            title: title.into(),
            status: DocumentStatus::PendingTranslation,
            latest_handover: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = id.into();
        self
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
