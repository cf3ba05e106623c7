use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CompletedParagraphs, DocumentId, UserRef};

/// Exclusive edit lease. Not time boxed: it lasts until handover or
/// completion releases it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockLease {
    pub document_id: DocumentId,
    pub holder: UserRef,
    pub acquired_at: DateTime<Utc>,
    pub can_edit: bool,
    #[serde(default)]
    pub completed_paragraphs: CompletedParagraphs,
}

impl LockLease {
    pub fn new(document_id: DocumentId, holder: UserRef) -> Self {
        Self {
            document_id,
            holder,
            acquired_at: Utc::now(),
            can_edit: true,
            completed_paragraphs: CompletedParagraphs::new(),
        }
    }

    /// The same lease as seen by someone other than the holder.
    pub fn observed_by(&self, user: &UserRef) -> Self {
        let mut lease = self.clone();
        lease.can_edit = lease.holder.id == user.id;
        lease
    }

    pub fn is_held_by(&self, user: &UserRef) -> bool {
        self.holder.id == user.id
    }
}

/// Context left for the next worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoverRecord {
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
    #[serde(default)]
    pub completed_paragraphs: CompletedParagraphs,
    pub handed_over_by: UserRef,
    pub handed_over_at: DateTime<Utc>,
}

/// Lock state reported by the status endpoint when nobody holds the lease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub document_id: DocumentId,
    pub locked: bool,
    #[serde(default)]
    pub lease: Option<LockLease>,
}

impl LockStatus {
    pub fn unlocked(document_id: DocumentId) -> Self {
        Self {
            document_id,
            locked: false,
            lease: None,
        }
    }

    pub fn held(lease: LockLease) -> Self {
        Self {
            document_id: lease.document_id.clone(),
            locked: true,
            lease: Some(lease),
        }
    }

    pub fn holder(&self) -> Option<&UserRef> {
        self.lease.as_ref().map(|l| &l.holder)
    }
}
