/// Edit session over a held lease
///
/// Save, handover and completion run one at a time. Handover and completion
/// end the session; leaving it any other way keeps the lease held.
use async_trait::async_trait;
use document::{
    Ack, CompletedParagraphs, DocumentId, HandoverRequest, LockLease, SaveRequest,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{LockError, LockManager, Result, TranslationBackend};

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEnd {
    HandedOver,
    Completed,
}

/// Shown when leaving a session with content or completion marks that were
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitWarning {
    pub document_id: DocumentId,
    pub message: String,
}

struct SessionState {
    ended: Option<SessionEnd>,
    last_persisted: String,
    persisted_completed: CompletedParagraphs,
}

pub struct WorkSession {
    backend: Arc<dyn TranslationBackend>,
    lease: LockLease,
    state: Mutex<SessionState>,
    /// Held across each backend call so calls for the document never overlap
    io: tokio::sync::Mutex<()>,
}

impl WorkSession {
    /// `baseline` is the content as loaded, used to detect unsaved work.
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        lease: LockLease,
        baseline: impl Into<String>,
    ) -> Result<Self> {
        if !lease.can_edit {
            return Err(LockError::HeldByOther {
                holder: lease.holder.clone(),
                lease: Some(lease),
            });
        }
        let state = SessionState {
            ended: None,
            last_persisted: baseline.into(),
            persisted_completed: lease.completed_paragraphs.clone(),
        };
        Ok(Self {
            backend,
            lease,
            state: Mutex::new(state),
            io: tokio::sync::Mutex::new(()),
        })
    }

    /// Acquires the lease through `manager` and opens a session on it.
    pub async fn open(
        manager: &LockManager,
        id: &DocumentId,
        baseline: impl Into<String>,
    ) -> Result<Self> {
        let lease = manager.acquire(id).await?;
        Self::new(manager.backend().clone(), lease, baseline)
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.lease.document_id
    }

    pub fn lease(&self) -> &LockLease {
        &self.lease
    }

    /// Completion state left by the previous holder.
    pub fn seeded_progress(&self) -> &CompletedParagraphs {
        &self.lease.completed_paragraphs
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().ended.is_none()
    }

    pub fn ended(&self) -> Option<SessionEnd> {
        self.state.lock().ended
    }

    pub fn has_unsaved(&self, content: &str, completed: &CompletedParagraphs) -> bool {
        let state = self.state.lock();
        state.last_persisted != content || &state.persisted_completed != completed
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(LockError::NotHeld(self.document_id().clone()))
        }
    }

    pub async fn save(&self, content: &str, completed: &CompletedParagraphs) -> Result<Ack> {
        self.ensure_active()?;
        let _io = self.io.lock().await;
        self.save_locked(content, completed).await
    }

    async fn save_locked(&self, content: &str, completed: &CompletedParagraphs) -> Result<Ack> {
        // Re-checked under the gate: a handover may have finished meanwhile
        self.ensure_active()?;
        let request = SaveRequest::new(content, completed);
        let ack = self.backend.save(self.document_id(), &request).await?;
        {
            let mut state = self.state.lock();
            state.last_persisted = content.to_string();
            state.persisted_completed = completed.clone();
        }
        info!(document = %self.document_id(), completed = completed.len(), "saved");
        Ok(ack)
    }

    /// Saves, then submits the handover which releases the lease. A failed
    /// save aborts before anything is sent and the lease stays held.
    pub async fn handover(
        &self,
        content: &str,
        completed: &CompletedParagraphs,
        memo: &str,
        terms: Option<String>,
    ) -> Result<Ack> {
        let request = HandoverRequest::new(memo, terms)?;
        self.ensure_active()?;
        let _io = self.io.lock().await;
        if let Err(err) = self.save_locked(content, completed).await {
            warn!(document = %self.document_id(), "handover aborted, save failed: {}", err);
            return Err(err);
        }
        let ack = self.backend.handover(self.document_id(), &request).await?;
        self.state.lock().ended = Some(SessionEnd::HandedOver);
        info!(document = %self.document_id(), "handed over");
        Ok(ack)
    }

    /// Persists the final content and sends the document to review.
    pub async fn complete(&self, content: &str, completed: &CompletedParagraphs) -> Result<Ack> {
        self.ensure_active()?;
        let _io = self.io.lock().await;
        self.ensure_active()?;
        let request = SaveRequest::new(content, completed);
        let ack = self.backend.complete(self.document_id(), &request).await?;
        {
            let mut state = self.state.lock();
            state.last_persisted = content.to_string();
            state.persisted_completed = completed.clone();
            state.ended = Some(SessionEnd::Completed);
        }
        info!(document = %self.document_id(), "translation completed");
        Ok(ack)
    }

    /// Leaving without handover or completion. No release is sent: the
    /// document stays locked to this worker.
    pub fn leave(&self, content: &str, completed: &CompletedParagraphs) -> Option<ExitWarning> {
        if !self.is_active() || !self.has_unsaved(content, completed) {
            return None;
        }
        warn!(document = %self.document_id(), "leaving with unsaved changes");
        Some(ExitWarning {
            document_id: self.document_id().clone(),
            message: "You have unsaved changes. The document stays locked to you until you hand it over or complete it.".to_string(),
        })
    }
}

/// Destination of autosaved snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn persist(&self, request: &SaveRequest) -> Result<Ack>;
}

#[async_trait]
impl SnapshotSink for WorkSession {
    async fn persist(&self, request: &SaveRequest) -> Result<Ack> {
        let completed: CompletedParagraphs = request.completed_paragraphs.iter().copied().collect();
        self.save(&request.content, &completed).await
    }
}
