/// In-memory translation backend
///
/// Backs the reference server and the tests. Every operation counts its
/// calls and can be told to fail, so retry and ordering behavior can be
/// observed from outside.
use async_trait::async_trait;
use chrono::Utc;
use document::{
    Ack, CompletedParagraphs, CreateVersionRequest, Document, DocumentId, DocumentStatus,
    DocumentVersion, HandoverRecord, HandoverRequest, LockLease, LockStatus, SaveRequest, UserRef,
    VersionType,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{BackendError, BackendResult, TranslationBackend};

/// Backend operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Document,
    Versions,
    CreateVersion,
    Acquire,
    Status,
    Save,
    Handover,
    Complete,
}

#[derive(Default)]
struct StoreState {
    documents: HashMap<DocumentId, Document>,
    versions: HashMap<DocumentId, Vec<DocumentVersion>>,
    locks: HashMap<DocumentId, LockLease>,
    /// Last completed set reported for each document
    progress: HashMap<DocumentId, CompletedParagraphs>,
    failures: HashMap<Operation, VecDeque<BackendError>>,
    calls: HashMap<Operation, usize>,
}

impl StoreState {
    /// Counts the call and pops an injected failure, if any.
    fn enter(&mut self, operation: Operation) -> BackendResult<()> {
        *self.calls.entry(operation).or_insert(0) += 1;
        match self.failures.get_mut(&operation).and_then(|q| q.pop_front()) {
            Some(err) => {
                debug!(?operation, %err, "injected failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn document_mut(&mut self, id: &DocumentId) -> BackendResult<&mut Document> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(format!("document {}", id)))
    }

    /// The caller must hold the lease.
    fn check_holder(&self, id: &DocumentId, user: &UserRef) -> BackendResult<()> {
        match self.locks.get(id) {
            Some(lease) if lease.is_held_by(user) => Ok(()),
            Some(lease) => Err(BackendError::Conflict {
                holder: lease.holder.clone(),
            }),
            None => Err(BackendError::Rejected {
                status: 403,
                message: format!("lock on {} is not held", id),
            }),
        }
    }

    fn push_version(
        &mut self,
        id: &DocumentId,
        version_type: VersionType,
        content: String,
    ) -> DocumentVersion {
        let versions = self.versions.entry(id.clone()).or_default();
        let number = versions.iter().map(|v| v.version_number).max().unwrap_or(0) + 1;
        let version = DocumentVersion::new(id.clone(), number, version_type, content);
        versions.push(version.clone());
        version
    }

    fn record_work(&mut self, id: &DocumentId, request: &SaveRequest) -> BackendResult<DocumentVersion> {
        let version = self.push_version(id, VersionType::ManualTranslation, request.content.clone());
        let completed: CompletedParagraphs = request.completed_paragraphs.iter().copied().collect();
        if let Some(lease) = self.locks.get_mut(id) {
            lease.completed_paragraphs = completed.clone();
        }
        self.progress.insert(id.clone(), completed);
        self.document_mut(id)?.updated_at = Utc::now();
        Ok(version)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, document: Document) -> DocumentId {
        let id = document.id.clone();
        let mut state = self.state.lock();
        state.versions.entry(id.clone()).or_default();
        state.documents.insert(id.clone(), document);
        id
    }

    /// Adds a version with the next version number.
    pub fn add_version(
        &self,
        id: &DocumentId,
        version_type: VersionType,
        content: impl Into<String>,
    ) -> DocumentVersion {
        self.state.lock().push_version(id, version_type, content.into())
    }

    /// Makes the next `times` calls of `operation` fail with `error`.
    pub fn fail_times(&self, operation: Operation, times: usize, error: BackendError) {
        let mut state = self.state.lock();
        let queue = state.failures.entry(operation).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    pub fn fail_next(&self, operation: Operation, error: BackendError) {
        self.fail_times(operation, 1, error);
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.state.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn lease(&self, id: &DocumentId) -> Option<LockLease> {
        self.state.lock().locks.get(id).cloned()
    }

    pub fn document_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self.state.lock().documents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn document(&self, id: &DocumentId) -> BackendResult<Document> {
        let mut state = self.state.lock();
        state.enter(Operation::Document)?;
        state.document_mut(id).map(|d| d.clone())
    }

    pub fn versions(&self, id: &DocumentId) -> BackendResult<Vec<DocumentVersion>> {
        let mut state = self.state.lock();
        state.enter(Operation::Versions)?;
        state
            .versions
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("document {}", id)))
    }

    pub fn create_version(
        &self,
        id: &DocumentId,
        request: &CreateVersionRequest,
    ) -> BackendResult<DocumentVersion> {
        let mut state = self.state.lock();
        state.enter(Operation::CreateVersion)?;
        state.document_mut(id)?;
        Ok(state.push_version(id, request.version_type, request.content.clone()))
    }

    /// Grants the lease, or returns the current one when `user` already
    /// holds it. Progress left by the previous worker seeds the lease.
    pub fn acquire_lock(&self, id: &DocumentId, user: &UserRef) -> BackendResult<LockLease> {
        let mut state = self.state.lock();
        state.enter(Operation::Acquire)?;
        let document = state.document_mut(id)?;
        if !document.status.is_editable() {
            return Err(BackendError::Rejected {
                status: 409,
                message: format!("document {} is {:?}", id, document.status),
            });
        }
        if let Some(lease) = state.locks.get(id) {
            if lease.is_held_by(user) {
                return Ok(lease.clone());
            }
            return Err(BackendError::Conflict {
                holder: lease.holder.clone(),
            });
        }
        state.document_mut(id)?.status = DocumentStatus::InTranslation;
        let mut lease = LockLease::new(id.clone(), user.clone());
        lease.completed_paragraphs = state.progress.get(id).cloned().unwrap_or_default();
        state.locks.insert(id.clone(), lease.clone());
        info!(document = %id, holder = %user, "lease granted");
        Ok(lease)
    }

    pub fn lock_status(&self, id: &DocumentId, user: &UserRef) -> BackendResult<LockStatus> {
        let mut state = self.state.lock();
        state.enter(Operation::Status)?;
        state.document_mut(id)?;
        Ok(match state.locks.get(id) {
            Some(lease) => LockStatus::held(lease.observed_by(user)),
            None => LockStatus::unlocked(id.clone()),
        })
    }

    /// Stores the content as a new manual translation version.
    pub fn save(&self, id: &DocumentId, user: &UserRef, request: &SaveRequest) -> BackendResult<Ack> {
        let mut state = self.state.lock();
        state.enter(Operation::Save)?;
        state.document_mut(id)?;
        state.check_holder(id, user)?;
        let version = state.record_work(id, request)?;
        debug!(document = %id, version = version.version_number, "saved");
        Ok(Ack::with_message(format!("version {}", version.version_number)))
    }

    pub fn handover(
        &self,
        id: &DocumentId,
        user: &UserRef,
        request: &HandoverRequest,
    ) -> BackendResult<Ack> {
        let mut state = self.state.lock();
        state.enter(Operation::Handover)?;
        state.document_mut(id)?;
        request.validate().map_err(|e| BackendError::Rejected {
            status: 400,
            message: e.to_string(),
        })?;
        state.check_holder(id, user)?;
        let record = HandoverRecord {
            memo: request.memo.clone(),
            terms: request.terms.clone(),
            completed_paragraphs: state.progress.get(id).cloned().unwrap_or_default(),
            handed_over_by: user.clone(),
            handed_over_at: Utc::now(),
        };
        state.locks.remove(id);
        let document = state.document_mut(id)?;
        document.latest_handover = Some(record);
        document.updated_at = Utc::now();
        info!(document = %id, by = %user, "handed over");
        Ok(Ack::ok())
    }

    /// Saves, moves the document to review and releases the lease.
    pub fn complete(&self, id: &DocumentId, user: &UserRef, request: &SaveRequest) -> BackendResult<Ack> {
        let mut state = self.state.lock();
        state.enter(Operation::Complete)?;
        let status = state.document_mut(id)?.status;
        state.check_holder(id, user)?;
        let next = status.complete_translation().map_err(|e| BackendError::Rejected {
            status: 409,
            message: e.to_string(),
        })?;
        state.record_work(id, request)?;
        state.locks.remove(id);
        state.document_mut(id)?.status = next;
        info!(document = %id, by = %user, "translation completed");
        Ok(Ack::ok())
    }
}

/// One worker's view of an [`InMemoryStore`].
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<InMemoryStore>,
    user: UserRef,
}

impl InMemoryBackend {
    pub fn new(store: Arc<InMemoryStore>, user: UserRef) -> Self {
        Self { store, user }
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }
}

#[async_trait]
impl TranslationBackend for InMemoryBackend {
    fn user(&self) -> &UserRef {
        &self.user
    }

    async fn document(&self, id: &DocumentId) -> BackendResult<Document> {
        self.store.document(id)
    }

    async fn versions(&self, id: &DocumentId) -> BackendResult<Vec<DocumentVersion>> {
        self.store.versions(id)
    }

    async fn create_version(
        &self,
        id: &DocumentId,
        request: &CreateVersionRequest,
    ) -> BackendResult<DocumentVersion> {
        self.store.create_version(id, request)
    }

    async fn acquire_lock(&self, id: &DocumentId) -> BackendResult<LockLease> {
        self.store.acquire_lock(id, &self.user)
    }

    async fn lock_status(&self, id: &DocumentId) -> BackendResult<LockStatus> {
        self.store.lock_status(id, &self.user)
    }

    async fn save(&self, id: &DocumentId, request: &SaveRequest) -> BackendResult<Ack> {
        self.store.save(id, &self.user, request)
    }

    async fn handover(&self, id: &DocumentId, request: &HandoverRequest) -> BackendResult<Ack> {
        self.store.handover(id, &self.user, request)
    }

    async fn complete(&self, id: &DocumentId, request: &SaveRequest) -> BackendResult<Ack> {
        self.store.complete(id, &self.user, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_document() -> (InMemoryStore, DocumentId) {
        let store = InMemoryStore::new();
        let id = store.insert_document(Document::new("Guide").with_id("doc-1"));
        store.add_version(&id, VersionType::Original, "<p>a</p>");
        (store, id)
    }

    #[test]
    fn test_second_worker_sees_conflict() {
        let (store, id) = store_with_document();
        let x = UserRef::new("x", "Xavier");
        let y = UserRef::new("y", "Yuki");
        store.acquire_lock(&id, &y).unwrap();
        assert_eq!(
            store.acquire_lock(&id, &x),
            Err(BackendError::Conflict { holder: y.clone() })
        );
        // The holder reacquiring gets its lease back
        assert!(store.acquire_lock(&id, &y).unwrap().can_edit);

        let seen_by_x = store.lock_status(&id, &x).unwrap().lease.unwrap();
        assert!(!seen_by_x.can_edit);
        assert_eq!(seen_by_x.holder, y);
    }

    #[test]
    fn test_handover_releases_and_seeds_next_lease() {
        let (store, id) = store_with_document();
        let x = UserRef::new("x", "Xavier");
        let y = UserRef::new("y", "Yuki");
        store.acquire_lock(&id, &x).unwrap();
        store
            .save(&id, &x, &SaveRequest {
                content: "<p>b</p>".into(),
                completed_paragraphs: vec![0],
            })
            .unwrap();
        let request = HandoverRequest::new("first half done", None).unwrap();
        store.handover(&id, &x, &request).unwrap();
        assert!(store.lease(&id).is_none());

        let document = store.document(&id).unwrap();
        let record = document.latest_handover.unwrap();
        assert_eq!(record.memo, "first half done");
        assert!(record.completed_paragraphs.contains(0));

        let lease = store.acquire_lock(&id, &y).unwrap();
        assert!(lease.completed_paragraphs.contains(0));
    }

    #[test]
    fn test_save_requires_lease() {
        let (store, id) = store_with_document();
        let x = UserRef::new("x", "Xavier");
        let request = SaveRequest {
            content: "<p>b</p>".into(),
            completed_paragraphs: vec![],
        };
        assert!(matches!(
            store.save(&id, &x, &request),
            Err(BackendError::Rejected { status: 403, .. })
        ));
    }

    #[test]
    fn test_complete_moves_to_review() {
        let (store, id) = store_with_document();
        let x = UserRef::new("x", "Xavier");
        store.acquire_lock(&id, &x).unwrap();
        let request = SaveRequest {
            content: "<p>done</p>".into(),
            completed_paragraphs: vec![0],
        };
        store.complete(&id, &x, &request).unwrap();
        assert_eq!(store.document(&id).unwrap().status, DocumentStatus::PendingReview);
        assert!(store.lease(&id).is_none());
        let versions = store.versions(&id).unwrap();
        assert_eq!(versions.last().unwrap().version_type, VersionType::ManualTranslation);
        // Review documents cannot be locked again for translation
        assert!(store.acquire_lock(&id, &x).is_err());
    }

    #[test]
    fn test_injected_failures_are_consumed_in_order() {
        let (store, id) = store_with_document();
        let x = UserRef::new("x", "Xavier");
        store.fail_times(Operation::Acquire, 2, BackendError::Unavailable("down".into()));
        assert!(store.acquire_lock(&id, &x).is_err());
        assert!(store.acquire_lock(&id, &x).is_err());
        assert!(store.acquire_lock(&id, &x).is_ok());
        assert_eq!(store.calls(Operation::Acquire), 3);
    }

    #[test]
    fn test_backend_acts_as_its_user() {
        let (store, id) = store_with_document();
        let store = Arc::new(store);
        let x = InMemoryBackend::new(store.clone(), UserRef::new("x", "Xavier"));
        let y = InMemoryBackend::new(store.clone(), UserRef::new("y", "Yuki"));

        let lease = tokio_test::block_on(x.acquire_lock(&id)).unwrap();
        assert_eq!(lease.holder.name, "Xavier");
        let status = tokio_test::block_on(y.lock_status(&id)).unwrap();
        assert!(status.locked);
        assert!(!status.lease.unwrap().can_edit);
        assert!(matches!(
            tokio_test::block_on(y.acquire_lock(&id)),
            Err(BackendError::Conflict { .. })
        ));
    }
}
