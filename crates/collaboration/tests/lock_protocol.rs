use async_trait::async_trait;
use collaboration::*;
use document::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn setup() -> (Arc<InMemoryStore>, DocumentId) {
    let store = Arc::new(InMemoryStore::new());
    let id = store.insert_document(Document::new("Field guide").with_id("doc-7"));
    store.add_version(&id, VersionType::Original, "<p>one</p><p>two</p>");
    (store, id)
}

fn worker(store: &Arc<InMemoryStore>, id: &str, name: &str) -> Arc<dyn TranslationBackend> {
    Arc::new(InMemoryBackend::new(store.clone(), UserRef::new(id, name)))
}

/// Records when each lock attempt reaches the backend.
struct Timed {
    inner: InMemoryBackend,
    attempts: Mutex<Vec<Instant>>,
}

#[async_trait]
impl TranslationBackend for Timed {
    fn user(&self) -> &UserRef {
        self.inner.user()
    }

    async fn document(&self, id: &DocumentId) -> BackendResult<Document> {
        self.inner.document(id).await
    }

    async fn versions(&self, id: &DocumentId) -> BackendResult<Vec<DocumentVersion>> {
        self.inner.versions(id).await
    }

    async fn create_version(
        &self,
        id: &DocumentId,
        request: &CreateVersionRequest,
    ) -> BackendResult<DocumentVersion> {
        self.inner.create_version(id, request).await
    }

    async fn acquire_lock(&self, id: &DocumentId) -> BackendResult<LockLease> {
        self.attempts.lock().push(Instant::now());
        self.inner.acquire_lock(id).await
    }

    async fn lock_status(&self, id: &DocumentId) -> BackendResult<LockStatus> {
        self.inner.lock_status(id).await
    }

    async fn save(&self, id: &DocumentId, request: &SaveRequest) -> BackendResult<Ack> {
        self.inner.save(id, request).await
    }

    async fn handover(&self, id: &DocumentId, request: &HandoverRequest) -> BackendResult<Ack> {
        self.inner.handover(id, request).await
    }

    async fn complete(&self, id: &DocumentId, request: &SaveRequest) -> BackendResult<Ack> {
        self.inner.complete(id, request).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_transient_failures_then_success() {
    let (store, id) = setup();
    store.fail_times(
        Operation::Acquire,
        2,
        BackendError::LockContention("lock busy".into()),
    );
    let timed = Arc::new(Timed {
        inner: InMemoryBackend::new(store.clone(), UserRef::new("x", "Xavier")),
        attempts: Mutex::new(Vec::new()),
    });
    let manager = LockManager::new(timed.clone(), RetryPolicy::default());

    let lease = manager.acquire(&id).await.unwrap();
    assert!(lease.can_edit);
    assert_eq!(store.calls(Operation::Acquire), 3);

    let attempts = timed.attempts.lock().clone();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[1] - attempts[0], Duration::from_millis(1000));
    assert_eq!(attempts[2] - attempts[1], Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let (store, id) = setup();
    store.fail_times(
        Operation::Acquire,
        5,
        BackendError::Unavailable("maintenance".into()),
    );
    let manager = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());

    let err = manager.acquire(&id).await.unwrap_err();
    assert!(matches!(err, LockError::RetriesExhausted { attempts: 3, .. }));
    assert!(err.user_message().contains("try again later"));
    assert_eq!(store.calls(Operation::Acquire), 3);
}

#[tokio::test]
async fn test_conflict_is_not_retried() {
    let (store, id) = setup();
    LockManager::new(worker(&store, "y", "Yuki"), RetryPolicy::default())
        .acquire(&id)
        .await
        .unwrap();
    store.reset_calls();

    let manager = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());
    let err = WorkSession::open(&manager, &id, "").await.err().unwrap();
    match &err {
        LockError::HeldByOther { holder, .. } => assert_eq!(holder.name, "Yuki"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.user_message().contains("Yuki"));
    assert_eq!(store.calls(Operation::Acquire), 1);

    let status = manager.status(&id).await.unwrap();
    let lease = status.lease.unwrap();
    assert!(!lease.can_edit);
    assert_eq!(lease.holder.name, "Yuki");
}

#[tokio::test]
async fn test_missing_document_fails_without_retry() {
    let (store, _) = setup();
    let manager = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());
    let err = manager.acquire(&DocumentId::from("missing")).await.unwrap_err();
    assert!(matches!(err, LockError::Backend(BackendError::NotFound(_))));
    assert_eq!(store.calls(Operation::Acquire), 1);
}

#[tokio::test]
async fn test_failed_save_aborts_handover() {
    let (store, id) = setup();
    let manager = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());
    let session = WorkSession::open(&manager, &id, "<p>one</p>").await.unwrap();
    let completed = CompletedParagraphs::from_indices([0], 2);

    store.fail_next(Operation::Save, BackendError::Unavailable("db down".into()));
    let result = session
        .handover("<p>uno</p>", &completed, "first paragraph done", None)
        .await;
    assert!(result.is_err());
    assert_eq!(store.calls(Operation::Handover), 0);
    assert!(store.document(&id).unwrap().latest_handover.is_none());
    assert!(session.is_active());

    let lease = manager.status(&id).await.unwrap().lease.unwrap();
    assert!(lease.can_edit);
    assert_eq!(lease.holder.id, "x");

    // Retrying once the backend is back completes the protocol
    session
        .handover("<p>uno</p>", &completed, "first paragraph done", Some("uno = one".into()))
        .await
        .unwrap();
    assert_eq!(session.ended(), Some(SessionEnd::HandedOver));
    assert!(store.lease(&id).is_none());
    let record = store.document(&id).unwrap().latest_handover.unwrap();
    assert_eq!(record.terms.as_deref(), Some("uno = one"));
    assert!(record.completed_paragraphs.contains(0));
    assert!(matches!(
        session.save("<p>late</p>", &completed).await,
        Err(LockError::NotHeld(_))
    ));
}

#[tokio::test]
async fn test_handover_requires_memo() {
    let (store, id) = setup();
    let manager = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());
    let session = WorkSession::open(&manager, &id, "").await.unwrap();
    let err = session
        .handover("<p>x</p>", &CompletedParagraphs::new(), "   ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::InvalidHandover(DocumentError::EmptyMemo)));
    assert_eq!(store.calls(Operation::Save), 0);
    assert!(session.is_active());
}

#[tokio::test]
async fn test_next_worker_receives_handover_context() {
    let (store, id) = setup();
    let x = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());
    let session = WorkSession::open(&x, &id, "").await.unwrap();
    let completed = CompletedParagraphs::from_indices([1], 2);
    session
        .handover("<p>one</p><p>dos</p>", &completed, "second done", None)
        .await
        .unwrap();

    let y = LockManager::new(worker(&store, "y", "Yuki"), RetryPolicy::default());
    let next = WorkSession::open(&y, &id, "").await.unwrap();
    assert!(next.seeded_progress().contains(1));
    let document = y.backend().document(&id).await.unwrap();
    assert_eq!(document.latest_handover.unwrap().handed_over_by.name, "Xavier");
    let versions = y.backend().versions(&id).await.unwrap();
    assert_eq!(
        select_editable_version(&versions).unwrap().content,
        "<p>one</p><p>dos</p>"
    );
}

#[tokio::test]
async fn test_completion_releases_and_sends_to_review() {
    let (store, id) = setup();
    let manager = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());
    let session = WorkSession::open(&manager, &id, "").await.unwrap();
    session
        .complete("<p>uno</p><p>dos</p>", &CompletedParagraphs::from_indices([0, 1], 2))
        .await
        .unwrap();
    assert_eq!(session.ended(), Some(SessionEnd::Completed));
    assert!(store.lease(&id).is_none());
    assert_eq!(store.document(&id).unwrap().status, DocumentStatus::PendingReview);
}

#[tokio::test]
async fn test_leaving_keeps_the_lease() {
    let (store, id) = setup();
    let manager = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());
    let session = WorkSession::open(&manager, &id, "<p>one</p>").await.unwrap();
    let none = CompletedParagraphs::new();
    store.reset_calls();

    assert_eq!(session.leave("<p>one</p>", &none), None);
    let warning = session.leave("<p>uno</p>", &none).unwrap();
    assert_eq!(warning.document_id, id);
    assert!(warning.message.contains("unsaved"));

    assert_eq!(store.calls(Operation::Handover), 0);
    assert_eq!(store.calls(Operation::Complete), 0);
    assert!(store.lease(&id).unwrap().is_held_by(&UserRef::new("x", "Xavier")));

    session.save("<p>uno</p>", &none).await.unwrap();
    assert_eq!(session.leave("<p>uno</p>", &none), None);
}

#[tokio::test]
async fn test_unsaved_completion_marks_warn_on_leave() {
    let (store, id) = setup();
    let manager = LockManager::new(worker(&store, "x", "Xavier"), RetryPolicy::default());
    let session = WorkSession::open(&manager, &id, "<p>one</p>").await.unwrap();
    let marked = CompletedParagraphs::from_indices([1], 2);

    assert!(session.has_unsaved("<p>one</p>", &marked));
    assert!(session.leave("<p>one</p>", &marked).is_some());

    session.save("<p>one</p>", &marked).await.unwrap();
    assert!(!session.has_unsaved("<p>one</p>", &marked));
    assert_eq!(session.leave("<p>one</p>", &marked), None);
    // Unmarking after the save is unsaved again
    assert!(session.leave("<p>one</p>", &CompletedParagraphs::new()).is_some());
}
