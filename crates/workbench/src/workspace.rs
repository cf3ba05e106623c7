use collaboration::{
    AutosaveScheduler, AutosaveStatus, ExitWarning, LockError, LockManager, SessionEnd,
    TranslationBackend, WorkSession,
};
use document::{
    CompletedParagraphs, Document, DocumentId, HandoverRecord, SaveRequest, UserRef, VersionSet,
};
use editor::EditModeController;
use markup::{export_document, ExportOptions, ExportedDocument};
use panes::{
    LayoutMetrics, MarkupPane, Pane, PaneError, PaneId, PaneSyncController, ScrollOutcome,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{Result, WorkbenchConfig, WorkbenchError};

/// Whether this worker got the lease.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Editing,
    /// Someone else holds the lease. Panes are viewable, nothing is editable.
    ReadOnly { holder: UserRef, message: String },
}

/// One open document: two or three synchronized panes, the editor on the
/// translation pane and, when editing, the lease-backed session.
pub struct TranslationWorkspace {
    document: Document,
    versions: VersionSet,
    original: MarkupPane,
    ai_draft: Option<MarkupPane>,
    editor: EditModeController,
    sync: PaneSyncController,
    access: Access,
    session: Option<Arc<WorkSession>>,
    autosave: Option<AutosaveScheduler>,
    /// Paragraph indices still present in the translation pane.
    live_paragraphs: BTreeSet<usize>,
    seen_revision: u64,
}

fn live_indices(pane: &dyn Pane) -> BTreeSet<usize> {
    pane.paragraphs().into_iter().map(|p| p.index).collect()
}

fn segmented_pane(id: PaneId, layout: LayoutMetrics, content: &str) -> MarkupPane {
    MarkupPane::with_content(id, layout, &markup::segment(content, id.namespace()))
}

/// Panes in display order.
fn pane_refs<'a>(
    original: &'a mut MarkupPane,
    ai_draft: &'a mut Option<MarkupPane>,
    editor: &'a mut EditModeController,
) -> Vec<&'a mut dyn Pane> {
    let mut panes: Vec<&'a mut dyn Pane> = Vec::with_capacity(3);
    panes.push(original);
    if let Some(ai) = ai_draft.as_mut() {
        panes.push(ai);
    }
    panes.push(editor.pane_mut());
    panes
}

impl TranslationWorkspace {
    /// Loads the document, segments every version and tries to take the
    /// lease. A lease held by someone else opens the document read-only;
    /// any other failure is terminal.
    pub async fn open(
        backend: Arc<dyn TranslationBackend>,
        id: &DocumentId,
        config: &WorkbenchConfig,
    ) -> Result<Self> {
        let document = backend.document(id).await?;
        let all_versions = backend.versions(id).await?;
        let versions = VersionSet::resolve(id, &all_versions)?;
        info!(
            document = %id,
            editable = ?versions.editable.version_type,
            version = versions.editable.version_number,
            panes = versions.pane_count(),
            "loaded document"
        );

        let layout = config.sync.layout;
        let original = segmented_pane(PaneId::Original, layout, &versions.original.content);
        let ai_draft = versions
            .ai_draft
            .as_ref()
            .map(|v| segmented_pane(PaneId::AiDraft, layout, &v.content));
        let translation = segmented_pane(PaneId::Translation, layout, &versions.editable.content);
        let live_paragraphs = live_indices(&translation);
        let baseline = markup::clean_snapshot(&translation.content());

        let manager = LockManager::new(backend.clone(), config.retry);
        let (access, session) = match manager.acquire(id).await {
            Ok(lease) => {
                let session = WorkSession::new(backend, lease, baseline)?;
                (Access::Editing, Some(Arc::new(session)))
            }
            Err(LockError::HeldByOther { holder, lease }) => {
                let message = LockError::HeldByOther {
                    holder: holder.clone(),
                    lease,
                }
                .user_message();
                warn!(document = %id, holder = %holder, "opening read-only");
                (Access::ReadOnly { holder, message }, None)
            }
            Err(err) => return Err(err.into()),
        };

        let mut completed = session
            .as_ref()
            .map(|s| s.seeded_progress().clone())
            .unwrap_or_default();
        completed.clamp(translation.paragraph_count());

        let mut editor = EditModeController::new(translation, session.is_some(), &config.editor);
        let mut original = original;
        let mut ai_draft = ai_draft;
        let mut sync = PaneSyncController::new(&config.sync);
        {
            let mut panes = pane_refs(&mut original, &mut ai_draft, &mut editor);
            sync.attach(&panes);
            sync.set_completed(&mut panes, completed);
        }

        let autosave = session.as_ref().map(|s| {
            let sink: Arc<dyn collaboration::SnapshotSink> = s.clone();
            AutosaveScheduler::spawn(sink, config.autosave)
        });

        Ok(Self {
            seen_revision: editor.revision(),
            document,
            versions,
            original,
            ai_draft,
            editor,
            sync,
            access,
            session,
            autosave,
            live_paragraphs,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document.id
    }

    pub fn versions(&self) -> &VersionSet {
        &self.versions
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    pub fn can_edit(&self) -> bool {
        self.access == Access::Editing && self.is_active()
    }

    /// False once the session was handed over or completed.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().map(|s| s.is_active()).unwrap_or(false)
    }

    pub fn session_end(&self) -> Option<SessionEnd> {
        self.session.as_ref().and_then(|s| s.ended())
    }

    /// Context left by the previous worker.
    pub fn handover_context(&self) -> Option<&HandoverRecord> {
        self.document.latest_handover.as_ref()
    }

    pub fn pane_ids(&self) -> Vec<PaneId> {
        let mut ids = vec![PaneId::Original];
        if self.ai_draft.is_some() {
            ids.push(PaneId::AiDraft);
        }
        ids.push(PaneId::Translation);
        ids
    }

    pub fn pane(&self, id: PaneId) -> Option<&MarkupPane> {
        match id {
            PaneId::Original => Some(&self.original),
            PaneId::AiDraft => self.ai_draft.as_ref(),
            PaneId::Translation => Some(self.editor.pane()),
        }
    }

    pub fn editor(&self) -> &EditModeController {
        &self.editor
    }

    /// Paragraphs currently in the translation. Structural deletes lower it.
    pub fn paragraph_count(&self) -> usize {
        self.live_paragraphs.len()
    }

    pub fn active_paragraph(&self) -> Option<usize> {
        self.sync.active_paragraph()
    }

    pub fn completed(&self) -> &CompletedParagraphs {
        self.sync.completed()
    }

    pub fn progress(&self) -> f32 {
        if self.live_paragraphs.is_empty() {
            return 0.0;
        }
        self.completed().len() as f32 / self.live_paragraphs.len() as f32
    }

    pub fn autosave_status(&self) -> Option<AutosaveStatus> {
        self.autosave.as_ref().map(|a| a.status())
    }

    fn with_panes<R>(
        &mut self,
        f: impl FnOnce(&mut PaneSyncController, &mut [&mut dyn Pane]) -> R,
    ) -> R {
        let mut panes = pane_refs(&mut self.original, &mut self.ai_draft, &mut self.editor);
        f(&mut self.sync, &mut panes)
    }

    pub fn hover(&mut self, source: PaneId, index: usize) -> bool {
        self.with_panes(|sync, panes| sync.on_hover(panes, source, index))
    }

    pub fn click(&mut self, source: PaneId, index: usize) -> bool {
        self.with_panes(|sync, panes| sync.on_click(panes, source, index))
    }

    pub fn scroll(&mut self, source: PaneId, ratio: f64, now: Instant) -> ScrollOutcome {
        self.with_panes(|sync, panes| sync.on_scroll(panes, source, ratio, now))
    }

    /// Toggles a completion mark; the change is autosaved with the content.
    pub fn toggle_complete(&mut self, index: usize) -> Result<bool> {
        if !self.can_edit() {
            return Err(WorkbenchError::ReadOnly);
        }
        if !self.live_paragraphs.contains(&index) {
            return Err(PaneError::ParagraphNotFound(index).into());
        }
        let total = self.live_paragraphs.last().map_or(0, |last| last + 1);
        let complete = self.with_panes(|sync, panes| sync.toggle_complete(panes, index, total))?;
        self.notify_autosave();
        Ok(complete)
    }

    /// Runs an editor operation, then propagates any content change.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut EditModeController) -> R) -> R {
        let result = f(&mut self.editor);
        self.after_edit();
        result
    }

    /// Drives time-based work: snapshot capture and the scroll guard.
    pub fn tick(&mut self, now: Instant) {
        self.editor.tick(now);
        self.sync.tick(now);
        self.after_edit();
    }

    fn after_edit(&mut self) {
        let revision = self.editor.revision();
        if revision == self.seen_revision {
            return;
        }
        self.seen_revision = revision;
        self.live_paragraphs = live_indices(self.editor.pane());
        let completed = self.completed();
        let kept: CompletedParagraphs = completed
            .iter()
            .filter(|i| self.live_paragraphs.contains(i))
            .collect();
        if &kept != completed {
            debug!(
                dropped = completed.len() - kept.len(),
                "dropping completion marks of deleted paragraphs"
            );
            // Also re-decorates
            self.with_panes(|sync, panes| sync.set_completed(panes, kept));
        } else {
            // Undo and redo re-render the translation pane
            self.with_panes(|sync, panes| sync.decorate(panes));
        }
        self.notify_autosave();
    }

    fn notify_autosave(&self) {
        if let Some(autosave) = &self.autosave {
            debug!(revision = self.seen_revision, "queueing autosave");
            autosave.notify(self.snapshot());
        }
    }

    /// Content and completion state as they would be persisted.
    pub fn snapshot(&self) -> SaveRequest {
        SaveRequest::new(self.editor.content(), self.completed())
    }

    fn active_session(&self) -> Result<Arc<WorkSession>> {
        match &self.session {
            Some(session) if self.access == Access::Editing => Ok(session.clone()),
            _ => Err(WorkbenchError::ReadOnly),
        }
    }

    /// Explicit save.
    pub async fn save(&mut self) -> Result<()> {
        let session = self.active_session()?;
        let snapshot = self.snapshot();
        let completed = self.completed().clone();
        session.save(&snapshot.content, &completed).await?;
        Ok(())
    }

    /// Saves, hands the document over and releases the lease. On failure
    /// nothing changes and the call may be retried.
    pub async fn handover(&mut self, memo: &str, terms: Option<String>) -> Result<()> {
        let session = self.active_session()?;
        let content = self.editor.content();
        let completed = self.completed().clone();
        session.handover(&content, &completed, memo, terms).await?;
        self.finish();
        Ok(())
    }

    /// Persists the final content and sends the document to review.
    pub async fn complete(&mut self) -> Result<()> {
        let session = self.active_session()?;
        let content = self.editor.content();
        let completed = self.completed().clone();
        session.complete(&content, &completed).await?;
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(autosave) = self.autosave.take() {
            autosave.shutdown();
        }
        self.editor.close();
        self.sync.detach_all();
    }

    /// Closes the workspace without handover or completion. The lease stays
    /// held; a warning comes back when content or completion marks were
    /// never persisted.
    pub fn leave(mut self) -> Option<ExitWarning> {
        let content = self.editor.content();
        let completed = self.completed().clone();
        self.finish();
        let warning = self
            .session
            .as_ref()
            .and_then(|s| s.leave(&content, &completed));
        info!(document = %self.document.id, warned = warning.is_some(), "left workspace");
        warning
    }

    /// Standalone copy of the translation with the original's stylesheets.
    pub fn export(&self) -> ExportedDocument {
        let options = ExportOptions::default()
            .with_title(self.document.title.clone())
            .with_stripped_tags();
        export_document(
            &self.editor.content(),
            Some(&self.versions.original.content),
            &options,
        )
    }
}
