use markup::classes::{STRUCTURAL_CANDIDATE, STRUCTURAL_HOVER, STRUCTURAL_SELECTED};
use markup::{clean_snapshot, is_non_content, is_structural, MarkupDocument, NodeId};
use panes::{Debouncer, ListenerRegistry, MarkupPane, Pane};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::{
    EditMode, EditSnapshot, EditorConfig, EditorError, FormatCommand, FormatOutcome,
    FormattingCommandExecutor, KeyCommand, KeyPress, KeyScope, KeyboardRouter, NativeFormatter,
    Result, SelectionSet, SnapshotHistory, TextPosition, TextSelection,
};

const EDITABLE_ATTR: &str = "contenteditable";

/// Events the controller binds on the editable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorEvent {
    Input,
    KeyDown,
    Click,
    MouseOver,
    MouseOut,
}

/// Emitted when a plain click lands on a link in Text Mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDialogRequest {
    pub node: NodeId,
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Open the link editor instead of following the link.
    LinkDialog(LinkDialogRequest),
    /// Accelerator held: follow the link.
    Navigate { href: String },
    /// Structural selection toggled.
    Selected { node: NodeId, selected: bool },
    Ignored,
}

/// Owns the editable pane and everything that mutates it.
pub struct EditModeController {
    pane: MarkupPane,
    mode: EditMode,
    can_edit: bool,
    text_history: SnapshotHistory,
    structural_history: SnapshotHistory,
    selection: SelectionSet,
    text_selection: Option<TextSelection>,
    listeners: ListenerRegistry<EditMode, EditorEvent>,
    keyboard: KeyboardRouter,
    capture: Debouncer,
    formatter: FormattingCommandExecutor,
    revision: u64,
}

impl EditModeController {
    /// Starts in Text Mode. Without edit rights no listener is ever attached
    /// and every mutating call fails with [`EditorError::EditingDisabled`].
    pub fn new(pane: MarkupPane, can_edit: bool, config: &EditorConfig) -> Self {
        let initial = EditSnapshot::new(clean_snapshot(&pane.content()));
        let mut controller = Self {
            pane,
            mode: EditMode::Text,
            can_edit,
            text_history: SnapshotHistory::new(initial.clone(), config.history_limit),
            structural_history: SnapshotHistory::new(initial, config.history_limit),
            selection: SelectionSet::new(),
            text_selection: None,
            listeners: ListenerRegistry::new(),
            keyboard: KeyboardRouter::new(),
            capture: Debouncer::new(Duration::from_millis(config.capture_debounce_ms)),
            formatter: FormattingCommandExecutor::new(config),
            revision: 0,
        };
        if can_edit {
            controller.attach(EditMode::Text);
        }
        info!(can_edit, "editor ready");
        controller
    }

    pub fn with_native(mut self, native: Box<dyn NativeFormatter>) -> Self {
        self.formatter = self.formatter.with_native(native);
        self
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    pub fn pane(&self) -> &MarkupPane {
        &self.pane
    }

    /// For decoration by the sync controller.
    pub fn pane_mut(&mut self) -> &mut MarkupPane {
        &mut self.pane
    }

    pub fn document(&self) -> &MarkupDocument {
        self.pane.document()
    }

    /// Persistable content: editor decoration removed, paragraph tags kept.
    pub fn content(&self) -> String {
        clean_snapshot(&self.pane.content())
    }

    /// Bumped whenever captured content changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn text_selection(&self) -> Option<TextSelection> {
        self.text_selection
    }

    pub fn set_text_selection(&mut self, selection: Option<TextSelection>) {
        self.text_selection = selection;
    }

    pub fn history(&self, mode: EditMode) -> &SnapshotHistory {
        match mode {
            EditMode::Text => &self.text_history,
            EditMode::Structural => &self.structural_history,
        }
    }

    fn history_mut(&mut self, mode: EditMode) -> &mut SnapshotHistory {
        match mode {
            EditMode::Text => &mut self.text_history,
            EditMode::Structural => &mut self.structural_history,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_outer_key_handler_registered(&self) -> bool {
        self.keyboard.is_outer_registered()
    }

    pub fn has_pending_capture(&self) -> bool {
        self.capture.is_pending()
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.can_edit {
            Ok(())
        } else {
            Err(EditorError::EditingDisabled)
        }
    }

    fn ensure_mode(&self, expected: EditMode) -> Result<()> {
        self.ensure_editable()?;
        if self.mode == expected {
            Ok(())
        } else {
            Err(EditorError::WrongMode { expected })
        }
    }

    /// Explicit mode switch. Neither history is discarded; the entered
    /// mode's current snapshot moves to the live content.
    pub fn set_mode(&mut self, mode: EditMode) -> Result<()> {
        self.ensure_editable()?;
        if mode == self.mode {
            return Ok(());
        }
        self.flush_capture();
        self.detach(self.mode);
        self.mode = mode;
        let live = EditSnapshot::new(self.content());
        self.history_mut(mode).rebase(live);
        self.attach(mode);
        info!("switched to {} mode", mode);
        Ok(())
    }

    fn attach(&mut self, mode: EditMode) {
        match mode {
            EditMode::Text => {
                for block in self.editable_blocks() {
                    if let Some(el) = self.pane.document_mut().element_mut(block) {
                        el.set_attr(EDITABLE_ATTR, "true");
                    }
                    self.listeners
                        .attach_to(mode, EditorEvent::Input, Some(block));
                }
                for anchor in self.content_elements(|name| name == "a") {
                    self.listeners
                        .attach_to(mode, EditorEvent::Click, Some(anchor));
                }
            }
            EditMode::Structural => {
                for candidate in self.content_elements(is_structural) {
                    if let Some(el) = self.pane.document_mut().element_mut(candidate) {
                        el.add_class(STRUCTURAL_CANDIDATE);
                    }
                    for event in [EditorEvent::Click, EditorEvent::MouseOver, EditorEvent::MouseOut] {
                        self.listeners.attach_to(mode, event, Some(candidate));
                    }
                }
            }
        }
        self.listeners.attach(mode, EditorEvent::KeyDown);
        self.keyboard.register_outer();
        debug!(mode = %mode, listeners = self.listeners.count(mode), "attached mode listeners");
    }

    fn detach(&mut self, mode: EditMode) {
        self.listeners.detach(mode);
        self.keyboard.unregister_outer();
        let doc = self.pane.document_mut();
        let elements: Vec<NodeId> = doc.descendants(doc.root()).collect();
        for id in elements {
            let Some(el) = doc.element_mut(id) else {
                continue;
            };
            match mode {
                EditMode::Text => {
                    el.remove_attr(EDITABLE_ATTR);
                }
                EditMode::Structural => {
                    el.remove_class(STRUCTURAL_CANDIDATE);
                    el.remove_class(STRUCTURAL_HOVER);
                    el.remove_class(STRUCTURAL_SELECTED);
                }
            }
        }
        self.selection.clear();
    }

    /// Element-level wiring goes stale whenever content is replaced.
    fn rebind(&mut self) {
        if !self.can_edit {
            return;
        }
        self.detach(self.mode);
        self.attach(self.mode);
    }

    /// Detaches everything, as when the editor goes away.
    pub fn close(&mut self) {
        self.flush_capture();
        self.detach(self.mode);
        self.listeners.detach_all();
        debug!("editor closed");
    }

    fn editable_blocks(&self) -> Vec<NodeId> {
        let doc = self.pane.document();
        let tagged: Vec<NodeId> = markup::tagged_paragraphs(doc)
            .into_iter()
            .map(|p| p.node)
            .collect();
        if tagged.is_empty() {
            markup::qualifying_blocks(doc)
        } else {
            tagged
        }
    }

    /// Elements of the content area matching `filter`, outside scripts,
    /// styles and other non-content subtrees.
    fn content_elements(&self, filter: impl Fn(&str) -> bool) -> Vec<NodeId> {
        let doc = self.pane.document();
        let start = doc.body().unwrap_or(doc.root());
        doc.descendants(start)
            .filter(|id| {
                doc.tag_name(*id).map(&filter).unwrap_or(false)
                    && !doc
                        .ancestors(*id)
                        .any(|a| doc.tag_name(a).map(is_non_content).unwrap_or(false))
            })
            .collect()
    }

    fn replace_content(&mut self, snapshot: &EditSnapshot) {
        self.pane.render(snapshot.as_str());
        self.selection.clear();
        self.text_selection = None;
        self.revision += 1;
        self.rebind();
    }

    /// Records the live content into the Text Mode history.
    fn capture_text(&mut self) -> bool {
        let snapshot = EditSnapshot::new(self.content());
        self.pane.relayout();
        if self.text_history.record(snapshot) {
            self.revision += 1;
            debug!(revision = self.revision, "captured text snapshot");
            true
        } else {
            false
        }
    }

    fn flush_capture(&mut self) -> bool {
        if self.capture.cancel() {
            self.capture_text()
        } else {
            false
        }
    }

    /// Notes a mutation of the editable content by user input. Captured
    /// once input pauses for the debounce delay.
    pub fn on_input(&mut self, now: Instant) {
        if self.can_edit
            && self.mode == EditMode::Text
            && self.listeners.is_attached(EditMode::Text, EditorEvent::Input)
        {
            self.capture.schedule(now);
        }
    }

    /// Fires a due snapshot capture. Returns whether content changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.capture.fire_if_due(now) {
            self.capture_text()
        } else {
            false
        }
    }

    /// Types `text` at a position inside an editable block.
    pub fn insert_text(&mut self, at: TextPosition, text: &str, now: Instant) -> Result<()> {
        self.ensure_mode(EditMode::Text)?;
        let doc = self.pane.document();
        let block = doc
            .closest(at.node, |el| el.has_attr(EDITABLE_ATTR))
            .filter(|b| self.listeners.handles(EditMode::Text, EditorEvent::Input, *b))
            .ok_or_else(|| EditorError::InvalidSelection(format!("{} is not editable", at.node)))?;
        let current = doc
            .text(at.node)
            .ok_or_else(|| EditorError::InvalidSelection(format!("{} is not text", at.node)))?;
        let byte = current
            .char_indices()
            .nth(at.offset)
            .map(|(b, _)| b)
            .unwrap_or(current.len());
        let mut updated = current;
        updated.insert_str(byte, text);
        self.pane.document_mut().set_text(at.node, &updated)?;
        let caret = TextPosition::new(at.node, at.offset + text.chars().count());
        self.text_selection = Some(TextSelection::caret(caret));
        debug!(block = %block, "text input");
        self.on_input(now);
        Ok(())
    }

    /// Applies a formatting command to the current text selection and
    /// captures the result right away.
    pub fn format(&mut self, command: &FormatCommand) -> Result<FormatOutcome> {
        self.ensure_mode(EditMode::Text)?;
        let selection = self.text_selection.ok_or(EditorError::NoSelection)?;
        self.flush_capture();
        let outcome = self
            .formatter
            .execute(self.pane.document_mut(), &selection, command)?;
        self.text_selection = outcome.selection;
        self.rebind();
        self.capture_text();
        Ok(outcome)
    }

    pub fn on_click(&mut self, node: NodeId, accelerator: bool) -> ClickOutcome {
        if !self.can_edit {
            return ClickOutcome::Ignored;
        }
        match self.mode {
            EditMode::Text => {
                let doc = self.pane.document();
                let Some(anchor) = doc.closest(node, |el| el.name == "a") else {
                    return ClickOutcome::Ignored;
                };
                if !self.listeners.handles(EditMode::Text, EditorEvent::Click, anchor) {
                    return ClickOutcome::Ignored;
                }
                let href = doc
                    .element(anchor)
                    .and_then(|el| el.attr("href"))
                    .unwrap_or_default();
                if accelerator {
                    ClickOutcome::Navigate { href }
                } else {
                    ClickOutcome::LinkDialog(LinkDialogRequest {
                        node: anchor,
                        href,
                        text: doc.text_content(anchor),
                    })
                }
            }
            EditMode::Structural => {
                let Some(candidate) = self.candidate_for(node, EditorEvent::Click) else {
                    return ClickOutcome::Ignored;
                };
                let selected = self.selection.toggle(candidate);
                if let Some(el) = self.pane.document_mut().element_mut(candidate) {
                    if selected {
                        el.add_class(STRUCTURAL_SELECTED);
                    } else {
                        el.remove_class(STRUCTURAL_SELECTED);
                    }
                }
                ClickOutcome::Selected {
                    node: candidate,
                    selected,
                }
            }
        }
    }

    /// Pointer entering or leaving a structural unit.
    pub fn on_hover(&mut self, node: NodeId, entering: bool) -> bool {
        if !self.can_edit || self.mode != EditMode::Structural {
            return false;
        }
        let event = if entering {
            EditorEvent::MouseOver
        } else {
            EditorEvent::MouseOut
        };
        let Some(candidate) = self.candidate_for(node, event) else {
            return false;
        };
        if let Some(el) = self.pane.document_mut().element_mut(candidate) {
            if entering {
                el.add_class(STRUCTURAL_HOVER);
            } else {
                el.remove_class(STRUCTURAL_HOVER);
            }
        }
        true
    }

    /// Nearest selectable ancestor with a live listener for `event`.
    fn candidate_for(&self, node: NodeId, event: EditorEvent) -> Option<NodeId> {
        let doc = self.pane.document();
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .filter(|id| {
                doc.element(*id)
                    .map(|el| el.has_class(STRUCTURAL_CANDIDATE))
                    .unwrap_or(false)
            })
            .find(|id| self.listeners.handles(EditMode::Structural, event, *id))
    }

    /// Applies the link dialog result.
    pub fn update_link(&mut self, node: NodeId, href: &str, text: Option<&str>) -> Result<()> {
        self.ensure_mode(EditMode::Text)?;
        if !self.pane.document().is_element(node, "a") {
            return Err(EditorError::NotALink(node));
        }
        self.flush_capture();
        let doc = self.pane.document_mut();
        if let Some(el) = doc.element_mut(node) {
            el.set_attr("href", href);
        }
        if let Some(text) = text {
            doc.set_text_content(node, text)?;
        }
        self.text_selection = None;
        self.capture_text();
        Ok(())
    }

    pub fn remove_link(&mut self, node: NodeId) -> Result<()> {
        self.ensure_mode(EditMode::Text)?;
        if !self.pane.document().is_element(node, "a") {
            return Err(EditorError::NotALink(node));
        }
        self.flush_capture();
        self.pane.document_mut().unwrap(node)?;
        self.text_selection = None;
        self.rebind();
        self.capture_text();
        Ok(())
    }

    /// Removes every selected unit. The pre-delete content becomes an undo
    /// step and redo is cleared.
    pub fn delete_selected(&mut self) -> Result<usize> {
        self.ensure_mode(EditMode::Structural)?;
        if self.selection.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        let nodes = self.selection.nodes();
        let doc = self.pane.document_mut();
        let mut removed = 0;
        for node in nodes {
            // Units inside an already removed unit go with it
            if doc.is_attached(node) {
                doc.detach(node)?;
                removed += 1;
            }
        }
        self.selection.clear();
        self.pane.relayout();
        let after = EditSnapshot::new(self.content());
        self.structural_history.record(after);
        self.revision += 1;
        self.rebind();
        info!(removed, "deleted structural units");
        Ok(removed)
    }

    pub fn undo(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.flush_capture();
        let mode = self.mode;
        let snapshot = self.history_mut(mode).undo()?.clone();
        self.replace_content(&snapshot);
        debug!(mode = %mode, "undo");
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.flush_capture();
        let mode = self.mode;
        let snapshot = self.history_mut(mode).redo()?.clone();
        self.replace_content(&snapshot);
        debug!(mode = %mode, "redo");
        Ok(())
    }

    /// Handles a key press seen at `scope`. Returns the command acted on.
    pub fn handle_key(&mut self, press: &KeyPress, scope: KeyScope) -> Result<Option<KeyCommand>> {
        if !self.can_edit {
            return Ok(None);
        }
        if scope == KeyScope::Surface && !self.listeners.is_attached(self.mode, EditorEvent::KeyDown) {
            return Ok(None);
        }
        let Some(command) = self.keyboard.route(press, scope) else {
            return Ok(None);
        };
        let result = match command {
            KeyCommand::Undo => self.undo(),
            KeyCommand::Redo => self.redo(),
            KeyCommand::DeleteSelection => {
                if self.mode != EditMode::Structural || self.selection.is_empty() {
                    return Ok(None);
                }
                self.delete_selected().map(|_| ())
            }
            KeyCommand::Bold | KeyCommand::Italic | KeyCommand::Underline => {
                if self.mode != EditMode::Text || self.text_selection.is_none() {
                    return Ok(None);
                }
                let format = match command {
                    KeyCommand::Bold => FormatCommand::Bold,
                    KeyCommand::Italic => FormatCommand::Italic,
                    _ => FormatCommand::Underline,
                };
                self.format(&format).map(|_| ())
            }
        };
        match result {
            // An exhausted history makes the accelerator a no-op
            Err(EditorError::HistoryEmpty(_)) => Ok(Some(command)),
            Err(err) => Err(err),
            Ok(()) => Ok(Some(command)),
        }
    }
}
