use document::CompletedParagraphs;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::{LayoutMetrics, ListenerRegistry, Pane, PaneError, PaneId, ReentrancyGuard, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long synchronized scrolling ignores scroll events it caused.
    pub scroll_guard_ms: u64,
    pub layout: LayoutMetrics,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scroll_guard_ms: 50,
            layout: LayoutMetrics::default(),
        }
    }
}

/// Pane events the controller listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaneEventKind {
    Hover,
    Click,
    Scroll,
}

/// Result of delivering a scroll event.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollOutcome {
    /// Other panes were moved to `ratio` and `active` became the active paragraph.
    Synced { ratio: f64, active: Option<usize> },
    /// Dropped while a synchronized scroll is settling.
    Suppressed,
    /// No scroll listener attached for the pane.
    Unhandled,
}

/// Keeps the panes of one screen correlated by paragraph index.
///
/// Panes are passed into each call rather than owned, so the editable pane
/// can stay with the edit-mode controller.
pub struct PaneSyncController {
    active: Option<usize>,
    completed: CompletedParagraphs,
    listeners: ListenerRegistry<PaneId, PaneEventKind>,
    scroll_guard: ReentrancyGuard,
}

impl PaneSyncController {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            active: None,
            completed: CompletedParagraphs::new(),
            listeners: ListenerRegistry::new(),
            scroll_guard: ReentrancyGuard::new(Duration::from_millis(config.scroll_guard_ms)),
        }
    }

    /// Registers hover, click and scroll listeners on each pane.
    pub fn attach(&mut self, panes: &[&mut dyn Pane]) {
        for pane in panes {
            let id = pane.id();
            self.listeners.detach(id);
            self.listeners.attach(id, PaneEventKind::Hover);
            self.listeners.attach(id, PaneEventKind::Click);
            self.listeners.attach(id, PaneEventKind::Scroll);
        }
        debug!(panes = panes.len(), "attached pane listeners");
    }

    pub fn detach(&mut self, pane: PaneId) -> usize {
        self.listeners.detach(pane)
    }

    /// Drops every listener, as on unmount.
    pub fn detach_all(&mut self) -> usize {
        self.listeners.detach_all()
    }

    pub fn is_attached(&self, pane: PaneId) -> bool {
        self.listeners.count(pane) > 0
    }

    pub fn active_paragraph(&self) -> Option<usize> {
        self.active
    }

    pub fn completed(&self) -> &CompletedParagraphs {
        &self.completed
    }

    pub fn set_active_paragraph(&mut self, panes: &mut [&mut dyn Pane], index: Option<usize>) {
        if self.active != index {
            trace!(?index, "active paragraph changed");
        }
        self.active = index;
        self.decorate(panes);
    }

    pub fn on_hover(&mut self, panes: &mut [&mut dyn Pane], source: PaneId, index: usize) -> bool {
        if !self.listeners.is_attached(source, PaneEventKind::Hover) {
            return false;
        }
        self.set_active_paragraph(panes, Some(index));
        true
    }

    pub fn on_click(&mut self, panes: &mut [&mut dyn Pane], source: PaneId, index: usize) -> bool {
        if !self.listeners.is_attached(source, PaneEventKind::Click) {
            return false;
        }
        self.set_active_paragraph(panes, Some(index));
        true
    }

    /// Moves `source` to `ratio`, applies the same ratio to the other panes
    /// and activates the paragraph nearest the source's new offset.
    pub fn on_scroll(
        &mut self,
        panes: &mut [&mut dyn Pane],
        source: PaneId,
        ratio: f64,
        now: Instant,
    ) -> ScrollOutcome {
        if !self.listeners.is_attached(source, PaneEventKind::Scroll) {
            return ScrollOutcome::Unhandled;
        }
        self.scroll_guard.release_if_elapsed(now);
        if self.scroll_guard.is_engaged(now) {
            trace!(pane = %source, "suppressed echoed scroll");
            return ScrollOutcome::Suppressed;
        }

        let ratio = ratio.clamp(0.0, 1.0);
        self.scroll_guard.engage(now);
        let mut active = None;
        for pane in panes.iter_mut() {
            pane.scroll_to_ratio(ratio);
            if pane.id() == source {
                let offset = pane.scroll_metrics().scroll_top;
                active = pane.paragraph_at_offset(offset);
            }
        }
        if active.is_some() {
            self.set_active_paragraph(panes, active);
        }
        ScrollOutcome::Synced { ratio, active }
    }

    /// Clears an expired scroll guard.
    pub fn tick(&mut self, now: Instant) {
        self.scroll_guard.release_if_elapsed(now);
    }

    pub fn set_completed(&mut self, panes: &mut [&mut dyn Pane], completed: CompletedParagraphs) {
        self.completed = completed;
        self.decorate(panes);
    }

    /// Toggles completion of one paragraph. Content is never touched.
    pub fn toggle_complete(
        &mut self,
        panes: &mut [&mut dyn Pane],
        index: usize,
        total: usize,
    ) -> Result<bool> {
        let complete = self
            .completed
            .toggle(index, total)
            .map_err(|_| PaneError::ParagraphNotFound(index))?;
        self.decorate(panes);
        Ok(complete)
    }

    /// Re-applies the current state to every pane, e.g. after re-rendering.
    pub fn decorate(&self, panes: &mut [&mut dyn Pane]) {
        for pane in panes.iter_mut() {
            pane.apply_decoration(self.active, &self.completed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarkupPane;

    fn pane(id: PaneId) -> MarkupPane {
        let tagged = markup::segment("<p>a</p><p>b</p><p>c</p>", id.namespace());
        MarkupPane::with_content(id, LayoutMetrics::default(), &tagged)
    }

    #[test]
    fn test_detached_panes_ignore_events() {
        let mut a = pane(PaneId::Original);
        let mut controller = PaneSyncController::new(&SyncConfig::default());
        let mut panes: Vec<&mut dyn Pane> = vec![&mut a];
        assert!(!controller.on_hover(&mut panes, PaneId::Original, 1));

        controller.attach(&panes);
        assert!(controller.on_hover(&mut panes, PaneId::Original, 1));
        assert_eq!(controller.active_paragraph(), Some(1));

        assert_eq!(controller.detach_all(), 3);
        assert!(!controller.on_click(&mut panes, PaneId::Original, 2));
        assert_eq!(controller.active_paragraph(), Some(1));
    }

    #[test]
    fn test_toggle_out_of_range() {
        let mut a = pane(PaneId::Original);
        let mut controller = PaneSyncController::new(&SyncConfig::default());
        let mut panes: Vec<&mut dyn Pane> = vec![&mut a];
        assert!(controller.toggle_complete(&mut panes, 3, 3).is_err());
        assert!(controller.toggle_complete(&mut panes, 2, 3).unwrap());
    }
}
