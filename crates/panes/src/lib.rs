/// Document panes and cross-pane synchronization.
///
/// Each pane renders one version of a document in isolation. The sync
/// controller correlates panes by paragraph index: hover, click and scroll in
/// any pane drive one shared active paragraph that every pane decorates.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod pane;
pub use pane::*;

mod markup_pane;
pub use markup_pane::*;

mod listeners;
pub use listeners::*;

mod timing;
pub use timing::*;

mod sync;
pub use sync::*;

#[derive(Debug, Error)]
pub enum PaneError {
    #[error("markup error: {0}")]
    Markup(#[from] markup::MarkupError),

    #[error("paragraph {0} not found")]
    ParagraphNotFound(usize),

    #[error("pane not attached: {0}")]
    NotAttached(PaneId),
}

pub type Result<T> = std::result::Result<T, PaneError>;

/// The panes of one editing screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaneId {
    Original,
    AiDraft,
    Translation,
}

impl PaneId {
    pub fn all() -> &'static [PaneId] {
        &[PaneId::Original, PaneId::AiDraft, PaneId::Translation]
    }

    /// Segmentation namespace for content rendered in this pane.
    pub fn namespace(self) -> &'static str {
        match self {
            PaneId::Original => "original",
            PaneId::AiDraft => "ai-draft",
            PaneId::Translation => "translation",
        }
    }

    pub fn is_editable(self) -> bool {
        self == PaneId::Translation
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}
