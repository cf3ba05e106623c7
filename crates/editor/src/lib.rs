/// Edit-mode controller for the editable translation pane.
///
/// Two exclusive modes operate on the pane: Text Mode (inline editing and
/// formatting) and Structural Mode (select and delete whole blocks). Each
/// mode keeps its own whole-document snapshot history.
use markup::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod mode;
pub use mode::*;

mod history;
pub use history::*;

mod selection;
pub use selection::*;

mod keyboard;
pub use keyboard::*;

mod formatting;
pub use formatting::*;

mod controller;
pub use controller::*;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("nothing to restore: {0} is empty")]
    HistoryEmpty(&'static str),

    #[error("editing is disabled for this session")]
    EditingDisabled,

    #[error("operation requires {expected} mode")]
    WrongMode { expected: EditMode },

    #[error("no blocks selected")]
    NothingSelected,

    #[error("no text selection")]
    NoSelection,

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("not a link: {0}")]
    NotALink(NodeId),

    #[error("table size {rows}x{cols} outside 1..={max}")]
    InvalidTableSize { rows: usize, cols: usize, max: usize },

    #[error("markup error: {0}")]
    Markup(#[from] markup::MarkupError),
}

pub type Result<T> = std::result::Result<T, EditorError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Debounce between a keystroke and its snapshot capture.
    pub capture_debounce_ms: u64,
    pub max_table_rows: usize,
    pub max_table_cols: usize,
    /// Oldest snapshots are dropped beyond this many undo steps.
    pub history_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            capture_debounce_ms: 500,
            max_table_rows: 50,
            max_table_cols: 50,
            history_limit: 200,
        }
    }
}
