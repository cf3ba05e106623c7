/// Translation workbench session.
///
/// Ties the pieces together for one document: versions are loaded and
/// segmented into panes, the lease decides whether the editor is live,
/// edits stream into autosave, and the session ends through handover,
/// completion or a warned exit.
use thiserror::Error;

mod config;
pub use config::*;

mod workspace;
pub use workspace::*;

#[derive(Debug, Error)]
pub enum WorkbenchError {
    #[error("cannot open document: {0}")]
    Load(#[from] document::DocumentError),

    #[error(transparent)]
    Lock(#[from] collaboration::LockError),

    #[error(transparent)]
    Backend(#[from] collaboration::BackendError),

    #[error("editor error: {0}")]
    Editor(#[from] editor::EditorError),

    #[error("pane error: {0}")]
    Pane(#[from] panes::PaneError),

    #[error("document is open read-only")]
    ReadOnly,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkbenchError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Load(_) => {
                "This document has no content that can be opened for translation.".to_string()
            }
            Self::Lock(err) => err.user_message(),
            Self::Backend(err) => err.user_message(),
            Self::ReadOnly => "This document is open read-only.".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkbenchError>;
