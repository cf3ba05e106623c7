/// Document markup handling for the translation workbench.
///
/// Content exchanged with the backend is HTML-like markup that is frequently
/// partial or malformed. This crate parses it leniently into an arena tree,
/// repairs missing document wrappers, tags paragraph blocks with stable
/// indices and produces clean export snapshots.
use thiserror::Error;

mod blocks;
pub use blocks::*;

mod tree;
pub use tree::*;

mod parse;

mod serialize;

mod repair;
pub use repair::*;

mod segment;
pub use segment::*;

mod export;
pub use export::*;

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node is not an element: {0}")]
    NotAnElement(NodeId),

    #[error("node has no parent: {0}")]
    Detached(NodeId),

    #[error("cannot move {child} under its own descendant {parent}")]
    InvalidHierarchy { parent: NodeId, child: NodeId },

    #[error("offset {offset} out of range for text node {node}")]
    OffsetOutOfRange { node: NodeId, offset: usize },
}

pub type Result<T> = std::result::Result<T, MarkupError>;

/// Class names the editor and pane controllers apply to rendered content.
/// None of them belong in persisted or exported documents.
pub mod classes {
    pub const PARAGRAPH_HIGHLIGHT: &str = "paragraph-highlight";
    pub const PARAGRAPH_COMPLETE: &str = "paragraph-complete";
    pub const STRUCTURAL_CANDIDATE: &str = "structural-candidate";
    pub const STRUCTURAL_HOVER: &str = "structural-hover";
    pub const STRUCTURAL_SELECTED: &str = "structural-selected";

    pub const EDITOR_CLASSES: &[&str] = &[
        PARAGRAPH_HIGHLIGHT,
        PARAGRAPH_COMPLETE,
        STRUCTURAL_CANDIDATE,
        STRUCTURAL_HOVER,
        STRUCTURAL_SELECTED,
    ];
}

/// Attributes the editor adds to make content editable.
pub const EDITOR_ATTRIBUTES: &[&str] = &["contenteditable", "spellcheck"];
