use serde::{Deserialize, Serialize};
use std::fmt;

/// Edit mode of the editable pane. Changes only on explicit user action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditMode {
    /// Inline editing of paragraph text with formatting commands
    Text,

    /// Whole blocks are selected and deleted; content is not editable
    Structural,
}

impl Default for EditMode {
    fn default() -> Self {
        Self::Text
    }
}

impl EditMode {
    pub fn name(&self) -> &str {
        match self {
            Self::Text => "Text",
            Self::Structural => "Structural",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Text => "Edit paragraph text and apply formatting",
            Self::Structural => "Select blocks and delete them",
        }
    }

    pub fn all() -> &'static [EditMode] {
        &[EditMode::Text, EditMode::Structural]
    }

    pub fn other(&self) -> EditMode {
        match self {
            Self::Text => Self::Structural,
            Self::Structural => Self::Text,
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
