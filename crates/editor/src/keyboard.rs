/// Keyboard accelerators for the editable pane.
///
/// A press is seen first by the editable surface and then, bubbling, by the
/// outer application scope. The outer handler only exists while a mode is
/// active, and a press acted on once is never acted on again.
use serde::{Deserialize, Serialize};

/// Keyboard command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCommand {
    Undo,
    Redo,
    DeleteSelection,
    Bold,
    Italic,
    Underline,
}

/// Where a key event was captured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyScope {
    /// The editable surface itself
    Surface,
    /// Application-wide fallback, for focus outside the surface
    Outer,
}

/// One physical key press. `id` is shared by every scope that sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub id: u64,
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyPress {
    pub fn new(id: u64, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            ctrl: false,
            meta: false,
            shift: false,
            alt: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Platform accelerator: Ctrl or Cmd.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    fn key_is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

impl KeyCommand {
    /// Command bound to `press`, if any
    pub fn from_press(press: &KeyPress) -> Option<KeyCommand> {
        if press.command() && !press.alt {
            if press.key_is("z") {
                return Some(if press.shift { Self::Redo } else { Self::Undo });
            }
            if press.key_is("y") && !press.shift {
                return Some(Self::Redo);
            }
            if press.shift {
                return None;
            }
            if press.key_is("b") {
                return Some(Self::Bold);
            }
            if press.key_is("i") {
                return Some(Self::Italic);
            }
            if press.key_is("u") {
                return Some(Self::Underline);
            }
            return None;
        }
        if !press.command() && (press.key_is("Delete") || press.key_is("Backspace")) {
            return Some(Self::DeleteSelection);
        }
        None
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Undo => "Undo",
            Self::Redo => "Redo",
            Self::DeleteSelection => "Delete Selection",
            Self::Bold => "Bold",
            Self::Italic => "Italic",
            Self::Underline => "Underline",
        }
    }

    pub fn shortcut(&self) -> &str {
        match self {
            Self::Undo => "Cmd+Z",
            Self::Redo => "Cmd+Shift+Z / Cmd+Y",
            Self::DeleteSelection => "Delete",
            Self::Bold => "Cmd+B",
            Self::Italic => "Cmd+I",
            Self::Underline => "Cmd+U",
        }
    }
}

/// Routes key presses from both capture scopes into at most one command.
#[derive(Clone, Debug, Default)]
pub struct KeyboardRouter {
    outer_registered: bool,
    last_handled: Option<u64>,
}

impl KeyboardRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the outer handler was already registered.
    pub fn register_outer(&mut self) -> bool {
        !std::mem::replace(&mut self.outer_registered, true)
    }

    pub fn unregister_outer(&mut self) -> bool {
        std::mem::replace(&mut self.outer_registered, false)
    }

    pub fn is_outer_registered(&self) -> bool {
        self.outer_registered
    }

    pub fn route(&mut self, press: &KeyPress, scope: KeyScope) -> Option<KeyCommand> {
        if scope == KeyScope::Outer && !self.outer_registered {
            return None;
        }
        if self.last_handled == Some(press.id) {
            return None;
        }
        let command = KeyCommand::from_press(press)?;
        self.last_handled = Some(press.id);
        Some(command)
    }
}
