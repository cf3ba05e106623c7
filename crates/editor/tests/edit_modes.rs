use editor::*;
use markup::classes::STRUCTURAL_CANDIDATE;
use panes::{LayoutMetrics, MarkupPane, PaneId};
use std::time::{Duration, Instant};

const CONTENT: &str = "<h1>Title</h1><div><p>one</p><p>two</p></div><p>three</p><p>four</p>";

fn controller(can_edit: bool) -> EditModeController {
    let tagged = markup::segment(CONTENT, PaneId::Translation.namespace());
    let pane = MarkupPane::with_content(PaneId::Translation, LayoutMetrics::default(), &tagged);
    EditModeController::new(pane, can_edit, &EditorConfig::default())
}

fn candidates(editor: &EditModeController) -> Vec<markup::NodeId> {
    let doc = editor.document();
    doc.descendants(doc.root())
        .filter(|id| {
            doc.element(*id)
                .map(|el| el.has_class(STRUCTURAL_CANDIDATE))
                .unwrap_or(false)
        })
        .collect()
}

fn select_paragraph(editor: &mut EditModeController, name: &str, nth: usize) {
    let node = editor.document().elements_named(name)[nth];
    assert!(matches!(
        editor.on_click(node, false),
        ClickOutcome::Selected { selected: true, .. }
    ));
}

#[test]
fn test_structural_deletes_undo_to_original() {
    let mut editor = controller(true);
    let original = editor.content();
    editor.set_mode(EditMode::Structural).unwrap();

    let mut states = vec![original.clone()];
    for _ in 0..3 {
        select_paragraph(&mut editor, "p", 0);
        assert_eq!(editor.delete_selected().unwrap(), 1);
        states.push(editor.content());
    }
    assert_eq!(editor.document().elements_named("p").len(), 1);

    for expected in states.iter().rev().skip(1) {
        editor.undo().unwrap();
        assert_eq!(&editor.content(), expected);
    }
    assert_eq!(editor.content(), original);
    assert!(matches!(editor.undo(), Err(EditorError::HistoryEmpty(_))));
}

#[test]
fn test_undo_then_redo_is_identity() {
    let mut editor = controller(true);
    editor.set_mode(EditMode::Structural).unwrap();
    select_paragraph(&mut editor, "p", 1);
    editor.delete_selected().unwrap();
    let after_delete = editor.content();

    editor.undo().unwrap();
    editor.redo().unwrap();
    assert_eq!(editor.content(), after_delete);
}

#[test]
fn test_delete_removes_nested_selection_once() {
    let mut editor = controller(true);
    editor.set_mode(EditMode::Structural).unwrap();
    select_paragraph(&mut editor, "div", 0);
    select_paragraph(&mut editor, "p", 0);
    // The paragraph goes with its container
    assert_eq!(editor.delete_selected().unwrap(), 1);
    assert!(editor.selection().is_empty());
    assert!(matches!(
        editor.delete_selected(),
        Err(EditorError::NothingSelected)
    ));
}

#[test]
fn test_candidates_rebound_after_undo() {
    let mut editor = controller(true);
    editor.set_mode(EditMode::Structural).unwrap();
    let before = candidates(&editor).len();
    select_paragraph(&mut editor, "p", 3);
    editor.delete_selected().unwrap();
    assert_eq!(candidates(&editor).len(), before - 1);
    editor.undo().unwrap();
    assert_eq!(candidates(&editor).len(), before);
    // Restored units are clickable again
    select_paragraph(&mut editor, "p", 3);
}

#[test]
fn test_mode_switch_keeps_both_histories() {
    let mut editor = controller(true);
    let start = Instant::now();
    let p = editor.document().elements_named("p")[0];
    let text = editor.document().text_nodes(p)[0];
    editor
        .insert_text(TextPosition::new(text, 3), "!", start)
        .unwrap();
    // Leaving Text Mode flushes the pending capture
    editor.set_mode(EditMode::Structural).unwrap();
    assert_eq!(editor.history(EditMode::Text).undo_len(), 1);
    assert!(!editor.has_pending_capture());

    select_paragraph(&mut editor, "p", 2);
    editor.delete_selected().unwrap();
    assert_eq!(editor.history(EditMode::Structural).undo_len(), 1);

    editor.set_mode(EditMode::Text).unwrap();
    assert_eq!(editor.history(EditMode::Text).undo_len(), 1);
    assert_eq!(editor.history(EditMode::Structural).undo_len(), 1);
    assert!(editor.content().contains("one!"));
    assert!(!editor.content().contains("three"));
}

#[test]
fn test_read_only_editor_is_inert() {
    let mut editor = controller(false);
    assert_eq!(editor.listener_count(), 0);
    assert!(!editor.is_outer_key_handler_registered());
    let p = editor.document().elements_named("p")[0];
    assert_eq!(editor.on_click(p, false), ClickOutcome::Ignored);
    assert!(matches!(editor.undo(), Err(EditorError::EditingDisabled)));
    assert!(!editor.content().contains("contenteditable"));
}

#[test]
fn test_key_press_handled_once_across_scopes() {
    let mut editor = controller(true);
    editor.set_mode(EditMode::Structural).unwrap();
    select_paragraph(&mut editor, "p", 0);
    select_paragraph(&mut editor, "p", 1);
    editor.delete_selected().unwrap();
    select_paragraph(&mut editor, "p", 0);
    editor.delete_selected().unwrap();
    assert_eq!(editor.history(EditMode::Structural).undo_len(), 2);

    let press = KeyPress::new(41, "z").with_ctrl();
    assert_eq!(
        editor.handle_key(&press, KeyScope::Surface).unwrap(),
        Some(KeyCommand::Undo)
    );
    // The same press bubbling to the outer scope is not undone twice
    assert_eq!(editor.handle_key(&press, KeyScope::Outer).unwrap(), None);
    assert_eq!(editor.history(EditMode::Structural).undo_len(), 1);

    let outer = KeyPress::new(42, "Z").with_meta().with_shift();
    assert_eq!(
        editor.handle_key(&outer, KeyScope::Outer).unwrap(),
        Some(KeyCommand::Redo)
    );
    assert_eq!(editor.history(EditMode::Structural).undo_len(), 2);
}

#[test]
fn test_delete_key_removes_selection() {
    let mut editor = controller(true);
    editor.set_mode(EditMode::Structural).unwrap();
    select_paragraph(&mut editor, "h1", 0);
    let press = KeyPress::new(1, "Delete");
    assert_eq!(
        editor.handle_key(&press, KeyScope::Surface).unwrap(),
        Some(KeyCommand::DeleteSelection)
    );
    assert!(!editor.content().contains("Title"));
}

#[test]
fn test_format_captures_immediately() {
    let mut editor = controller(true);
    let p = editor.document().elements_named("p")[2];
    let text = editor.document().text_nodes(p)[0];
    editor.set_text_selection(Some(TextSelection::range(
        TextPosition::new(text, 0),
        TextPosition::new(text, 5),
    )));
    let revision = editor.revision();
    let outcome = editor.format(&FormatCommand::Bold).unwrap();
    assert!(!outcome.used_native);
    assert!(editor.revision() > revision);
    assert!(editor.content().contains("<b>three</b>"));

    editor.undo().unwrap();
    assert!(!editor.content().contains("<b>"));
    // Text Mode commands are refused in Structural Mode
    editor.set_mode(EditMode::Structural).unwrap();
    assert!(matches!(
        editor.format(&FormatCommand::Italic),
        Err(EditorError::WrongMode {
            expected: EditMode::Text
        })
    ));
}

#[test]
fn test_undo_flushes_pending_typing() {
    let mut editor = controller(true);
    let start = Instant::now();
    let p = editor.document().elements_named("p")[3];
    let text = editor.document().text_nodes(p)[0];
    editor
        .insert_text(TextPosition::new(text, 0), "x", start)
        .unwrap();
    assert!(editor.has_pending_capture());
    editor.undo().unwrap();
    assert!(!editor.content().contains("xfour"));
    assert!(!editor.tick(start + Duration::from_secs(1)));
}
