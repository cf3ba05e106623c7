use document::CompletedParagraphs;
use markup::classes::{PARAGRAPH_COMPLETE, PARAGRAPH_HIGHLIGHT};
use panes::{
    LayoutMetrics, MarkupPane, Pane, PaneId, PaneSyncController, ScrollOutcome, SyncConfig,
};
use std::time::{Duration, Instant};

const FIVE_PARAGRAPHS: &str = "<h1>Title</h1><p>one</p><p>two</p><p>three</p><p>four</p>";

fn metrics() -> LayoutMetrics {
    LayoutMetrics {
        line_height: 100.0,
        chars_per_line: 1000,
        paragraph_gap: 0.0,
        client_height: 200.0,
    }
}

fn three_panes() -> (MarkupPane, MarkupPane, MarkupPane) {
    let make = |id: PaneId| {
        let tagged = markup::segment(FIVE_PARAGRAPHS, id.namespace());
        MarkupPane::with_content(id, metrics(), &tagged)
    };
    (
        make(PaneId::Original),
        make(PaneId::AiDraft),
        make(PaneId::Translation),
    )
}

#[test]
fn test_hover_highlights_same_index_in_every_pane() {
    let (mut a, mut b, mut c) = three_panes();
    let mut controller = PaneSyncController::new(&SyncConfig::default());
    let mut panes: Vec<&mut dyn Pane> = vec![&mut a, &mut b, &mut c];
    controller.attach(&panes);

    assert!(controller.on_hover(&mut panes, PaneId::Original, 2));

    for pane in &panes {
        assert_eq!(pane.paragraph_count(), 5);
        assert_eq!(pane.paragraphs_with_class(PARAGRAPH_HIGHLIGHT), vec![2]);
    }

    // Moving the pointer elsewhere leaves exactly one highlight per pane
    controller.on_click(&mut panes, PaneId::Translation, 4);
    for pane in &panes {
        assert_eq!(pane.paragraphs_with_class(PARAGRAPH_HIGHLIGHT), vec![4]);
    }
}

#[test]
fn test_completion_toggle_is_idempotent() {
    let (mut a, mut b, mut c) = three_panes();
    let mut controller = PaneSyncController::new(&SyncConfig::default());
    let mut panes: Vec<&mut dyn Pane> = vec![&mut a, &mut b, &mut c];
    controller.attach(&panes);
    controller.set_completed(&mut panes, CompletedParagraphs::from_indices([0], 5));
    controller.set_active_paragraph(&mut panes, Some(1));

    let before: Vec<String> = panes.iter().map(|p| p.content()).collect();
    let completed_before = controller.completed().clone();

    assert!(controller.toggle_complete(&mut panes, 3, 5).unwrap());
    for pane in &panes {
        assert_eq!(pane.paragraphs_with_class(PARAGRAPH_COMPLETE), vec![0, 3]);
        // Highlight is independent of completion
        assert_eq!(pane.paragraphs_with_class(PARAGRAPH_HIGHLIGHT), vec![1]);
    }
    assert!(!controller.toggle_complete(&mut panes, 3, 5).unwrap());

    let after: Vec<String> = panes.iter().map(|p| p.content()).collect();
    assert_eq!(after, before);
    assert_eq!(controller.completed(), &completed_before);
}

#[test]
fn test_scroll_sync_with_reentrancy_guard() {
    let (mut a, mut b, mut c) = three_panes();
    let mut controller = PaneSyncController::new(&SyncConfig::default());
    let start = Instant::now();
    let mut panes: Vec<&mut dyn Pane> = vec![&mut a, &mut b, &mut c];
    controller.attach(&panes);

    // 5 paragraphs of 100px in a 200px viewport: max scroll is 300
    panes[0].set_scroll_top(300.0);
    let ratio = panes[0].scroll_ratio();
    let outcome = controller.on_scroll(&mut panes, PaneId::Original, ratio, start);
    assert_eq!(
        outcome,
        ScrollOutcome::Synced {
            ratio: 1.0,
            active: Some(3)
        }
    );
    assert_eq!(panes[1].scroll_metrics().scroll_top, 300.0);
    assert_eq!(panes[2].scroll_metrics().scroll_top, 300.0);
    assert_eq!(controller.active_paragraph(), Some(3));

    // The target panes' own scroll events arrive while the guard is up
    let echo = controller.on_scroll(
        &mut panes,
        PaneId::AiDraft,
        1.0,
        start + Duration::from_millis(10),
    );
    assert_eq!(echo, ScrollOutcome::Suppressed);

    controller.tick(start + Duration::from_millis(60));
    panes[2].set_scroll_top(0.0);
    let outcome = controller.on_scroll(
        &mut panes,
        PaneId::Translation,
        0.0,
        start + Duration::from_millis(70),
    );
    assert_eq!(
        outcome,
        ScrollOutcome::Synced {
            ratio: 0.0,
            active: Some(0)
        }
    );
    assert_eq!(panes[0].scroll_metrics().scroll_top, 0.0);
}

#[test]
fn test_scroll_moves_source_pane_before_resolving_active() {
    let (mut a, mut b, mut c) = three_panes();
    let mut controller = PaneSyncController::new(&SyncConfig::default());
    let mut panes: Vec<&mut dyn Pane> = vec![&mut a, &mut b, &mut c];
    controller.attach(&panes);

    // Source pane still sits at the top; only the reported ratio moved
    let outcome = controller.on_scroll(&mut panes, PaneId::AiDraft, 1.0, Instant::now());
    assert_eq!(
        outcome,
        ScrollOutcome::Synced {
            ratio: 1.0,
            active: Some(3)
        }
    );
    for pane in &panes {
        assert_eq!(pane.scroll_metrics().scroll_top, 300.0);
        assert_eq!(pane.paragraphs_with_class(PARAGRAPH_HIGHLIGHT), vec![3]);
    }
}

#[test]
fn test_two_pane_layout() {
    let tagged = markup::segment(FIVE_PARAGRAPHS, "original");
    let mut original = MarkupPane::with_content(PaneId::Original, metrics(), &tagged);
    let tagged = markup::segment(FIVE_PARAGRAPHS, "translation");
    let mut translation = MarkupPane::with_content(PaneId::Translation, metrics(), &tagged);

    let mut controller = PaneSyncController::new(&SyncConfig::default());
    let mut panes: Vec<&mut dyn Pane> = vec![&mut original, &mut translation];
    controller.attach(&panes);

    // No AI pane is attached, so its events go nowhere
    assert!(!controller.on_hover(&mut panes, PaneId::AiDraft, 1));
    assert!(controller.on_hover(&mut panes, PaneId::Translation, 1));
    assert_eq!(panes[0].paragraphs_with_class(PARAGRAPH_HIGHLIGHT), vec![1]);
}
