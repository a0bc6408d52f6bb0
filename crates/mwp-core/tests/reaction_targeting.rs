//! Integration tests for the path from a detector's output to the intent
//! that answers it, exercised through the public API only.

use std::time::Duration;

use mwp_core::{
    nearest_detection, Detection, DetectionCriteria, HidKeyCode, InjectionIntent, InputStep,
    IntentAction, MouseButton, Point, Rect, WindowHandle, WindowId,
};

fn window() -> WindowHandle {
    WindowHandle::new(WindowId(0xBEEF), Rect::new(100, 50, 800, 600), "Realm #1", "game.exe")
}

#[test]
fn test_only_positive_matches_are_candidates_and_nearest_is_targeted() {
    // Arrange
    let w = window();
    let criteria = DetectionCriteria {
        labels: vec!["item".to_string()],
        threshold: 0.8,
        early_exit: false,
    };
    let raw = vec![
        Detection::new("enemy", 0.99, Rect::new(395, 295, 10, 10)), // closest but wrong label
        Detection::new("item", 0.50, Rect::new(405, 305, 10, 10)),  // right label, too weak
        Detection::new("item", 0.95, Rect::new(600, 500, 20, 20)),
        Detection::new("item", 0.85, Rect::new(450, 340, 20, 20)),
    ];

    // Act
    let positives: Vec<Detection> = raw.into_iter().filter(|d| criteria.is_match(d)).collect();
    let idx = nearest_detection(&positives, w.reference_point()).expect("two positives");
    let target = positives[idx].target_point();

    // Assert
    assert_eq!(positives.len(), 2);
    assert_eq!(target, Point::new(460, 350));
    assert_eq!(w.to_screen(target), Point::new(560, 400));
}

#[test]
fn test_approach_move_intent_targets_detection_center_with_held_modifier() {
    // Arrange
    let w = window();
    let d = Detection::new("item", 0.9, Rect::new(200, 100, 40, 40));

    // Act
    let intent = InjectionIntent::new(
        w.id,
        IntentAction::Click { button: MouseButton::Left, at: d.target_point() },
    )
    .with_modifier(HidKeyCode::ControlLeft)
    .with_hold(Duration::from_millis(500));
    let steps = intent.steps();

    // Assert
    assert_eq!(intent.window(), WindowId(0xBEEF));
    assert_eq!(steps[1], InputStep::MoveTo(Point::new(220, 120)));
    assert_eq!(
        steps.iter().filter(|s| matches!(s, InputStep::KeyDown(_))).count(),
        steps.iter().filter(|s| matches!(s, InputStep::KeyUp(_))).count(),
        "every pressed key must be released"
    );
}
