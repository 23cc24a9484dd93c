//! Submission protocol scenarios against the scripted mock driver.

use xpost::testing::{MockDriver, Reaction};
use xpost::ui;
use xpost::{KeyCombo, Policy, SubmissionProtocol, XpostError};

fn surface() -> xpost::Descriptor {
    ui::COMPOSER_SURFACES[0].clone()
}

#[tokio::test]
async fn submit_chord_closing_the_composer_is_success() {
    let driver = MockDriver::new();
    let policy = Policy::default();

    driver.show(&surface());
    driver.on_press(KeyCombo::Submit, vec![Reaction::Hide(surface())]);

    SubmissionProtocol::new(&driver, &policy)
        .run("hello world")
        .await
        .unwrap();

    assert_eq!(driver.surface_content(), "hello world");
    // Primary path sufficed; the secondary button click never ran.
    assert!(driver.js_clicks().is_empty());
}

#[tokio::test]
async fn trigger_click_opens_the_composer() {
    let driver = MockDriver::new();
    let policy = Policy::default();

    driver.show(&ui::COMPOSE_TRIGGERS[2]);
    driver.on_click(
        &ui::COMPOSE_TRIGGERS[2],
        vec![Reaction::Show(surface())],
    );
    driver.on_press(KeyCombo::Submit, vec![Reaction::Hide(surface())]);

    SubmissionProtocol::new(&driver, &policy)
        .run("post body")
        .await
        .unwrap();

    assert!(driver.clicks().contains(&ui::COMPOSE_TRIGGERS[2]));
    // The keyboard-shortcut fallback was not needed.
    assert!(!driver.keys().contains(&KeyCombo::Char('n')));
}

#[tokio::test]
async fn missing_surface_is_composer_unavailable_after_shortcut_fallback() {
    let driver = MockDriver::new();
    let policy = Policy::default();

    let err = SubmissionProtocol::new(&driver, &policy)
        .run("post body")
        .await
        .unwrap_err();

    assert!(matches!(err, XpostError::ComposerUnavailable));
    // No trigger was visible, so the shortcut was tried best-effort.
    assert!(driver.keys().contains(&KeyCombo::Char('n')));
}

#[tokio::test]
async fn write_is_idempotent_across_prior_surface_states() {
    let driver = MockDriver::new();
    let policy = Policy::default();
    let protocol = SubmissionProtocol::new(&driver, &policy);
    driver.show(&surface());

    driver.set_surface_content("half-typed draft from last time");
    protocol.write_content(&surface(), "the final text").await;
    assert_eq!(driver.surface_content(), "the final text");

    driver.set_surface_content("completely different leftovers");
    protocol.write_content(&surface(), "the final text").await;
    assert_eq!(driver.surface_content(), "the final text");

    // Full replace: select-all then delete precede the insert.
    let keys = driver.keys();
    let select = keys.iter().position(|k| *k == KeyCombo::SelectAll).unwrap();
    let delete = keys
        .iter()
        .position(|k| *k == KeyCombo::DeleteSelection)
        .unwrap();
    assert!(select < delete);
}

#[tokio::test]
async fn secondary_send_path_runs_exactly_once() {
    let driver = MockDriver::new();
    let policy = Policy::default();

    // The submit chord does nothing; the enabled send button works.
    driver.show(&surface());
    driver.show(&ui::SEND_BUTTONS);
    driver.on_click(&ui::SEND_BUTTONS, vec![Reaction::Hide(surface())]);

    SubmissionProtocol::new(&driver, &policy)
        .run("needs the button")
        .await
        .unwrap();

    assert_eq!(driver.js_clicks(), vec![ui::SEND_BUTTONS]);
}

#[tokio::test]
async fn send_button_appearing_after_the_chord_is_still_clicked() {
    let driver = MockDriver::new();
    let policy = Policy::default();

    // The chord does nothing and the send control is still re-rendering
    // when the secondary path starts looking for it; the bounded wait must
    // pick it up anyway.
    driver.show(&surface());
    driver.reveal_on_wait(&ui::SEND_BUTTONS);
    driver.on_click(&ui::SEND_BUTTONS, vec![Reaction::Hide(surface())]);

    SubmissionProtocol::new(&driver, &policy)
        .run("late button")
        .await
        .unwrap();

    assert_eq!(driver.js_clicks(), vec![ui::SEND_BUTTONS]);
}

#[tokio::test]
async fn surface_surviving_both_paths_is_submission_incomplete() {
    let driver = MockDriver::new();
    let policy = Policy::default();

    driver.show(&surface());
    driver.show(&ui::SEND_BUTTONS);
    // Neither the chord nor the button click closes the composer.

    let err = SubmissionProtocol::new(&driver, &policy)
        .run("never goes out")
        .await
        .unwrap_err();

    assert!(matches!(err, XpostError::SubmissionIncomplete));
    // The secondary path was attempted exactly once, not retried.
    assert_eq!(driver.js_clicks().len(), 1);
}

#[tokio::test]
async fn dialog_resolution_prefers_send_now() {
    let driver = MockDriver::new();
    let policy = Policy::default();
    let protocol = SubmissionProtocol::new(&driver, &policy);

    driver.show(&ui::DRAFT_PROMPT);
    driver.show(&ui::DIALOG_SEND_NOW);
    driver.show(&ui::DIALOG_CANCEL);

    protocol.resolve_confirmation_dialog().await;

    assert_eq!(driver.clicks(), vec![ui::DIALOG_SEND_NOW]);
}

#[tokio::test]
async fn dialog_with_only_an_unrecognized_control_still_resolves() {
    let driver = MockDriver::new();
    let policy = Policy::default();
    let protocol = SubmissionProtocol::new(&driver, &policy);

    // A dialog the flow has never seen: no send/discard/cancel, just one
    // actionable control inside it.
    driver.show(&ui::DRAFT_PROMPT);
    driver.show(&ui::DIALOG_ANY_BUTTON);

    protocol.resolve_confirmation_dialog().await;

    assert_eq!(driver.clicks(), vec![ui::DIALOG_ANY_BUTTON]);
}

#[tokio::test]
async fn absent_dialog_clicks_nothing() {
    let driver = MockDriver::new();
    let policy = Policy::default();
    let protocol = SubmissionProtocol::new(&driver, &policy);

    protocol.resolve_confirmation_dialog().await;

    assert!(driver.clicks().is_empty());
}
