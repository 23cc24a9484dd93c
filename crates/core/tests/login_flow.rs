//! Login state machine scenarios against the scripted mock driver.

use xpost::testing::{MemorySessionStore, MockDriver, Reaction, ScriptedPrompt};
use xpost::{Identity, LoginState, LoginStateMachine, Policy, TwoFactorResolver, XpostError};
use xpost::ui;

fn identity() -> Identity {
    Identity {
        username: "operator".into(),
        password: "pw".into(),
        ..Identity::default()
    }
}

fn machine<'a>(
    driver: &'a MockDriver,
    store: &'a MemorySessionStore,
    prompt: &'a ScriptedPrompt,
    policy: &'a Policy,
) -> LoginStateMachine<'a> {
    LoginStateMachine::new(driver, store, TwoFactorResolver::new(prompt), policy)
}

/// Wire up a visible single-step (mobile) form.
fn show_single_step_form(driver: &MockDriver) {
    driver.show(&ui::ANY_IDENTIFIER_INPUT);
    driver.show(&ui::MOBILE_USERNAME_INPUT);
    driver.show(&ui::MOBILE_PASSWORD_INPUT);
    driver.show(&ui::MOBILE_LOGIN_BUTTONS[0]);
}

#[tokio::test]
async fn single_step_login_reaches_home_and_saves_once() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    show_single_step_form(&driver);
    driver.on_click(
        &ui::MOBILE_LOGIN_BUTTONS[0],
        vec![
            Reaction::Hide(ui::MOBILE_USERNAME_INPUT),
            Reaction::Hide(ui::MOBILE_PASSWORD_INPUT),
            Reaction::Show(ui::HOME_INDICATORS[0].clone()),
        ],
    );

    let mut machine = machine(&driver, &store, &prompt, &policy);
    machine.run(&identity()).await.unwrap();

    assert_eq!(machine.state(), LoginState::Home);
    assert_eq!(store.save_count(), 1);
    assert!(store.stored().is_some());

    let fills = driver.fills();
    assert!(fills
        .iter()
        .any(|(d, v)| *d == ui::MOBILE_USERNAME_INPUT && v == "operator"));
    assert!(fills
        .iter()
        .any(|(d, v)| *d == ui::MOBILE_PASSWORD_INPUT && v == "pw"));
}

#[tokio::test]
async fn multi_step_login_passes_interposed_identifier_twice() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    driver.show(&ui::ANY_IDENTIFIER_INPUT);
    driver.show(&ui::IDENTIFIER_INPUTS[0]);
    driver.show(&ui::INTERPOSED_IDENTIFIER);
    // The service re-asks for the identifier twice; the password field only
    // appears after the third submission.
    driver.on_fill_count(
        &ui::INTERPOSED_IDENTIFIER,
        3,
        vec![
            Reaction::Hide(ui::INTERPOSED_IDENTIFIER),
            Reaction::Show(ui::PASSWORD_INPUT),
        ],
    );
    driver.on_fill_count(
        &ui::PASSWORD_INPUT,
        1,
        vec![
            Reaction::Hide(ui::PASSWORD_INPUT),
            Reaction::Show(ui::HOME_INDICATORS[0].clone()),
        ],
    );

    let mut machine = machine(&driver, &store, &prompt, &policy);
    machine.run(&identity()).await.unwrap();

    assert_eq!(machine.state(), LoginState::Home);
    assert_eq!(store.save_count(), 1);

    let identifier_fills = driver
        .fills()
        .iter()
        .filter(|(d, _)| *d == ui::INTERPOSED_IDENTIFIER)
        .count();
    assert_eq!(identifier_fills, 3);
}

#[tokio::test]
async fn password_discovery_is_bounded() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    // The identifier prompt never gives way to a password field.
    driver.show(&ui::ANY_IDENTIFIER_INPUT);
    driver.show(&ui::IDENTIFIER_INPUTS[0]);
    driver.show(&ui::INTERPOSED_IDENTIFIER);

    let mut machine = machine(&driver, &store, &prompt, &policy);
    let err = machine.run(&identity()).await.unwrap_err();

    assert!(matches!(
        err,
        XpostError::PasswordStepUnreachable { attempts: 3 }
    ));
    assert_eq!(machine.state(), LoginState::Failed);
    assert_eq!(store.save_count(), 0);

    // Initial submission plus exactly three bounded re-submissions.
    let identifier_fills = driver
        .fills()
        .iter()
        .filter(|(d, _)| *d == ui::INTERPOSED_IDENTIFIER)
        .count();
    assert_eq!(identifier_fills, 4);
}

#[tokio::test]
async fn no_entry_url_reachable_is_form_unreachable() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    for url in ui::LOGIN_URLS {
        driver.set_unreachable(url);
    }

    let mut machine = machine(&driver, &store, &prompt, &policy);
    let err = machine.run(&identity()).await.unwrap_err();

    assert!(matches!(err, XpostError::FormUnreachable));
    assert_eq!(machine.state(), LoginState::Failed);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn reachable_url_without_identifier_input_is_form_unreachable() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    let mut machine = machine(&driver, &store, &prompt, &policy);
    let err = machine.run(&identity()).await.unwrap_err();

    assert!(matches!(err, XpostError::FormUnreachable));
    // All three entry URLs were tried in order.
    assert_eq!(driver.opened(), ui::LOGIN_URLS.to_vec());
}

#[tokio::test]
async fn neither_home_nor_second_factor_is_login_timeout() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    // Credentials go in but the page never resolves to anything known.
    show_single_step_form(&driver);

    let mut machine = machine(&driver, &store, &prompt, &policy);
    let err = machine.run(&identity()).await.unwrap_err();

    assert!(matches!(err, XpostError::LoginTimeout));
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn explicit_code_is_written_verbatim_into_second_factor_input() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    show_single_step_form(&driver);
    driver.on_click(
        &ui::MOBILE_LOGIN_BUTTONS[0],
        vec![
            Reaction::Show(ui::SECOND_FACTOR_PROMPT),
            Reaction::Show(ui::SECOND_FACTOR_INPUT),
        ],
    );
    driver.show(&ui::VERIFY_BUTTON);
    driver.on_click(
        &ui::VERIFY_BUTTON,
        vec![
            Reaction::Hide(ui::SECOND_FACTOR_INPUT),
            Reaction::Hide(ui::SECOND_FACTOR_PROMPT),
            Reaction::Show(ui::HOME_INDICATORS[0].clone()),
        ],
    );

    let mut machine = machine(&driver, &store, &prompt, &policy);
    let identity = Identity {
        explicit_code: Some("123456".into()),
        ..identity()
    };
    machine.run(&identity).await.unwrap();

    assert_eq!(machine.state(), LoginState::Home);
    assert_eq!(store.save_count(), 1);
    assert!(driver
        .fills()
        .iter()
        .any(|(d, v)| *d == ui::SECOND_FACTOR_INPUT && v == "123456"));
    // The interactive prompt was never consulted.
    assert!(prompt.questions().is_empty());
}

#[tokio::test]
async fn second_factor_without_home_afterwards_fails() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    show_single_step_form(&driver);
    driver.on_click(
        &ui::MOBILE_LOGIN_BUTTONS[0],
        vec![Reaction::Show(ui::SECOND_FACTOR_INPUT)],
    );
    // Verification is submitted but home never appears.

    let mut machine = machine(&driver, &store, &prompt, &policy);
    let identity = Identity {
        explicit_code: Some("000000".into()),
        ..identity()
    };
    let err = machine.run(&identity).await.unwrap_err();

    assert!(matches!(err, XpostError::TwoFactorFailed(_)));
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn variant_detection_prefers_single_step_when_both_fields_present() {
    let driver = MockDriver::new();
    let store = MemorySessionStore::new();
    let prompt = ScriptedPrompt::new(&[]);
    let policy = Policy::default();

    show_single_step_form(&driver);
    driver.on_click(
        &ui::MOBILE_LOGIN_BUTTONS[0],
        vec![Reaction::Show(ui::HOME_INDICATORS[0].clone())],
    );

    let mut machine = machine(&driver, &store, &prompt, &policy);
    machine.run(&identity()).await.unwrap();

    // Single-step submits credentials without the identifier-first dance.
    assert!(!driver
        .fills()
        .iter()
        .any(|(d, _)| *d == ui::INTERPOSED_IDENTIFIER));
    assert_eq!(machine.state(), LoginState::Home);
}
