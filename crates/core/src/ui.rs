//! Descriptor tables for the target service UI.
//!
//! The service exposes no stable API; these ordered candidate lists are the
//! whole contract. Order matters: the first visible match wins, so the most
//! specific descriptors come first and the loosest fallbacks last.

use crate::driver::Descriptor;

/// Login entry points, tried in order until one shows an identifier input.
pub const LOGIN_URLS: [&str; 3] = [
    "https://x.com/i/flow/login",
    "https://x.com/login",
    "https://mobile.x.com/login",
];

pub const HOME_URL: &str = "https://x.com/home";

/// Any of these visible means an authenticated home surface.
pub const HOME_INDICATORS: [Descriptor; 3] = [
    Descriptor::Css(
        "[data-testid=\"SideNav_NewTweet_Button\"], [data-testid=\"tweetTextarea_0\"]",
    ),
    Descriptor::Css("[data-testid=\"AppTabBar_Profile_Link\"]"),
    Descriptor::Css("[data-testid=\"primaryColumn\"]"),
];

/// Identifier inputs across the known form variants, including the
/// interposed confirmation input the service shows when it suspects fraud.
pub const IDENTIFIER_INPUTS: [Descriptor; 3] = [
    Descriptor::Css("input[name=\"text\"]"),
    Descriptor::Css("input[autocomplete=\"username\"]"),
    Descriptor::Css("input[data-testid=\"ocfEnterTextTextInput\"]"),
];

/// Union probe for the interposed identifier-echo step, raced against the
/// password input during password-step discovery.
pub const INTERPOSED_IDENTIFIER: Descriptor = Descriptor::Css(
    "input[name=\"text\"], input[autocomplete=\"username\"], \
     input[data-testid=\"ocfEnterTextTextInput\"]",
);

/// Broadest identifier probe used while deciding whether a form loaded at
/// all; covers the legacy mobile variant too.
pub const ANY_IDENTIFIER_INPUT: Descriptor = Descriptor::Css(
    "input[autocomplete=\"username\"], input[name=\"text\"], \
     input[name=\"session[username_or_email]\"]",
);

pub const PASSWORD_INPUT: Descriptor = Descriptor::Css(
    "input[type=\"password\"], input[name=\"password\"], \
     input[autocomplete=\"current-password\"]",
);

/// Single-step (mobile) form: both credential fields on one page.
pub const MOBILE_USERNAME_INPUT: Descriptor =
    Descriptor::Css("input[name=\"session[username_or_email]\"]");
pub const MOBILE_PASSWORD_INPUT: Descriptor =
    Descriptor::Css("input[name=\"session[password]\"]");
pub const MOBILE_LOGIN_BUTTONS: [Descriptor; 2] = [
    Descriptor::Role {
        role: "button",
        name: "log in",
    },
    Descriptor::Css("[data-testid=\"LoginForm_Login_Button\"]"),
];

/// Pre-form acknowledgement control some entry pages interpose.
pub const RETRY_BUTTON: Descriptor = Descriptor::Role {
    role: "button",
    name: "retry",
};

/// Throttling / soft-error banner that warrants a back-off before retrying
/// the identifier step.
pub const THROTTLE_BANNER: Descriptor = Descriptor::Text("could not log you in|try again later");

pub const NEXT_BUTTONS: [Descriptor; 2] = [
    Descriptor::Role {
        role: "button",
        name: "next|continue|log in",
    },
    Descriptor::Css("[data-testid=\"ocfEnterTextNextButton\"]"),
];

pub const LOGIN_BUTTON: Descriptor = Descriptor::Role {
    role: "button",
    name: "log in",
};

/// Second-factor step: a short free-text input or a verification prompt.
pub const SECOND_FACTOR_INPUT: Descriptor = Descriptor::Css("input[name=\"text\"]");
pub const SECOND_FACTOR_PROMPT: Descriptor =
    Descriptor::Text("verification code|two[- ]?factor");
pub const VERIFY_BUTTON: Descriptor = Descriptor::Role {
    role: "button",
    name: "next|verify|confirm|log in",
};

/// Composer triggers across desktop and app-bar layouts.
pub const COMPOSE_TRIGGERS: [Descriptor; 6] = [
    Descriptor::Css("[data-testid=\"SideNav_NewTweet_Button\"]"),
    Descriptor::Css("[data-testid=\"DashButton_Profile_SidebarCompose\"]"),
    Descriptor::Css("[data-testid=\"app-bar-new-tweet-button\"]"),
    Descriptor::Css("[data-testid=\"AppTabBar_ComposeButton\"]"),
    Descriptor::Css("[data-testid=\"toolBarComposeButton\"]"),
    Descriptor::Css("[data-testid=\"compositionButton\"]"),
];

/// Writable content surface, most specific first, bare `role=textbox` last.
pub const COMPOSER_SURFACES: [Descriptor; 7] = [
    Descriptor::Css("div[data-testid=\"tweetTextarea_0\"] div[role=\"textbox\"]"),
    Descriptor::Css("div[role=\"textbox\"][data-testid=\"tweetTextarea_0\"]"),
    Descriptor::Css("div[data-testid=\"tweetTextarea_0\"]"),
    Descriptor::Css("div[data-testid=\"tweetTextarea_1\"]"),
    Descriptor::Css("div[role=\"textbox\"][data-testid^=\"tweetTextarea_\"]"),
    Descriptor::Css("div[role=\"textbox\"][aria-label*=\"What\"]"),
    Descriptor::Css("div[role=\"textbox\"]"),
];

/// Enabled submit controls only; disabled variants are excluded so the
/// secondary path never clicks a dead button.
pub const SEND_BUTTONS: Descriptor = Descriptor::Css(
    "[data-testid=\"tweetButtonInline\"]:not([disabled]):not([aria-disabled=\"true\"]), \
     [data-testid=\"tweetButtonInlineComposer\"]:not([disabled]):not([aria-disabled=\"true\"]), \
     [data-testid=\"tweetButton\"]:not([disabled]):not([aria-disabled=\"true\"])",
);

/// Save-draft style confirmation dialog and its ranked resolution controls.
pub const DRAFT_PROMPT: Descriptor = Descriptor::Text("save post");
pub const DIALOG_SEND_NOW: Descriptor = Descriptor::Role {
    role: "button",
    name: "send now|post now|post",
};
pub const DIALOG_DISCARD: Descriptor = Descriptor::Role {
    role: "button",
    name: "don't save|discard",
};
pub const DIALOG_CANCEL: Descriptor = Descriptor::Role {
    role: "button",
    name: "cancel",
};
pub const DIALOG_ANY_BUTTON: Descriptor =
    Descriptor::Css("[role=\"dialog\"] [role=\"button\"]");
pub const PAGE_ANY_BUTTON: Descriptor = Descriptor::Css("[role=\"button\"]");

/// Known transient obstructions, clicked closed in order.
pub const OVERLAY_CLOSERS: [Descriptor; 8] = [
    Descriptor::Css("[data-testid=\"app-bar-close\"]"),
    Descriptor::Css("[aria-label=\"Close\"]"),
    Descriptor::Css("[data-testid=\"close\"]"),
    Descriptor::Css("[data-testid=\"confirmationSheetConfirm\"]"),
    Descriptor::Css("[data-testid=\"confirmationSheetCancel\"]"),
    Descriptor::Css("[data-testid=\"dialog\"] button"),
    Descriptor::Css("[data-testid=\"sheetDialog\"] button"),
    Descriptor::Css("[data-testid=\"twc-cc-mask\"] + div [data-testid]"),
];

/// Removes residual full-viewport masks and neutralizes pointer interception
/// on the root overlay container. Run after the click-based pass.
pub const STRIP_OVERLAYS_JS: &str = r#"
(() => {
  document.querySelectorAll('[data-testid="twc-cc-mask"]').forEach((el) => el.remove());
  document
    .querySelectorAll('#layers > div[role="presentation"], #layers [style*="pointer-events"]')
    .forEach((el) => el.remove());
  const layers = document.getElementById('layers');
  if (layers) {
    layers.style.pointerEvents = 'none';
  }
  return true;
})()
"#;
