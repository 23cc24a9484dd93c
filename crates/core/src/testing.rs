//! Test doubles for the flow components.
//!
//! [`MockDriver`] models the remote surface as a set of currently-visible
//! descriptors plus reaction rules that mutate visibility when the flow
//! clicks or fills something. Waits resolve against current visibility
//! without sleeping, so bounded races degrade to single probes and test
//! runs stay instant.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{Condition, Descriptor, DriverOutcome, InteractiveDriver, KeyCombo};
use crate::error::Result;
use crate::session::{Cookie, SessionStore, StorageState};
use crate::two_factor::Prompt;

/// Visibility mutation applied when a reaction rule fires.
#[derive(Debug, Clone)]
pub enum Reaction {
    Show(Descriptor),
    Hide(Descriptor),
}

struct FillRule {
    target: Descriptor,
    /// Fire once the target has been filled this many times in total.
    after: usize,
    reactions: Vec<Reaction>,
    fired: bool,
}

#[derive(Default)]
struct MockState {
    visible: HashSet<String>,
    /// Hidden from instant probes; revealed by the next bounded wait that
    /// targets them.
    deferred: HashSet<String>,
    unreachable_urls: HashSet<String>,
    opened: Vec<String>,
    fills: Vec<(Descriptor, String)>,
    fill_counts: HashMap<String, usize>,
    clicks: Vec<Descriptor>,
    js_clicks: Vec<Descriptor>,
    keys: Vec<KeyCombo>,
    click_reactions: HashMap<String, Vec<Reaction>>,
    press_reactions: HashMap<KeyCombo, Vec<Reaction>>,
    fill_rules: Vec<FillRule>,
    surface_content: String,
    select_all_pending: bool,
    snapshot: Option<StorageState>,
    restored: Option<StorageState>,
}

fn key(d: &Descriptor) -> String {
    format!("{d:?}")
}

pub struct MockDriver {
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                snapshot: Some(StorageState {
                    cookies: vec![Cookie::new("auth_token", "mock")],
                    origins: vec![],
                }),
                ..MockState::default()
            }),
        }
    }

    pub fn show(&self, d: &Descriptor) {
        self.state.lock().unwrap().visible.insert(key(d));
    }

    pub fn hide(&self, d: &Descriptor) {
        self.state.lock().unwrap().visible.remove(&key(d));
    }

    /// Model an element that is still re-rendering: invisible to instant
    /// probes, visible as soon as a bounded wait targets it.
    pub fn reveal_on_wait(&self, d: &Descriptor) {
        self.state.lock().unwrap().deferred.insert(key(d));
    }

    pub fn set_unreachable(&self, url: &str) {
        self.state
            .lock()
            .unwrap()
            .unreachable_urls
            .insert(url.to_string());
    }

    /// When `target` is clicked (really or programmatically), apply
    /// `reactions`.
    pub fn on_click(&self, target: &Descriptor, reactions: Vec<Reaction>) {
        self.state
            .lock()
            .unwrap()
            .click_reactions
            .insert(key(target), reactions);
    }

    /// When `combo` is pressed, apply `reactions`.
    pub fn on_press(&self, combo: KeyCombo, reactions: Vec<Reaction>) {
        self.state
            .lock()
            .unwrap()
            .press_reactions
            .insert(combo, reactions);
    }

    /// Once `target` has been filled `after` times in total, apply
    /// `reactions` (once).
    pub fn on_fill_count(&self, target: &Descriptor, after: usize, reactions: Vec<Reaction>) {
        self.state.lock().unwrap().fill_rules.push(FillRule {
            target: target.clone(),
            after,
            reactions,
            fired: false,
        });
    }

    pub fn set_surface_content(&self, text: &str) {
        self.state.lock().unwrap().surface_content = text.to_string();
    }

    pub fn surface_content(&self) -> String {
        self.state.lock().unwrap().surface_content.clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn fills(&self) -> Vec<(Descriptor, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn clicks(&self) -> Vec<Descriptor> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn js_clicks(&self) -> Vec<Descriptor> {
        self.state.lock().unwrap().js_clicks.clone()
    }

    pub fn keys(&self) -> Vec<KeyCombo> {
        self.state.lock().unwrap().keys.clone()
    }

    pub fn restored(&self) -> Option<StorageState> {
        self.state.lock().unwrap().restored.clone()
    }

    fn apply(state: &mut MockState, reactions: &[Reaction]) {
        for reaction in reactions {
            match reaction {
                Reaction::Show(d) => {
                    state.visible.insert(key(d));
                }
                Reaction::Hide(d) => {
                    state.visible.remove(&key(d));
                }
            }
        }
    }

    fn register_click(&self, target: &Descriptor, programmatic: bool) -> DriverOutcome {
        let mut state = self.state.lock().unwrap();
        if !programmatic && !state.visible.contains(&key(target)) {
            return DriverOutcome::NotVisible;
        }
        if programmatic {
            state.js_clicks.push(target.clone());
        } else {
            state.clicks.push(target.clone());
        }
        if let Some(reactions) = state.click_reactions.get(&key(target)).cloned() {
            Self::apply(&mut state, &reactions);
        }
        DriverOutcome::Completed
    }
}

#[async_trait]
impl InteractiveDriver for MockDriver {
    async fn open(&self, url: &str) -> DriverOutcome {
        let mut state = self.state.lock().unwrap();
        state.opened.push(url.to_string());
        if state.unreachable_urls.contains(url) {
            DriverOutcome::NotVisible
        } else {
            DriverOutcome::Completed
        }
    }

    async fn first_visible(&self, candidates: &[Descriptor]) -> Option<usize> {
        let state = self.state.lock().unwrap();
        candidates
            .iter()
            .position(|c| state.visible.contains(&key(c)))
    }

    async fn wait_for_any(
        &self,
        conditions: &[Condition],
        _timeout: Duration,
    ) -> Option<&'static str> {
        let mut state = self.state.lock().unwrap();
        for c in conditions {
            if state.deferred.remove(&key(&c.target)) {
                state.visible.insert(key(&c.target));
            }
        }
        conditions
            .iter()
            .find(|c| state.visible.contains(&key(&c.target)))
            .map(|c| c.tag)
    }

    async fn fill(&self, target: &Descriptor, text: &str) -> DriverOutcome {
        let mut state = self.state.lock().unwrap();
        if !state.visible.contains(&key(target)) {
            return DriverOutcome::NotVisible;
        }
        state.fills.push((target.clone(), text.to_string()));
        let count = state.fill_counts.entry(key(target)).or_insert(0);
        *count += 1;
        let count = *count;

        let mut due = Vec::new();
        for rule in &mut state.fill_rules {
            if !rule.fired && key(&rule.target) == key(target) && count >= rule.after {
                rule.fired = true;
                due.extend(rule.reactions.clone());
            }
        }
        Self::apply(&mut state, &due);
        DriverOutcome::Completed
    }

    async fn click(&self, target: &Descriptor) -> DriverOutcome {
        self.register_click(target, false)
    }

    async fn click_js(&self, target: &Descriptor) -> DriverOutcome {
        self.register_click(target, true)
    }

    async fn focus(&self, target: &Descriptor) -> DriverOutcome {
        let state = self.state.lock().unwrap();
        if state.visible.contains(&key(target)) {
            DriverOutcome::Completed
        } else {
            DriverOutcome::NotVisible
        }
    }

    async fn press(&self, combo: KeyCombo) -> DriverOutcome {
        let mut state = self.state.lock().unwrap();
        state.keys.push(combo);
        match combo {
            KeyCombo::SelectAll => state.select_all_pending = true,
            KeyCombo::DeleteSelection => {
                if state.select_all_pending {
                    state.surface_content.clear();
                    state.select_all_pending = false;
                }
            }
            _ => {}
        }
        if let Some(reactions) = state.press_reactions.get(&combo).cloned() {
            Self::apply(&mut state, &reactions);
        }
        DriverOutcome::Completed
    }

    async fn insert_text(&self, text: &str) -> DriverOutcome {
        let mut state = self.state.lock().unwrap();
        state.surface_content.push_str(text);
        DriverOutcome::Completed
    }

    async fn evaluate(&self, _script: &str) -> Option<serde_json::Value> {
        Some(serde_json::Value::Bool(true))
    }

    async fn storage_state(&self) -> Option<StorageState> {
        self.state.lock().unwrap().snapshot.clone()
    }

    async fn restore(&self, state: &StorageState) {
        self.state.lock().unwrap().restored = Some(state.clone());
    }

    async fn pause(&self, _duration: Duration) {}
}

/// In-memory session store that counts saves.
#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<Option<StorageState>>,
    saves: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StorageState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<StorageState> {
        self.state.lock().unwrap().clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<StorageState> {
        self.state.lock().unwrap().clone()
    }

    fn save(&self, state: &StorageState) -> Result<()> {
        *self.state.lock().unwrap() = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Prompt that answers from a fixed script and records every question.
pub struct ScriptedPrompt {
    answers: Mutex<Vec<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn read_line(&self, question: &str) -> std::io::Result<String> {
        self.questions.lock().unwrap().push(question.to_string());
        Ok(self.answers.lock().unwrap().pop().unwrap_or_default())
    }
}
