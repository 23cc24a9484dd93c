//! Chromium-backed implementation of the interactive driver.
//!
//! Element lookup and visibility run as in-page script probes; input goes
//! through CDP input dispatch so the page sees trusted-looking events.
//! Every primitive swallows transport-level noise and reports absence,
//! matching the driver contract.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, trace, warn};

use xpost::session::{LocalStorageEntry, OriginState};
use xpost::{Condition, Descriptor, DriverOutcome, InteractiveDriver, KeyCombo, StorageState};

/// Poll interval for visibility probes inside bounded waits.
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Hide the automation tell before any page script runs.
const MASK_WEBDRIVER_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

pub struct LaunchOptions {
    pub headless: bool,
    pub user_agent: &'static str,
    pub chrome: Option<PathBuf>,
}

pub struct CdpDriver {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    page: Page,
    /// Origin-keyed localStorage waiting to be applied once the matching
    /// origin is actually loaded.
    pending_storage: Mutex<Vec<OriginState>>,
}

impl CdpDriver {
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let chrome = match options.chrome {
            Some(path) => path,
            None => find_chrome().context(
                "Chrome/Chromium not found; install it or pass --chrome",
            )?,
        };
        debug!(target = "xpost", chrome = %chrome.display(), headless = options.headless, "launching browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .viewport(None)
            .window_size(1280, 720)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to configure browser: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser.new_page("about:blank").await?;
        let mask = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(MASK_WEBDRIVER_JS)
            .build()
            .map_err(|e| anyhow::anyhow!("bad init script: {e}"))?;
        page.execute(mask).await?;
        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(options.user_agent)
            .build()
            .map_err(|e| anyhow::anyhow!("bad user-agent override: {e}"))?;
        page.execute(ua).await?;

        Ok(Self {
            browser,
            handler_task,
            page,
            pending_storage: Mutex::new(Vec::new()),
        })
    }

    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        self.handler_task.abort();
    }

    async fn probe(&self, target: &Descriptor) -> bool {
        matches!(
            self.eval_value(&action_script(target, "return true;")).await,
            Some(serde_json::Value::Bool(true))
        )
    }

    async fn eval_value(&self, script: &str) -> Option<serde_json::Value> {
        match self.page.evaluate(script).await {
            Ok(result) => result.into_value().ok(),
            Err(err) => {
                trace!(target = "xpost", error = %err, "evaluation failed");
                None
            }
        }
    }

    /// Center of the first visible match, for real pointer dispatch.
    async fn center_of(&self, target: &Descriptor) -> Option<(f64, f64)> {
        let script = action_script(
            target,
            "el.scrollIntoView({ block: 'center' }); \
             const r = el.getBoundingClientRect(); \
             return { x: r.x + r.width / 2, y: r.y + r.height / 2 };",
        );
        let value = self.eval_value(&script).await?;
        let x = value.get("x")?.as_f64()?;
        let y = value.get("y")?.as_f64()?;
        Some((x, y))
    }

    async fn dispatch_mouse(&self, x: f64, y: f64) -> bool {
        let events = [
            (DispatchMouseEventType::MouseMoved, None),
            (DispatchMouseEventType::MousePressed, Some(MouseButton::Left)),
            (DispatchMouseEventType::MouseReleased, Some(MouseButton::Left)),
        ];
        for (kind, button) in events {
            let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
            if let Some(button) = button {
                builder = builder.button(button).click_count(1);
            }
            let params = match builder.build() {
                Ok(params) => params,
                Err(_) => return false,
            };
            if self.page.execute(params).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn dispatch_key(&self, key: &str, modifiers: i64) -> bool {
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let params = match DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key)
                .modifiers(modifiers)
                .build()
            {
                Ok(params) => params,
                Err(_) => return false,
            };
            if self.page.execute(params).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn dispatch_char(&self, c: char) -> bool {
        let params = match DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text(c.to_string())
            .build()
        {
            Ok(params) => params,
            Err(_) => return false,
        };
        self.page.execute(params).await.is_ok()
    }

    /// Apply any stashed localStorage entries for the origin we just landed
    /// on. Cookies go in globally; storage needs its origin loaded first.
    async fn apply_pending_storage(&self) {
        let pending = {
            let guard = self.pending_storage.lock().unwrap();
            guard.clone()
        };
        if pending.is_empty() {
            return;
        }
        for origin in &pending {
            let entries = serde_json::to_string(&origin.local_storage).unwrap_or_default();
            let script = format!(
                r#"(() => {{
  if (location.origin !== {origin}) return false;
  for (const entry of {entries}) {{
    try {{ localStorage.setItem(entry.name, entry.value); }} catch (e) {{}}
  }}
  return true;
}})()"#,
                origin = serde_json::Value::String(origin.origin.clone()),
            );
            if let Some(serde_json::Value::Bool(true)) = self.eval_value(&script).await {
                let mut guard = self.pending_storage.lock().unwrap();
                guard.retain(|o| o.origin != origin.origin);
            }
        }
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl InteractiveDriver for CdpDriver {
    async fn open(&self, url: &str) -> DriverOutcome {
        match self.page.goto(url).await {
            Ok(_) => {
                self.apply_pending_storage().await;
                DriverOutcome::Completed
            }
            Err(err) => {
                debug!(target = "xpost", %url, error = %err, "navigation failed");
                DriverOutcome::NotVisible
            }
        }
    }

    async fn first_visible(&self, candidates: &[Descriptor]) -> Option<usize> {
        for (idx, candidate) in candidates.iter().enumerate() {
            if self.probe(candidate).await {
                return Some(idx);
            }
        }
        None
    }

    async fn wait_for_any(
        &self,
        conditions: &[Condition],
        timeout: Duration,
    ) -> Option<&'static str> {
        let deadline = Instant::now() + timeout;
        loop {
            for condition in conditions {
                if self.probe(&condition.target).await {
                    return Some(condition.tag);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    async fn fill(&self, target: &Descriptor, text: &str) -> DriverOutcome {
        // Focus and clear in-page, then insert through CDP so the page sees
        // a real input event stream.
        let prep = action_script(
            target,
            "el.focus(); \
             if ('value' in el) { \
               el.value = ''; \
               el.dispatchEvent(new Event('input', { bubbles: true })); \
             } else { \
               window.getSelection().selectAllChildren(el); \
             } \
             return true;",
        );
        if !matches!(
            self.eval_value(&prep).await,
            Some(serde_json::Value::Bool(true))
        ) {
            return DriverOutcome::NotVisible;
        }
        self.insert_text(text).await
    }

    async fn click(&self, target: &Descriptor) -> DriverOutcome {
        let Some((x, y)) = self.center_of(target).await else {
            return DriverOutcome::NotVisible;
        };
        if self.dispatch_mouse(x, y).await {
            DriverOutcome::Completed
        } else {
            DriverOutcome::SurfaceChanged
        }
    }

    async fn click_js(&self, target: &Descriptor) -> DriverOutcome {
        match self
            .eval_value(&action_script(target, "el.click(); return true;"))
            .await
        {
            Some(serde_json::Value::Bool(true)) => DriverOutcome::Completed,
            _ => DriverOutcome::NotVisible,
        }
    }

    async fn focus(&self, target: &Descriptor) -> DriverOutcome {
        match self
            .eval_value(&action_script(target, "el.focus(); return true;"))
            .await
        {
            Some(serde_json::Value::Bool(true)) => DriverOutcome::Completed,
            _ => DriverOutcome::NotVisible,
        }
    }

    async fn press(&self, combo: KeyCombo) -> DriverOutcome {
        let modifier = if cfg!(target_os = "macos") { 4 } else { 2 };
        let ok = match combo {
            KeyCombo::SelectAll => self.dispatch_key("a", modifier).await,
            KeyCombo::DeleteSelection => self.dispatch_key("Backspace", 0).await,
            KeyCombo::Enter => self.dispatch_key("Enter", 0).await,
            KeyCombo::Submit => self.dispatch_key("Enter", modifier).await,
            KeyCombo::Char(c) => self.dispatch_char(c).await,
        };
        if ok {
            DriverOutcome::Completed
        } else {
            DriverOutcome::SurfaceChanged
        }
    }

    async fn insert_text(&self, text: &str) -> DriverOutcome {
        let params = match InsertTextParams::builder().text(text).build() {
            Ok(params) => params,
            Err(_) => return DriverOutcome::SurfaceChanged,
        };
        match self.page.execute(params).await {
            Ok(_) => DriverOutcome::Completed,
            Err(err) => {
                trace!(target = "xpost", error = %err, "insert_text failed");
                DriverOutcome::SurfaceChanged
            }
        }
    }

    async fn evaluate(&self, script: &str) -> Option<serde_json::Value> {
        self.eval_value(script).await
    }

    async fn storage_state(&self) -> Option<StorageState> {
        let cookies = match self.page.get_cookies().await {
            Ok(cookies) => cookies,
            Err(err) => {
                warn!(target = "xpost", error = %err, "cookie capture failed");
                return None;
            }
        };
        let cookies = cookies
            .into_iter()
            .map(|c| xpost::Cookie {
                name: c.name,
                value: c.value,
                domain: Some(c.domain),
                path: Some(c.path),
                expires: cookie_expiry(c.expires),
                http_only: Some(c.http_only),
                secure: Some(c.secure),
                same_site: c.same_site.map(|s| format!("{s:?}")),
            })
            .collect();

        let origins = match self.eval_value(LOCAL_STORAGE_SNAPSHOT_JS).await {
            Some(value) => origin_from_snapshot(value).into_iter().collect(),
            None => Vec::new(),
        };

        Some(StorageState { cookies, origins })
    }

    async fn restore(&self, state: &StorageState) {
        let cookies: Vec<CookieParam> = state
            .cookies
            .iter()
            .map(|c| {
                let mut cookie = CookieParam::new(c.name.clone(), c.value.clone());
                cookie.domain = c.domain.clone();
                cookie.path = c.path.clone();
                cookie.expires = c.expires.map(TimeSinceEpoch::new);
                cookie.secure = c.secure;
                cookie.http_only = c.http_only;
                if cookie.domain.is_none() {
                    cookie.url = Some("https://x.com".to_string());
                }
                cookie
            })
            .collect();
        if !cookies.is_empty() {
            if let Err(err) = self.page.set_cookies(cookies).await {
                warn!(target = "xpost", error = %err, "cookie restore failed");
            }
        }

        let mut pending = self.pending_storage.lock().unwrap();
        *pending = state.origins.clone();
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

const LOCAL_STORAGE_SNAPSHOT_JS: &str = r#"
(() => {
  const entries = [];
  for (let i = 0; i < localStorage.length; i++) {
    const name = localStorage.key(i);
    entries.push({ name, value: localStorage.getItem(name) });
  }
  return { origin: location.origin, entries };
})()
"#;

/// The protocol reports session cookies with a negative expiry.
fn cookie_expiry(expires: f64) -> Option<f64> {
    if expires < 0.0 {
        None
    } else {
        Some(expires)
    }
}

fn origin_from_snapshot(value: serde_json::Value) -> Option<OriginState> {
    let origin = value.get("origin")?.as_str()?.to_string();
    let entries = value.get("entries")?.as_array()?;
    let local_storage: Vec<LocalStorageEntry> = entries
        .iter()
        .filter_map(|e| {
            Some(LocalStorageEntry {
                name: e.get("name")?.as_str()?.to_string(),
                value: e.get("value")?.as_str()?.to_string(),
            })
        })
        .collect();
    if local_storage.is_empty() {
        None
    } else {
        Some(OriginState {
            origin,
            local_storage,
        })
    }
}

/// Shared in-page lookup: resolves a descriptor to its first visible match.
const FIND_PRELUDE: &str = r#"
const visible = (el) => {
  if (!el) return false;
  const r = el.getBoundingClientRect();
  if (r.width <= 0 || r.height <= 0) return false;
  const s = window.getComputedStyle(el);
  return s.visibility !== 'hidden' && s.display !== 'none';
};
const find = (d) => {
  if (d.kind === 'css') {
    for (const el of document.querySelectorAll(d.value)) {
      if (visible(el)) return el;
    }
    return null;
  }
  if (d.kind === 'role') {
    const re = new RegExp(d.name, 'i');
    const selector = d.role === 'button'
      ? '[role="button"], button, input[type="submit"]'
      : '[role="' + d.role + '"]';
    for (const el of document.querySelectorAll(selector)) {
      const label = (el.innerText || el.value || el.getAttribute('aria-label') || '').trim();
      if (visible(el) && re.test(label)) return el;
    }
    return null;
  }
  const re = new RegExp(d.value, 'i');
  for (const el of document.querySelectorAll('body *')) {
    if (el.children.length === 0 && visible(el) && re.test(el.textContent || '')) return el;
  }
  return null;
};
"#;

fn descriptor_json(target: &Descriptor) -> serde_json::Value {
    match target {
        Descriptor::Css(selector) => {
            serde_json::json!({ "kind": "css", "value": selector })
        }
        Descriptor::Role { role, name } => {
            serde_json::json!({ "kind": "role", "role": role, "name": name })
        }
        Descriptor::Text(pattern) => {
            serde_json::json!({ "kind": "text", "value": pattern })
        }
    }
}

/// Wrap `action` (with `el` in scope) in the lookup prelude; evaluates to
/// `null` when no visible match exists.
fn action_script(target: &Descriptor, action: &str) -> String {
    format!(
        "(() => {{ {prelude} const el = find({desc}); if (!el) return null; {action} }})()",
        prelude = FIND_PRELUDE,
        desc = descriptor_json(target),
    )
}

/// Find a Chrome/Chromium executable on this machine.
fn find_chrome() -> Option<PathBuf> {
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_descriptor_script_embeds_selector() {
        let script = action_script(
            &Descriptor::Css("input[name=\"text\"]"),
            "return true;",
        );
        assert!(script.contains("\"kind\":\"css\""));
        assert!(script.contains("input[name=\\\"text\\\"]"));
    }

    #[test]
    fn role_descriptor_script_carries_name_pattern() {
        let script = action_script(
            &Descriptor::Role {
                role: "button",
                name: "next|continue",
            },
            "return true;",
        );
        assert!(script.contains("\"kind\":\"role\""));
        assert!(script.contains("next|continue"));
    }

    #[test]
    fn negative_expiry_means_session_cookie() {
        assert_eq!(cookie_expiry(-1.0), None);
    }

    #[test]
    fn real_expiry_is_preserved() {
        assert_eq!(cookie_expiry(1_924_992_000.0), Some(1_924_992_000.0));
    }

    #[test]
    fn empty_snapshot_yields_no_origin() {
        let value = serde_json::json!({ "origin": "https://x.com", "entries": [] });
        assert!(origin_from_snapshot(value).is_none());
    }

    #[test]
    fn snapshot_round_trips_entries() {
        let value = serde_json::json!({
            "origin": "https://x.com",
            "entries": [{ "name": "device_id", "value": "d1" }],
        });
        let origin = origin_from_snapshot(value).unwrap();
        assert_eq!(origin.origin, "https://x.com");
        assert_eq!(origin.local_storage[0].name, "device_id");
    }
}
