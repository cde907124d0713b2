//! Chromium-backed [`PageDriver`] using chromiumoxide.
//!
//! Browser acquisition goes through the generic fallback primitive with
//! three ordered strategies: an explicitly pinned binary, a user-cached
//! binary under `~/.jobpilot/chromium`, and whatever the platform provides.

use super::{sanitize_js_string, PageDriver};
use crate::fallback::FallbackStrategy;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;

/// Binary pinned via `JOBPILOT_BROWSER_PATH`.
fn pinned_binary() -> Option<PathBuf> {
    let p = PathBuf::from(std::env::var("JOBPILOT_BROWSER_PATH").ok()?);
    p.exists().then_some(p)
}

/// Binary cached under `~/.jobpilot/chromium/`.
fn cached_binary() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let candidates = if cfg!(target_os = "macos") {
        vec![
            home.join(".jobpilot/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            home.join(".jobpilot/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            home.join(".jobpilot/chromium/chrome"),
        ]
    } else {
        vec![
            home.join(".jobpilot/chromium/chrome-linux64/chrome"),
            home.join(".jobpilot/chromium/chrome"),
        ]
    };
    candidates.into_iter().find(|c| c.exists())
}

/// Platform-provided binary: PATH lookup, then common install locations.
fn platform_binary() -> Option<PathBuf> {
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }
    None
}

/// All browser binaries this host can resolve, in acquisition order.
/// Used by `doctor` for diagnostics.
pub fn resolvable_binaries() -> Vec<(&'static str, Option<PathBuf>)> {
    vec![
        ("pinned (JOBPILOT_BROWSER_PATH)", pinned_binary()),
        ("cached (~/.jobpilot/chromium)", cached_binary()),
        ("platform default", platform_binary()),
    ]
}

/// The ordered acquisition strategies consumed by the orchestrator.
pub fn acquisition_strategies(
    headless: bool,
) -> Vec<FallbackStrategy<'static, Box<dyn PageDriver>>> {
    let launch_with = |name: &'static str, resolve: fn() -> Option<PathBuf>| {
        FallbackStrategy::new(name, move || async move {
            let path = resolve().with_context(|| format!("no binary for strategy: {name}"))?;
            let driver = ChromiumDriver::launch(path, headless).await?;
            Ok(Box::new(driver) as Box<dyn PageDriver>)
        })
    };
    vec![
        launch_with("pinned browser binary", pinned_binary),
        launch_with("cached browser binary", cached_binary),
        launch_with("platform default browser", platform_binary),
    ]
}

/// One Chromium instance with a single page.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch Chromium from `path` and open a blank page.
    pub async fn launch(path: PathBuf, headless: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-blink-features=AutomationControlled");
        if headless {
            builder = builder.arg("--headless=new");
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create page")?;

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    async fn eval(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS evaluation failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()> {
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn eval_json(&self, script: &str) -> Result<serde_json::Value> {
        self.eval(script).await
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll('{}').length",
            sanitize_js_string(selector)
        );
        let value = self.eval(&script).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                return el ? el.textContent.trim() : null;
            }})()"#,
            sanitize_js_string(selector)
        );
        let value = self.eval(&script).await?;
        Ok(value.as_str().map(String::from))
    }

    async fn read_attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                return el ? el.getAttribute('{}') : null;
            }})()"#,
            sanitize_js_string(selector),
            sanitize_js_string(attr)
        );
        let value = self.eval(&script).await?;
        Ok(value.as_str().map(String::from))
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                if (el) {{ el.click(); return true; }}
                return false;
            }})()"#,
            sanitize_js_string(selector)
        );
        let value = self.eval(&script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn type_text(&self, selector: &str, value: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                if (el) {{
                    el.value = '{}';
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return true;
                }}
                return false;
            }})()"#,
            sanitize_js_string(selector),
            sanitize_js_string(value)
        );
        let result = self.eval(&script).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.eval("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        let _ = this.page.close().await;
        let _ = this.browser.close().await;
        this.handler_task.abort();
        Ok(())
    }
}
