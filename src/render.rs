//! Headless-browser rendering of the listing page, with bounded retry.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tracing::{info, warn};

use crate::error::PipelineError;

const PAGE_TIMEOUT_MS: u64 = 30_000;
const WAIT_TIMEOUT_MS: u64 = 5_000;
const POLL_INTERVAL_MS: u64 = 100;
const SETTLE_MS: u64 = 200;
const RETRY_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1_000;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.5993.90 Safari/537.36";

/// Render `url` and return its HTML once `wait_selector` matches something
/// in the DOM. The listing is injected after the initial document, so the
/// load event alone is not enough.
///
/// Each attempt drives its own scoped browser session; failed attempts back
/// off exponentially, up to `RETRY_ATTEMPTS` attempts total.
pub async fn render_page(url: &str, wait_selector: &str) -> Result<String, PipelineError> {
    with_retry(RETRY_ATTEMPTS, Duration::from_millis(BASE_BACKOFF_MS), || {
        render_once(url, wait_selector)
    })
    .await
    .map_err(|(attempts, cause)| PipelineError::Render { attempts, cause })
}

/// Run `op` up to `attempts` times, sleeping `base_backoff * 2^n` between
/// tries. On exhaustion returns the attempt count and the last cause.
async fn with_retry<T, F, Fut>(
    attempts: u32,
    base_backoff: Duration,
    mut op: F,
) -> Result<T, (u32, anyhow::Error)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = anyhow!("no attempts were made");
    for attempt in 0..attempts {
        if attempt > 0 {
            let backoff = base_backoff * 2u32.pow(attempt - 1);
            warn!(
                "Retrying in {:.1}s (attempt {}/{})",
                backoff.as_secs_f64(),
                attempt + 1,
                attempts
            );
            tokio::time::sleep(backoff).await;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("Attempt {}/{} failed: {e:#}", attempt + 1, attempts);
                last_err = e;
            }
        }
    }
    Err((attempts, last_err))
}

/// One full attempt: launch, render, and always tear the session down
/// before surfacing the result.
async fn render_once(url: &str, wait_selector: &str) -> Result<String> {
    let (mut browser, mut handler) = Browser::launch(browser_config()?)
        .await
        .context("failed to launch browser")?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            let _ = event;
        }
    });

    let result = render_in_session(&browser, url, wait_selector).await;

    let _ = browser.close().await;
    handler_task.abort();

    result
}

async fn render_in_session(browser: &Browser, url: &str, wait_selector: &str) -> Result<String> {
    let page = browser
        .new_page("about:blank")
        .await
        .context("failed to open page")?;

    let result = load_and_capture(&page, url, wait_selector).await;
    let _ = page.close().await;
    result
}

async fn load_and_capture(page: &Page, url: &str, wait_selector: &str) -> Result<String> {
    info!("Loading {}", url);
    let nav = tokio::time::timeout(Duration::from_millis(PAGE_TIMEOUT_MS), page.goto(url)).await;
    match nav {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => bail!("navigation failed: {e}"),
        Err(_) => bail!("navigation timed out after {PAGE_TIMEOUT_MS}ms"),
    }
    let _ = page.wait_for_navigation().await;

    wait_for_selector(page, wait_selector).await?;
    tokio::time::sleep(Duration::from_millis(SETTLE_MS)).await;

    let html: String = page
        .evaluate("document.documentElement.outerHTML")
        .await
        .context("failed to capture page HTML")?
        .into_value()
        .map_err(|e| anyhow!("failed to convert HTML result: {e:?}"))?;

    Ok(html)
}

/// Poll until the selector matches at least one element, with its own
/// deadline separate from the navigation timeout.
async fn wait_for_selector(page: &Page, selector: &str) -> Result<()> {
    let probe = format!("document.querySelector({}) !== null", js_string(selector));
    let deadline = Instant::now() + Duration::from_millis(WAIT_TIMEOUT_MS);
    loop {
        let present: bool = page
            .evaluate(probe.clone())
            .await
            .context("selector probe failed")?
            .into_value()
            .map_err(|e| anyhow!("failed to convert probe result: {e:?}"))?;
        if present {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("selector {selector:?} not present after {WAIT_TIMEOUT_MS}ms");
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Quote a selector as a JS string literal.
fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

fn browser_config() -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg(format!("--user-agent={USER_AGENT}"));
    if let Some(path) = find_chromium() {
        builder = builder.chrome_executable(path);
    }
    builder
        .build()
        .map_err(|e| anyhow!("failed to build browser config: {e}"))
}

/// Locate the browser binary: env override first, then PATH. When neither
/// matches, chromiumoxide falls back to its own detection.
fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("EXPERT_SCRAPER_CHROME") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }
    None
}
