use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{Config, USER_AGENT, WINDOW_SIZE};
use crate::error::{AppError, Result};
use crate::extract::PageSession;

/// How often element waits re-query the DOM.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const HIDE_WEBDRIVER_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// chromiumoxide's default switches minus `--enable-automation`, which would
/// otherwise flag the session as automated.
const BASE_ARGS: [&str; 24] = [
    "--disable-background-networking",
    "--enable-features=NetworkService,NetworkServiceInProcess",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-component-extensions-with-background-pages",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--force-color-profile=srgb",
    "--metrics-recording-only",
    "--no-first-run",
    "--password-store=basic",
    "--use-mock-keychain",
    "--enable-blink-features=IdleDetection",
    "--lang=en_US",
];

const STEALTH_ARGS: [&str; 2] = [
    "--disable-gpu",
    "--disable-blink-features=AutomationControlled",
];

/// Command-line switches for the headless session. Headless mode, sandbox
/// and window size are set through the builder.
fn launch_args() -> Vec<&'static str> {
    BASE_ARGS.iter().chain(STEALTH_ARGS.iter()).copied().collect()
}

fn user_agent_override() -> SetUserAgentOverrideParams {
    SetUserAgentOverrideParams::new(USER_AGENT)
}

/// Headless Chrome driven over CDP.
pub struct ChromeSession {
    browser: Browser,
    handler: Option<JoinHandle<()>>,
    page: Option<Page>,
}

impl ChromeSession {
    pub async fn launch(cfg: &Config) -> Result<Self> {
        let (width, height) = WINDOW_SIZE;
        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .no_sandbox()
            .window_size(width, height)
            .disable_default_args()
            .args(launch_args());
        if let Some(path) = &cfg.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(AppError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        // The CDP connection only makes progress while its handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {e}");
                }
            }
        });

        Ok(Self {
            browser,
            handler: Some(handler),
            page: None,
        })
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AppError::Browser("no page open".to_string()))
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        let page = self.browser.new_page("about:blank").await?;
        page.set_user_agent(user_agent_override()).await?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
            HIDE_WEBDRIVER_JS,
        ))
        .await?;
        page.goto(url).await?;
        self.page = Some(page);
        Ok(())
    }

    async fn click_when_ready(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        let wait = async {
            loop {
                if let Ok(element) = page.find_element(selector).await {
                    if element.click().await.is_ok() {
                        return;
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| AppError::Timeout {
                what: format!("{selector} to become clickable"),
                secs: timeout.as_secs(),
            })
    }

    async fn scroll_to(&mut self, y: u32) -> Result<()> {
        self.page()?
            .evaluate(format!("window.scrollTo(0, {y});"))
            .await?;
        Ok(())
    }

    async fn wait_for_rows(
        &mut self,
        row_selector: &str,
        cell_selector: &str,
        timeout: Duration,
    ) -> Result<Vec<Vec<String>>> {
        let page = self.page()?;
        let wait = async {
            loop {
                match page.find_elements(row_selector).await {
                    Ok(rows) if !rows.is_empty() => return rows,
                    _ => tokio::time::sleep(POLL_INTERVAL).await,
                }
            }
        };
        let rows = tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| AppError::Timeout {
                what: format!("{row_selector} to be present"),
                secs: timeout.as_secs(),
            })?;

        let mut table = Vec::with_capacity(rows.len());
        for row in rows {
            let mut texts = Vec::new();
            for cell in row.find_elements(cell_selector).await? {
                texts.push(cell.inner_text().await?.unwrap_or_default());
            }
            table.push(texts);
        }
        Ok(table)
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("Page close failed: {e}");
            }
        }
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Browser process did not exit cleanly: {e}");
        }
        if let Some(handler) = self.handler.take() {
            let _ = handler.await;
        }
        Ok(())
    }
}
