pub mod browser;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{
    Config, CELL_SELECTOR, CONSENT_PAUSE_SECS, CONSENT_SELECTOR, ROW_COUNT, ROW_SELECTOR,
    SCROLL_PAUSE_SECS, SCROLL_Y,
};
use crate::error::{AppError, Result};
use crate::types::RawRow;

pub use browser::ChromeSession;

/// Browser collaborator: the handful of page operations the extractor needs.
#[async_trait]
pub trait PageSession: Send {
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Waits up to `timeout` for `selector` to match, then clicks it.
    async fn click_when_ready(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    async fn scroll_to(&mut self, y: u32) -> Result<()>;

    /// Waits up to `timeout` for at least one `row_selector` match and
    /// returns the visible text of each row's `cell_selector` children.
    async fn wait_for_rows(
        &mut self,
        row_selector: &str,
        cell_selector: &str,
        timeout: Duration,
    ) -> Result<Vec<Vec<String>>>;

    async fn shutdown(&mut self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub url: String,
    pub consent_selector: String,
    pub row_selector: String,
    pub cell_selector: String,
    pub wait_timeout: Duration,
    pub row_count: usize,
    pub scroll_y: u32,
    /// Settle time after dismissing the consent dialog.
    pub consent_pause: Duration,
    /// Settle time after scrolling, for lazily rendered rows.
    pub scroll_pause: Duration,
}

impl ExtractorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            url: cfg.source_url.clone(),
            consent_selector: CONSENT_SELECTOR.to_string(),
            row_selector: ROW_SELECTOR.to_string(),
            cell_selector: CELL_SELECTOR.to_string(),
            wait_timeout: cfg.wait_timeout,
            row_count: ROW_COUNT,
            scroll_y: SCROLL_Y,
            consent_pause: Duration::from_secs(CONSENT_PAUSE_SECS),
            scroll_pause: Duration::from_secs(SCROLL_PAUSE_SECS),
        }
    }
}

pub struct Extractor {
    settings: ExtractorSettings,
}

impl Extractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self { settings }
    }

    /// Scrapes the listings table. The session is shut down whether or not
    /// the scrape succeeds.
    pub async fn extract<S: PageSession + ?Sized>(&self, session: &mut S) -> Result<Vec<RawRow>> {
        let result = self.scrape(session).await;
        if let Err(e) = session.shutdown().await {
            warn!("Browser shutdown failed: {e}");
        }
        result
    }

    async fn scrape<S: PageSession + ?Sized>(&self, session: &mut S) -> Result<Vec<RawRow>> {
        let s = &self.settings;
        session.open(&s.url).await?;
        info!(url = %s.url, "Page opened");

        match session
            .click_when_ready(&s.consent_selector, s.wait_timeout)
            .await
        {
            Ok(()) => {
                info!("Consent dialog dismissed");
                tokio::time::sleep(s.consent_pause).await;
            }
            Err(e) => info!("No cookie popup found ({e})"),
        }

        session.scroll_to(s.scroll_y).await?;
        tokio::time::sleep(s.scroll_pause).await;

        let rows = session
            .wait_for_rows(&s.row_selector, &s.cell_selector, s.wait_timeout)
            .await?;
        info!(rendered = rows.len(), "Table rows located");

        if rows.len() < s.row_count {
            return Err(AppError::ExtractionShortfall(format!(
                "found {} table rows, expected {}",
                rows.len(),
                s.row_count
            )));
        }

        rows.into_iter()
            .take(s.row_count)
            .enumerate()
            .map(|(i, cells)| {
                RawRow::from_cells(cells).map_err(|e| match e {
                    AppError::ExtractionShortfall(msg) => {
                        AppError::ExtractionShortfall(format!("row {i}: {msg}"))
                    }
                    other => other,
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CELL_COUNT;

    /// Scripted page: records calls and serves canned table rows.
    #[derive(Default)]
    pub(crate) struct FakeSession {
        pub rows: Vec<Vec<String>>,
        pub has_consent: bool,
        pub table_missing: bool,
        pub calls: Vec<String>,
        pub shut_down: bool,
    }

    impl FakeSession {
        pub(crate) fn with_rows(rows: Vec<Vec<String>>) -> Self {
            Self {
                rows,
                has_consent: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PageSession for FakeSession {
        async fn open(&mut self, url: &str) -> Result<()> {
            self.calls.push(format!("open {url}"));
            Ok(())
        }

        async fn click_when_ready(&mut self, selector: &str, timeout: Duration) -> Result<()> {
            self.calls.push(format!("click {selector}"));
            if self.has_consent {
                Ok(())
            } else {
                Err(AppError::Timeout {
                    what: selector.to_string(),
                    secs: timeout.as_secs(),
                })
            }
        }

        async fn scroll_to(&mut self, y: u32) -> Result<()> {
            self.calls.push(format!("scroll {y}"));
            Ok(())
        }

        async fn wait_for_rows(
            &mut self,
            row_selector: &str,
            _cell_selector: &str,
            timeout: Duration,
        ) -> Result<Vec<Vec<String>>> {
            self.calls.push(format!("rows {row_selector}"));
            if self.table_missing {
                return Err(AppError::Timeout {
                    what: row_selector.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            Ok(self.rows.clone())
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.shut_down = true;
            Ok(())
        }
    }

    pub(crate) fn settings() -> ExtractorSettings {
        ExtractorSettings {
            url: "https://example.test/crypto".to_string(),
            consent_selector: CONSENT_SELECTOR.to_string(),
            row_selector: ROW_SELECTOR.to_string(),
            cell_selector: CELL_SELECTOR.to_string(),
            wait_timeout: Duration::from_secs(1),
            row_count: ROW_COUNT,
            scroll_y: SCROLL_Y,
            consent_pause: Duration::ZERO,
            scroll_pause: Duration::ZERO,
        }
    }

    pub(crate) fn table(rows: usize, cells: usize) -> Vec<Vec<String>> {
        (0..rows)
            .map(|r| (0..cells).map(|c| format!("r{r}c{c}")).collect())
            .collect()
    }

    #[tokio::test]
    async fn reads_first_ten_rows_in_order() {
        let mut session = FakeSession::with_rows(table(25, 13));
        let rows = Extractor::new(settings()).extract(&mut session).await.unwrap();
        assert_eq!(rows.len(), ROW_COUNT);
        assert_eq!(rows[9].cells()[0], "r9c0");
        assert_eq!(rows[0].cells().len(), CELL_COUNT);
        assert!(session.shut_down);
        assert_eq!(
            session.calls,
            vec![
                "open https://example.test/crypto",
                "click #onetrust-accept-btn-handler",
                "scroll 1000",
                "rows table tbody tr",
            ]
        );
    }

    #[tokio::test]
    async fn missing_consent_dialog_is_tolerated() {
        let mut session = FakeSession::with_rows(table(10, 11));
        session.has_consent = false;
        let rows = Extractor::new(settings()).extract(&mut session).await.unwrap();
        assert_eq!(rows.len(), ROW_COUNT);
    }

    #[tokio::test]
    async fn missing_table_is_fatal_and_still_shuts_down() {
        let mut session = FakeSession::with_rows(Vec::new());
        session.table_missing = true;
        let err = Extractor::new(settings()).extract(&mut session).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }), "got {err:?}");
        assert!(session.shut_down);
    }

    #[tokio::test]
    async fn too_few_rows_is_shortfall() {
        let mut session = FakeSession::with_rows(table(9, 11));
        let err = Extractor::new(settings()).extract(&mut session).await.unwrap_err();
        assert!(matches!(err, AppError::ExtractionShortfall(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn short_row_is_shortfall() {
        let mut rows = table(10, 11);
        rows[4].truncate(10);
        let mut session = FakeSession::with_rows(rows);
        let err = Extractor::new(settings()).extract(&mut session).await.unwrap_err();
        match err {
            AppError::ExtractionShortfall(msg) => assert!(msg.starts_with("row 4"), "{msg}"),
            other => panic!("expected shortfall, got {other:?}"),
        }
    }
}
