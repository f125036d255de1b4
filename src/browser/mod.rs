//! [`BrowserDriver`] over a stealth Chrome session from `eoka`.

mod dom;
mod observe;

use crate::action::{ScrollDirection, SearchEngine, SelectorKind, Target};
use crate::config::BrowserConfig;
use crate::driver::BrowserDriver;
use crate::observation::{ElementInfo, ScrollPosition, SearchResult};
use crate::{Error, Result};
use async_trait::async_trait;
use eoka::{Browser, Page};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Owns one browser and the page the agent drives.
pub struct EokaDriver {
    browser: Option<Browser>,
    page: Page,
}

impl EokaDriver {
    /// Launch Chrome with the given browser config.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser: Some(browser),
            page,
        })
    }

    fn page(&self) -> Result<&Page> {
        if self.browser.is_none() {
            return Err(Error::ActionFailed("browser session is closed".into()));
        }
        Ok(&self.page)
    }

    /// CSS selector for a target, resolving XPath in the page.
    async fn resolve(&self, target: &Target) -> Result<String> {
        let page = self.page()?;
        match target.to_css() {
            Some(css) => Ok(css),
            None => dom::xpath_to_css(page, &target.selector).await,
        }
    }

    /// Resolve a target that must exist and accept text.
    async fn text_input(&self, target: &Target) -> Result<String> {
        let selector = self.resolve(target).await?;
        match dom::element_kind(self.page()?, &selector).await? {
            None => Err(Error::ActionFailed(format!("element not found: {}", target))),
            Some(kind) if !kind.accepts_text() => Err(Error::ActionFailed(format!(
                "{} is a <{}>, not an <input> or <textarea>",
                target, kind.tag
            ))),
            Some(_) => Ok(selector),
        }
    }

    /// Let the page settle after something that may navigate.
    async fn wait_for_stable(&self) -> Result<()> {
        let page = self.page()?;
        // Some sites poll forever; idle is best effort.
        let _ = page.wait_for_network_idle(500, 5000).await;
        page.wait(100).await;
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for EokaDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page()?.goto(url).await?;
        self.wait_for_stable().await
    }

    async fn click(&mut self, target: &Target) -> Result<()> {
        let selector = self.resolve(target).await?;
        let page = self.page()?;
        if !page.try_click(&selector).await? {
            return Err(Error::ActionFailed(format!("element not found: {}", target)));
        }
        self.wait_for_stable().await
    }

    async fn fill(&mut self, target: &Target, text: &str) -> Result<()> {
        let selector = self.text_input(target).await?;
        self.page()?.fill(&selector, text).await?;
        Ok(())
    }

    async fn fill_and_submit(&mut self, target: &Target, text: &str) -> Result<()> {
        let selector = self.text_input(target).await?;
        let page = self.page()?;
        page.fill(&selector, text).await?;
        dom::focus(page, &selector).await?;
        page.human().press_key("Enter").await?;
        self.wait_for_stable().await
    }

    async fn scroll_by(
        &mut self,
        direction: ScrollDirection,
        amount_px: u32,
    ) -> Result<ScrollPosition> {
        let pos = dom::scroll_by(self.page()?, direction, amount_px).await?;
        self.page()?.wait(200).await;
        Ok(pos)
    }

    async fn screenshot(&mut self, path: &Path) -> Result<PathBuf> {
        let data = self.page()?.screenshot().await?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, data)?;
        Ok(path.to_path_buf())
    }

    async fn read_content(
        &mut self,
        target: &Target,
        attribute: Option<&str>,
    ) -> Result<Vec<String>> {
        let selector = match target.selector_type {
            SelectorKind::Xpath => match self.resolve(target).await {
                Ok(sel) => sel,
                Err(Error::ActionFailed(_)) => return Ok(Vec::new()),
                Err(e) => return Err(e),
            },
            _ => self.resolve(target).await?,
        };
        dom::read_content(self.page()?, &selector, attribute).await
    }

    async fn read_search_results(&mut self, engine: SearchEngine) -> Result<Vec<SearchResult>> {
        dom::search_results(self.page()?, &engine.selectors()).await
    }

    async fn read_visible_text(&mut self) -> Result<String> {
        self.page()?.text().await.map_err(Error::from)
    }

    async fn read_visible_elements(&mut self, limit: usize) -> Result<Vec<ElementInfo>> {
        observe::visible_elements(self.page()?, limit).await
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(browser) = self.browser.take() {
            debug!("Closing browser");
            browser.close().await?;
        }
        Ok(())
    }
}
