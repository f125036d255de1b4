use crate::action::{Action, SearchEngine, SelectorKind, Target};
use crate::config::BrowserConfig;
use crate::driver::BrowserDriver;
use crate::observation::{Observation, Payload, SearchResult};
use crate::{Error, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs one action against the driver and reports what happened.
///
/// Never returns an error: driver failures and timeouts become
/// [`Outcome::Failure`](crate::Outcome::Failure) observations.
#[derive(Debug, Clone)]
pub struct Executor {
    screenshot_dir: PathBuf,
    action_timeout: Duration,
}

impl Executor {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            screenshot_dir: config.screenshot_dir.clone(),
            action_timeout: Duration::from_millis(config.action_timeout_ms),
        }
    }

    /// Await a driver call, failing with [`Error::Timeout`] past the
    /// per-call deadline.
    pub async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.action_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{} took longer than {}ms",
                op,
                self.action_timeout.as_millis()
            ))),
        }
    }

    pub async fn execute<D>(&self, driver: &mut D, action: &Action) -> Observation
    where
        D: BrowserDriver + ?Sized,
    {
        let result = match action {
            Action::Navigate(a) => {
                info!("navigate: {}", a.url);
                self.bounded("navigate", driver.navigate(&a.url))
                    .await
                    .map(|_| None)
            }
            Action::Click(a) => {
                info!("click: {}", a.target);
                self.bounded("click", driver.click(&a.target))
                    .await
                    .map(|_| None)
            }
            Action::InputText(a) => {
                info!("input_text: {} = '{}'", a.target, a.text);
                self.bounded("input_text", driver.fill(&a.target, &a.text))
                    .await
                    .map(|_| None)
            }
            Action::EnterInput(a) => {
                info!("enter_input: {} = '{}'", a.target, a.text);
                self.bounded("enter_input", driver.fill_and_submit(&a.target, &a.text))
                    .await
                    .map(|_| None)
            }
            Action::ExtractContent(a) => {
                info!("extract_content: {} ({})", a.target, a.attribute);
                let attribute = Some(a.attribute.as_str()).filter(|attr| *attr != "text");
                match self
                    .bounded("extract_content", driver.read_content(&a.target, attribute))
                    .await
                {
                    Ok(values) if values.iter().all(|v| v.trim().is_empty()) => Err(
                        Error::ActionFailed(format!("no content found for {}", a.target)),
                    ),
                    Ok(values) => Ok(Some(Payload::Content(values))),
                    Err(e) => Err(e),
                }
            }
            Action::ExtractSearchResults(a) => {
                info!("extract_search_results: {}", a.search_engine);
                match search_engine(&a.search_engine) {
                    Err(e) => Err(e),
                    Ok(engine) => match self
                        .bounded("extract_search_results", driver.read_search_results(engine))
                        .await
                    {
                        Ok(results) if results.is_empty() => Err(Error::ActionFailed(format!(
                            "no {} search results on this page",
                            engine
                        ))),
                        Ok(results) => Ok(Some(Payload::SearchResults(results))),
                        Err(e) => Err(e),
                    },
                }
            }
            Action::Search(a) => {
                info!("search: '{}' on {}", a.query, a.search_engine);
                match search_engine(&a.search_engine) {
                    Err(e) => Err(e),
                    Ok(engine) => self
                        .search(driver, engine, &a.query)
                        .await
                        .map(|results| Some(Payload::SearchResults(results))),
                }
            }
            Action::Scroll(a) => {
                info!("scroll: {:?} {}px", a.direction, a.amount);
                self.bounded("scroll", driver.scroll_by(a.direction, a.amount))
                    .await
                    .map(|pos| Some(Payload::ScrollPosition(pos)))
            }
            Action::Wait(a) => {
                // NaN and negatives wait zero; overflow is capped below.
                let requested =
                    Duration::try_from_secs_f64(a.seconds.max(0.0)).unwrap_or(Duration::MAX);
                let wait = requested.min(self.action_timeout);
                if wait < requested {
                    warn!(
                        "wait of {}s capped at {}ms",
                        a.seconds,
                        self.action_timeout.as_millis()
                    );
                }
                info!("wait: {}ms", wait.as_millis());
                tokio::time::sleep(wait).await;
                Ok(None)
            }
            Action::Screenshot(a) => {
                let path = self.screenshot_path(a.filename.as_deref());
                info!("screenshot: {}", path.display());
                self.bounded("screenshot", driver.screenshot(&path))
                    .await
                    .map(|written| Some(Payload::Screenshot(written)))
            }
            Action::Stop(_) => {
                debug!("stop reached the executor, nothing to run");
                Ok(None)
            }
        };

        match result {
            Ok(payload) => {
                let obs = Observation::success(action);
                match payload {
                    Some(p) => obs.with_result(p),
                    None => obs,
                }
            }
            Err(e) => {
                warn!("{} failed: {}", action.name(), e);
                Observation::failure(action, e.to_string())
            }
        }
    }

    /// Open the engine's home page, submit `query` in its search box and
    /// read the result page. An empty result list is not an error here.
    async fn search<D>(
        &self,
        driver: &mut D,
        engine: SearchEngine,
        query: &str,
    ) -> Result<Vec<SearchResult>>
    where
        D: BrowserDriver + ?Sized,
    {
        let selectors = engine.selectors();
        self.bounded("search", driver.navigate(selectors.home)).await?;
        let input = Target::new(selectors.input, SelectorKind::Css);
        self.bounded("search", driver.fill_and_submit(&input, query))
            .await?;
        let results = self
            .bounded("search", driver.read_search_results(engine))
            .await?;
        debug!("{} results for '{}' on {}", results.len(), query, engine);
        Ok(results)
    }

    /// Bare file names land in the screenshot directory; anything with a
    /// directory component is used as given. No name means a timestamped one.
    pub fn screenshot_path(&self, filename: Option<&str>) -> PathBuf {
        match filename {
            Some(name) => {
                let path = Path::new(name);
                let bare = path.parent().map_or(true, |p| p.as_os_str().is_empty());
                if bare && !path.is_absolute() {
                    self.screenshot_dir.join(path)
                } else {
                    path.to_path_buf()
                }
            }
            None => self.screenshot_dir.join(
                chrono::Local::now()
                    .format("screenshot_%Y%m%d_%H%M%S.png")
                    .to_string(),
            ),
        }
    }
}

fn search_engine(name: &str) -> Result<SearchEngine> {
    SearchEngine::parse(name)
        .ok_or_else(|| Error::ActionFailed(format!("unsupported search engine '{}'", name)))
}
