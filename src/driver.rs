//! The browser seam. The agent only ever touches a page through this trait.

use crate::action::{ScrollDirection, SearchEngine, Target};
use crate::observation::{ElementInfo, ScrollPosition, SearchResult};
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A live browser session.
///
/// One session, one page, one caller: every method takes `&mut self` and
/// the agent loop holds the only handle. Any `Err` is a failed operation;
/// the executor turns it into a failure observation.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Navigate and wait for the page to settle.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn click(&mut self, target: &Target) -> Result<()>;

    /// Clear the input, then type `text`. Fails if the target is not a
    /// text-accepting element.
    async fn fill(&mut self, target: &Target, text: &str) -> Result<()>;

    /// [`fill`](Self::fill), then submit with Enter.
    async fn fill_and_submit(&mut self, target: &Target, text: &str) -> Result<()>;

    /// Scroll the window and return the new scroll offset.
    async fn scroll_by(
        &mut self,
        direction: ScrollDirection,
        amount_px: u32,
    ) -> Result<ScrollPosition>;

    /// Capture the viewport as PNG at `path`. Returns the written path.
    async fn screenshot(&mut self, path: &Path) -> Result<PathBuf>;

    /// Text (`attribute == None`) or attribute values of every element the
    /// target matches. An empty vec means nothing matched.
    async fn read_content(
        &mut self,
        target: &Target,
        attribute: Option<&str>,
    ) -> Result<Vec<String>>;

    /// Organic results on the current page, read with `engine`'s selectors.
    async fn read_search_results(&mut self, engine: SearchEngine) -> Result<Vec<SearchResult>>;

    async fn read_visible_text(&mut self) -> Result<String>;

    /// Visible elements in document order, at most `limit`.
    async fn read_visible_elements(&mut self, limit: usize) -> Result<Vec<ElementInfo>>;

    /// Release the session. Calling it twice is harmless.
    async fn close(&mut self) -> Result<()>;
}
