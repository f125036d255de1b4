//! # eoka-pilot
//!
//! LLM-driven browser agent. A planner picks the next action, the executor
//! runs it against a live page, the page is observed and folded into a
//! running summary, and the loop repeats until the planner says `stop`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoka_pilot::{Agent, Config, EokaDriver, OpenAiChat, RunOutcome};
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_pilot::Result<()> {
//! let config = Config::load("configs/example.yaml")?;
//! let driver = EokaDriver::launch(&config.browser).await?;
//! let model = OpenAiChat::new(&config.planner)?;
//! let result = Agent::new(&config, driver, model).run().await;
//! if let RunOutcome::Completed { summary } = &result.outcome {
//!     println!("{}", summary);
//! }
//! # Ok(())
//! # }
//! ```

pub mod action;
mod browser;
mod config;
pub mod decode;
mod driver;
pub mod observation;
mod planner;
mod runner;

pub use action::{Action, ActionError, ScrollDirection, SearchEngine, SelectorKind, Target};
pub use browser::EokaDriver;
pub use config::{
    AgentConfig, BrowserConfig, Config, MalformedActionPolicy, ParamDef, Params, PlannerConfig,
    PlanningMode, Viewport,
};
pub use driver::BrowserDriver;
pub use observation::{
    ElementInfo, Observation, Outcome, PageSnapshot, Payload, Rect, ScrollPosition, SearchResult,
};
pub use planner::{ChatMessage, ChatModel, OpenAiChat, Planner, Role};
pub use runner::{Agent, FailReason, History, HistoryEntry, LoopState, RunOutcome, RunResult};

/// Result type for eoka-pilot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading, planning or execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("planner error: {0}")]
    Planner(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid action: {0}")]
    InvalidAction(#[from] ActionError),

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),
}
