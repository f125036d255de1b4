mod executor;
mod history;

pub use executor::Executor;
pub use history::{History, HistoryEntry};

use crate::action::{Action, ActionError};
use crate::config::{AgentConfig, Config, MalformedActionPolicy, PlanningMode};
use crate::decode::snippet;
use crate::driver::BrowserDriver;
use crate::observation::{Observation, PageSnapshot};
use crate::planner::{ChatModel, Planner};
use crate::Result;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the loop is in its plan, execute, observe, summarize cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Planning,
    Executing,
    Observing,
    Summarizing,
    Terminated,
    Failed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planning => "PLANNING",
            Self::Executing => "EXECUTING",
            Self::Observing => "OBSERVING",
            Self::Summarizing => "SUMMARIZING",
            Self::Terminated => "TERMINATED",
            Self::Failed => "FAILED",
        })
    }
}

/// Why a run ended without `stop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// `max_steps` iterations ran without a `stop`.
    StepLimit(usize),
    /// This many iterations in a row failed.
    ConsecutiveFailures(usize),
    /// The run deadline passed, in milliseconds.
    Deadline(u64),
    /// Malformed action under the `abort` policy.
    MalformedAction(String),
    /// No upfront plan could be produced.
    Planning(String),
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepLimit(n) => write!(f, "step limit of {} reached", n),
            Self::ConsecutiveFailures(n) => write!(f, "{} consecutive failed iterations", n),
            Self::Deadline(ms) => write!(f, "run deadline of {}ms exceeded", ms),
            Self::MalformedAction(e) => write!(f, "malformed action: {}", e),
            Self::Planning(e) => write!(f, "planning failed: {}", e),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The planner issued `stop`, or an upfront plan ran to its end.
    Completed { summary: String },
    /// The run was cut off. `summary` is the last running summary.
    Failed { reason: FailReason, summary: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::Completed { summary } | Self::Failed { summary, .. } => summary,
        }
    }
}

/// Result of one agent run.
#[derive(Debug)]
pub struct RunResult {
    pub outcome: RunOutcome,
    /// Iterations started, including the one that issued `stop`.
    pub steps: usize,
    pub history: History,
    pub duration_ms: u64,
}

/// What one iteration amounted to.
enum Iteration {
    Succeeded,
    Failed,
    /// Malformed action under `skip`: nothing recorded, counters untouched.
    Skipped,
    /// Malformed action under `retry`: counts as a failure, replan at once.
    Retry,
    Stop(String),
    Abort(FailReason),
}

/// The agent loop. Owns the browser session and the planner for the
/// length of one run.
pub struct Agent<D, M> {
    task: String,
    start_url: Option<String>,
    settings: AgentConfig,
    executor: Executor,
    driver: D,
    planner: Planner<M>,
    history: History,
    summary: String,
    state: LoopState,
    steps: usize,
    closed: bool,
}

impl<D: BrowserDriver, M: ChatModel> Agent<D, M> {
    pub fn new(config: &Config, driver: D, model: M) -> Self {
        let settings = config.agent.clone();
        Self {
            task: config.task.clone(),
            start_url: config.start_url.clone(),
            executor: Executor::new(&config.browser),
            driver,
            planner: Planner::new(model).with_plan_attempts(settings.plan_attempts),
            history: History::new(settings.history_window),
            summary: String::new(),
            state: LoopState::Planning,
            steps: 0,
            closed: false,
            settings,
        }
    }

    /// Run until `stop` or a limit, then release the browser.
    pub async fn run(mut self) -> RunResult {
        let start = Instant::now();
        info!(
            "agent started ({:?} mode): {}",
            self.settings.mode, self.task
        );

        let outcome = match self.settings.run_timeout_ms {
            Some(ms) => {
                let timed = tokio::time::timeout(Duration::from_millis(ms), self.drive()).await;
                match timed {
                    Ok(outcome) => outcome,
                    Err(_) => self.fail(FailReason::Deadline(ms)),
                }
            }
            None => self.drive().await,
        };

        self.release().await;
        self.transition(if outcome.is_success() {
            LoopState::Terminated
        } else {
            LoopState::Failed
        });

        match &outcome {
            RunOutcome::Completed { summary } => info!("completed: {}", summary),
            RunOutcome::Failed { reason, .. } => warn!("failed: {}", reason),
        }

        RunResult {
            outcome,
            steps: self.steps,
            history: self.history,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn drive(&mut self) -> RunOutcome {
        if let Some(url) = self.start_url.clone() {
            info!("opening {}", url);
            if let Err(e) = self
                .executor
                .bounded("navigate", self.driver.navigate(&url))
                .await
            {
                warn!("could not open start url: {}", e);
                self.summary = format!("Could not open {}: {}", url, e);
            }
        }

        let mut plan: Option<VecDeque<Value>> = None;
        if self.settings.mode == PlanningMode::Upfront {
            self.transition(LoopState::Planning);
            match self.planner.plan_upfront(&self.task).await {
                Ok(steps) => {
                    info!("plan has {} steps", steps.len());
                    plan = Some(steps.into());
                }
                Err(e) => return self.fail(FailReason::Planning(e.to_string())),
            }
        }

        let mut failures = 0;
        loop {
            if self.steps >= self.settings.max_steps {
                return self.fail(FailReason::StepLimit(self.settings.max_steps));
            }
            self.steps += 1;
            let step = self.steps;
            self.transition(LoopState::Planning);

            let next = match plan.as_mut() {
                Some(queue) => match queue.pop_front() {
                    Some(value) => Ok(value),
                    None => {
                        self.steps -= 1;
                        info!("plan exhausted without stop");
                        return RunOutcome::Completed {
                            summary: self.summary.clone(),
                        };
                    }
                },
                None => {
                    self.planner
                        .plan_next(&self.task, &self.history, &self.summary)
                        .await
                }
            };

            match self.iterate(step, next).await {
                Iteration::Stop(summary) => {
                    self.release().await;
                    return RunOutcome::Completed { summary };
                }
                Iteration::Abort(reason) => return self.fail(reason),
                Iteration::Succeeded => failures = 0,
                Iteration::Skipped => {}
                outcome @ (Iteration::Failed | Iteration::Retry) => {
                    failures += 1;
                    debug!("consecutive failures: {}", failures);
                    if failures >= self.settings.max_consecutive_failures {
                        return self.fail(FailReason::ConsecutiveFailures(failures));
                    }
                    if matches!(outcome, Iteration::Retry) {
                        continue;
                    }
                }
            }

            if self.settings.iteration_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.iteration_delay_ms)).await;
            }
        }
    }

    async fn iterate(&mut self, step: usize, next: Result<Value>) -> Iteration {
        let value = match next {
            Ok(value) => value,
            Err(e) => {
                warn!("step {}: planning failed: {}", step, e);
                self.summary = format!("Planning the next action failed: {}", e);
                return Iteration::Failed;
            }
        };

        let action = match Action::from_value(&value) {
            Ok(action) => action,
            Err(e) => return self.malformed(step, value, e).await,
        };

        self.transition(LoopState::Executing);
        info!("step {}: {}", step, action.name());

        if let Action::Stop(stop) = &action {
            let summary = if stop.summary.trim().is_empty() {
                self.summary.clone()
            } else {
                stop.summary.clone()
            };
            return Iteration::Stop(summary);
        }

        let observation = self.executor.execute(&mut self.driver, &action).await;
        self.record(step, Some(action), observation).await
    }

    async fn malformed(&mut self, step: usize, raw: Value, err: ActionError) -> Iteration {
        warn!(
            "step {}: malformed action ({}): {}",
            step,
            err,
            snippet(&raw.to_string())
        );
        match self.settings.malformed_action {
            MalformedActionPolicy::Skip => Iteration::Skipped,
            MalformedActionPolicy::Retry => Iteration::Retry,
            MalformedActionPolicy::Abort => Iteration::Abort(FailReason::MalformedAction(err.to_string())),
            MalformedActionPolicy::Fail => {
                let observation = Observation::malformed(&raw, &err);
                self.record(step, None, observation).await
            }
        }
    }

    /// Observe the page, summarize, and append to history.
    async fn record(
        &mut self,
        step: usize,
        action: Option<Action>,
        observation: Observation,
    ) -> Iteration {
        self.transition(LoopState::Observing);
        let page = self.snapshot().await;
        let current = serde_json::to_value(&observation).unwrap_or(Value::Null);

        self.transition(LoopState::Summarizing);
        let summarized = match self
            .planner
            .summarize(&self.task, &self.history, &current, &page)
            .await
        {
            Ok(summary) => {
                debug!("summary: {}", summary);
                self.summary = summary;
                true
            }
            Err(e) => {
                warn!("step {}: summarizing failed: {}", step, e);
                self.summary = format!("Error while executing the action: {}", e);
                false
            }
        };

        let succeeded = observation.is_success() && summarized;
        self.history.push(HistoryEntry {
            step,
            action,
            observation,
        });

        if succeeded {
            Iteration::Succeeded
        } else {
            Iteration::Failed
        }
    }

    /// Fresh page snapshot rendered for the summarizer. Read errors are
    /// reported inline.
    async fn snapshot(&mut self) -> String {
        let text = self
            .executor
            .bounded("read_visible_text", self.driver.read_visible_text())
            .await;
        let elements = self
            .executor
            .bounded(
                "read_visible_elements",
                self.driver.read_visible_elements(self.settings.element_limit),
            )
            .await;

        let mut problems = Vec::new();
        let text = text.unwrap_or_else(|e| {
            problems.push(format!("page text unavailable: {}", e));
            String::new()
        });
        let elements = elements.unwrap_or_else(|e| {
            problems.push(format!("page elements unavailable: {}", e));
            Vec::new()
        });
        for problem in &problems {
            warn!("snapshot: {}", problem);
        }

        let snapshot = PageSnapshot::new(
            &text,
            elements,
            self.settings.page_text_limit,
            self.settings.element_limit,
        );
        let mut rendered = snapshot.render();
        for problem in problems {
            rendered.push_str(&format!("\n({})", problem));
        }
        rendered
    }

    /// Close the driver once, whatever path got us here.
    async fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!("closing browser");
        if let Err(e) = self.executor.bounded("close", self.driver.close()).await {
            warn!("closing browser failed: {}", e);
        }
    }

    fn fail(&self, reason: FailReason) -> RunOutcome {
        RunOutcome::Failed {
            reason,
            summary: self.summary.clone(),
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!("{} -> {}", self.state, next);
        }
        self.state = next;
    }
}
