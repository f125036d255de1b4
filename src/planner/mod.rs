//! The planner: prompts a chat model for actions, plans and summaries, and
//! decodes what comes back.

mod openai;
mod prompts;

pub use openai::OpenAiChat;

use crate::decode;
use crate::runner::History;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A text-completion service. Returns the raw reply; decoding is the
/// caller's job.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Builds prompts for a [`ChatModel`] and decodes its replies.
pub struct Planner<M> {
    model: M,
    plan_attempts: u32,
}

impl<M: ChatModel> Planner<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            plan_attempts: 3,
        }
    }

    /// Attempts at [`plan_upfront`](Self::plan_upfront) before giving up.
    pub fn with_plan_attempts(mut self, attempts: u32) -> Self {
        self.plan_attempts = attempts.max(1);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Ask for the next action. Returns a JSON object with an `action` tag;
    /// whether it is a valid action is for the caller to check.
    pub async fn plan_next(&self, task: &str, history: &History, summary: &str) -> Result<Value> {
        let messages = [
            ChatMessage::system(prompts::next_action_system()),
            ChatMessage::user(prompts::next_action_user(task, &history.render(), summary)),
        ];
        let raw = self.model.complete(&messages).await?;
        debug!("planner: {}", raw);
        decode::parse_action_object(&raw)
    }

    /// Fold the latest observation and page state into a new summary.
    pub async fn summarize(
        &self,
        task: &str,
        history: &History,
        current: &Value,
        page: &str,
    ) -> Result<String> {
        let messages = [
            ChatMessage::system(prompts::summarize_system()),
            ChatMessage::user(prompts::summarize_user(
                task,
                &history.render(),
                &current.to_string(),
                page,
            )),
        ];
        let raw = self.model.complete(&messages).await?;
        debug!("summarizer: {}", raw);
        let summary = decode::decode(&raw);
        if summary.is_empty() {
            return Err(Error::Planner("summarizer returned an empty reply".into()));
        }
        Ok(summary)
    }

    /// Ask for a whole plan at once. Any failure, transport or decode, is
    /// retried up to the configured number of attempts.
    pub async fn plan_upfront(&self, task: &str) -> Result<Vec<Value>> {
        let messages = [
            ChatMessage::system(prompts::plan_system()),
            ChatMessage::user(task),
        ];

        let mut last_error = None;
        for attempt in 1..=self.plan_attempts {
            debug!("generating plan (attempt {}/{})", attempt, self.plan_attempts);
            let result = match self.model.complete(&messages).await {
                Ok(raw) => {
                    debug!("planner: {}", raw);
                    decode::parse_plan(&raw)
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(plan) => return Ok(plan),
                Err(e) => {
                    warn!("plan attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            }
        }

        Err(Error::Planner(format!(
            "no valid plan after {} attempts: {}",
            self.plan_attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies from a fixed script and records every request.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Planner("script exhausted".into())))
        }
    }

    #[tokio::test]
    async fn test_plan_next_decodes_fenced_reply() {
        let model = Scripted::new(vec![Ok(
            "<think>go to bing</think>```json\n{\"action\": \"navigate\", \"url\": \"https://www.bing.com\"}\n```".into(),
        )]);
        let planner = Planner::new(model);
        let action = planner
            .plan_next("find x", &History::new(5), "")
            .await
            .unwrap();
        assert_eq!(action, json!({"action": "navigate", "url": "https://www.bing.com"}));

        let seen = planner.model().seen.lock().unwrap();
        assert_eq!(seen[0][0].role, Role::System);
        assert!(seen[0][1].content.contains("Task: find x"));
    }

    #[tokio::test]
    async fn test_plan_next_rejects_untagged() {
        let planner = Planner::new(Scripted::new(vec![Ok("{\"url\": \"x\"}".into())]));
        let err = planner
            .plan_next("t", &History::new(5), "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_summarize_strips_reasoning() {
        let planner = Planner::new(Scripted::new(vec![Ok(
            "<think>hmm</think>\n  Opened bing; the search box is #sb_form_q.  ".into(),
        )]));
        let summary = planner
            .summarize(
                "t",
                &History::new(5),
                &json!({"action": "navigate"}),
                "Page text:\nBing",
            )
            .await
            .unwrap();
        assert_eq!(summary, "Opened bing; the search box is #sb_form_q.");

        let empty = Planner::new(Scripted::new(vec![Ok("<think>x</think>".into())]));
        assert!(empty
            .summarize("t", &History::new(5), &json!({}), "")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_plan_upfront_retries_then_succeeds() {
        let model = Scripted::new(vec![
            Ok("I would first open the page".into()),
            Err(Error::Planner("HTTP 500".into())),
            Ok("[{\"action\": \"navigate\", \"url\": \"https://a.test\"}, {\"action\": \"stop\"}]".into()),
        ]);
        let planner = Planner::new(model).with_plan_attempts(3);
        let plan = planner.plan_upfront("t").await.unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(planner.model().seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_plan_upfront_gives_up() {
        let planner = Planner::new(Scripted::new(vec![Ok("[]".into()), Ok("nope".into())]))
            .with_plan_attempts(2);
        let err = planner.plan_upfront("t").await.unwrap_err();
        assert!(err.to_string().contains("after 2 attempts"));
    }
}
