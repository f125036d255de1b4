use crate::action::Action;
use crate::observation::Observation;
use serde::Serialize;
use std::collections::VecDeque;

/// One completed iteration.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// 1-based iteration number.
    pub step: usize,
    /// `None` when the planner's payload never became a valid action.
    #[serde(skip)]
    pub action: Option<Action>,
    #[serde(flatten)]
    pub observation: Observation,
}

/// Completed actions in execution order, bounded to the most recent
/// `window` entries. Older entries are dropped first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    window: usize,
    total: usize,
}

impl History {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            entries: VecDeque::with_capacity(window),
            window,
            total: 0,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.window {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total += 1;
    }

    /// Retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry ever pushed, evicted ones included.
    pub fn total_recorded(&self) -> usize {
        self.total
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// JSON array of the retained entries, as sent in prompts.
    pub fn render(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "[]".into())
    }
}
