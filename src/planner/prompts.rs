//! Prompt text for planning and summarizing.

use once_cell::sync::Lazy;

/// The action vocabulary as shown to the model.
const ACTION_REFERENCE: &str = r##"1. navigate: open a URL
   {"action": "navigate", "url": "https://www.example.com"}

2. click: click an element
   {"action": "click", "selector": "#submit-button", "selector_type": "css"}

3. input_text: clear an input and type text into it
   {"action": "input_text", "selector": "#search-box", "selector_type": "css", "text": "rust tutorial"}

4. enter_input: type into an input, then press Enter
   {"action": "enter_input", "selector": "kw", "selector_type": "id", "text": "rust tutorial"}

5. extract_content: read the text or an attribute of matching elements
   {"action": "extract_content", "selector": ".result-item", "attribute": "text"}
   attribute: text, href, src, ...

6. extract_search_results: read the organic results of a search page
   {"action": "extract_search_results", "search_engine": "google"}
   search_engine: google, baidu, bing

7. search: open a search engine, search for a query, and read the results
   {"action": "search", "query": "highest mountain in the world", "search_engine": "bing"}
   search_engine: google, baidu, bing

8. scroll: scroll the page
   {"action": "scroll", "direction": "down", "amount": 500}

9. wait: pause, at most 300 seconds
   {"action": "wait", "seconds": 3}

10. screenshot: capture the viewport
   {"action": "screenshot", "filename": "search_results.png"}

11. stop: finish, with a summary of the outcome
   {"action": "stop", "summary": "The highest mountain is Mount Everest (8,849 m)."}

selector_type is one of id, css, xpath (default css)."##;

static NEXT_ACTION_SYSTEM: Lazy<String> = Lazy::new(|| {
    format!(
        r#"You are a task execution expert operating a web browser through a fixed set of tools.

Available actions:
{}

Decide the next action from what has been done so far.

# Input
- Task description
- Completed actions and their outcomes
- Current task summary

# Output
- If the task is done, or can no longer be done, return a stop action with a summary.
- Return exactly one JSON object and nothing else."#,
        ACTION_REFERENCE
    )
});

static SUMMARIZE_SYSTEM: Lazy<String> = Lazy::new(|| {
    format!(
        r#"You are a task execution expert. An action has just been executed towards the task goal.
Summarize how it went and keep every detail the next step will need.

Available actions:
{}

Base the summary on:
- Task description
- Completed actions
- The current action and its outcome
- The page state after the action

Reply with the summary text only."#,
        ACTION_REFERENCE
    )
});

static PLAN_SYSTEM: Lazy<String> = Lazy::new(|| {
    format!(
        r#"You are a browser automation expert. Turn the user's task into a browser automation plan:
a sequence of explicit steps, each one a single browser action.

Supported actions:
{}

Reply with a JSON array of action objects and nothing else. End the plan with a stop action."#,
        ACTION_REFERENCE
    )
});

pub fn next_action_system() -> &'static str {
    &NEXT_ACTION_SYSTEM
}

pub fn summarize_system() -> &'static str {
    &SUMMARIZE_SYSTEM
}

pub fn plan_system() -> &'static str {
    &PLAN_SYSTEM
}

pub fn next_action_user(task: &str, history: &str, summary: &str) -> String {
    format!(
        "Task: {}\nCompleted actions: {}\nCurrent summary: {}\n",
        task,
        history,
        or_none(summary)
    )
}

pub fn summarize_user(task: &str, history: &str, current: &str, page: &str) -> String {
    format!(
        "Task: {}\nCompleted actions: {}\nCurrent action: {}\nPage after the action:\n{}\n\nSummarize the current action:",
        task, history, current, page
    )
}

fn or_none(s: &str) -> &str {
    if s.trim().is_empty() {
        "(none yet)"
    } else {
        s
    }
}
