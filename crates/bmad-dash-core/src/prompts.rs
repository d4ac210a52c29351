//! Suggested prompts for the coach, chosen by story status.

use serde::Serialize;

use crate::state::ProjectContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptCategory {
    Workflow,
    Info,
    Validation,
    Help,
}

impl PromptCategory {
    pub fn all() -> Vec<PromptCategory> {
        vec![
            PromptCategory::Workflow,
            PromptCategory::Info,
            PromptCategory::Validation,
            PromptCategory::Help,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptCategory::Workflow => "workflow",
            PromptCategory::Info => "info",
            PromptCategory::Validation => "validation",
            PromptCategory::Help => "help",
        }
    }
}

/// A ready-to-send prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedPrompt {
    pub text: String,
    pub icon: &'static str,
    pub category: PromptCategory,
}

type Template = (&'static str, &'static str, PromptCategory);

const TODO: &[Template] = &[
    ("How do I start Story {storyId}?", "🚀", PromptCategory::Workflow),
    ("What are the acceptance criteria for this story?", "✓", PromptCategory::Info),
    ("What should I do next?", "🎯", PromptCategory::Workflow),
    ("Show me the architecture for Epic {epicId}", "🏗️", PromptCategory::Info),
];

const IN_PROGRESS: &[Template] = &[
    ("What tasks remain in Story {storyId}?", "📋", PromptCategory::Workflow),
    ("Show me the acceptance criteria", "✓", PromptCategory::Info),
    ("Should I run code-review now?", "🔍", PromptCategory::Workflow),
    ("What should I do next?", "🎯", PromptCategory::Workflow),
];

const REVIEW: &[Template] = &[
    ("Did the AI agent complete Story {storyId} correctly?", "🤖", PromptCategory::Validation),
    ("Should I run code-review workflow?", "🔍", PromptCategory::Workflow),
    ("What's the status of my current epic?", "📊", PromptCategory::Info),
    ("What should I do next?", "🎯", PromptCategory::Workflow),
];

const COMPLETE: &[Template] = &[
    ("What's my next story?", "➡️", PromptCategory::Workflow),
    ("Show me the sprint status", "📊", PromptCategory::Info),
    ("Should I run retrospective for Epic {epicId}?", "🔄", PromptCategory::Workflow),
    ("What should I do next?", "🎯", PromptCategory::Workflow),
];

const DEFAULT: &[Template] = &[
    ("What should I do next?", "🎯", PromptCategory::Workflow),
    ("What's my current story status?", "📊", PromptCategory::Info),
    ("Show me my progress", "📈", PromptCategory::Info),
    ("Explain the BMAD Method", "📚", PromptCategory::Help),
];

/// Map a raw story status onto a template key.
///
/// Uppercases, turns `-` and spaces into `_`, then folds known aliases.
pub fn normalize_status(status: &str) -> String {
    let trimmed = status.trim();
    if trimmed.is_empty() {
        return "DEFAULT".to_string();
    }

    let normalized: String = trimmed
        .to_uppercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect();

    match normalized.as_str() {
        "READY_FOR_DEV" | "BACKLOG" => "TODO".to_string(),
        "DONE" | "COMPLETED" => "COMPLETE".to_string(),
        "IN_REVIEW" => "REVIEW".to_string(),
        _ => normalized,
    }
}

/// Prompts for the story described by `context`.
pub fn generate(context: &ProjectContext) -> Vec<SuggestedPrompt> {
    let templates = match normalize_status(&context.story_status).as_str() {
        "TODO" => TODO,
        "IN_PROGRESS" => IN_PROGRESS,
        "REVIEW" => REVIEW,
        "COMPLETE" => COMPLETE,
        _ => DEFAULT,
    };

    let story_id = non_empty(&context.story_id, "X.X");
    let epic_id = non_empty(&context.epic_id, "epic-X");
    let story_title = non_empty(&context.story_title, "Unknown");

    templates
        .iter()
        .map(|(text, icon, category)| SuggestedPrompt {
            text: text
                .replace("{storyId}", story_id)
                .replace("{epicId}", epic_id)
                .replace("{storyTitle}", story_title),
            icon: *icon,
            category: *category,
        })
        .collect()
}

pub fn filter_by_category(prompts: &[SuggestedPrompt], category: PromptCategory) -> Vec<SuggestedPrompt> {
    prompts
        .iter()
        .filter(|p| p.category == category)
        .cloned()
        .collect()
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
