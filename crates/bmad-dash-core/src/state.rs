//! UI-agnostic application state types
//!
//! Data structures shared by every front end that drives the coach chat. None
//! of them depend on a particular UI toolkit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one message slot in a chat transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ai-message-{}", self.0)
    }
}

/// A chat message in the coach conversation
///
/// `content` only changes while `is_streaming` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
    pub is_streaming: bool,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One task line of the current story
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: String,
}

/// Snapshot of where the project stands, sent along with every chat message
///
/// Replaced wholesale on each dashboard load, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectContext {
    pub phase: String,
    pub epic_id: String,
    pub epic_title: String,
    pub story_id: String,
    pub story_title: String,
    pub story_status: String,
    pub task_progress: String,
    pub current_task: String,
    pub current_task_status: String,
    pub tasks: Vec<TaskSummary>,
    pub acceptance_criteria: Vec<String>,
}

impl Default for ProjectContext {
    fn default() -> Self {
        Self {
            phase: "Implementation".to_string(),
            epic_id: "epic-5".to_string(),
            epic_title: String::new(),
            story_id: "5.1".to_string(),
            story_title: String::new(),
            story_status: String::new(),
            task_progress: String::new(),
            current_task: "1".to_string(),
            current_task_status: String::new(),
            tasks: Vec::new(),
            acceptance_criteria: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_context_serializes_snake_case() {
        let context = ProjectContext {
            epic_id: "epic-2".to_string(),
            story_status: "IN_PROGRESS".to_string(),
            tasks: vec![TaskSummary {
                id: "1".to_string(),
                title: "Write parser".to_string(),
                status: "done".to_string(),
            }],
            ..ProjectContext::default()
        };

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["epic_id"], "epic-2");
        assert_eq!(json["story_status"], "IN_PROGRESS");
        assert_eq!(json["tasks"][0]["title"], "Write parser");
        assert!(json["acceptance_criteria"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_project_context_fills_missing_fields() {
        let context: ProjectContext =
            serde_json::from_str(r#"{"story_id": "3.4", "phase": "Planning"}"#).unwrap();
        assert_eq!(context.story_id, "3.4");
        assert_eq!(context.phase, "Planning");
        assert_eq!(context.epic_id, "epic-5");
    }

    #[test]
    fn test_message_id_display() {
        assert_eq!(MessageId::new(7).to_string(), "ai-message-7");
    }
}
