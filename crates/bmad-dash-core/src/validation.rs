//! Workflow gaps and per-story completion checks reported by the backend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapSeverity {
    High,
    Low,
    #[default]
    #[serde(other)]
    Medium,
}

impl GapSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapSeverity::High => "high",
            GapSeverity::Medium => "medium",
            GapSeverity::Low => "low",
        }
    }
}

/// A workflow step a story skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowGap {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Option<String>,
    pub severity: GapSeverity,
    pub suggested_command: Option<String>,
}

impl WorkflowGap {
    /// Display text; the gap type when no message was given.
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.kind)
    }
}

/// Story with at least one gap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapStory {
    pub story_id: String,
    pub story_key: Option<String>,
    pub story_title: String,
    pub story_status: String,
    pub gap_count: usize,
    pub gaps: Vec<WorkflowGap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct GapReport {
    pub gaps: Vec<GapStory>,
    pub count: usize,
}

/// Completion check for one story
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryValidation {
    pub story_id: String,
    pub has_git_commits: bool,
    pub git_commit_count: u64,
    pub git_last_commit_time: Option<String>,
    pub has_tests: bool,
    pub test_pass_count: u64,
    pub test_fail_count: u64,
    pub test_last_run_time: Option<String>,
    pub all_tasks_complete: bool,
    pub has_dev_story_workflow: bool,
    pub has_code_review_workflow: bool,
    pub workflow_gaps: Vec<WorkflowGap>,
    pub issues: Vec<String>,
    pub is_complete: bool,
}

/// Banner title for a gap list, or None when there is nothing to show.
pub fn gap_headline(stories: &[GapStory]) -> Option<String> {
    match stories.len() {
        0 => None,
        1 => Some("Workflow Gaps Detected (1 story)".to_string()),
        n => Some(format!("Workflow Gaps Detected ({} stories)", n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gap_defaults_and_text() {
        let gap: WorkflowGap = serde_json::from_value(json!({
            "type": "missing_code_review",
            "suggested_command": "/bmad:code-review"
        }))
        .unwrap();
        assert_eq!(gap.severity, GapSeverity::Medium);
        assert_eq!(gap.text(), "missing_code_review");

        let gap: WorkflowGap = serde_json::from_value(json!({
            "type": "missing_tests",
            "message": "No tests found",
            "severity": "critical"
        }))
        .unwrap();
        assert_eq!(gap.severity, GapSeverity::Medium);
        assert_eq!(gap.text(), "No tests found");

        let gap: WorkflowGap = serde_json::from_value(json!({"type": "x", "severity": "high"})).unwrap();
        assert_eq!(gap.severity.as_str(), "high");
    }

    #[test]
    fn test_gap_headline() {
        assert_eq!(gap_headline(&[]), None);
        let story = GapStory::default();
        assert_eq!(
            gap_headline(&[story.clone()]).as_deref(),
            Some("Workflow Gaps Detected (1 story)")
        );
        assert_eq!(
            gap_headline(&[story.clone(), story]).as_deref(),
            Some("Workflow Gaps Detected (2 stories)")
        );
    }

    #[test]
    fn test_validation_tolerates_nulls_and_missing_fields() {
        let validation: StoryValidation = serde_json::from_value(json!({
            "story_id": "1.2",
            "has_git_commits": true,
            "git_commit_count": 3,
            "git_last_commit_time": null,
            "issues": ["No tests found for this story"],
            "is_complete": false
        }))
        .unwrap();
        assert_eq!(validation.git_commit_count, 3);
        assert_eq!(validation.git_last_commit_time, None);
        assert!(!validation.has_tests);
        assert_eq!(validation.issues.len(), 1);
    }
}
