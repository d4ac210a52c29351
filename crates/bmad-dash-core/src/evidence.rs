//! Git, test and review evidence for a story
//!
//! The backend has shipped the same numbers under several field names over
//! time. Everything is normalized here, once, right after the JSON arrives;
//! nothing downstream looks at raw evidence payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Traffic-light status attached to evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStatus {
    Green,
    Yellow,
    Red,
    #[default]
    Unknown,
}

impl EvidenceStatus {
    /// Case-insensitive; anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "green" => EvidenceStatus::Green,
            "yellow" => EvidenceStatus::Yellow,
            "red" => EvidenceStatus::Red,
            _ => EvidenceStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStatus::Green => "green",
            EvidenceStatus::Yellow => "yellow",
            EvidenceStatus::Red => "red",
            EvidenceStatus::Unknown => "unknown",
        }
    }

    fn from_field(data: &Value) -> Self {
        data.get("status")
            .and_then(Value::as_str)
            .map(Self::parse)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitCommit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub timestamp: String,
    pub files_changed: Vec<String>,
}

/// Commits linked to a story
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitEvidence {
    pub status: EvidenceStatus,
    pub commit_count: u64,
    /// Present only when the payload listed the commits themselves
    pub commits: Vec<GitCommit>,
}

impl GitEvidence {
    /// Normalize a git evidence payload.
    ///
    /// The count is taken from the first of `commit_count`, `commits` as a
    /// number, `commits` as an array, `count`. Returns `None` when the payload
    /// carries no git information at all.
    pub fn from_value(data: &Value) -> Option<Self> {
        let object = data.as_object()?;
        let commit_count = object.get("commit_count").and_then(Value::as_u64);
        let commits_field = object.get("commits").filter(|v| !v.is_null());
        let legacy_count = object.get("count").and_then(Value::as_u64);
        let status = object.get("status").filter(|v| !v.is_null());

        if commit_count.is_none() && commits_field.is_none() && legacy_count.is_none() && status.is_none() {
            return None;
        }

        let commits: Vec<GitCommit> = commits_field
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let count = commit_count
            .or_else(|| commits_field.and_then(Value::as_u64))
            .or_else(|| commits_field.and_then(Value::as_array).map(|a| a.len() as u64))
            .or(legacy_count)
            .unwrap_or(0);

        Some(Self {
            status: EvidenceStatus::from_field(data),
            commit_count: count,
            commits,
        })
    }

    pub fn badge_label(&self) -> String {
        match self.commit_count {
            0 => "No Commits".to_string(),
            1 => "1 Commit".to_string(),
            n => format!("{} Commits", n),
        }
    }
}

/// Test results linked to a story
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestEvidence {
    pub status: EvidenceStatus,
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub test_files: Vec<String>,
}

impl TestEvidence {
    /// Normalize a test evidence payload (`tests_total`/`total_tests`,
    /// `tests_passed`/`pass_count`). Returns `None` without a total.
    pub fn from_value(data: &Value) -> Option<Self> {
        let object = data.as_object()?;
        let total = object
            .get("tests_total")
            .or_else(|| object.get("total_tests"))
            .and_then(Value::as_u64)?;
        let passed = object
            .get("tests_passed")
            .or_else(|| object.get("pass_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let failed = object
            .get("tests_failed")
            .or_else(|| object.get("fail_count"))
            .and_then(Value::as_u64)
            .unwrap_or_else(|| total.saturating_sub(passed));
        let test_files = object
            .get("test_files")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        Some(Self {
            status: EvidenceStatus::from_field(data),
            total,
            passed,
            failed,
            test_files,
        })
    }

    pub fn badge_label(&self) -> String {
        format!("Tests: {}/{}", self.passed, self.total)
    }
}

/// Code review state of a story
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewEvidence {
    pub status: String,
}

impl ReviewEvidence {
    pub fn from_value(data: &Value) -> Option<Self> {
        let status = data.get("status")?.as_str()?;
        Some(Self {
            status: status.to_string(),
        })
    }

    pub fn is_reviewed(&self) -> bool {
        self.status == "reviewed"
    }
}

/// Everything the story badges need
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceSummary {
    pub git: Option<GitEvidence>,
    pub tests: Option<TestEvidence>,
    pub review: Option<ReviewEvidence>,
}

impl EvidenceSummary {
    /// Build from the combined evidence object embedded in dashboard data.
    pub fn from_combined(data: &Value) -> Self {
        Self {
            git: GitEvidence::from_value(data),
            tests: TestEvidence::from_value(data),
            review: None,
        }
    }

    pub fn git_label(&self) -> String {
        self.git
            .as_ref()
            .map_or_else(|| "No Commits".to_string(), GitEvidence::badge_label)
    }

    pub fn test_label(&self) -> String {
        self.tests
            .as_ref()
            .map_or_else(|| "No Tests".to_string(), TestEvidence::badge_label)
    }

    /// Both git and tests are green
    pub fn is_healthy(&self) -> bool {
        matches!(&self.git, Some(git) if git.status == EvidenceStatus::Green)
            && matches!(&self.tests, Some(tests) if tests.status == EvidenceStatus::Green)
    }

    pub fn is_reviewed(&self) -> bool {
        self.review.as_ref().is_some_and(ReviewEvidence::is_reviewed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_count_field_wins() {
        let git = GitEvidence::from_value(&json!({"commit_count": 4, "commits": [{}], "count": 9})).unwrap();
        assert_eq!(git.commit_count, 4);
    }

    #[test]
    fn test_commits_as_number() {
        let git = GitEvidence::from_value(&json!({"commits": 3, "count": 9})).unwrap();
        assert_eq!(git.commit_count, 3);
        assert!(git.commits.is_empty());
    }

    #[test]
    fn test_commits_as_array() {
        let git = GitEvidence::from_value(&json!({
            "status": "green",
            "commits": [
                {"sha": "abc123", "message": "feat: parser", "author": "dev", "timestamp": "2026-01-02T10:00:00", "files_changed": ["src/lib.rs"]},
                {"sha": "def456", "message": "fix: tests"}
            ]
        }))
        .unwrap();
        assert_eq!(git.commit_count, 2);
        assert_eq!(git.status, EvidenceStatus::Green);
        assert_eq!(git.commits[0].files_changed, vec!["src/lib.rs"]);
        assert_eq!(git.commits[1].author, "");
        assert_eq!(git.badge_label(), "2 Commits");
    }

    #[test]
    fn test_legacy_count() {
        let git = GitEvidence::from_value(&json!({"count": 1})).unwrap();
        assert_eq!(git.badge_label(), "1 Commit");
    }

    #[test]
    fn test_status_only_has_zero_commits() {
        let git = GitEvidence::from_value(&json!({"status": "yellow"})).unwrap();
        assert_eq!(git.commit_count, 0);
        assert_eq!(git.status, EvidenceStatus::Yellow);
        assert_eq!(git.badge_label(), "No Commits");
    }

    #[test]
    fn test_no_git_data() {
        assert_eq!(GitEvidence::from_value(&json!({"tests_total": 3})), None);
        assert_eq!(GitEvidence::from_value(&json!("nope")), None);
    }

    #[test]
    fn test_test_evidence_field_variants() {
        let tests = TestEvidence::from_value(&json!({"tests_total": 10, "tests_passed": 8})).unwrap();
        assert_eq!((tests.total, tests.passed, tests.failed), (10, 8, 2));
        assert_eq!(tests.badge_label(), "Tests: 8/10");

        let tests = TestEvidence::from_value(&json!({"total_tests": 5, "pass_count": 5, "fail_count": 0, "status": "green"})).unwrap();
        assert_eq!(tests.badge_label(), "Tests: 5/5");
        assert_eq!(tests.status, EvidenceStatus::Green);

        assert_eq!(TestEvidence::from_value(&json!({"pass_count": 5})), None);
    }

    #[test]
    fn test_summary_labels_and_health() {
        let summary = EvidenceSummary::from_combined(&json!({
            "status": "green",
            "commit_count": 2,
            "tests_total": 4,
            "tests_passed": 4
        }));
        assert_eq!(summary.git_label(), "2 Commits");
        assert_eq!(summary.test_label(), "Tests: 4/4");
        assert!(summary.is_healthy());
        assert!(!summary.is_reviewed());

        let empty = EvidenceSummary::default();
        assert_eq!(empty.git_label(), "No Commits");
        assert_eq!(empty.test_label(), "No Tests");
        assert!(!empty.is_healthy());
    }

    #[test]
    fn test_review_evidence() {
        let review = ReviewEvidence::from_value(&json!({"status": "reviewed"})).unwrap();
        assert!(review.is_reviewed());
        let pending = ReviewEvidence::from_value(&json!({"status": "pending"})).unwrap();
        assert!(!pending.is_reviewed());
        assert_eq!(ReviewEvidence::from_value(&json!({})), None);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(EvidenceStatus::parse("RED"), EvidenceStatus::Red);
        assert_eq!(EvidenceStatus::parse("purple"), EvidenceStatus::Unknown);
        assert_eq!(EvidenceStatus::Yellow.as_str(), "yellow");
    }
}
