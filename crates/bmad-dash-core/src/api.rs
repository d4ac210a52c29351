//! Client for the dashboard backend
//!
//! Every call takes a [`CancellationToken`]; cancelling it abandons the
//! request and yields [`ApiError::Cancelled`].

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::CacheStatus;
use crate::error::{http_status_message, ApiError};
use crate::evidence::{EvidenceSummary, GitEvidence, ReviewEvidence, TestEvidence};
use crate::sync::{SyncCheck, SyncOutcome, SyncStatus};
use crate::validation::{GapReport, GapStory, StoryValidation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryTask {
    pub title: String,
    pub status: String,
    pub inferred: bool,
}

/// Story as shown in the detail panel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryDetail {
    pub story_id: String,
    pub title: String,
    pub status: String,
    pub tasks: Vec<StoryTask>,
    pub content: Option<String>,
}

impl StoryDetail {
    /// Story markdown without its YAML frontmatter.
    pub fn body(&self) -> Option<&str> {
        let content = self.content.as_deref()?;
        if let Some(rest) = content.strip_prefix("---") {
            if let Some(end) = rest.find("---") {
                return Some(rest[end + 3..].trim());
            }
        }
        Some(content)
    }
}

#[derive(Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
    project_root: String,
}

impl DashboardClient {
    pub fn new(base_url: &str, project_root: &str) -> Self {
        Self::with_client(Client::new(), base_url, project_root)
    }

    pub fn with_client(client: Client, base_url: &str, project_root: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_root: project_root.to_string(),
        }
    }

    pub fn project_root(&self) -> &str {
        &self.project_root
    }

    /// Full dashboard payload, passed through untouched
    pub async fn get_dashboard(&self, cancel: &CancellationToken) -> Result<Value, ApiError> {
        self.get("/api/dashboard", cancel).await
    }

    pub async fn get_story_detail(
        &self,
        story_id: &str,
        cancel: &CancellationToken,
    ) -> Result<StoryDetail, ApiError> {
        let value = self
            .get(&format!("/api/dashboard/story/{}", story_id), cancel)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_git_evidence(
        &self,
        story_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<GitEvidence>, ApiError> {
        let value = self
            .get(&format!("/api/git-evidence/{}", story_id), cancel)
            .await?;
        Ok(GitEvidence::from_value(&value))
    }

    pub async fn get_test_evidence(
        &self,
        story_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<TestEvidence>, ApiError> {
        let value = self
            .get(&format!("/api/test-evidence/{}", story_id), cancel)
            .await?;
        Ok(TestEvidence::from_value(&value))
    }

    pub async fn get_review_evidence(
        &self,
        story_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ReviewEvidence>, ApiError> {
        let value = self
            .get(&format!("/api/review-evidence/{}", story_id), cancel)
            .await?;
        Ok(ReviewEvidence::from_value(&value))
    }

    /// Git, test and review evidence fetched in parallel.
    ///
    /// A failed lookup leaves its part empty rather than failing the whole.
    pub async fn get_evidence(&self, story_id: &str, cancel: &CancellationToken) -> EvidenceSummary {
        let (git, tests, review) = tokio::join!(
            self.get_git_evidence(story_id, cancel),
            self.get_test_evidence(story_id, cancel),
            self.get_review_evidence(story_id, cancel),
        );

        EvidenceSummary {
            git: git.unwrap_or_else(|err| {
                debug!(%err, story_id, "git evidence unavailable");
                None
            }),
            tests: tests.unwrap_or_else(|err| {
                debug!(%err, story_id, "test evidence unavailable");
                None
            }),
            review: review.unwrap_or_else(|err| {
                debug!(%err, story_id, "review evidence unavailable");
                None
            }),
        }
    }

    /// Ask the backend to drop its cache and re-parse the project
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<Value, ApiError> {
        self.post("/api/refresh", json!({ "project_root": self.project_root }), cancel)
            .await
    }

    /// Smart cache summary from the dashboard payload, if the backend sent one
    pub async fn get_cache_status(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<CacheStatus>, ApiError> {
        let dashboard = self.get_dashboard(cancel).await?;
        Ok(CacheStatus::from_dashboard(&dashboard))
    }

    pub async fn get_sync_status(&self, cancel: &CancellationToken) -> Result<SyncStatus, ApiError> {
        let value = self.get("/api/bmad-sync/status", cancel).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn check_sync(&self, cancel: &CancellationToken) -> Result<SyncCheck, ApiError> {
        let value = self
            .post("/api/bmad-sync/check", json!({ "project_root": self.project_root }), cancel)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Download the BMAD docs into the project.
    ///
    /// A failed sync comes back as an HTTP 500 carrying the reason.
    pub async fn perform_sync(&self, cancel: &CancellationToken) -> Result<SyncOutcome, ApiError> {
        let value = self
            .post("/api/bmad-sync/perform", json!({ "project_root": self.project_root }), cancel)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Record `version` as seen; the backend looks up the latest when it is `None`.
    pub async fn mark_docs_seen(
        &self,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, ApiError> {
        let body = json!({ "project_root": self.project_root, "version": version });
        let value = self.post("/api/bmad-sync/update", body, cancel).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Stories that skipped a workflow step
    pub async fn get_workflow_gaps(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<GapStory>, ApiError> {
        let value = self.get("/api/workflow-gaps", cancel).await?;
        let report: GapReport = serde_json::from_value(value)?;
        if report.count != report.gaps.len() {
            debug!(count = report.count, gaps = report.gaps.len(), "gap count mismatch");
        }
        Ok(report.gaps)
    }

    pub async fn validate_story(
        &self,
        story_id: &str,
        cancel: &CancellationToken,
    ) -> Result<StoryValidation, ApiError> {
        let value = self
            .get(&format!("/api/validate-story/{}", story_id), cancel)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get(&self, path: &str, cancel: &CancellationToken) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self
            .client
            .get(&url)
            .query(&[("project_root", self.project_root.as_str())]);
        execute(request, cancel).await
    }

    async fn post(&self, path: &str, body: Value, cancel: &CancellationToken) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        execute(self.client.post(&url).json(&body), cancel).await
    }
}

async fn execute(request: RequestBuilder, cancel: &CancellationToken) -> Result<Value, ApiError> {
    let call = async {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: error_message(&body, status.as_u16()),
            });
        }
        Ok::<Value, ApiError>(serde_json::from_slice(&body)?)
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = call => result,
    }
}

/// `message`, then `error`, then a synthesized status line
fn error_message(body: &[u8], status: u16) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| value.get("error").and_then(Value::as_str))
                .map(str::to_string)
        })
        .unwrap_or_else(|| http_status_message(status))
}
