//! BMAD documentation sync status and the banner that surfaces it.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::DashboardClient;
use crate::error::ApiError;

pub const DEFAULT_DOCS_URL: &str = "http://docs.bmad-method.org";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncStatus {
    pub current_version: Option<String>,
    pub latest_version: Option<String>,
    pub last_check: Option<String>,
    pub last_updated: Option<String>,
    pub last_seen: Option<String>,
    pub docs_url: Option<String>,
    #[serde(alias = "has_updates")]
    pub update_available: bool,
}

impl SyncStatus {
    pub fn docs_url(&self) -> &str {
        self.docs_url.as_deref().unwrap_or(DEFAULT_DOCS_URL)
    }

    /// Fold the result of an update check into this status.
    pub fn absorb(&mut self, check: &SyncCheck) {
        self.update_available = check.has_updates;
        if check.current_version.is_some() {
            self.current_version = check.current_version.clone();
        }
        if check.latest_version.is_some() {
            self.latest_version = check.latest_version.clone();
        }
        if check.last_check.is_some() {
            self.last_check = check.last_check.clone();
        }
        if check.docs_url.is_some() {
            self.docs_url = check.docs_url.clone();
        }
    }
}

/// Reply to a forced update check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncCheck {
    pub has_updates: bool,
    pub current_version: Option<String>,
    pub latest_version: Option<String>,
    pub last_check: Option<String>,
    pub docs_url: Option<String>,
    /// Set when the docs site could not be reached
    pub error: Option<String>,
}

/// Reply to a sync or a mark-as-seen request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOutcome {
    pub success: bool,
    pub version: Option<String>,
    pub message: Option<String>,
    pub docs_url: Option<String>,
}

/// Docs sync banner.
///
/// Nothing is shown until [`open`](Self::open) has loaded a status; results
/// that land after [`close`](Self::close) are returned but not kept.
pub struct SyncBanner {
    client: DashboardClient,
    status: Option<SyncStatus>,
    open: bool,
}

impl SyncBanner {
    pub fn new(client: DashboardClient) -> Self {
        Self {
            client,
            status: None,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn status(&self) -> Option<&SyncStatus> {
        self.status.as_ref()
    }

    pub fn update_available(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.update_available)
    }

    pub async fn open(&mut self, cancel: &CancellationToken) -> Result<&SyncStatus, ApiError> {
        self.open = true;
        let status = self.client.get_sync_status(cancel).await?;
        Ok(self.status.insert(status))
    }

    pub fn close(&mut self) {
        self.open = false;
        self.status = None;
    }

    /// Ask the backend to check the docs site now.
    pub async fn force_check(&mut self, cancel: &CancellationToken) -> Result<SyncCheck, ApiError> {
        let check = self.client.check_sync(cancel).await?;
        if let Some(error) = &check.error {
            warn!(%error, "BMAD update check failed");
        }
        if let Some(status) = self.live_status() {
            status.absorb(&check);
        }
        Ok(check)
    }

    /// Download the docs into the project, then reload the status.
    pub async fn sync(&mut self, cancel: &CancellationToken) -> Result<SyncOutcome, ApiError> {
        let outcome = self.client.perform_sync(cancel).await?;
        if let Some(status) = self.live_status() {
            status.update_available = false;
            if outcome.version.is_some() {
                status.current_version = outcome.version.clone();
            }
        }

        // The backend stamps the sync time; pick it up if we can
        if self.open {
            match self.client.get_sync_status(cancel).await {
                Ok(status) if self.open => self.status = Some(status),
                Ok(_) => {}
                Err(err) => debug!(%err, "status reload after sync failed"),
            }
        }
        Ok(outcome)
    }

    /// Mark the latest docs as seen so the update notice goes away.
    pub async fn dismiss(&mut self, cancel: &CancellationToken) -> Result<SyncOutcome, ApiError> {
        let latest = self.status.as_ref().and_then(|s| s.latest_version.clone());
        let outcome = self.client.mark_docs_seen(latest.as_deref(), cancel).await?;
        if let Some(status) = self.live_status() {
            status.update_available = false;
            if outcome.docs_url.is_some() {
                status.docs_url = outcome.docs_url.clone();
            }
        }
        Ok(outcome)
    }

    pub fn headline(&self) -> Option<&'static str> {
        let status = self.status.as_ref()?;
        Some(if status.update_available {
            "BMAD Documentation Update Available"
        } else {
            "BMAD Documentation Synced"
        })
    }

    /// Line under the headline: the latest version, or the last sync.
    pub fn detail(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        if status.update_available {
            let latest = status.latest_version.as_deref().unwrap_or("v.latest");
            Some(format!("Latest: {}", latest))
        } else {
            Some(format!(
                "Version: {} | Last Sync: {}",
                status.current_version.as_deref().unwrap_or("unknown"),
                status.last_updated.as_deref().unwrap_or("Never")
            ))
        }
    }

    fn live_status(&mut self) -> Option<&mut SyncStatus> {
        if self.open {
            self.status.as_mut()
        } else {
            None
        }
    }
}
