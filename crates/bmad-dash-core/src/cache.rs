//! The backend's smart cache summary, as carried in the dashboard payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheStatus {
    pub project: Option<String>,
    pub cache_version: Option<String>,
    pub total_stories: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub cache_age_ms: u64,
    pub cache_file_exists: bool,
}

impl CacheStatus {
    /// Read `smart_cache` out of a dashboard payload.
    pub fn from_dashboard(dashboard: &Value) -> Option<Self> {
        let cache = dashboard.get("smart_cache").filter(|v| v.is_object())?;
        serde_json::from_value(cache.clone()).ok()
    }

    pub fn done_count(&self) -> u64 {
        self.status_counts.get("done").copied().unwrap_or(0)
    }

    pub fn summary(&self) -> String {
        if self.cache_file_exists {
            format!("{} done stories cached", self.done_count())
        } else {
            "Not cached yet".to_string()
        }
    }

    pub fn age_label(&self) -> String {
        format_cache_age(self.cache_age_ms)
    }
}

/// Coarse "N units ago" text; anything under a minute is "just now".
pub fn format_cache_age(age_ms: u64) -> String {
    let minutes = age_ms / 1000 / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let plural = |n: u64| if n > 1 { "s" } else { "" };
    if days > 0 {
        format!("{} day{} ago", days, plural(days))
    } else if hours > 0 {
        format!("{} hour{} ago", hours, plural(hours))
    } else if minutes > 0 {
        format!("{} min{} ago", minutes, plural(minutes))
    } else {
        "just now".to_string()
    }
}
