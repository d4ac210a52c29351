//! Story detail panel and the request slot that keeps only its latest load alive.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{DashboardClient, StoryDetail};
use crate::error::ApiError;

/// Holds the cancellation token of the one request a view may have in flight.
///
/// Beginning a new request cancels the previous one.
#[derive(Debug, Default)]
pub struct RequestSlot {
    current: Option<CancellationToken>,
    generation: u64,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is in flight and hand out a fresh token.
    pub fn begin(&mut self) -> CancellationToken {
        self.close();
        self.generation += 1;
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        token
    }

    pub fn close(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Bumped by every [`begin`](Self::begin)
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Closed,
    Loading(String),
    Loaded(StoryDetail),
    Failed(String),
}

/// One story load started by [`StoryPanel::begin_open`].
///
/// The fetch borrows nothing from the panel, so it may run on another task
/// while the panel starts a newer load.
#[derive(Clone)]
pub struct PanelLoad {
    client: DashboardClient,
    story_id: String,
    generation: u64,
    cancel: CancellationToken,
}

impl PanelLoad {
    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    pub async fn fetch(&self) -> Result<StoryDetail, ApiError> {
        self.client.get_story_detail(&self.story_id, &self.cancel).await
    }
}

pub struct StoryPanel {
    client: DashboardClient,
    slot: RequestSlot,
    state: PanelState,
}

impl StoryPanel {
    pub fn new(client: DashboardClient) -> Self {
        Self {
            client,
            slot: RequestSlot::new(),
            state: PanelState::Closed,
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != PanelState::Closed
    }

    /// Switch to `story_id`, abandoning any load still in flight.
    pub fn begin_open(&mut self, story_id: &str) -> PanelLoad {
        let cancel = self.slot.begin();
        self.state = PanelState::Loading(story_id.to_string());
        PanelLoad {
            client: self.client.clone(),
            story_id: story_id.to_string(),
            generation: self.slot.generation(),
            cancel,
        }
    }

    /// Apply the outcome of `load`.
    ///
    /// Returns false when the load was superseded, the panel was closed, or
    /// the request was cancelled; the state is left alone in those cases.
    pub fn apply(&mut self, load: &PanelLoad, result: Result<StoryDetail, ApiError>) -> bool {
        if load.generation != self.slot.generation() || load.cancel.is_cancelled() {
            debug!(story_id = %load.story_id, "discarding stale story load");
            return false;
        }

        self.state = match result {
            Ok(detail) => PanelState::Loaded(detail),
            Err(err) if err.is_cancelled() => return false,
            Err(err) => PanelState::Failed(err.to_string()),
        };
        self.slot.close();
        true
    }

    /// Load `story_id` and wait for it.
    pub async fn open(&mut self, story_id: &str) -> &PanelState {
        let load = self.begin_open(story_id);
        let result = load.fetch().await;
        self.apply(&load, result);
        &self.state
    }

    pub fn close(&mut self) {
        self.slot.close();
        self.state = PanelState::Closed;
    }
}
