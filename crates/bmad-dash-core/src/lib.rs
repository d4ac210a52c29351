pub mod api;
pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod evidence;
pub mod panel;
pub mod prompts;
pub mod state;
pub mod sync;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use api::{DashboardClient, StoryDetail, StoryTask};
pub use cache::CacheStatus;
pub use chat::{ChatHandler, ChatSession, ChatSidebar, ErrorPolicy, MessageList};
pub use config::Config;
pub use error::{ApiError, ChatError, RenderError};
pub use evidence::{EvidenceStatus, EvidenceSummary, GitEvidence, ReviewEvidence, TestEvidence};
pub use panel::{PanelState, RequestSlot, StoryPanel};
pub use prompts::{PromptCategory, SuggestedPrompt};
pub use state::{ChatMessage, ChatRole, MessageId, ProjectContext, TaskSummary};
pub use sync::{SyncBanner, SyncCheck, SyncOutcome, SyncStatus};
pub use validation::{GapSeverity, GapStory, StoryValidation, WorkflowGap};
