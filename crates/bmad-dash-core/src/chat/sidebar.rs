//! The coach chat panel: session, transcript view and project context.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::render::MessageList;
use super::session::{ChatHandler, ChatSession};
use crate::error::ChatError;
use crate::state::{ChatRole, MessageId, ProjectContext};

pub const GREETING: &str = "Hello! I'm your BMAD Coach. I'm aware of your current project state and ready to help. What would you like to know?";

/// Routes exchange signals into one message slot of the view.
struct SlotWriter<'a, F> {
    view: &'a mut MessageList,
    slot: MessageId,
    echo: F,
}

impl<F: FnMut(&str)> ChatHandler for SlotWriter<'_, F> {
    fn on_token(&mut self, token: &str) {
        if let Err(err) = self.view.append_token(self.slot, token) {
            debug!(%err, "dropping token");
            return;
        }
        (self.echo)(token);
    }

    fn on_error(&mut self, message: &str) {
        if let Err(err) = self.view.show_error(self.slot, message) {
            debug!(%err, "dropping error");
        }
    }

    fn on_complete(&mut self) {
        if let Err(err) = self.view.finalize(self.slot) {
            debug!(%err, "finalize after completion");
        }
    }
}

/// Ends the exchange on every exit path, including the send future being
/// dropped mid-stream.
struct ExchangeGuard<'a> {
    view: &'a mut MessageList,
    streaming: &'a mut bool,
    slot: MessageId,
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        *self.streaming = false;
        // Failed or abandoned exchanges never reach on_complete
        self.view.finalize(self.slot).ok();
    }
}

pub struct ChatSidebar {
    session: ChatSession,
    view: MessageList,
    context: ProjectContext,
    streaming: bool,
}

impl ChatSidebar {
    pub fn new(session: ChatSession) -> Self {
        let mut view = MessageList::new();
        view.add_message(ChatRole::Assistant, GREETING, false);
        Self {
            session,
            view,
            context: ProjectContext::default(),
            streaming: false,
        }
    }

    /// Replace the project snapshot sent with later messages.
    pub fn set_project_context(&mut self, context: ProjectContext) {
        self.context = context;
    }

    pub fn project_context(&self) -> &ProjectContext {
        &self.context
    }

    pub fn view(&self) -> &MessageList {
        &self.view
    }

    /// True while an exchange is running; input is refused meanwhile.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn clear(&mut self) {
        self.view.clear();
        self.view.add_message(ChatRole::Assistant, GREETING, false);
    }

    /// Send `input` and render the reply.
    ///
    /// Returns `Ok(None)` when the input is blank or an exchange is already
    /// running. Otherwise returns the assistant message slot, or the exchange
    /// error after it has been displayed in that slot.
    pub async fn submit(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<MessageId>, ChatError> {
        self.submit_with(input, cancel, |_| {}).await
    }

    /// Like [`submit`](Self::submit), also passing each rendered token to `echo`.
    pub async fn submit_with<F>(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
        echo: F,
    ) -> Result<Option<MessageId>, ChatError>
    where
        F: FnMut(&str),
    {
        let message = input.trim();
        if message.is_empty() || self.streaming {
            return Ok(None);
        }

        self.view.add_message(ChatRole::User, message, false);
        let slot = self.view.start_message(ChatRole::Assistant);
        self.streaming = true;

        let mut guard = ExchangeGuard {
            view: &mut self.view,
            streaming: &mut self.streaming,
            slot,
        };
        let mut writer = SlotWriter {
            view: &mut *guard.view,
            slot,
            echo,
        };
        let result = self
            .session
            .send(message, &self.context, &mut writer, cancel)
            .await;

        drop(writer);
        drop(guard);
        result.map(|()| Some(slot))
    }
}
