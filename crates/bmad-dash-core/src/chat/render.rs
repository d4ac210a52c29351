//! Incremental message view
//!
//! [`MessageList`] is the live list of rendered chat messages. Each message
//! owns its HTML fragment; a streaming assistant message is re-rendered from
//! its accumulated text after every token and carries a trailing indicator
//! until it is finalized.

use crate::chat::markdown::{escape_html, format_message};
use crate::error::RenderError;
use crate::state::{ChatMessage, ChatRole, MessageId};

pub const STREAMING_INDICATOR: &str = r#"<span class="ai-streaming-indicator">●</span>"#;

/// One rendered message
#[derive(Debug, Clone)]
pub struct MessageNode {
    message: ChatMessage,
    body_html: String,
    error: Option<String>,
    html_len: usize,
}

impl MessageNode {
    pub fn message(&self) -> &ChatMessage {
        &self.message
    }

    pub fn id(&self) -> MessageId {
        self.message.id
    }

    pub fn is_streaming(&self) -> bool {
        self.message.is_streaming
    }

    /// Error shown in place of the streamed text, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Markup of the content element, indicator included while streaming.
    pub fn content_html(&self) -> String {
        if self.message.is_streaming {
            format!("{}{}", self.body_html, STREAMING_INDICATOR)
        } else {
            self.body_html.clone()
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<div id="{}" class="ai-message ai-message-{}"><div class="ai-message-content">{}</div></div>"#,
            self.message.id,
            self.message.role.as_str(),
            self.content_html()
        )
    }

    fn render(&mut self) {
        let copy_controls = !self.message.is_streaming;
        self.body_html = match &self.error {
            Some(message) => format_message(&format!("Error: {}", message), copy_controls),
            None => format_message(&self.message.content, copy_controls),
        };
        self.html_len = self.to_html().len();
    }

    /// Re-render and return the markup length before and after.
    fn rerender(&mut self) -> (usize, usize) {
        let before = self.html_len;
        self.render();
        (before, self.html_len)
    }
}

/// Ordered list of rendered messages
#[derive(Debug, Default)]
pub struct MessageList {
    nodes: Vec<MessageNode>,
    next_id: u64,
    scroll_top: usize,
    // Sum of every node's markup length
    height: usize,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new message slot.
    ///
    /// Assistant slots start empty and streaming. Opening one finalizes any
    /// other message still streaming, so at most one is live at a time.
    pub fn start_message(&mut self, role: ChatRole) -> MessageId {
        self.add_message(role, "", role == ChatRole::Assistant)
    }

    /// Append a message with known content.
    pub fn add_message(&mut self, role: ChatRole, content: &str, streaming: bool) -> MessageId {
        if streaming {
            let live: Vec<MessageId> = self
                .nodes
                .iter()
                .filter(|n| n.is_streaming())
                .map(MessageNode::id)
                .collect();
            for id in live {
                tracing::debug!(%id, "superseding streaming message");
                self.finalize_node(id);
            }
        }

        self.next_id += 1;
        let mut node = MessageNode {
            message: ChatMessage {
                id: MessageId::new(self.next_id),
                role,
                content: content.to_string(),
                is_streaming: streaming,
            },
            body_html: String::new(),
            error: None,
            html_len: 0,
        };
        node.render();
        let id = node.id();
        self.height += node.html_len;
        self.nodes.push(node);
        self.scroll_to_bottom();
        id
    }

    /// Add a token to a streaming message and re-render it.
    pub fn append_token(&mut self, id: MessageId, token: &str) -> Result<(), RenderError> {
        let node = self.live_node(id)?;
        node.message.content.push_str(token);
        let (before, after) = node.rerender();
        self.resize(before, after);
        self.scroll_to_bottom();
        Ok(())
    }

    /// Show `Error: <message>` in place of the message text.
    ///
    /// The error stays on display for the rest of the exchange; tokens that
    /// still arrive are accumulated but not shown.
    pub fn show_error(&mut self, id: MessageId, message: &str) -> Result<(), RenderError> {
        let node = self.live_node(id)?;
        node.error = Some(message.to_string());
        let (before, after) = node.rerender();
        self.resize(before, after);
        self.scroll_to_bottom();
        Ok(())
    }

    /// Stop streaming: drop the indicator and attach code copy controls.
    ///
    /// Finalizing an already final message is a no-op.
    pub fn finalize(&mut self, id: MessageId) -> Result<(), RenderError> {
        if !self.nodes.iter().any(|n| n.id() == id) {
            return Err(RenderError::UnknownMessage(id));
        }
        self.finalize_node(id);
        self.scroll_to_bottom();
        Ok(())
    }

    pub fn get(&self, id: MessageId) -> Option<&MessageNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn nodes(&self) -> &[MessageNode] {
        &self.nodes
    }

    /// Transcript in display order
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.nodes.iter().map(MessageNode::message)
    }

    pub fn streaming_message(&self) -> Option<MessageId> {
        self.nodes.iter().find(|n| n.is_streaming()).map(MessageNode::id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.scroll_top = 0;
        self.height = 0;
    }

    /// Rendered size of the list, in bytes of markup
    pub fn scroll_height(&self) -> usize {
        self.height
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn to_html(&self) -> String {
        let body: String = self.nodes.iter().map(MessageNode::to_html).collect();
        format!(
            r#"<div class="ai-chat-messages" id="ai-chat-messages">{}</div>"#,
            body
        )
    }

    /// Self-contained page for viewing a transcript outside the dashboard.
    pub fn to_document(&self, title: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
            escape_html(title),
            self.to_html()
        )
    }

    fn live_node(&mut self, id: MessageId) -> Result<&mut MessageNode, RenderError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id() == id)
            .ok_or(RenderError::UnknownMessage(id))?;
        if !node.is_streaming() {
            return Err(RenderError::Finalized(id));
        }
        Ok(node)
    }

    fn finalize_node(&mut self, id: MessageId) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id() == id) {
            if node.is_streaming() {
                node.message.is_streaming = false;
                let (before, after) = node.rerender();
                self.resize(before, after);
            }
        }
    }

    fn resize(&mut self, before: usize, after: usize) {
        self.height = self.height - before + after;
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.scroll_height();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::markdown::COPY_BUTTON;

    #[test]
    fn test_assistant_placeholder_is_empty_and_streaming() {
        let mut list = MessageList::new();
        let id = list.start_message(ChatRole::Assistant);
        let node = list.get(id).unwrap();
        assert!(node.is_streaming());
        assert_eq!(node.content_html(), STREAMING_INDICATOR);
        assert_eq!(list.streaming_message(), Some(id));
    }

    #[test]
    fn test_append_keeps_exactly_one_indicator() {
        let mut list = MessageList::new();
        let id = list.start_message(ChatRole::Assistant);
        for token in ["Hel", "lo", " **there**"] {
            list.append_token(id, token).unwrap();
            let html = list.get(id).unwrap().content_html();
            assert_eq!(html.matches(STREAMING_INDICATOR).count(), 1);
            assert!(html.ends_with(STREAMING_INDICATOR));
        }
        assert_eq!(
            list.get(id).unwrap().content_html(),
            format!("Hello <strong>there</strong>{}", STREAMING_INDICATOR)
        );
    }

    #[test]
    fn test_rendered_content_matches_formatted_concatenation() {
        let tokens = ["Use `x", " * y`", " and\n*", "this*", " <b>"];
        let mut list = MessageList::new();
        let id = list.start_message(ChatRole::Assistant);
        for token in tokens {
            list.append_token(id, token).unwrap();
        }
        list.finalize(id).unwrap();

        let node = list.get(id).unwrap();
        assert_eq!(node.message().content, tokens.concat());
        assert_eq!(node.content_html(), format_message(&tokens.concat(), true));
    }

    #[test]
    fn test_finalize_removes_indicator_and_adds_copy_controls() {
        let mut list = MessageList::new();
        let id = list.start_message(ChatRole::Assistant);
        list.append_token(id, "```sh\nls\n```").unwrap();
        assert!(!list.get(id).unwrap().content_html().contains(COPY_BUTTON));

        list.finalize(id).unwrap();
        let html = list.get(id).unwrap().content_html();
        assert!(!html.contains(STREAMING_INDICATOR));
        assert!(html.contains(COPY_BUTTON));
        assert!(list.finalize(id).is_ok());
        assert_eq!(list.append_token(id, "more"), Err(RenderError::Finalized(id)));
    }

    #[test]
    fn test_error_replaces_displayed_text() {
        let mut list = MessageList::new();
        let id = list.start_message(ChatRole::Assistant);
        list.append_token(id, "partial").unwrap();
        list.show_error(id, "quota <exceeded>").unwrap();
        list.append_token(id, " more").unwrap();
        list.finalize(id).unwrap();

        let node = list.get(id).unwrap();
        assert_eq!(node.content_html(), "Error: quota &lt;exceeded&gt;");
        assert_eq!(node.error(), Some("quota <exceeded>"));
        assert_eq!(node.message().content, "partial more");
    }

    #[test]
    fn test_superseded_exchange_cannot_touch_new_slot() {
        let mut list = MessageList::new();
        let first = list.start_message(ChatRole::Assistant);
        list.append_token(first, "one").unwrap();

        let second = list.start_message(ChatRole::Assistant);
        assert_ne!(first, second);
        assert_eq!(list.streaming_message(), Some(second));

        // Late callbacks from the first exchange
        assert_eq!(list.append_token(first, "late"), Err(RenderError::Finalized(first)));
        assert!(list.show_error(first, "late").is_err());
        list.append_token(second, "two").unwrap();

        assert_eq!(list.get(first).unwrap().message().content, "one");
        assert_eq!(list.get(second).unwrap().message().content, "two");
    }

    #[test]
    fn test_unknown_message() {
        let mut list = MessageList::new();
        let mut other = MessageList::new();
        other.start_message(ChatRole::User);
        let stray = other.start_message(ChatRole::User);
        assert_eq!(list.finalize(stray), Err(RenderError::UnknownMessage(stray)));
    }

    #[test]
    fn test_user_message_is_final_and_escaped() {
        let mut list = MessageList::new();
        let id = list.add_message(ChatRole::User, "<i>hi</i>", false);
        let html = list.get(id).unwrap().to_html();
        assert_eq!(
            html,
            format!(
                r#"<div id="{}" class="ai-message ai-message-user"><div class="ai-message-content">&lt;i&gt;hi&lt;/i&gt;</div></div>"#,
                id
            )
        );
    }

    #[test]
    fn test_scrolls_to_bottom_after_every_change() {
        let mut list = MessageList::new();
        list.add_message(ChatRole::User, "question", false);
        let id = list.start_message(ChatRole::Assistant);
        list.append_token(id, "a longer answer").unwrap();
        assert_eq!(list.scroll_top(), list.scroll_height());
        list.finalize(id).unwrap();
        assert_eq!(list.scroll_top(), list.scroll_height());
    }

    #[test]
    fn test_scroll_height_tracks_rendered_markup() {
        let rendered = |list: &MessageList| -> usize {
            list.nodes().iter().map(|n| n.to_html().len()).sum()
        };

        let mut list = MessageList::new();
        list.add_message(ChatRole::User, "how do I run `cargo test`?", false);
        let first = list.start_message(ChatRole::Assistant);
        for token in ["Use ", "```\ncargo test\n", "```"] {
            list.append_token(first, token).unwrap();
            assert_eq!(list.scroll_height(), rendered(&list));
        }

        // Starting a new slot finalizes the first one
        let second = list.start_message(ChatRole::Assistant);
        assert_eq!(list.scroll_height(), rendered(&list));
        list.show_error(second, "HTTP error! status: 500").unwrap();
        assert_eq!(list.scroll_height(), rendered(&list));
        list.finalize(second).unwrap();
        assert_eq!(list.scroll_height(), rendered(&list));

        list.clear();
        assert_eq!(list.scroll_height(), 0);
    }

    #[test]
    fn test_document_escapes_title() {
        let mut list = MessageList::new();
        list.add_message(ChatRole::User, "hi", false);
        let doc = list.to_document("Story <1.2>");
        assert!(doc.contains("<title>Story &lt;1.2&gt;</title>"));
        assert!(doc.contains(r#"<div class="ai-chat-messages" id="ai-chat-messages">"#));
    }
}
