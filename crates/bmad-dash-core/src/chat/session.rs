//! Chat session controller
//!
//! Runs one exchange against `POST /api/ai-chat`: send the user's message with
//! the project context, decode the streamed frames and drive a [`ChatHandler`].
//! Tokens are handed out one by one and never accumulated here; presentation
//! state belongs to whoever implements the handler.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::decoder::frames;
use super::frame::{parse_frame, StreamSignal};
use crate::error::{http_status_message, ChatError};
use crate::state::ProjectContext;

/// Receives the signals of one exchange.
///
/// `on_complete` fires exactly once when the stream ends normally. Failures of
/// the exchange as a whole fire `on_error` and no `on_complete`.
pub trait ChatHandler {
    fn on_token(&mut self, token: &str);
    fn on_error(&mut self, message: &str);
    fn on_complete(&mut self);
}

/// Closure-backed [`ChatHandler`]
pub struct Callbacks<T, E, C> {
    pub on_token: T,
    pub on_error: E,
    pub on_complete: C,
}

impl<T, E, C> ChatHandler for Callbacks<T, E, C>
where
    T: FnMut(&str),
    E: FnMut(&str),
    C: FnMut(),
{
    fn on_token(&mut self, token: &str) {
        (self.on_token)(token)
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message)
    }

    fn on_complete(&mut self) {
        (self.on_complete)()
    }
}

/// What to do with the rest of the stream after an `{"error": ...}` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Report the error and keep delivering later tokens
    #[default]
    Continue,
    /// Report the error and stop reading
    Terminate,
}

/// Lifecycle of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    /// An error frame was seen; later tokens may still arrive under
    /// [`ErrorPolicy::Continue`]
    Errored,
    Complete,
    Failed,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    project_context: &'a ProjectContext,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client side of the coach chat endpoint
#[derive(Clone)]
pub struct ChatSession {
    client: Client,
    base_url: String,
    error_policy: ErrorPolicy,
}

impl ChatSession {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Build with a connect timeout. The response body itself has no deadline.
    pub fn with_connect_timeout(base_url: &str, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a full exchange.
    ///
    /// Transport, HTTP and cancellation failures are reported through
    /// `on_error` and then returned, so callers still get a `Result` to act on.
    pub async fn send<H>(
        &self,
        message: &str,
        context: &ProjectContext,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<(), ChatError>
    where
        H: ChatHandler + ?Sized,
    {
        let mut exchange = Exchange::new(self.error_policy);
        exchange.send(self, message, context, handler, cancel).await
    }
}

/// State of one in-flight exchange
#[derive(Debug)]
pub struct Exchange {
    state: ExchangeState,
    policy: ErrorPolicy,
}

impl Exchange {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            state: ExchangeState::Idle,
            policy,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub async fn send<H>(
        &mut self,
        session: &ChatSession,
        message: &str,
        context: &ProjectContext,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<(), ChatError>
    where
        H: ChatHandler + ?Sized,
    {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        self.transition(ExchangeState::Sending);
        let url = format!("{}/api/ai-chat", session.base_url);
        let request = ChatRequest {
            message,
            project_context: context,
        };
        let pending = session.client.post(&url).json(&request).send();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = pending => Some(outcome),
        };
        let response = match outcome {
            None => return Err(self.fail(handler, ChatError::Cancelled)),
            Some(Err(err)) => return Err(self.fail(handler, ChatError::from(err))),
            Some(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body
                    .message
                    .or(body.error)
                    .unwrap_or_else(|| http_status_message(code)),
                Err(_) => http_status_message(code),
            };
            return Err(self.fail(handler, ChatError::Http { status: code, message }));
        }

        self.consume(response.bytes_stream(), handler, cancel).await
    }

    /// Drive `handler` from a raw response body.
    pub async fn consume<S, E, H>(
        &mut self,
        body: S,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<(), ChatError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
        H: ChatHandler + ?Sized,
    {
        self.transition(ExchangeState::Streaming);

        let frames = frames(body);
        futures_util::pin_mut!(frames);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = frames.next() => Some(next),
            };
            let Some(next) = next else {
                return Err(self.fail(handler, ChatError::Cancelled));
            };

            match next {
                None => break,
                Some(Err(err)) => {
                    return Err(self.fail(handler, ChatError::Transport(err.to_string())));
                }
                Some(Ok(candidate)) => match parse_frame(&candidate) {
                    Some(StreamSignal::Token(token)) => handler.on_token(&token),
                    Some(StreamSignal::Error(message)) => {
                        warn!(%message, "error frame in chat stream");
                        handler.on_error(&message);
                        self.transition(ExchangeState::Errored);
                        if self.policy == ErrorPolicy::Terminate {
                            break;
                        }
                    }
                    None => {}
                },
            }
        }

        if self.state == ExchangeState::Streaming {
            self.transition(ExchangeState::Complete);
        }
        handler.on_complete();
        Ok(())
    }

    fn fail<H>(&mut self, handler: &mut H, err: ChatError) -> ChatError
    where
        H: ChatHandler + ?Sized,
    {
        handler.on_error(&err.to_string());
        self.transition(ExchangeState::Failed);
        err
    }

    fn transition(&mut self, next: ExchangeState) {
        debug!(from = ?self.state, to = ?next, "chat exchange");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{chunked, serve};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use futures_util::stream;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Recorder {
        tokens: Vec<String>,
        errors: Vec<String>,
        completions: usize,
    }

    impl ChatHandler for Recorder {
        fn on_token(&mut self, token: &str) {
            self.tokens.push(token.to_string());
        }

        fn on_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }

        fn on_complete(&mut self) {
            self.completions += 1;
        }
    }

    fn body(chunks: &[&'static str]) -> impl Stream<Item = Result<Bytes, String>> {
        let chunks: Vec<Result<Bytes, String>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        stream::iter(chunks)
    }

    #[tokio::test]
    async fn test_single_token_then_end() {
        let mut recorder = Recorder::default();
        let mut exchange = Exchange::new(ErrorPolicy::Continue);
        exchange
            .consume(body(&["data: {\"token\": \"X\"}\n\n"]), &mut recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recorder.tokens, vec!["X"]);
        assert_eq!(recorder.completions, 1);
        assert!(recorder.errors.is_empty());
        assert_eq!(exchange.state(), ExchangeState::Complete);
    }

    #[tokio::test]
    async fn test_tokens_arrive_in_order_across_chunk_boundaries() {
        let mut recorder = Recorder::default();
        let mut exchange = Exchange::new(ErrorPolicy::Continue);
        exchange
            .consume(
                body(&[
                    "data: {\"token\": \"Hel\"}\n\nda",
                    "ta: {\"token\": \"lo\"}\n",
                    "\ndata: {\"token\": \", \"}\n\ndata: {\"token\": \"world\"}\n\n",
                ]),
                &mut recorder,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(recorder.tokens, vec!["Hel", "lo", ", ", "world"]);
        assert_eq!(recorder.completions, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_abort_stream() {
        let mut recorder = Recorder::default();
        let mut exchange = Exchange::new(ErrorPolicy::Continue);
        exchange
            .consume(
                body(&["data: not-json\n\n", "data: {\"token\": \"ok\"}\n\n"]),
                &mut recorder,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(recorder.tokens, vec!["ok"]);
        assert!(recorder.errors.is_empty());
        assert_eq!(recorder.completions, 1);
    }

    #[tokio::test]
    async fn test_error_frame_continues_by_default() {
        let mut recorder = Recorder::default();
        let mut exchange = Exchange::new(ErrorPolicy::Continue);
        exchange
            .consume(
                body(&[
                    "data: {\"token\": \"a\"}\n\n",
                    "data: {\"error\": \"model overloaded\"}\n\n",
                    "data: {\"token\": \"b\"}\n\n",
                ]),
                &mut recorder,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(recorder.tokens, vec!["a", "b"]);
        assert_eq!(recorder.errors, vec!["model overloaded"]);
        assert_eq!(recorder.completions, 1);
        assert_eq!(exchange.state(), ExchangeState::Errored);
    }

    #[tokio::test]
    async fn test_error_frame_terminates_when_configured() {
        let mut recorder = Recorder::default();
        let mut exchange = Exchange::new(ErrorPolicy::Terminate);
        exchange
            .consume(
                body(&[
                    "data: {\"token\": \"a\"}\n\n",
                    "data: {\"error\": \"model overloaded\"}\n\n",
                    "data: {\"token\": \"b\"}\n\n",
                ]),
                &mut recorder,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(recorder.tokens, vec!["a"]);
        assert_eq!(recorder.errors, vec!["model overloaded"]);
        assert_eq!(recorder.completions, 1);
    }

    #[tokio::test]
    async fn test_body_error_fails_exchange() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: {\"token\": \"a\"}\n\n")),
            Err("connection reset by peer".to_string()),
        ];
        let mut recorder = Recorder::default();
        let mut exchange = Exchange::new(ErrorPolicy::Continue);
        let err = exchange
            .consume(stream::iter(chunks), &mut recorder, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, ChatError::Transport("connection reset by peer".to_string()));
        assert_eq!(recorder.tokens, vec!["a"]);
        assert_eq!(recorder.errors, vec!["connection reset by peer"]);
        assert_eq!(recorder.completions, 0);
        assert_eq!(exchange.state(), ExchangeState::Failed);
    }

    #[tokio::test]
    async fn test_cancel_stalled_stream() {
        let stalled = body(&["data: {\"token\": \"first\"}\n\n"]).chain(stream::pending());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut recorder = Recorder::default();
        let mut exchange = Exchange::new(ErrorPolicy::Continue);
        let err = exchange.consume(stalled, &mut recorder, &cancel).await.unwrap_err();

        assert_eq!(err, ChatError::Cancelled);
        assert_eq!(recorder.tokens, vec!["first"]);
        assert_eq!(recorder.errors, vec!["request cancelled"]);
        assert_eq!(recorder.completions, 0);
    }

    #[tokio::test]
    async fn test_empty_message_sends_nothing() {
        let session = ChatSession::new("http://127.0.0.1:9");
        let mut recorder = Recorder::default();
        let err = session
            .send("   \n", &ProjectContext::default(), &mut recorder, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, ChatError::EmptyMessage);
        assert!(recorder.errors.is_empty());
        assert_eq!(recorder.completions, 0);
    }

    #[tokio::test]
    async fn test_http_error_uses_body_message() {
        let app = Router::new().route(
            "/api/ai-chat",
            post(|| async {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "boom"})))
            }),
        );
        let session = ChatSession::new(&serve(app).await);
        let mut recorder = Recorder::default();
        let err = session
            .send("hi", &ProjectContext::default(), &mut recorder, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ChatError::Http {
                status: 500,
                message: "boom".to_string()
            }
        );
        assert_eq!(recorder.errors, vec!["boom"]);
        assert!(recorder.tokens.is_empty());
        assert_eq!(recorder.completions, 0);
    }

    #[tokio::test]
    async fn test_http_error_without_body_synthesizes_message() {
        let app = Router::new().route(
            "/api/ai-chat",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>") }),
        );
        let session = ChatSession::new(&serve(app).await);
        let mut recorder = Recorder::default();
        let err = session
            .send("hi", &ProjectContext::default(), &mut recorder, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert_eq!(recorder.errors, vec!["HTTP error! status: 500"]);
        assert!(recorder.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_streamed_response_carries_request_body() {
        let app = Router::new().route(
            "/api/ai-chat",
            post(|Json(request): Json<serde_json::Value>| async move {
                chunked(vec![
                    format!("data: {}\n\n", json!({"token": request["message"]})),
                    format!(
                        "data: {}\n\n",
                        json!({"token": request["project_context"]["story_id"]})
                    ),
                ])
            }),
        );
        let session = ChatSession::new(&(serve(app).await + "/"));
        let context = ProjectContext {
            story_id: "2.3".to_string(),
            ..ProjectContext::default()
        };
        let mut recorder = Recorder::default();
        session
            .send("what next?", &context, &mut recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recorder.tokens, vec!["what next?", "2.3"]);
        assert_eq!(recorder.completions, 1);
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let session = ChatSession::new(&format!("http://{}", addr));
        let mut recorder = Recorder::default();
        let err = session
            .send("hi", &ProjectContext::default(), &mut recorder, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Transport(_)));
        assert_eq!(recorder.errors.len(), 1);
        assert_eq!(recorder.completions, 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_send_reports_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let session = ChatSession::new("http://127.0.0.1:9");
        let mut recorder = Recorder::default();
        let err = session
            .send("hi", &ProjectContext::default(), &mut recorder, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, ChatError::Cancelled);
        assert_eq!(recorder.errors, vec!["request cancelled"]);
    }

    #[test]
    fn test_callbacks_forward_to_closures() {
        let mut tokens = Vec::new();
        let mut completed = false;
        {
            let mut callbacks = Callbacks {
                on_token: |t: &str| tokens.push(t.to_string()),
                on_error: |_: &str| {},
                on_complete: || completed = true,
            };
            callbacks.on_token("a");
            callbacks.on_complete();
        }
        assert_eq!(tokens, vec!["a"]);
        assert!(completed);
    }
}
