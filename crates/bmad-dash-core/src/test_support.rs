//! Helpers shared by the HTTP-level tests.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use futures_util::{stream, StreamExt};

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Chunked response body sending each string as its own chunk.
pub fn chunked(chunks: Vec<String>) -> Response {
    let chunks = chunks
        .into_iter()
        .map(|chunk| Ok::<_, std::io::Error>(Bytes::from(chunk)));
    Body::from_stream(stream::iter(chunks)).into_response()
}

/// Like [`chunked`], but the body never ends after the last chunk.
pub fn stalled(chunks: Vec<String>) -> Response {
    let chunks = chunks
        .into_iter()
        .map(|chunk| Ok::<_, std::io::Error>(Bytes::from(chunk)));
    Body::from_stream(stream::iter(chunks).chain(stream::pending())).into_response()
}

/// One `data:` frame carrying a token.
pub fn token_frame(token: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "token": token }))
}
