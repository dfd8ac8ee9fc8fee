//! Stream transport
//!
//! A connector opens one connection per call and hands back its inbound
//! frames as a stream. The stream ending is the close; dropping it tears
//! the connection down.

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// Inbound payloads of one connection
///
/// `Err` items carrying a decode error are unreadable frames; any other
/// error is a transport failure.
pub type FrameStream = BoxStream<'static, SyncResult<String>>;

/// Opens stream connections
pub trait StreamConnector: Send + Sync + 'static {
    /// Open a new connection
    ///
    /// Resolves once the connection is established, or with the
    /// establishment failure.
    fn connect(&self) -> BoxFuture<'static, SyncResult<FrameStream>>;
}

/// WebSocket connector
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl StreamConnector for WebSocketConnector {
    fn connect(&self) -> BoxFuture<'static, SyncResult<FrameStream>> {
        let url = self.url.clone();
        async move {
            debug!("Connecting to {}", url);
            let (ws_stream, _response) =
                connect_async(&url)
                    .await
                    .map_err(|e| SyncError::Connect {
                        url: url.clone(),
                        details: e.to_string(),
                    })?;

            let frames = ws_stream.filter_map(|msg| async move { frame_payload(msg) });
            Ok(frames.boxed())
        }
        .boxed()
    }
}

/// Map a WebSocket message to a payload, skipping control frames
fn frame_payload(msg: Result<Message, WsError>) -> Option<SyncResult<String>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Binary(data)) => Some(String::from_utf8(data).map_err(|_| {
            SyncError::Decode("binary frame is not valid UTF-8".to_string())
        })),
        // Close frames are followed by the end of the stream
        Ok(_) => None,
        Err(WsError::ConnectionClosed) => None,
        Err(e) => Some(Err(e.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_is_payload() {
        let payload = frame_payload(Ok(Message::Text("[]".to_string())));
        assert_eq!(payload, Some(Ok("[]".to_string())));
    }

    #[test]
    fn test_binary_frame() {
        let payload = frame_payload(Ok(Message::Binary(b"[{\"game_id\":\"g1\"}]".to_vec())));
        assert_eq!(payload, Some(Ok("[{\"game_id\":\"g1\"}]".to_string())));

        let invalid = frame_payload(Ok(Message::Binary(vec![0xff, 0xfe])));
        assert!(matches!(invalid, Some(Err(e)) if e.is_decode()));
    }

    #[test]
    fn test_control_frames_are_skipped() {
        assert_eq!(frame_payload(Ok(Message::Ping(vec![1]))), None);
        assert_eq!(frame_payload(Ok(Message::Pong(vec![1]))), None);
        assert_eq!(frame_payload(Ok(Message::Close(None))), None);
    }

    #[test]
    fn test_transport_error() {
        let err = frame_payload(Err(WsError::AlreadyClosed)).unwrap().unwrap_err();
        assert!(err.drives_reconnect());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listens on port 9 of localhost
        let connector = WebSocketConnector::new("ws://127.0.0.1:9/ws");
        let result = connector.connect().await;
        assert!(matches!(result, Err(SyncError::Connect { .. })));
    }
}
