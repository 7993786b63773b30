//! Wire channel routes
//!
//! The push channel is a WebSocket: each outbound binary message is exactly
//! one complete frame, with no envelope beyond the transport's own framing.
//! The protocol is strictly server→client; inbound payloads are ignored and
//! connect/disconnect are the only control signals. A multipart HTTP flavor
//! of the same feed is served for plain `<img>` consumers, and a bare
//! reachability route reports that the relay is up.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::media::Frame;
use crate::relay::FanoutBroadcaster;
use crate::source::MediaSource;

/// Build the relay router over the given broadcaster.
pub(crate) fn router<S: MediaSource>(hub: Arc<FanoutBroadcaster<S>>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/stream", get(stream_ws::<S>))
        .route("/stream.mjpeg", get(stream_mjpeg::<S>))
        .with_state(hub)
}

async fn status() -> impl IntoResponse {
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        "MJPEG relay running",
    )
}

async fn stream_ws<S: MediaSource>(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<FanoutBroadcaster<S>>>,
) -> Response {
    ws.on_upgrade(move |socket| relay_socket(socket, hub))
}

async fn relay_socket<S: MediaSource>(mut socket: WebSocket, hub: Arc<FanoutBroadcaster<S>>) {
    let mut sub = hub.subscribe();
    let id = sub.id();
    tracing::info!(subscriber_id = id, "viewer connected");

    loop {
        tokio::select! {
            frame = sub.recv() => match frame {
                Some(frame) => {
                    if socket.send(Message::Binary(frame.data)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = socket.recv() => match inbound {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                // Client payloads are not part of the protocol
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unsubscribe(id);
    tracing::info!(subscriber_id = id, "viewer disconnected");
}

async fn stream_mjpeg<S: MediaSource>(State(hub): State<Arc<FanoutBroadcaster<S>>>) -> Response {
    let mut sub = hub.subscribe();
    let id = sub.id();
    tracing::info!(subscriber_id = id, "multipart viewer connected");

    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(1);
    tokio::spawn(async move {
        while let Some(frame) = sub.recv().await {
            if tx.send(Ok(multipart_part(&frame))).await.is_err() {
                break;
            }
        }
        hub.unsubscribe(id);
        tracing::info!(subscriber_id = id, "multipart viewer disconnected");
    });

    let body = Body::from_stream(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|part| (part, rx))
    }));

    (
        [
            (
                header::CONTENT_TYPE,
                "multipart/x-mixed-replace; boundary=frame",
            ),
            (header::CACHE_CONTROL, "no-cache"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}

/// One multipart body part wrapping a frame.
fn multipart_part(frame: &Frame) -> Bytes {
    let header = format!(
        "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        frame.size()
    );
    let mut part = BytesMut::with_capacity(header.len() + frame.size() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(&frame.data);
    part.put_slice(b"\r\n");
    part.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_part_layout() {
        let frame = Frame::new(0, 0, Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]));
        let part = multipart_part(&frame);

        let text = String::from_utf8_lossy(&part[..]);
        assert!(text.starts_with("--frame\r\n"));
        assert!(text.contains("Content-Type: image/jpeg\r\n"));
        assert!(text.contains("Content-Length: 4\r\n\r\n"));
        assert!(part.ends_with(b"\xFF\xD9\r\n"));
    }
}
