use axum::extract::ws::{Message, WebSocket};
use cuebus_protocol::frames::Frame;
use futures_util::SinkExt;

pub type WsSink = futures_util::stream::SplitSink<WebSocket, Message>;

/// Wrap a RES or EVENT in its typed frame and send it as JSON text.
pub async fn frame(tx: &mut WsSink, frame: impl Into<Frame>) -> Result<(), axum::Error> {
    let json = serde_json::to_string(&frame.into()).unwrap_or_default();
    tx.send(Message::Text(json.into()))
        .await
        .map_err(axum::Error::new)
}
