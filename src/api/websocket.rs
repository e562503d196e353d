//! WebSocket handler for observer connections

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tracing::{debug, info, trace, warn};

use crate::{actors::messages::InboundMessage, api::state::ApiState};

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

/// Handle an observer connection
///
/// Everything the hub queues for this observer is forwarded as JSON text
/// frames. Inbound `ping` messages are answered through the hub's
/// heartbeat path.
async fn handle_websocket(socket: WebSocket, state: ApiState) {
    let subscription = match state.hub.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!("rejecting websocket observer: {e:#}");
            return;
        }
    };

    let observer_id = subscription.id();
    info!("websocket observer {observer_id} connected");

    let (mut sender, mut receiver) = socket.split();
    let (mut outbound, responder) = subscription.into_parts();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode observer message: {e}");
                    continue;
                }
            };

            if sender.send(Message::Text(text)).await.is_err() {
                debug!("websocket send failed, observer disconnected");
                return;
            }
        }

        // the hub dropped this observer
        let _ = sender.send(Message::Close(None)).await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                    Ok(inbound) if inbound.is_heartbeat() => {
                        if let Err(e) = responder.answer(inbound.data) {
                            debug!("{e:#}");
                            break;
                        }
                    }
                    Ok(inbound) => trace!("ignoring {} message", inbound.kind),
                    Err(e) => debug!("invalid observer message: {e}"),
                },
                Message::Close(_) => break,
                _ => {
                    // protocol-level pings are answered by axum
                }
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    state.hub.unsubscribe(observer_id);
    info!("websocket observer {observer_id} disconnected");
}
