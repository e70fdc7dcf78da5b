use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::api::rest::SharedController;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(controller): State<SharedController>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, controller))
}

async fn handle_socket(socket: WebSocket, controller: SharedController) {
    let (mut sender, mut receiver) = socket.split();
    let events = BroadcastStream::new(controller.state().events_tx.subscribe());

    info!("ui client connected");

    let snapshot = controller.state().snapshot_events().await;

    let send_task = tokio::spawn(async move {
        let snapshot = futures::stream::iter(snapshot.into_iter().map(Ok));
        let mut events = snapshot.chain(events);

        while let Some(next) = events.next().await {
            let event = match next {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "ui client lagging; events dropped");
                    continue;
                }
            };

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize session event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("ui client disconnected");
}
