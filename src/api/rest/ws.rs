use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::state::AppState;

/// Pushes every sample published for the appointment, as it happens.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(appointment_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, appointment_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, appointment_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut samples = BroadcastStream::new(state.tracking_events_tx.subscribe());

    info!(appointment_id = %appointment_id, "websocket client connected");

    // Late joiners get the last known position first.
    if let Ok(Some(sample)) = state.tracking.read_sample(&appointment_id).await {
        if let Ok(json) = serde_json::to_string(&sample) {
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    }

    let watched_id = appointment_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(next) = samples.next().await {
            let sample = match next {
                Ok(sample) if sample.appointment_id == watched_id => sample,
                Ok(_) => continue,
                Err(err) => {
                    warn!(error = %err, "websocket client lagging behind tracking events");
                    continue;
                }
            };

            let json = match serde_json::to_string(&sample) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize tracking sample for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    join_first(send_task, recv_task).await;

    info!(appointment_id = %appointment_id, "websocket client disconnected");
}

/// Waits for either task to finish, then cancels the other and waits for it
/// to be torn down so it cannot outlive the connection.
async fn join_first(mut first: JoinHandle<()>, mut second: JoinHandle<()>) {
    let survivor = tokio::select! {
        _ = &mut first => second,
        _ = &mut second => first,
    };

    survivor.abort();
    let _ = survivor.await;
}

#[cfg(test)]
mod tests {
    use std::future;

    use tokio::sync::broadcast;

    use super::join_first;

    #[tokio::test]
    async fn idle_forwarder_is_cancelled_when_client_goes_away() {
        let (events_tx, events_rx) = broadcast::channel::<String>(4);

        let forwarder = tokio::spawn(async move {
            let _events_rx = events_rx;
            future::pending::<()>().await;
        });
        let client_reader = tokio::spawn(async {});

        join_first(forwarder, client_reader).await;

        assert_eq!(events_tx.receiver_count(), 0);
    }

    #[tokio::test]
    async fn either_side_finishing_first_releases_the_other() {
        let (events_tx, events_rx) = broadcast::channel::<String>(4);

        let client_reader = tokio::spawn(async move {
            let _events_rx = events_rx;
            future::pending::<()>().await;
        });
        let forwarder = tokio::spawn(async {});

        join_first(forwarder, client_reader).await;

        assert_eq!(events_tx.receiver_count(), 0);
    }
}
