//! WebSocket endpoint streaming hub events to one authenticated client.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::instrument;

use sample_depot_core::events::{ClientMessage, ServerEvent};

use super::hub::{EventHub, Subscription};
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::state::AppState;

/// `GET /api/events` - upgrade to the event stream.
#[instrument(skip(ws, state, user), fields(user_id = %user.id))]
pub async fn event_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Response {
    let hub = state.hub().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, user))
}

async fn handle_socket(socket: WebSocket, hub: EventHub, user: CurrentUser) {
    let mut subscription = hub.connect();
    let (mut sink, mut stream) = socket.split();
    tracing::info!(connection = %subscription.id(), user_id = %user.id, "Client connected");

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&*event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, event = event.name(), "Failed to encode event");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
                if ends_stream(&event) {
                    tracing::info!(connection = %subscription.id(), user_id = %user.id, "Closing stream after logout");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_client_frame(&subscription, &user, text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket receive failed");
                    break;
                }
            },
        }
    }

    tracing::info!(connection = %subscription.id(), user_id = %user.id, "Client disconnected");
}

/// Events after which the connection has nothing left to receive.
const fn ends_stream(event: &ServerEvent) -> bool {
    matches!(event, ServerEvent::ForceLogout { .. })
}

fn handle_client_frame(subscription: &Subscription, user: &CurrentUser, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Register { user_id }) if user_id == user.id => {
            subscription.register(user_id);
        }
        Ok(ClientMessage::Register { user_id }) => {
            tracing::warn!(
                connection = %subscription.id(),
                session_user = %user.id,
                requested_user = %user_id,
                "Ignoring registration for another user"
            );
        }
        Err(e) => {
            tracing::debug!(error = %e, "Unrecognized client frame");
        }
    }
}
