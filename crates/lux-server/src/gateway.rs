// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! WebSocket subscription gateway.
//!
//! Browsers connect to `/ws` and speak the lux-proto JSON schema, one
//! message per text frame. Inbound input/instance commands are translated to
//! engine [`Command`]s and enqueued (they take effect at the next tick
//! boundary, never mid-tick); subscription commands mutate the subscriber
//! table owned by the gateway side.
//!
//! Frames cross the tick-thread → gateway boundary through a `watch`
//! channel: a capacity-one queue where a slow consumer sees only the newest
//! frame. The fan-out task detects skipped `frame_number`s and counts them
//! as drops.

use crate::subscribers::{SubscriberTable, Subscription};
use axum::{
    extract::ws::{Message, WebSocket},
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use lux_core::{Command, Frame, FrameSink, GraphId, InstanceId, Patch, SinkFeedback};
use lux_proto::{wire, ClientMessage, ServerMessage};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

/// Outbox depth per connection; overflow drops messages (best-effort).
const OUTBOX_DEPTH: usize = 256;

/// Shared gateway state behind the axum router.
pub struct GatewayState {
    /// Connected clients and their subscriptions.
    pub subscribers: Mutex<SubscriberTable>,
    commands: std::sync::Mutex<Sender<Command>>,
    last_status: Mutex<Option<ServerMessage>>,
}

impl GatewayState {
    /// Creates gateway state around the engine's command queue.
    pub fn new(commands: Sender<Command>) -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(SubscriberTable::default()),
            commands: std::sync::Mutex::new(commands),
            last_status: Mutex::new(None),
        })
    }

    /// Enqueues an engine command for the next tick drain.
    pub fn send_command(&self, command: Command) {
        match self.commands.lock() {
            Ok(sender) => {
                if sender.send(command).is_err() {
                    warn!("engine command queue closed");
                }
            }
            Err(_) => warn!("command sender mutex poisoned"),
        }
    }

    /// Broadcasts one message to every connection.
    pub async fn broadcast(&self, message: &ServerMessage) {
        self.subscribers.lock().await.broadcast(message);
    }
}

/// Frame sink handing engine output to the gateway (newest-wins).
pub struct FrameTap {
    tx: watch::Sender<Option<Arc<Frame>>>,
}

/// Creates the tick-thread side sink and the gateway-side receiver.
#[must_use]
pub fn frame_channel() -> (FrameTap, watch::Receiver<Option<Arc<Frame>>>) {
    let (tx, rx) = watch::channel(None);
    (FrameTap { tx }, rx)
}

impl FrameSink for FrameTap {
    fn frame(&mut self, frame: &Frame, _patch: &Patch) -> SinkFeedback {
        // send_replace never blocks; an unconsumed frame is simply replaced.
        let _ = self.tx.send_replace(Some(Arc::new(frame.clone())));
        SinkFeedback::default()
    }

    fn shutdown(&mut self) {}
}

/// Builds the gateway router.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::channel::<ServerMessage>(OUTBOX_DEPTH);

    let conn_id = state.subscribers.lock().await.add(outbox.clone());
    info!(conn_id, "subscriber connected");

    // Status on connect.
    if let Some(status) = state.last_status.lock().await.clone() {
        let _ = outbox.try_send(status);
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox_rx.recv().await {
            match wire::encode_server(&message) {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(%err, "failed to encode outbound message"),
            }
        }
    });

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => {
                handle_client_text(text.as_str(), conn_id, &state, &outbox).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    state.subscribers.lock().await.remove(conn_id);
    info!(conn_id, "subscriber disconnected");
}

/// Decodes and dispatches one inbound socket frame; malformed input earns a
/// classified `error` reply on the connection's outbox.
pub(crate) async fn handle_client_text(
    text: &str,
    conn_id: u64,
    state: &Arc<GatewayState>,
    outbox: &mpsc::Sender<ServerMessage>,
) {
    match wire::decode_client(text) {
        Ok(message) => handle_client_message(message, conn_id, state).await,
        Err(err) => {
            debug!(conn_id, %err, "rejected inbound message");
            let _ = outbox.try_send(err.reply());
        }
    }
}

async fn handle_client_message(message: ClientMessage, conn_id: u64, state: &Arc<GatewayState>) {
    match message {
        ClientMessage::Fader { fader_id, value } => {
            state.send_command(Command::SetFader {
                id: fader_id,
                value,
            });
        }
        ClientMessage::ButtonDown { button_id } => {
            state.send_command(Command::ButtonDown { id: button_id });
        }
        ClientMessage::ButtonUp { button_id } => {
            state.send_command(Command::ButtonUp { id: button_id });
        }
        ClientMessage::ButtonPress { button_id } => {
            state.send_command(Command::ButtonPress { id: button_id });
        }
        ClientMessage::SubscribeFrames { mode, fixture_ids } => {
            state
                .subscribers
                .lock()
                .await
                .subscribe(conn_id, Subscription::new(mode, fixture_ids));
        }
        ClientMessage::UnsubscribeFrames => {
            state.subscribers.lock().await.unsubscribe(conn_id);
        }
        ClientMessage::SetInstanceEnabled {
            instance_id,
            enabled,
        } => {
            state.send_command(Command::SetInstanceEnabled {
                id: instance_id,
                enabled,
            });
        }
    }
}

/// Status identity: the fields whose change warrants a `runtime/status`
/// re-broadcast. Per-tick `writes` echoes are deliberately excluded.
type StatusShape = Vec<(InstanceId, GraphId, bool, u32)>;

/// Consumes engine frames: re-broadcasts status on change, then diffs and
/// dispatches the frame to every subscriber.
pub async fn run_frame_fanout(
    state: Arc<GatewayState>,
    mut frames: watch::Receiver<Option<Arc<Frame>>>,
) {
    let mut last_frame_number = 0u64;
    let mut dropped_frames = 0u64;
    let mut last_shape: Option<StatusShape> = None;

    while frames.changed().await.is_ok() {
        let frame = frames.borrow_and_update().clone();
        let Some(frame) = frame else { continue };

        if last_frame_number != 0 && frame.frame_number > last_frame_number + 1 {
            dropped_frames += frame.frame_number - last_frame_number - 1;
            debug!(dropped_frames, "gateway lagging; newest frame wins");
        }
        last_frame_number = frame.frame_number;

        let shape: StatusShape = frame
            .instances
            .iter()
            .map(|s| {
                (
                    s.instance_id.clone(),
                    s.graph_id.clone(),
                    s.enabled,
                    s.error_count,
                )
            })
            .collect();
        if last_shape.as_ref() != Some(&shape) {
            last_shape = Some(shape);
            let status = ServerMessage::Status {
                tick_hz: frame.tick_hz,
                t: frame.time,
                instances: frame.instances.clone(),
            };
            *state.last_status.lock().await = Some(status.clone());
            state.subscribers.lock().await.broadcast(&status);
        }

        state.subscribers.lock().await.fanout(&frame);
    }
}
