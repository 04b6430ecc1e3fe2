use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        validation::validate_activity_code,
        ws::{ClientMessage, ServerMessage},
    },
    error::ServiceError,
    services::response_service,
    state::{SharedState, interaction::IncomingResponse, rooms::Presence},
};

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the server keeps about one socket after a successful join.
///
/// The context is owned by the socket task; there is no shared per-connection
/// session state anywhere else.
struct ConnectionContext {
    code: u32,
    identity: String,
    name: String,
    language: String,
}

/// Handle the full lifecycle of one participant or presenter WebSocket.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(JOIN_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match serde_json::from_str::<ClientMessage>(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse websocket message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ClientMessage::Join {
        code,
        identity,
        name,
    } = inbound
    else {
        warn!("first message was not a join");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    if validate_activity_code(code).is_err() {
        send_error(&outbound_tx, "activity code must have seven digits");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    // The room only exists for activities present in the store.
    if let Err(err) = state.read_interaction(code).await {
        send_error(&outbound_tx, &err.to_string());
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let connection_id = Uuid::new_v4();
    let mut context = ConnectionContext {
        code,
        identity,
        name,
        language: "en".into(),
    };

    // Subscribe before joining so this connection sees its own presence event.
    let mut events = state.rooms().subscribe(code);
    let roster = state.rooms().join(
        code,
        connection_id,
        Presence {
            identity: context.identity.clone(),
            name: context.name.clone(),
        },
    );
    state
        .rooms()
        .broadcast(code, ServerMessage::Presence { members: roster });

    info!(code, identity = %context.identity, "participant joined room");

    // Forward room events to this socket until the room or the writer closes.
    let forward_tx = outbound_tx.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if send_message(&forward_tx, &event).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "room subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Leave) => {
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
                Ok(message) => {
                    dispatch(&state, &mut context, connection_id, message, &outbound_tx).await;
                }
                Err(err) => {
                    warn!(code, error = %err, "failed to parse websocket message");
                    send_error(&outbound_tx, "unparseable message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(code, error = %err, "websocket error");
                break;
            }
        }
    }

    forward_task.abort();
    if state.rooms().leave(code, connection_id).is_some() {
        let rooms = state.rooms();
        rooms.broadcast(
            code,
            ServerMessage::MemberLeft {
                identity: context.identity.clone(),
            },
        );
        rooms.broadcast(
            code,
            ServerMessage::Presence {
                members: rooms.roster(code),
            },
        );
    }
    info!(code, identity = %context.identity, "participant left room");

    finalize(writer_task, outbound_tx).await;
}

/// Route one post-join client message.
async fn dispatch(
    state: &SharedState,
    context: &mut ConnectionContext,
    connection_id: Uuid,
    message: ClientMessage,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) {
    let code = context.code;
    let rooms = state.rooms();

    match message {
        ClientMessage::Join { .. } => {
            warn!(code, "ignoring duplicate join message");
        }
        ClientMessage::Submit {
            session,
            answer,
            elapsed_ms,
        } => {
            let incoming = IncomingResponse {
                participant: context.identity.clone(),
                name: context.name.clone(),
                answer,
                elapsed_ms,
            };
            match response_service::ingest(state, code, session, incoming).await {
                Ok(()) => {
                    let _ = send_message(outbound_tx, &ServerMessage::SubmissionAck { session });
                }
                Err(err) => report(outbound_tx, code, "submit", &err),
            }
        }
        ClientMessage::Rename { name } => {
            context.name = name.clone();
            rooms.rename(code, connection_id, &name);
            rooms.broadcast(
                code,
                ServerMessage::NameChanged {
                    identity: context.identity.clone(),
                    name,
                },
            );
            rooms.broadcast(
                code,
                ServerMessage::Presence {
                    members: rooms.roster(code),
                },
            );
        }
        ClientMessage::SetLanguage { language } => {
            debug!(code, from = %context.language, to = %language, "language changed");
            context.language = language;
        }
        ClientMessage::Lock => rooms.broadcast(code, ServerMessage::Locked { code }),
        ClientMessage::Unlock => rooms.broadcast(code, ServerMessage::Unlocked { code }),
        ClientMessage::RevealRanking { ranking } => {
            rooms.broadcast(code, ServerMessage::RankingRevealed { code, ranking });
        }
        ClientMessage::SetCloudVisibility { visible } => {
            rooms.broadcast(code, ServerMessage::CloudVisibility { code, visible });
        }
        ClientMessage::DeleteEntry { session, id } => {
            if let Err(err) = response_service::delete_entry(state, code, session, id).await {
                report(outbound_tx, code, "delete_entry", &err);
            }
        }
        ClientMessage::DeleteMatching { session, values } => {
            if let Err(err) =
                response_service::delete_matching(state, code, session, values).await
            {
                report(outbound_tx, code, "delete_matching", &err);
            }
        }
        ClientMessage::Reorder { session, order } => {
            if let Err(err) = response_service::reorder(state, code, session, order).await {
                report(outbound_tx, code, "reorder", &err);
            }
        }
        ClientMessage::SetEntryColor {
            session,
            value,
            color,
        } => {
            if let Err(err) =
                response_service::set_entry_color(state, code, session, value, color).await
            {
                report(outbound_tx, code, "set_entry_color", &err);
            }
        }
        ClientMessage::Leave | ClientMessage::Unknown => {
            warn!(code, "ignoring unexpected message");
        }
    }
}

/// Serialize a payload and push it onto the connection's writer queue.
fn send_message<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> Result<(), ()>
where
    T: ?Sized + serde::Serialize,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize websocket message");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into())).map_err(|_| ())
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    let _ = send_message(
        tx,
        &ServerMessage::Error {
            message: message.into(),
        },
    );
}

/// Log a failed operation and report it to the originating connection only.
fn report(
    tx: &mpsc::UnboundedSender<Message>,
    code: u32,
    operation: &str,
    err: &ServiceError,
) {
    warn!(code, operation, error = %err, "websocket operation failed");
    send_error(tx, &err.to_string());
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
