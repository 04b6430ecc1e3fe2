//! Response ingestion and response-list mutations driven by the WebSocket
//! layer. Every operation runs a read-modify-write cycle under the per-code
//! lock and then pushes the refreshed list to the room.

use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    error::ServiceError,
    state::{SharedState, interaction::IncomingResponse},
};

/// Merge a submission into the given session and fan out the result.
///
/// The session number is trusted as-is: a submission racing a close lands in
/// the session the participant was looking at. Errors are returned to the
/// caller so the socket layer can report them to the originating connection
/// only.
pub async fn ingest(
    state: &SharedState,
    code: u32,
    session: u32,
    incoming: IncomingResponse,
) -> Result<(), ServiceError> {
    let (record, responses) = state
        .mutate_interaction(code, move |interaction| {
            let (index, list) = interaction.ingest(session, incoming)?;
            Ok((list[index].clone(), list.to_vec()))
        })
        .await?;

    let rooms = state.rooms();
    rooms.broadcast(
        code,
        ServerMessage::ResponseSubmitted {
            code,
            session,
            record,
        },
    );
    rooms.broadcast(
        code,
        ServerMessage::ResponseList {
            code,
            session,
            responses,
        },
    );
    Ok(())
}

/// Soft-delete one entry and push the refreshed list.
pub async fn delete_entry(
    state: &SharedState,
    code: u32,
    session: u32,
    entry: Uuid,
) -> Result<(), ServiceError> {
    let responses = state
        .mutate_interaction(code, move |interaction| {
            Ok(interaction.soft_delete_entry(session, entry)?.to_vec())
        })
        .await?;

    state
        .rooms()
        .broadcast(
            code,
            ServerMessage::ResponseList {
                code,
                session,
                responses,
            },
        );
    Ok(())
}

/// Soft-delete every entry matching one of the values and push the list.
pub async fn delete_matching(
    state: &SharedState,
    code: u32,
    session: u32,
    values: Vec<String>,
) -> Result<(), ServiceError> {
    let responses = state
        .mutate_interaction(code, move |interaction| {
            Ok(interaction.soft_delete_matching(session, &values)?.to_vec())
        })
        .await?;

    state
        .rooms()
        .broadcast(
            code,
            ServerMessage::ResponseList {
                code,
                session,
                responses,
            },
        );
    Ok(())
}

/// Apply a presenter-supplied entry order and push the refreshed list.
pub async fn reorder(
    state: &SharedState,
    code: u32,
    session: u32,
    order: Vec<Uuid>,
) -> Result<(), ServiceError> {
    let responses = state
        .mutate_interaction(code, move |interaction| {
            Ok(interaction.reorder(session, &order)?.to_vec())
        })
        .await?;

    state
        .rooms()
        .broadcast(
            code,
            ServerMessage::ResponseList {
                code,
                session,
                responses,
            },
        );
    Ok(())
}

/// Tag every entry matching the text with a color and push the refreshed list.
pub async fn set_entry_color(
    state: &SharedState,
    code: u32,
    session: u32,
    value: String,
    color: String,
) -> Result<(), ServiceError> {
    let responses = state
        .mutate_interaction(code, {
            let value = value.clone();
            let color = color.clone();
            move |interaction| Ok(interaction.set_entry_color(session, &value, &color)?.to_vec())
        })
        .await?;

    let rooms = state.rooms();
    rooms.broadcast(
        code,
        ServerMessage::EntryColorChanged {
            code,
            session,
            value,
            color,
        },
    );
    rooms.broadcast(
        code,
        ServerMessage::ResponseList {
            code,
            session,
            responses,
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::interaction_store::{InteractionStore, memory::MemoryStore},
        state::{
            AppState,
            interaction::{
                AccessControl, ActivityKind, AnswerPayload, Interaction,
            },
        },
    };
    use std::sync::Arc;
    use time::OffsetDateTime;

    async fn cloud_state(code: u32) -> SharedState {
        let state = AppState::new(AppConfig::default());
        let store = MemoryStore::new();

        let mut interaction = Interaction::new(
            code,
            "Cloud".into(),
            AccessControl::Owner {
                identity: "owner".into(),
            },
            ActivityKind::WordCloud,
            OffsetDateTime::now_utc(),
        );
        interaction.open(OffsetDateTime::now_utc());
        store.replace(code, interaction).await.unwrap();
        state.install_store(Arc::new(store)).await;
        state
    }

    fn entry(participant: &str, text: &str) -> IncomingResponse {
        IncomingResponse {
            participant: participant.into(),
            name: participant.into(),
            answer: AnswerPayload::Entry {
                id: Uuid::new_v4(),
                text: text.into(),
                category: None,
                color: None,
            },
            elapsed_ms: None,
        }
    }

    #[tokio::test]
    async fn ingest_broadcasts_the_record_and_the_refreshed_list() {
        let state = cloud_state(1234567).await;
        let mut events = state.rooms().subscribe(1234567);

        ingest(&state, 1234567, 1, entry("alice", "idea"))
            .await
            .unwrap();

        let ServerMessage::ResponseSubmitted {
            code,
            session,
            record,
        } = events.recv().await.unwrap()
        else {
            panic!("expected a response_submitted event first");
        };
        assert_eq!(code, 1234567);
        assert_eq!(session, 1);
        assert_eq!(record.participant, "alice");

        let ServerMessage::ResponseList {
            code, responses, ..
        } = events.recv().await.unwrap()
        else {
            panic!("expected a response_list event second");
        };
        assert_eq!(code, 1234567);
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn failed_mutation_broadcasts_nothing() {
        let state = cloud_state(1234567).await;
        let mut events = state.rooms().subscribe(1234567);

        // Session 3 has no responses yet, so the delete cannot apply.
        let err = delete_entry(&state, 1234567, 3, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_are_all_kept() {
        let state = cloud_state(1234567).await;

        let mut handles = Vec::new();
        for index in 0..16 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                ingest(
                    &state,
                    1234567,
                    1,
                    entry(&format!("participant-{index}"), "idea"),
                )
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let interaction = state.read_interaction(1234567).await.unwrap();
        assert_eq!(interaction.session_responses(1).len(), 16);
    }

    #[tokio::test]
    async fn color_change_emits_a_dedicated_event() {
        let state = cloud_state(1234567).await;
        ingest(&state, 1234567, 1, entry("alice", "rust"))
            .await
            .unwrap();

        let mut events = state.rooms().subscribe(1234567);
        set_entry_color(&state, 1234567, 1, "rust".into(), "#ff6600".into())
            .await
            .unwrap();

        let ServerMessage::EntryColorChanged { value, color, .. } = events.recv().await.unwrap()
        else {
            panic!("expected an entry_color_changed event");
        };
        assert_eq!(value, "rust");
        assert_eq!(color, "#ff6600");
    }
}
