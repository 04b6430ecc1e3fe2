//! Lifecycle orchestration for activities: creation, sessions, content edits
//! and aggregated views. Every mutation runs under the per-code lock and ends
//! with a single whole-document replace before events fan out to the room.

use rand::Rng;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    dto::{
        interaction::{
            CreateInteractionRequest, CreatedInteraction, Credentials, InteractionSnapshot,
            SessionStatisticsResponse,
        },
        ws::ServerMessage,
    },
    error::ServiceError,
    state::{
        SharedState,
        interaction::{
            AccessControl, ActivityContent, Interaction, RankingEntry,
        },
        stats,
    },
};

const SECRET_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Create a new draft activity under a freshly allocated seven-digit code.
pub async fn create(
    state: &SharedState,
    request: CreateInteractionRequest,
) -> Result<CreatedInteraction, ServiceError> {
    let store = state.require_store().await?;

    let (access, secret) = match request.owner {
        Some(identity) => (AccessControl::Owner { identity }, None),
        None => {
            let secret = generate_secret(state.config().secret_length);
            (
                AccessControl::Secret {
                    secret: secret.clone(),
                },
                Some(secret),
            )
        }
    };

    let mut code = 0;
    let mut allocated = false;
    for _ in 0..state.config().code_retry_limit {
        let candidate = rand::rng().random_range(1_000_000..=9_999_999);
        if !store.exists(candidate).await? {
            code = candidate;
            allocated = true;
            break;
        }
    }
    if !allocated {
        return Err(ServiceError::Conflict(
            "could not allocate a free activity code".into(),
        ));
    }

    let interaction = Interaction::new(
        code,
        request.title,
        access,
        request.kind,
        OffsetDateTime::now_utc(),
    );
    store.replace(code, interaction).await?;

    info!(code, "activity created");
    Ok(CreatedInteraction { code, secret })
}

/// Public projection of an activity; the access secret is redacted.
pub async fn snapshot(state: &SharedState, code: u32) -> Result<InteractionSnapshot, ServiceError> {
    let interaction = state.read_interaction(code).await?;
    Ok(interaction.into())
}

/// Open the current session and notify the room.
pub async fn open(
    state: &SharedState,
    code: u32,
    credentials: &Credentials,
) -> Result<(), ServiceError> {
    let credentials = credentials.clone();
    let session = state
        .mutate_interaction(code, move |interaction| {
            authorize(interaction, &credentials)?;
            interaction.open(OffsetDateTime::now_utc());
            Ok(interaction.current_session)
        })
        .await?;

    state
        .rooms()
        .broadcast(code, ServerMessage::Opened { code, session });
    Ok(())
}

/// Move the display pointer of an open activity and notify the room.
pub async fn advance(
    state: &SharedState,
    code: u32,
    credentials: &Credentials,
    pointer: usize,
) -> Result<(), ServiceError> {
    let credentials = credentials.clone();
    state
        .mutate_interaction(code, move |interaction| {
            authorize(interaction, &credentials)?;
            interaction.advance(pointer)?;
            Ok(())
        })
        .await?;

    state
        .rooms()
        .broadcast(code, ServerMessage::PointerChanged { code, pointer });
    Ok(())
}

/// Close the current session and notify the room which session just ended.
pub async fn close(
    state: &SharedState,
    code: u32,
    credentials: &Credentials,
    ranking: Option<Vec<RankingEntry>>,
) -> Result<(), ServiceError> {
    let credentials = credentials.clone();
    let closed = state
        .mutate_interaction(code, move |interaction| {
            authorize(interaction, &credentials)?;
            let session = interaction.current_session;
            interaction.close(ranking, OffsetDateTime::now_utc())?;
            Ok(session)
        })
        .await?;

    state.rooms().broadcast(
        code,
        ServerMessage::Closed {
            code,
            session: closed,
        },
    );
    Ok(())
}

/// Replace title and content, then delete media files nothing references
/// anymore. The activity kind is fixed at creation.
pub async fn edit_content(
    state: &SharedState,
    code: u32,
    credentials: &Credentials,
    title: String,
    content: ActivityContent,
) -> Result<(), ServiceError> {
    let credentials = credentials.clone();
    let orphans = state
        .mutate_interaction(code, move |interaction| {
            authorize(interaction, &credentials)?;
            if interaction.content.kind() != content.kind() {
                return Err(ServiceError::InvalidInput(
                    "the activity kind cannot change".into(),
                ));
            }

            let before = interaction.content.media_files();
            interaction.title = title;
            interaction.content = content;
            let after = interaction.content.media_files();

            Ok(before
                .difference(&after)
                .cloned()
                .collect::<Vec<String>>())
        })
        .await?;

    for file in orphans {
        if let Err(err) = state.media().delete_file(code, &file).await {
            warn!(code, file, error = %err, "failed to delete orphaned media file");
        }
    }
    Ok(())
}

/// Drop one past session from the history.
pub async fn delete_session_history(
    state: &SharedState,
    code: u32,
    credentials: &Credentials,
    session: u32,
) -> Result<(), ServiceError> {
    let credentials = credentials.clone();
    state
        .mutate_interaction(code, move |interaction| {
            authorize(interaction, &credentials)?;
            interaction.delete_session_history(session);
            Ok(())
        })
        .await
}

/// Delete the activity record and cascade to its media directory.
pub async fn delete(
    state: &SharedState,
    code: u32,
    credentials: &Credentials,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    {
        let _guard = state.lock_code(code).await;
        let interaction = store
            .read(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no activity with code {code}")))?;
        authorize(&interaction, credentials)?;
        store.delete(code).await?;
    }
    state.forget_code(code);

    if let Err(err) = state.media().delete_all(code).await {
        warn!(code, error = %err, "failed to delete activity media directory");
    }

    info!(code, "activity deleted");
    Ok(())
}

/// Aggregated view of one session, shaped by the activity kind.
///
/// Closed sessions aggregate against the content copy captured at close time;
/// the live session uses the current content. Sessions without data read as
/// empty aggregates.
pub async fn session_statistics(
    state: &SharedState,
    code: u32,
    session: u32,
) -> Result<SessionStatisticsResponse, ServiceError> {
    let interaction = state.read_interaction(code).await?;
    let responses = interaction.session_responses(session).to_vec();
    let content = interaction
        .sessions
        .get(&session)
        .and_then(|record| record.content.clone())
        .unwrap_or(interaction.content);

    Ok(match content {
        ActivityContent::Poll(survey) => SessionStatisticsResponse::Questions {
            questions: stats::interaction_statistics(&survey.questions, &responses),
        },
        ActivityContent::Quiz(quiz) => SessionStatisticsResponse::Questions {
            questions: stats::interaction_statistics(&quiz.questions, &responses),
        },
        ActivityContent::WordCloud(_) => {
            let partition = stats::partition_entries(&responses);
            SessionStatisticsResponse::Entries {
                visible: partition.visible,
                deleted: partition.deleted,
            }
        }
        ActivityContent::Brainstorm(brainstorm) => SessionStatisticsResponse::Categories {
            categories: stats::categorized_entries(&brainstorm.categories, &responses),
        },
    })
}

fn authorize(interaction: &Interaction, credentials: &Credentials) -> Result<(), ServiceError> {
    if interaction
        .access
        .permits(credentials.identity.as_deref(), credentials.secret.as_deref())
    {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(
            "credentials do not control this activity".into(),
        ))
    }
}

fn generate_secret(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| SECRET_LETTERS[rng.random_range(0..SECRET_LETTERS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            interaction_store::{InteractionStore, memory::MemoryStore},
            storage::StorageResult,
        },
        dto::interaction::SessionStatisticsResponse,
        state::{
            AppState,
            interaction::{
                ActivityKind, ActivityStatus, AnswerMode, AnswerPayload, ChoiceItem,
                IncomingResponse, Question, SurveyContent,
            },
        },
    };
    use futures::future::BoxFuture;
    use std::sync::Arc;

    async fn test_state() -> (SharedState, MemoryStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryStore::new();
        state.install_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn owner() -> Credentials {
        Credentials {
            identity: Some("teacher-1".into()),
            secret: None,
        }
    }

    fn poll_request() -> CreateInteractionRequest {
        CreateInteractionRequest {
            title: "Favorite language?".into(),
            kind: ActivityKind::Poll,
            owner: Some("teacher-1".into()),
        }
    }

    fn poll_content() -> ActivityContent {
        ActivityContent::Poll(SurveyContent {
            description: String::new(),
            support: None,
            questions: vec![Question {
                prompt: "Pick one".into(),
                support: None,
                mode: AnswerMode::SingleChoice,
                items: vec![
                    ChoiceItem {
                        text: "Rust".into(),
                        image: String::new(),
                        correct: false,
                    },
                    ChoiceItem {
                        text: "Go".into(),
                        image: String::new(),
                        correct: false,
                    },
                ],
                expected: Vec::new(),
            }],
            pointer: 0,
        })
    }

    fn submission(participant: &str, value: &str) -> IncomingResponse {
        IncomingResponse {
            participant: participant.into(),
            name: participant.into(),
            answer: AnswerPayload::Selections {
                selections: vec![vec![value.into()]],
            },
            elapsed_ms: None,
        }
    }

    #[tokio::test]
    async fn owned_creation_yields_no_secret() {
        let (state, _store) = test_state().await;
        let created = create(&state, poll_request()).await.unwrap();

        assert!(created.secret.is_none());
        assert!((1_000_000..=9_999_999).contains(&created.code));
    }

    #[tokio::test]
    async fn anonymous_creation_yields_a_lowercase_secret() {
        let (state, _store) = test_state().await;
        let created = create(
            &state,
            CreateInteractionRequest {
                title: "Anon".into(),
                kind: ActivityKind::WordCloud,
                owner: None,
            },
        )
        .await
        .unwrap();

        let secret = created.secret.unwrap();
        assert_eq!(secret.len(), state.config().secret_length);
        assert!(secret.chars().all(|c| c.is_ascii_lowercase()));

        // The generated secret opens the activity.
        let credentials = Credentials {
            identity: None,
            secret: Some(secret),
        };
        open(&state, created.code, &credentials).await.unwrap();
    }

    #[tokio::test]
    async fn code_allocation_exhaustion_is_a_conflict() {
        struct SaturatedStore;

        impl InteractionStore for SaturatedStore {
            fn exists(&self, _code: u32) -> BoxFuture<'static, StorageResult<bool>> {
                Box::pin(async { Ok(true) })
            }
            fn read(&self, _code: u32) -> BoxFuture<'static, StorageResult<Option<Interaction>>> {
                Box::pin(async { Ok(None) })
            }
            fn replace(
                &self,
                _code: u32,
                _interaction: Interaction,
            ) -> BoxFuture<'static, StorageResult<()>> {
                Box::pin(async { Ok(()) })
            }
            fn delete(&self, _code: u32) -> BoxFuture<'static, StorageResult<()>> {
                Box::pin(async { Ok(()) })
            }
            fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
                Box::pin(async { Ok(()) })
            }
        }

        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(SaturatedStore)).await;

        let err = create(&state, poll_request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn lifecycle_requires_matching_credentials() {
        let (state, _store) = test_state().await;
        let created = create(&state, poll_request()).await.unwrap();

        let wrong = Credentials {
            identity: Some("intruder".into()),
            secret: None,
        };
        let err = open(&state, created.code, &wrong).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        open(&state, created.code, &owner()).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_record_aborts_without_writing() {
        let (state, store) = test_state().await;
        store.seed_raw(1234567, "{broken");

        let err = open(&state, 1234567, &owner()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Corrupt(_)));
        assert_eq!(store.raw(1234567).as_deref(), Some("{broken"));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (state, _store) = test_state().await;
        let err = snapshot(&state, 7654321).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn edit_rejects_a_kind_change() {
        let (state, _store) = test_state().await;
        let created = create(&state, poll_request()).await.unwrap();

        let err = edit_content(
            &state,
            created.code,
            &owner(),
            "Renamed".into(),
            ActivityContent::empty(ActivityKind::WordCloud),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn full_poll_lifecycle_round_trip() {
        let (state, _store) = test_state().await;
        let created = create(&state, poll_request()).await.unwrap();
        let code = created.code;

        edit_content(&state, code, &owner(), "Poll".into(), poll_content())
            .await
            .unwrap();
        open(&state, code, &owner()).await.unwrap();

        // Two participants answer, one changes their mind.
        state
            .mutate_interaction(code, |interaction| {
                interaction.ingest(1, submission("alice", "Rust"))?;
                interaction.ingest(1, submission("bob", "Go"))?;
                interaction.ingest(1, submission("alice", "Go"))?;
                Ok(())
            })
            .await
            .unwrap();

        close(&state, code, &owner(), None).await.unwrap();

        let snapshot = snapshot(&state, code).await.unwrap();
        assert_eq!(snapshot.status, ActivityStatus::Closed);
        assert_eq!(snapshot.current_session, 2);
        assert_eq!(snapshot.responses[&1].len(), 2);

        let SessionStatisticsResponse::Questions { questions } =
            session_statistics(&state, code, 1).await.unwrap()
        else {
            panic!("expected question statistics for a poll");
        };
        assert_eq!(questions[0].respondents, 2);
        assert_eq!(questions[0].items[0].label, "Rust");
        assert_eq!(questions[0].items[0].count, 0);
        assert_eq!(questions[0].items[1].label, "Go");
        assert_eq!(questions[0].items[1].count, 2);
        assert_eq!(questions[0].items[1].percentage, 100);
    }

    #[tokio::test]
    async fn delete_session_history_forgets_one_run() {
        let (state, _store) = test_state().await;
        let created = create(&state, poll_request()).await.unwrap();
        let code = created.code;

        edit_content(&state, code, &owner(), "Poll".into(), poll_content())
            .await
            .unwrap();
        open(&state, code, &owner()).await.unwrap();
        state
            .mutate_interaction(code, |interaction| {
                interaction.ingest(1, submission("alice", "Rust"))?;
                Ok(())
            })
            .await
            .unwrap();
        close(&state, code, &owner(), None).await.unwrap();

        delete_session_history(&state, code, &owner(), 1)
            .await
            .unwrap();

        let snapshot = snapshot(&state, code).await.unwrap();
        assert!(snapshot.sessions.is_empty());
        assert!(snapshot.responses.is_empty());
        // The counter never rewinds.
        assert_eq!(snapshot.current_session, 2);
    }

    #[tokio::test]
    async fn lifecycle_events_echo_the_code_and_session() {
        let (state, _store) = test_state().await;
        let created = create(&state, poll_request()).await.unwrap();
        let code = created.code;
        edit_content(&state, code, &owner(), "Poll".into(), poll_content())
            .await
            .unwrap();

        let mut events = state.rooms().subscribe(code);
        open(&state, code, &owner()).await.unwrap();
        state
            .mutate_interaction(code, |interaction| {
                interaction.ingest(1, submission("alice", "Rust"))?;
                Ok(())
            })
            .await
            .unwrap();
        close(&state, code, &owner(), None).await.unwrap();

        let ServerMessage::Opened {
            code: opened_code,
            session,
        } = events.recv().await.unwrap()
        else {
            panic!("expected an opened event first");
        };
        assert_eq!(opened_code, code);
        assert_eq!(session, 1);

        let ServerMessage::Closed {
            code: closed_code,
            session,
        } = events.recv().await.unwrap()
        else {
            panic!("expected a closed event second");
        };
        assert_eq!(closed_code, code);
        assert_eq!(session, 1);
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let (state, store) = test_state().await;
        let created = create(&state, poll_request()).await.unwrap();

        delete(&state, created.code, &owner()).await.unwrap();
        assert!(!store.exists(created.code).await.unwrap());
    }

    #[tokio::test]
    async fn delete_releases_the_code_lock() {
        let (state, _store) = test_state().await;
        let created = create(&state, poll_request()).await.unwrap();

        open(&state, created.code, &owner()).await.unwrap();
        assert!(state.holds_code_lock(created.code));

        delete(&state, created.code, &owner()).await.unwrap();
        assert!(!state.holds_code_lock(created.code));
    }

    #[tokio::test]
    async fn degraded_mode_rejects_operations() {
        let state = AppState::new(AppConfig::default());
        let err = create(&state, poll_request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
