use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::format_timestamp,
    state::{
        interaction::{
            AccessControl, ActivityContent, ActivityKind, ActivityStatus, Interaction,
            RankingEntry, ResponseRecord, SessionRecord,
        },
        stats::{CategoryBucket, EntryView, QuestionStatistics},
    },
};

/// Payload used to create a brand-new activity.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateInteractionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub kind: ActivityKind,
    /// Identity of the authenticated owner. When omitted the activity is
    /// anonymous and guarded by a generated secret.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Summary returned once an activity has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedInteraction {
    pub code: u32,
    /// Generated access secret, present only for anonymous activities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Caller credentials carried by every mutating request.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct Credentials {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Body of the open request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct OpenRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// Body of the advance request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdvanceRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Question index to show to the room.
    pub pointer: usize,
}

/// Body of the close request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CloseRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Final quiz standings, stored verbatim when present.
    #[serde(default)]
    pub ranking: Option<Vec<RankingEntry>>,
}

/// Body of the content update request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct EditContentRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub content: ActivityContent,
}

/// Body of requests that only carry credentials.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DeleteRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// Public projection of an activity. The access secret is never serialized.
#[derive(Debug, Serialize, ToSchema)]
pub struct InteractionSnapshot {
    pub code: u32,
    pub title: String,
    pub kind: ActivityKind,
    /// Owner identity for owned activities, absent for anonymous ones.
    pub owner: Option<String>,
    /// Whether lifecycle operations require the access secret.
    pub protected: bool,
    pub content: ActivityContent,
    pub status: ActivityStatus,
    pub current_session: u32,
    pub sessions: BTreeMap<u32, SessionRecord>,
    pub responses: BTreeMap<u32, Vec<ResponseRecord>>,
    pub created_at: String,
}

impl From<Interaction> for InteractionSnapshot {
    fn from(interaction: Interaction) -> Self {
        let (owner, protected) = match &interaction.access {
            AccessControl::Owner { identity } => (Some(identity.clone()), false),
            AccessControl::Secret { .. } => (None, true),
        };

        Self {
            code: interaction.code,
            title: interaction.title,
            kind: interaction.content.kind(),
            owner,
            protected,
            content: interaction.content,
            status: interaction.status,
            current_session: interaction.current_session,
            sessions: interaction.sessions,
            responses: interaction.responses,
            created_at: format_timestamp(interaction.created_at),
        }
    }
}

/// Aggregated view of one session, shaped by the activity kind.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum SessionStatisticsResponse {
    /// Per-question tallies for polls and quizzes.
    Questions { questions: Vec<QuestionStatistics> },
    /// Word cloud entries split by visibility.
    Entries {
        visible: Vec<EntryView>,
        deleted: Vec<EntryView>,
    },
    /// Brainstorm entries bucketed per category.
    Categories { categories: Vec<CategoryBucket> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::interaction::AccessControl;
    use time::OffsetDateTime;

    #[test]
    fn snapshot_never_carries_the_access_secret() {
        let interaction = Interaction::new(
            1234567,
            "Secretive".into(),
            AccessControl::Secret {
                secret: "wxyz".into(),
            },
            ActivityKind::Poll,
            OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        );

        let snapshot = InteractionSnapshot::from(interaction);
        assert!(snapshot.protected);
        assert!(snapshot.owner.is_none());

        let payload = serde_json::to_string(&snapshot).unwrap();
        assert!(!payload.contains("wxyz"));
    }

    #[test]
    fn snapshot_exposes_the_owner_identity() {
        let interaction = Interaction::new(
            1234567,
            "Owned".into(),
            AccessControl::Owner {
                identity: "teacher-1".into(),
            },
            ActivityKind::Quiz,
            OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        );

        let snapshot = InteractionSnapshot::from(interaction);
        assert!(!snapshot.protected);
        assert_eq!(snapshot.owner.as_deref(), Some("teacher-1"));
        assert_eq!(snapshot.kind, ActivityKind::Quiz);
    }
}
