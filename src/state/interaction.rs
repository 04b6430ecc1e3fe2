//! Domain model for live activities: content, access control, sessions and
//! response merging. Everything in this module is pure; persistence and
//! broadcasting live in the service layer.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// The four supported activity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Poll,
    Quiz,
    Brainstorm,
    WordCloud,
}

/// Lifecycle status of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Draft,
    Open,
    Closed,
}

/// Who may run lifecycle operations on an activity.
///
/// Exactly one mode applies: either the activity belongs to an authenticated
/// owner, or it is anonymous and guarded by a generated secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AccessControl {
    Owner { identity: String },
    Secret { secret: String },
}

impl AccessControl {
    /// Whether the supplied credentials grant control of the activity.
    pub fn permits(&self, identity: Option<&str>, secret: Option<&str>) -> bool {
        match self {
            AccessControl::Owner { identity: owner } => identity == Some(owner.as_str()),
            AccessControl::Secret { secret: expected } => secret == Some(expected.as_str()),
        }
    }
}

/// Reference to an uploaded media file shown alongside a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaSupport {
    /// File name inside the activity's media directory.
    pub file: String,
    #[serde(default)]
    pub alt: String,
}

/// How participants answer a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    SingleChoice,
    MultipleChoice,
    FreeText,
}

/// One selectable item of a fixed-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChoiceItem {
    pub text: String,
    /// Media file name when the item is an image instead of text.
    #[serde(default)]
    pub image: String,
    /// Marks a correct quiz answer; ignored for polls.
    #[serde(default)]
    pub correct: bool,
}

impl ChoiceItem {
    /// Display label, preferring text over the image file name.
    pub fn label(&self) -> &str {
        if self.text.is_empty() {
            &self.image
        } else {
            &self.text
        }
    }

    /// Whether a submitted selection designates this item.
    pub fn matches(&self, selection: &str) -> bool {
        (!self.text.is_empty() && self.text == selection)
            || (!self.image.is_empty() && self.image == selection)
    }
}

/// A single poll or quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    pub prompt: String,
    #[serde(default)]
    pub support: Option<MediaSupport>,
    pub mode: AnswerMode,
    #[serde(default)]
    pub items: Vec<ChoiceItem>,
    /// Accepted answers for quiz free-text questions.
    #[serde(default)]
    pub expected: Vec<String>,
}

/// Question list content shared by polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SurveyContent {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub support: Option<MediaSupport>,
    pub questions: Vec<Question>,
    /// Index of the question currently shown to the room.
    #[serde(default)]
    pub pointer: usize,
}

/// Quiz content: questions plus a pointer checkpoint restored at close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuizContent {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub support: Option<MediaSupport>,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub pointer: usize,
    /// Pointer value the quiz rewinds to when a session closes.
    #[serde(default)]
    pub pointer_checkpoint: usize,
}

/// Brainstorm category participants can file their entries under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub text: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub alt: String,
}

/// Brainstorm content: a prompt plus optional categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BrainstormContent {
    pub prompt: String,
    #[serde(default)]
    pub support: Option<MediaSupport>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Word cloud content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WordCloudContent {
    pub prompt: String,
    #[serde(default)]
    pub support: Option<MediaSupport>,
}

/// Kind-specific activity content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityContent {
    Poll(SurveyContent),
    Quiz(QuizContent),
    Brainstorm(BrainstormContent),
    WordCloud(WordCloudContent),
}

impl ActivityContent {
    /// Empty content for a freshly created activity of the given kind.
    pub fn empty(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Poll => ActivityContent::Poll(SurveyContent {
                description: String::new(),
                support: None,
                questions: Vec::new(),
                pointer: 0,
            }),
            ActivityKind::Quiz => ActivityContent::Quiz(QuizContent {
                description: String::new(),
                support: None,
                questions: Vec::new(),
                pointer: 0,
                pointer_checkpoint: 0,
            }),
            ActivityKind::Brainstorm => ActivityContent::Brainstorm(BrainstormContent {
                prompt: String::new(),
                support: None,
                categories: Vec::new(),
            }),
            ActivityKind::WordCloud => ActivityContent::WordCloud(WordCloudContent {
                prompt: String::new(),
                support: None,
            }),
        }
    }

    /// The activity kind this content belongs to.
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityContent::Poll(_) => ActivityKind::Poll,
            ActivityContent::Quiz(_) => ActivityKind::Quiz,
            ActivityContent::Brainstorm(_) => ActivityKind::Brainstorm,
            ActivityContent::WordCloud(_) => ActivityKind::WordCloud,
        }
    }

    /// Question list, empty for entry-based activities.
    pub fn questions(&self) -> &[Question] {
        match self {
            ActivityContent::Poll(survey) => &survey.questions,
            ActivityContent::Quiz(quiz) => &quiz.questions,
            ActivityContent::Brainstorm(_) | ActivityContent::WordCloud(_) => &[],
        }
    }

    /// Current display pointer, if this content has one.
    pub fn pointer(&self) -> Option<usize> {
        match self {
            ActivityContent::Poll(survey) => Some(survey.pointer),
            ActivityContent::Quiz(quiz) => Some(quiz.pointer),
            ActivityContent::Brainstorm(_) | ActivityContent::WordCloud(_) => None,
        }
    }

    fn set_pointer(&mut self, pointer: usize) -> bool {
        match self {
            ActivityContent::Poll(survey) => {
                survey.pointer = pointer;
                true
            }
            ActivityContent::Quiz(quiz) => {
                quiz.pointer = pointer;
                true
            }
            ActivityContent::Brainstorm(_) | ActivityContent::WordCloud(_) => false,
        }
    }

    fn support(&self) -> Option<&MediaSupport> {
        match self {
            ActivityContent::Poll(survey) => survey.support.as_ref(),
            ActivityContent::Quiz(quiz) => quiz.support.as_ref(),
            ActivityContent::Brainstorm(brainstorm) => brainstorm.support.as_ref(),
            ActivityContent::WordCloud(cloud) => cloud.support.as_ref(),
        }
    }

    /// Every media file name this content references, used for orphan cleanup.
    pub fn media_files(&self) -> HashSet<String> {
        let mut files = HashSet::new();
        if let Some(support) = self.support() {
            files.insert(support.file.clone());
        }

        for question in self.questions() {
            if let Some(support) = &question.support {
                files.insert(support.file.clone());
            }
            for item in &question.items {
                if !item.image.is_empty() {
                    files.insert(item.image.clone());
                }
            }
        }

        if let ActivityContent::Brainstorm(brainstorm) = self {
            for category in &brainstorm.categories {
                if !category.image.is_empty() {
                    files.insert(category.image.clone());
                }
            }
        }

        files
    }
}

/// Final standings revealed at the end of a quiz session, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RankingEntry {
    pub name: String,
    pub score: i64,
}

/// What a participant submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerPayload {
    /// Per-question selection lists for polls and quizzes, indexed by
    /// question position. A selection holds one value for single-choice
    /// questions and possibly several for multiple-choice ones.
    Selections { selections: Vec<Vec<String>> },
    /// One contributed brainstorm or word cloud entry.
    Entry {
        id: Uuid,
        text: String,
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        color: Option<String>,
    },
}

/// A single stored response within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResponseRecord {
    /// Stable identity of the participant (connection or account scoped).
    pub participant: String,
    /// Display name at submission time.
    pub name: String,
    pub answer: AnswerPayload,
    /// Soft-deleted entries stay in the list with `visible` cleared.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Quiz answer latency used by the front for ranking display.
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
}

fn default_visible() -> bool {
    true
}

impl ResponseRecord {
    /// Entry id when the answer is an entry payload.
    pub fn entry_id(&self) -> Option<Uuid> {
        match &self.answer {
            AnswerPayload::Entry { id, .. } => Some(*id),
            AnswerPayload::Selections { .. } => None,
        }
    }
}

/// Historical record of one run of an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionRecord {
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub started_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>)]
    pub ended_at: Option<OffsetDateTime>,
    /// Copy of the content as it was when the session closed.
    #[serde(default)]
    pub content: Option<ActivityContent>,
    /// Quiz standings supplied by the presenter, never recomputed.
    #[serde(default)]
    pub ranking: Option<Vec<RankingEntry>>,
}

/// Incoming submission before it is merged into a session's response list.
#[derive(Debug, Clone)]
pub struct IncomingResponse {
    pub participant: String,
    pub name: String,
    pub answer: AnswerPayload,
    pub elapsed_ms: Option<u64>,
}

/// A live activity and its full response history, persisted as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Interaction {
    /// Seven-digit join code, unique across the store.
    pub code: u32,
    pub title: String,
    pub access: AccessControl,
    pub content: ActivityContent,
    pub status: ActivityStatus,
    /// Session counter, starting at 1; increments at every close and never
    /// reuses a number.
    pub current_session: u32,
    /// Closed sessions that received at least one response, keyed by number.
    #[serde(default)]
    pub sessions: BTreeMap<u32, SessionRecord>,
    /// Response lists keyed by session number.
    #[serde(default)]
    pub responses: BTreeMap<u32, Vec<ResponseRecord>>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

/// Lifecycle operations rejected in the current status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("activity is not open")]
    NotOpen,
    #[error("activity content has no display pointer")]
    NoPointer,
}

/// Response-list mutations that do not fit the stored data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("answer payload does not fit a {expected:?} activity")]
    MismatchedAnswer { expected: ActivityKind },
    #[error("session {0} has no responses")]
    UnknownSession(u32),
    #[error("reorder rejected: {0}")]
    InvalidReorder(String),
}

impl Interaction {
    /// Fresh draft activity with empty content and no history.
    pub fn new(
        code: u32,
        title: String,
        access: AccessControl,
        kind: ActivityKind,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            code,
            title,
            access,
            content: ActivityContent::empty(kind),
            status: ActivityStatus::Draft,
            current_session: 1,
            sessions: BTreeMap::new(),
            responses: BTreeMap::new(),
            created_at: now,
        }
    }

    /// Open the current session. Opening an already-open activity is a no-op
    /// and keeps the original start timestamp.
    pub fn open(&mut self, now: OffsetDateTime) {
        if self.status == ActivityStatus::Open {
            return;
        }

        self.sessions.insert(
            self.current_session,
            SessionRecord {
                started_at: now,
                ended_at: None,
                content: None,
                ranking: None,
            },
        );
        self.status = ActivityStatus::Open;
    }

    /// Move the display pointer of an open question-based activity.
    pub fn advance(&mut self, pointer: usize) -> Result<(), LifecycleError> {
        if self.status != ActivityStatus::Open {
            return Err(LifecycleError::NotOpen);
        }
        if !self.content.set_pointer(pointer) {
            return Err(LifecycleError::NoPointer);
        }
        Ok(())
    }

    /// Close the current session.
    ///
    /// A session that received no responses is discarded entirely; otherwise
    /// the session record keeps a copy of the content and, for quizzes, the
    /// presenter-supplied ranking. The session counter always advances, and a
    /// quiz rewinds its pointer to the checkpoint.
    pub fn close(
        &mut self,
        ranking: Option<Vec<RankingEntry>>,
        now: OffsetDateTime,
    ) -> Result<(), LifecycleError> {
        if self.status != ActivityStatus::Open {
            return Err(LifecycleError::NotOpen);
        }

        let session = self.current_session;
        let has_responses = self
            .responses
            .get(&session)
            .is_some_and(|list| !list.is_empty());

        if has_responses {
            if let Some(record) = self.sessions.get_mut(&session) {
                record.ended_at = Some(now);
                record.content = Some(self.content.clone());
                if self.content.kind() == ActivityKind::Quiz {
                    record.ranking = ranking;
                }
            }
        } else {
            self.sessions.remove(&session);
            self.responses.remove(&session);
        }

        self.current_session += 1;
        self.status = ActivityStatus::Closed;

        if let ActivityContent::Quiz(quiz) = &mut self.content {
            quiz.pointer = quiz.pointer_checkpoint;
        }

        Ok(())
    }

    /// Drop the stored record and responses of one past session.
    pub fn delete_session_history(&mut self, session: u32) {
        self.sessions.remove(&session);
        self.responses.remove(&session);
    }

    /// Merge a submission into a session's response list.
    ///
    /// Polls and quizzes upsert on the participant identity: a resubmission
    /// replaces the previous answer and refreshes the display name when the
    /// new one is non-empty. Entry-based activities always append. Returns
    /// the index of the merged record together with the refreshed list.
    ///
    /// The session number is taken as-is, so a submission racing a close
    /// lands in the session the participant was answering.
    pub fn ingest(
        &mut self,
        session: u32,
        incoming: IncomingResponse,
    ) -> Result<(usize, &[ResponseRecord]), MergeError> {
        let kind = self.content.kind();
        let upsert = matches!(kind, ActivityKind::Poll | ActivityKind::Quiz);

        match (&incoming.answer, upsert) {
            (AnswerPayload::Selections { .. }, true) | (AnswerPayload::Entry { .. }, false) => {}
            _ => return Err(MergeError::MismatchedAnswer { expected: kind }),
        }

        let is_quiz = kind == ActivityKind::Quiz;
        let list = self.responses.entry(session).or_default();

        let index = if upsert {
            match list
                .iter()
                .position(|record| record.visible && record.participant == incoming.participant)
            {
                Some(index) => {
                    let existing = &mut list[index];
                    existing.answer = incoming.answer;
                    if is_quiz {
                        existing.elapsed_ms = incoming.elapsed_ms;
                    }
                    if !incoming.name.is_empty() {
                        existing.name = incoming.name;
                    }
                    index
                }
                None => {
                    list.push(ResponseRecord {
                        participant: incoming.participant,
                        name: incoming.name,
                        answer: incoming.answer,
                        visible: true,
                        elapsed_ms: if is_quiz { incoming.elapsed_ms } else { None },
                    });
                    list.len() - 1
                }
            }
        } else {
            list.push(ResponseRecord {
                participant: incoming.participant,
                name: incoming.name,
                answer: incoming.answer,
                visible: true,
                elapsed_ms: None,
            });
            list.len() - 1
        };

        Ok((index, list.as_slice()))
    }

    /// Soft-delete the entry with the given id. The record stays in the list
    /// so the list length never shrinks.
    pub fn soft_delete_entry(
        &mut self,
        session: u32,
        entry: Uuid,
    ) -> Result<&[ResponseRecord], MergeError> {
        let list = self
            .responses
            .get_mut(&session)
            .ok_or(MergeError::UnknownSession(session))?;

        for record in list.iter_mut() {
            if record.entry_id() == Some(entry) {
                record.visible = false;
            }
        }

        Ok(list.as_slice())
    }

    /// Soft-delete every entry whose text matches one of the given values.
    pub fn soft_delete_matching(
        &mut self,
        session: u32,
        values: &[String],
    ) -> Result<&[ResponseRecord], MergeError> {
        let list = self
            .responses
            .get_mut(&session)
            .ok_or(MergeError::UnknownSession(session))?;

        for record in list.iter_mut() {
            if let AnswerPayload::Entry { text, .. } = &record.answer {
                if values.contains(text) {
                    record.visible = false;
                }
            }
        }

        Ok(list.as_slice())
    }

    /// Set the color tag of every entry matching the given text.
    pub fn set_entry_color(
        &mut self,
        session: u32,
        value: &str,
        color: &str,
    ) -> Result<&[ResponseRecord], MergeError> {
        let list = self
            .responses
            .get_mut(&session)
            .ok_or(MergeError::UnknownSession(session))?;

        for record in list.iter_mut() {
            if let AnswerPayload::Entry { text, color: tag, .. } = &mut record.answer {
                if text == value {
                    *tag = Some(color.to_owned());
                }
            }
        }

        Ok(list.as_slice())
    }

    /// Apply a presenter-supplied ordering to the visible entries.
    ///
    /// The supplied ids must be exactly the set of visible entry ids,
    /// otherwise nothing changes. Soft-deleted records keep their relative
    /// order after the visible ones.
    pub fn reorder(
        &mut self,
        session: u32,
        order: &[Uuid],
    ) -> Result<&[ResponseRecord], MergeError> {
        let list = self
            .responses
            .get_mut(&session)
            .ok_or(MergeError::UnknownSession(session))?;

        let mut visible_ids = HashSet::new();
        for record in list.iter().filter(|record| record.visible) {
            let Some(id) = record.entry_id() else {
                return Err(MergeError::InvalidReorder(
                    "response list holds non-entry records".into(),
                ));
            };
            visible_ids.insert(id);
        }

        let supplied: HashSet<Uuid> = order.iter().copied().collect();
        if supplied.len() != order.len() || supplied != visible_ids {
            return Err(MergeError::InvalidReorder(
                "supplied ids do not match the visible entries".into(),
            ));
        }

        let mut by_id: HashMap<Uuid, ResponseRecord> = HashMap::new();
        let mut hidden = Vec::new();
        for record in std::mem::take(list) {
            if record.visible {
                if let Some(id) = record.entry_id() {
                    by_id.insert(id, record);
                }
            } else {
                hidden.push(record);
            }
        }

        for id in order {
            if let Some(record) = by_id.remove(id) {
                list.push(record);
            }
        }
        list.extend(hidden);

        Ok(list.as_slice())
    }

    /// Responses of one session; missing sessions read as empty.
    pub fn session_responses(&self, session: u32) -> &[ResponseRecord] {
        self.responses
            .get(&session)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
