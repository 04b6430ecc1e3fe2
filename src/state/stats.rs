//! Aggregation views over a session's response list. All functions are pure
//! and only ever count visible records.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::interaction::{
    AnswerMode, AnswerPayload, Category, Question, ResponseRecord,
};

/// Tally for one choice item or one distinct free-text answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemStatistics {
    pub label: String,
    pub count: usize,
    /// Share of all choice instances at this question, rounded to a percent.
    pub percentage: u32,
}

/// Aggregates of one question of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuestionStatistics {
    /// Participants who picked at least one value at this question.
    pub respondents: usize,
    pub items: Vec<ItemStatistics>,
}

/// Flat projection of an entry-based response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EntryView {
    pub id: Uuid,
    pub text: String,
    pub category: Option<String>,
    pub color: Option<String>,
    pub contributor: String,
}

/// Word cloud entries split by visibility.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct EntryPartition {
    pub visible: Vec<EntryView>,
    pub deleted: Vec<EntryView>,
}

/// Brainstorm entries of one category, split by visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryBucket {
    pub label: String,
    pub visible: Vec<EntryView>,
    pub deleted: Vec<EntryView>,
}

fn selections_at(record: &ResponseRecord, index: usize) -> Option<&[String]> {
    match &record.answer {
        AnswerPayload::Selections { selections } => {
            selections.get(index).map(Vec::as_slice)
        }
        AnswerPayload::Entry { .. } => None,
    }
}

/// Percentage of `count` over `total`, rounded half up; empty totals read as 0.
fn percentage(count: usize, total: usize) -> u32 {
    if count == 0 || total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// Count participants with at least one selected value at the question index.
pub fn respondents(responses: &[ResponseRecord], index: usize) -> usize {
    responses
        .iter()
        .filter(|record| record.visible)
        .filter_map(|record| selections_at(record, index))
        .filter(|selection| !selection.is_empty())
        .count()
}

/// Aggregate one question over a response list.
///
/// The denominator is the total number of choice instances at this index: a
/// participant selecting two values contributes two instances, so item
/// percentages always sum to roughly 100 even for multiple-choice questions.
pub fn question_statistics(
    question: &Question,
    responses: &[ResponseRecord],
    index: usize,
) -> QuestionStatistics {
    let picked: Vec<&[String]> = responses
        .iter()
        .filter(|record| record.visible)
        .filter_map(|record| selections_at(record, index))
        .collect();

    let total: usize = picked.iter().map(|selection| selection.len()).sum();

    let items = match question.mode {
        AnswerMode::FreeText => {
            // Distinct trimmed answers, in the order they were first seen.
            let mut labels: Vec<String> = Vec::new();
            for selection in &picked {
                for value in *selection {
                    let trimmed = value.trim();
                    if !labels.iter().any(|label| label == trimmed) {
                        labels.push(trimmed.to_owned());
                    }
                }
            }

            labels
                .into_iter()
                .map(|label| {
                    let count = picked
                        .iter()
                        .flat_map(|selection| selection.iter())
                        .filter(|value| value.trim() == label)
                        .count();
                    ItemStatistics {
                        percentage: percentage(count, total),
                        label,
                        count,
                    }
                })
                .collect()
        }
        AnswerMode::SingleChoice | AnswerMode::MultipleChoice => question
            .items
            .iter()
            .map(|item| {
                let count = picked
                    .iter()
                    .flat_map(|selection| selection.iter())
                    .filter(|value| item.matches(value))
                    .count();
                ItemStatistics {
                    label: item.label().to_owned(),
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect(),
    };

    QuestionStatistics {
        respondents: respondents(responses, index),
        items,
    }
}

/// Aggregate every question independently at its own index.
pub fn interaction_statistics(
    questions: &[Question],
    responses: &[ResponseRecord],
) -> Vec<QuestionStatistics> {
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| question_statistics(question, responses, index))
        .collect()
}

fn entry_view(record: &ResponseRecord) -> Option<EntryView> {
    match &record.answer {
        AnswerPayload::Entry {
            id,
            text,
            category,
            color,
        } => Some(EntryView {
            id: *id,
            text: text.clone(),
            category: category.clone(),
            color: color.clone(),
            contributor: record.name.clone(),
        }),
        AnswerPayload::Selections { .. } => None,
    }
}

/// Split word cloud entries into visible and soft-deleted ones.
pub fn partition_entries(responses: &[ResponseRecord]) -> EntryPartition {
    let mut partition = EntryPartition::default();
    for record in responses {
        let Some(view) = entry_view(record) else {
            continue;
        };
        if record.visible {
            partition.visible.push(view);
        } else {
            partition.deleted.push(view);
        }
    }
    partition
}

/// Bucket brainstorm entries per category, matching on category text or image.
/// Entries referencing no known category are dropped. Without categories the
/// whole list lands in one unlabeled bucket.
pub fn categorized_entries(
    categories: &[Category],
    responses: &[ResponseRecord],
) -> Vec<CategoryBucket> {
    if categories.is_empty() {
        let partition = partition_entries(responses);
        return vec![CategoryBucket {
            label: String::new(),
            visible: partition.visible,
            deleted: partition.deleted,
        }];
    }

    let mut buckets: Vec<CategoryBucket> = categories
        .iter()
        .map(|category| CategoryBucket {
            label: if category.text.is_empty() {
                category.image.clone()
            } else {
                category.text.clone()
            },
            visible: Vec::new(),
            deleted: Vec::new(),
        })
        .collect();

    for record in responses {
        let Some(view) = entry_view(record) else {
            continue;
        };
        let Some(tag) = &view.category else {
            continue;
        };
        let Some(position) = categories
            .iter()
            .position(|category| &category.text == tag || &category.image == tag)
        else {
            continue;
        };

        if record.visible {
            buckets[position].visible.push(view);
        } else {
            buckets[position].deleted.push(view);
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::interaction::ChoiceItem;

    fn question(mode: AnswerMode, items: &[&str]) -> Question {
        Question {
            prompt: "prompt".into(),
            support: None,
            mode,
            items: items
                .iter()
                .map(|text| ChoiceItem {
                    text: (*text).into(),
                    image: String::new(),
                    correct: false,
                })
                .collect(),
            expected: Vec::new(),
        }
    }

    fn response(participant: &str, selections: Vec<Vec<&str>>) -> ResponseRecord {
        ResponseRecord {
            participant: participant.into(),
            name: participant.into(),
            answer: AnswerPayload::Selections {
                selections: selections
                    .into_iter()
                    .map(|s| s.into_iter().map(str::to_string).collect())
                    .collect(),
            },
            visible: true,
            elapsed_ms: None,
        }
    }

    fn entry(name: &str, text: &str, category: Option<&str>, visible: bool) -> ResponseRecord {
        ResponseRecord {
            participant: name.into(),
            name: name.into(),
            answer: AnswerPayload::Entry {
                id: Uuid::new_v4(),
                text: text.into(),
                category: category.map(str::to_string),
                color: None,
            },
            visible,
            elapsed_ms: None,
        }
    }

    #[test]
    fn multi_select_uses_choice_instances_as_the_denominator() {
        let question = question(AnswerMode::MultipleChoice, &["Rust", "Go"]);
        let responses = vec![
            response("alice", vec![vec!["Rust", "Go"]]),
            response("bob", vec![vec!["Rust", "Go"]]),
        ];

        let stats = question_statistics(&question, &responses, 0);
        assert_eq!(stats.respondents, 2);
        for item in &stats.items {
            assert_eq!(item.count, 2);
            assert_eq!(item.percentage, 50);
        }
    }

    #[test]
    fn single_select_percentages_sum_to_one_hundred() {
        let question = question(AnswerMode::SingleChoice, &["Rust", "Go", "Zig"]);
        let responses = vec![
            response("alice", vec![vec!["Rust"]]),
            response("bob", vec![vec!["Rust"]]),
            response("carol", vec![vec!["Go"]]),
            response("dave", vec![vec!["Zig"]]),
        ];

        let stats = question_statistics(&question, &responses, 0);
        let total: u32 = stats.items.iter().map(|item| item.percentage).sum();
        assert_eq!(total, 100);
        assert_eq!(stats.items[0].count, 2);
    }

    #[test]
    fn empty_responses_yield_zero_percentages() {
        let question = question(AnswerMode::SingleChoice, &["Rust"]);
        let stats = question_statistics(&question, &[], 0);
        assert_eq!(stats.respondents, 0);
        assert_eq!(stats.items[0].count, 0);
        assert_eq!(stats.items[0].percentage, 0);
    }

    #[test]
    fn free_text_answers_are_trimmed_and_kept_in_first_seen_order() {
        let question = question(AnswerMode::FreeText, &[]);
        let responses = vec![
            response("alice", vec![vec!["  tokio "]]),
            response("bob", vec![vec!["axum"]]),
            response("carol", vec![vec!["tokio"]]),
        ];

        let stats = question_statistics(&question, &responses, 0);
        assert_eq!(stats.items.len(), 2);
        assert_eq!(stats.items[0].label, "tokio");
        assert_eq!(stats.items[0].count, 2);
        assert_eq!(stats.items[1].label, "axum");
    }

    #[test]
    fn soft_deleted_records_are_excluded() {
        let question = question(AnswerMode::SingleChoice, &["Rust"]);
        let mut hidden = response("alice", vec![vec!["Rust"]]);
        hidden.visible = false;
        let responses = vec![hidden, response("bob", vec![vec!["Rust"]])];

        let stats = question_statistics(&question, &responses, 0);
        assert_eq!(stats.respondents, 1);
        assert_eq!(stats.items[0].count, 1);
        assert_eq!(stats.items[0].percentage, 100);
    }

    #[test]
    fn questions_aggregate_independently_per_index() {
        let questions = vec![
            question(AnswerMode::SingleChoice, &["Rust", "Go"]),
            question(AnswerMode::SingleChoice, &["Yes", "No"]),
        ];
        let responses = vec![
            response("alice", vec![vec!["Rust"], vec!["Yes"]]),
            // bob only answered the first question
            response("bob", vec![vec!["Go"]]),
        ];

        let stats = interaction_statistics(&questions, &responses);
        assert_eq!(stats[0].respondents, 2);
        assert_eq!(stats[1].respondents, 1);
        assert_eq!(stats[1].items[0].count, 1);
        assert_eq!(stats[1].items[0].percentage, 100);
    }

    #[test]
    fn partition_splits_on_visibility() {
        let responses = vec![
            entry("alice", "keep", None, true),
            entry("bob", "gone", None, false),
        ];

        let partition = partition_entries(&responses);
        assert_eq!(partition.visible.len(), 1);
        assert_eq!(partition.visible[0].text, "keep");
        assert_eq!(partition.deleted.len(), 1);
        assert_eq!(partition.deleted[0].text, "gone");
    }

    #[test]
    fn categorized_entries_bucket_by_text_and_drop_unknown_tags() {
        let categories = vec![
            Category {
                text: "Pros".into(),
                image: String::new(),
                alt: String::new(),
            },
            Category {
                text: "Cons".into(),
                image: String::new(),
                alt: String::new(),
            },
        ];
        let responses = vec![
            entry("alice", "fast", Some("Pros"), true),
            entry("bob", "verbose", Some("Cons"), false),
            entry("carol", "lost", Some("Nope"), true),
        ];

        let buckets = categorized_entries(&categories, &responses);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].visible.len(), 1);
        assert_eq!(buckets[1].deleted.len(), 1);
        let placed: usize = buckets
            .iter()
            .map(|bucket| bucket.visible.len() + bucket.deleted.len())
            .sum();
        assert_eq!(placed, 2);
    }

    #[test]
    fn no_categories_means_one_flat_bucket() {
        let responses = vec![entry("alice", "idea", None, true)];
        let buckets = categorized_entries(&[], &responses);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].visible.len(), 1);
    }
}
