use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod health;
pub mod interaction;
pub mod validation;
pub mod ws;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
