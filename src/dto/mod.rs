use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// `POST`/`PUT /api/game` requests and responses.
pub mod action;
/// Snapshot projections.
pub mod game;
/// Health payload.
pub mod health;
/// SSE payloads.
pub mod sse;
/// Input validators.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
