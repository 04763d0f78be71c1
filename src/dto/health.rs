use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of live player event streams.
    pub connected_players: usize,
    /// RFC 3339 time the check ran.
    pub checked_at: String,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(connected_players: usize) -> Self {
        Self::with_status("ok", connected_players)
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(connected_players: usize) -> Self {
        Self::with_status("degraded", connected_players)
    }

    fn with_status(status: &str, connected_players: usize) -> Self {
        Self {
            status: status.to_string(),
            connected_players,
            checked_at: super::format_system_time(std::time::SystemTime::now()),
        }
    }
}
