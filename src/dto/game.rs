use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    game::{Difficulty, Documents, GameState, ModeKind, Player, ROUND_COUNT, RoundConfig},
    leaderboard::{self, Standing},
};

/// Which audience a snapshot is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Players and anonymous readers: no solutions, only revealed hints.
    Public,
    /// The bound admin: full round configuration and presence details.
    Admin {
        /// Number of live player event streams.
        connected_players: usize,
    },
}

/// Full `{gameState, players, leaderboard}` payload returned by `GET` and pushed over SSE.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Game document.
    pub game_state: GameStateView,
    /// Roster in join order.
    pub players: Vec<PlayerView>,
    /// Standings derived from the roster.
    pub leaderboard: Vec<LeaderboardEntryView>,
}

impl GameSnapshot {
    /// Project both documents for the given audience.
    pub fn project(docs: &Documents, projection: Projection) -> Self {
        let admin = matches!(projection, Projection::Admin { .. });
        Self {
            game_state: GameStateView::project(&docs.game, projection),
            players: docs
                .roster
                .iter()
                .map(|player| PlayerView::project(player, admin))
                .collect(),
            leaderboard: leaderboard::rank(&docs.roster)
                .into_iter()
                .map(LeaderboardEntryView::from)
                .collect(),
        }
    }

    /// Look up a player by username.
    pub fn player(&self, username: &str) -> Option<&PlayerView> {
        self.players.iter().find(|player| player.username == username)
    }
}

/// Wire form of the game document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    /// Game id, regenerated on create and reset.
    pub id: Uuid,
    /// Whether a game exists (an access code is set).
    pub has_game: bool,
    /// Only present in the admin projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    /// Whether players may join or play.
    pub is_active: bool,
    /// Epoch milliseconds.
    pub expires_at: Option<i64>,
    /// Left the lobby.
    pub is_started: bool,
    /// Epoch milliseconds.
    pub started_at: Option<i64>,
    /// `free` or `controlled`.
    pub game_mode: ModeKind,
    /// Controlled round cursor, always `0` in free mode.
    pub current_round: u8,
    /// Always `false` in free mode.
    pub round_active: bool,
    /// Usernames in finishing order for the current round.
    pub round_winners: Vec<String>,
    /// Hints revealed per round.
    #[schema(value_type = Vec<u8>)]
    pub revealed_hints: [u8; ROUND_COUNT],
    /// The six rounds.
    pub rounds: Vec<RoundView>,
    /// Epoch milliseconds; a change means every client must log out.
    pub reset_at: i64,
    /// Only present in the admin projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_connected: Option<bool>,
    /// Only present in the admin projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_players: Option<usize>,
}

impl GameStateView {
    fn project(game: &GameState, projection: Projection) -> Self {
        let cursor = game.mode.cursor().cloned().unwrap_or_default();
        let (admin, connected_players) = match projection {
            Projection::Public => (false, None),
            Projection::Admin { connected_players } => (true, Some(connected_players)),
        };

        Self {
            id: game.id,
            has_game: game.exists(),
            access_code: game.access_code.clone().filter(|_| admin),
            is_active: game.is_active,
            expires_at: game.expires_at,
            is_started: game.is_started,
            started_at: game.started_at,
            game_mode: game.mode.kind(),
            current_round: cursor.current_round,
            round_active: cursor.round_active,
            round_winners: cursor.round_winners,
            revealed_hints: game.revealed_hints,
            rounds: game
                .rounds
                .iter()
                .map(|round| {
                    let revealed = game
                        .revealed_hints
                        .get(usize::from(round.id).wrapping_sub(1))
                        .copied()
                        .unwrap_or(0);
                    RoundView::project(round, revealed, admin)
                })
                .collect(),
            reset_at: game.reset_at,
            admin_connected: admin.then_some(game.admin.is_some()),
            connected_players,
        }
    }
}

/// Wire form of a round configuration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    /// 1-based round id.
    pub id: u8,
    /// Display name.
    pub name: String,
    /// Authored difficulty.
    pub difficulty: Difficulty,
    /// Flavor text shown with the grid.
    pub question: String,
    /// Public projection: only the revealed prefix. Admin: every authored hint.
    pub hints: Vec<String>,
    /// Number of authored hints.
    pub hint_count: usize,
    /// Only present in the admin projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

impl RoundView {
    fn project(round: &RoundConfig, revealed: u8, admin: bool) -> Self {
        let visible = if admin {
            round.hints.len()
        } else {
            usize::from(revealed).min(round.hints.len())
        };
        Self {
            id: round.id,
            name: round.name.clone(),
            difficulty: round.difficulty,
            question: round.question.clone(),
            hints: round.hints[..visible].to_vec(),
            hint_count: round.hints.len(),
            solution: admin.then(|| round.solution.as_str().to_owned()),
        }
    }
}

/// Wire form of a roster entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Unique key of the player.
    pub username: String,
    /// Epoch milliseconds.
    pub joined_at: i64,
    /// Optional avatar identifier.
    pub avatar: Option<String>,
    /// Completion flag per round.
    #[schema(value_type = Vec<bool>)]
    pub rounds_completed: [bool; ROUND_COUNT],
    /// Seconds spent per round.
    #[schema(value_type = Vec<u32>)]
    pub round_times: [u32; ROUND_COUNT],
    /// Free mode: next-round cursor. Controlled: the game round.
    pub current_round: u8,
    /// All six rounds done.
    pub is_finished: bool,
    /// Controlled mode: solved the active round.
    pub has_found_current_round: bool,
    /// Only present in the admin projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    /// Only present in the admin projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_start_time: Option<i64>,
}

impl PlayerView {
    /// Project a player for the given audience.
    pub fn project(player: &Player, admin: bool) -> Self {
        Self {
            username: player.username.clone(),
            joined_at: player.joined_at,
            avatar: player.avatar.clone(),
            rounds_completed: player.rounds_completed,
            round_times: player.round_times,
            current_round: player.current_round,
            is_finished: player.is_finished,
            has_found_current_round: player.has_found_current_round,
            finished_at: player.finished_at.filter(|_| admin),
            round_start_time: player.round_start_time.filter(|_| admin),
        }
    }
}

/// One line of the derived leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntryView {
    /// 1-based rank.
    pub rank: usize,
    /// Player key.
    pub username: String,
    /// Optional avatar identifier.
    pub avatar: Option<String>,
    /// Number of completed rounds.
    pub rounds_completed: usize,
    /// Sum of round times in seconds.
    pub total_time: u64,
    /// All six rounds done.
    pub is_finished: bool,
}

impl From<Standing<'_>> for LeaderboardEntryView {
    fn from(standing: Standing<'_>) -> Self {
        Self {
            rank: standing.rank,
            username: standing.player.username.clone(),
            avatar: standing.player.avatar.clone(),
            rounds_completed: standing.player.completed_count(),
            total_time: standing.player.total_time(),
            is_finished: standing.player.is_finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        engine::{self, Rules},
        game::fixtures,
    };

    fn docs_with_hint() -> Documents {
        let mut docs = Documents::initial(fixtures::rounds());
        engine::create_game(&mut docs, &Rules::default(), "code42", 0).unwrap();
        engine::join(&mut docs, "ada", None, 0).unwrap();
        engine::reveal_hint(&mut docs.game, 1).unwrap();
        docs
    }

    #[test]
    fn public_projection_hides_solutions_and_unrevealed_hints() {
        let snapshot = GameSnapshot::project(&docs_with_hint(), Projection::Public);
        let json = serde_json::to_value(&snapshot).unwrap();

        let round = &json["gameState"]["rounds"][0];
        assert!(round.get("solution").is_none());
        assert_eq!(round["hints"], serde_json::json!(["first"]));
        assert_eq!(round["hintCount"], 2);
        assert!(json["gameState"].get("accessCode").is_none());
        assert_eq!(json["gameState"]["hasGame"], true);
        assert!(json["players"][0].get("roundStartTime").is_none());
    }

    #[test]
    fn admin_projection_includes_solutions_and_presence() {
        let snapshot = GameSnapshot::project(
            &docs_with_hint(),
            Projection::Admin {
                connected_players: 3,
            },
        );

        let round = &snapshot.game_state.rounds[0];
        assert_eq!(round.solution.as_deref(), Some("ANCHOR"));
        assert_eq!(round.hints.len(), 2);
        assert_eq!(snapshot.game_state.access_code.as_deref(), Some("CODE42"));
        assert_eq!(snapshot.game_state.connected_players, Some(3));
        assert_eq!(snapshot.players[0].round_start_time, Some(0));
    }

    #[test]
    fn free_mode_reports_neutral_round_fields() {
        let json = serde_json::to_value(GameSnapshot::project(
            &docs_with_hint(),
            Projection::Public,
        ))
        .unwrap();
        assert_eq!(json["gameState"]["gameMode"], "free");
        assert_eq!(json["gameState"]["currentRound"], 0);
        assert_eq!(json["gameState"]["roundActive"], false);
        assert_eq!(json["gameState"]["roundWinners"], serde_json::json!([]));
    }

    #[test]
    fn snapshot_deserializes_back() {
        let snapshot = GameSnapshot::project(&docs_with_hint(), Projection::Public);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: GameSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
