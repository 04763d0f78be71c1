use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};
use crate::state::game::{
    AdminSession, Difficulty, Documents, GameMode, GameState, ModeKind, Player, ROUND_COUNT,
    RoundConfig, RoundCursor, Roster, Solution, Timestamp,
};

/// Persisted form of the game configuration/status document.
///
/// The mode is flattened back to `gameMode`/`currentRound`/`roundActive`/`roundWinners`
/// so stored documents keep the layout existing clients already read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStateEntity {
    /// Opaque game identifier.
    pub id: Uuid,
    /// Code gating joins.
    pub access_code: Option<String>,
    /// Whether the game accepts players.
    pub is_active: bool,
    /// Soft-expiry instant (epoch ms).
    pub expires_at: Option<Timestamp>,
    /// Whether play has begun.
    pub is_started: bool,
    /// Instant play began (epoch ms).
    pub started_at: Option<Timestamp>,
    /// Mode discriminant.
    pub game_mode: ModeKind,
    /// Controlled round cursor, `0` in free mode.
    pub current_round: u8,
    /// Whether the controlled round accepts answers.
    pub round_active: bool,
    /// Ordered winners of the current controlled round.
    pub round_winners: Vec<String>,
    /// Revealed hints per round.
    pub revealed_hints: [u8; ROUND_COUNT],
    /// Authored rounds.
    pub rounds: Vec<RoundConfigEntity>,
    /// Last wipe instant (epoch ms).
    pub reset_at: Timestamp,
    /// Bound admin session identifier.
    pub admin_session_id: Option<String>,
    /// Instant the admin session was bound (epoch ms).
    pub admin_connected_at: Option<Timestamp>,
}

/// Persisted round configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfigEntity {
    /// Round number, 1..=6.
    pub id: u8,
    /// Display name.
    pub name: String,
    /// Stored solution, never corrected on read.
    pub solution: String,
    /// Difficulty level.
    pub difficulty: Difficulty,
    /// Flavor text.
    pub question: String,
    /// Ordered hints.
    pub hints: Vec<String>,
}

/// Persisted roster entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    /// Username, duplicated from the map key.
    pub username: String,
    /// First join instant (epoch ms).
    pub joined_at: Timestamp,
    /// Opaque avatar reference.
    pub avatar: Option<String>,
    /// Completion flag per round.
    pub rounds_completed: [bool; ROUND_COUNT],
    /// Seconds per round.
    pub round_times: [u32; ROUND_COUNT],
    /// Mode-dependent round cursor.
    pub current_round: u8,
    /// Terminal flag.
    pub is_finished: bool,
    /// Instant the player finished (epoch ms).
    pub finished_at: Option<Timestamp>,
    /// Start of the current round timer (epoch ms).
    pub round_start_time: Option<Timestamp>,
    /// Controlled mode: solved the launched round.
    pub has_found_current_round: bool,
}

/// Persisted player roster: username to player, in join order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RosterEntity {
    /// Players keyed by username.
    pub players: IndexMap<String, PlayerEntity>,
}

impl From<&RoundConfig> for RoundConfigEntity {
    fn from(round: &RoundConfig) -> Self {
        Self {
            id: round.id,
            name: round.name.clone(),
            solution: round.solution.as_str().to_owned(),
            difficulty: round.difficulty,
            question: round.question.clone(),
            hints: round.hints.clone(),
        }
    }
}

impl From<RoundConfigEntity> for RoundConfig {
    fn from(entity: RoundConfigEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            solution: Solution::from_stored(entity.solution),
            difficulty: entity.difficulty,
            question: entity.question,
            hints: entity.hints,
        }
    }
}

impl From<&GameState> for GameStateEntity {
    fn from(game: &GameState) -> Self {
        let cursor = game.mode.cursor().cloned().unwrap_or_default();
        Self {
            id: game.id,
            access_code: game.access_code.clone(),
            is_active: game.is_active,
            expires_at: game.expires_at,
            is_started: game.is_started,
            started_at: game.started_at,
            game_mode: game.mode.kind(),
            current_round: cursor.current_round,
            round_active: cursor.round_active,
            round_winners: cursor.round_winners,
            revealed_hints: game.revealed_hints,
            rounds: game.rounds.iter().map(RoundConfigEntity::from).collect(),
            reset_at: game.reset_at,
            admin_session_id: game.admin.as_ref().map(|admin| admin.id.clone()),
            admin_connected_at: game.admin.as_ref().map(|admin| admin.connected_at),
        }
    }
}

impl TryFrom<GameStateEntity> for GameState {
    type Error = StorageError;

    fn try_from(entity: GameStateEntity) -> StorageResult<Self> {
        if entity.rounds.len() != ROUND_COUNT {
            return Err(StorageError::corrupt(
                "game state",
                format!("expected {ROUND_COUNT} rounds, found {}", entity.rounds.len()),
            ));
        }
        if usize::from(entity.current_round) > ROUND_COUNT {
            return Err(StorageError::corrupt(
                "game state",
                format!("current round {} out of range", entity.current_round),
            ));
        }

        let mode = match entity.game_mode {
            ModeKind::Free => GameMode::Free,
            ModeKind::Controlled => GameMode::Controlled(RoundCursor {
                current_round: entity.current_round,
                round_active: entity.round_active,
                round_winners: entity.round_winners,
            }),
        };
        let admin = entity
            .admin_session_id
            .map(|id| AdminSession {
                id,
                connected_at: entity.admin_connected_at.unwrap_or_default(),
            });

        Ok(GameState {
            id: entity.id,
            access_code: entity.access_code,
            is_active: entity.is_active,
            expires_at: entity.expires_at,
            is_started: entity.is_started,
            started_at: entity.started_at,
            mode,
            revealed_hints: entity.revealed_hints,
            rounds: entity.rounds.into_iter().map(RoundConfig::from).collect(),
            reset_at: entity.reset_at,
            admin,
        })
    }
}

impl From<&Player> for PlayerEntity {
    fn from(player: &Player) -> Self {
        Self {
            username: player.username.clone(),
            joined_at: player.joined_at,
            avatar: player.avatar.clone(),
            rounds_completed: player.rounds_completed,
            round_times: player.round_times,
            current_round: player.current_round,
            is_finished: player.is_finished,
            finished_at: player.finished_at,
            round_start_time: player.round_start_time,
            has_found_current_round: player.has_found_current_round,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(entity: PlayerEntity) -> Self {
        Self {
            username: entity.username,
            joined_at: entity.joined_at,
            avatar: entity.avatar,
            rounds_completed: entity.rounds_completed,
            round_times: entity.round_times,
            current_round: entity.current_round,
            is_finished: entity.is_finished,
            finished_at: entity.finished_at,
            round_start_time: entity.round_start_time,
            has_found_current_round: entity.has_found_current_round,
        }
    }
}

impl From<&Roster> for RosterEntity {
    fn from(roster: &Roster) -> Self {
        Self {
            players: roster
                .iter()
                .map(|player| (player.username.clone(), PlayerEntity::from(player)))
                .collect(),
        }
    }
}

impl TryFrom<RosterEntity> for Roster {
    type Error = StorageError;

    fn try_from(entity: RosterEntity) -> StorageResult<Self> {
        if let Some((key, player)) = entity
            .players
            .iter()
            .find(|(key, player)| **key != player.username)
        {
            return Err(StorageError::corrupt(
                "players",
                format!("entry `{key}` holds player `{}`", player.username),
            ));
        }
        Ok(Roster::from_players(
            entity.players.into_values().map(Player::from),
        ))
    }
}

/// Rebuild the documents from what the store returned, falling back to a blank state.
pub fn documents_from_entities(
    game: Option<GameStateEntity>,
    roster: Option<RosterEntity>,
    default_rounds: &[RoundConfig],
) -> StorageResult<Documents> {
    let game = match game {
        Some(entity) => GameState::try_from(entity)?,
        None => GameState::blank(default_rounds.to_vec()),
    };
    let roster = match roster {
        Some(entity) => Roster::try_from(entity)?,
        None => Roster::default(),
    };
    Ok(Documents { game, roster })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::fixtures;

    #[test]
    fn persisted_game_uses_flat_camel_case_layout() {
        let mut game = GameState::blank(fixtures::rounds());
        game.mode = GameMode::Controlled(RoundCursor {
            current_round: 2,
            round_active: true,
            round_winners: vec!["ada".into()],
        });

        let value = serde_json::to_value(GameStateEntity::from(&game)).unwrap();

        assert_eq!(value["gameMode"], "controlled");
        assert_eq!(value["currentRound"], 2);
        assert_eq!(value["roundActive"], true);
        assert_eq!(value["roundWinners"][0], "ada");
        assert_eq!(value["rounds"][0]["solution"], "ANCHOR");
    }

    #[test]
    fn stored_solution_is_kept_verbatim() {
        let mut entity = GameStateEntity::from(&GameState::blank(fixtures::rounds()));
        entity.rounds[0].solution = "odd".into();

        let game = GameState::try_from(entity).unwrap();
        assert_eq!(game.rounds[0].solution.as_str(), "odd");
    }

    #[test]
    fn wrong_round_count_is_rejected() {
        let mut entity = GameStateEntity::from(&GameState::blank(fixtures::rounds()));
        entity.rounds.pop();
        assert!(matches!(
            GameState::try_from(entity),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn missing_field_fails_deserialization() {
        let mut value =
            serde_json::to_value(GameStateEntity::from(&GameState::blank(fixtures::rounds())))
                .unwrap();
        value.as_object_mut().unwrap().remove("revealedHints");
        assert!(serde_json::from_value::<GameStateEntity>(value).is_err());
    }

    #[test]
    fn roster_round_trips_in_join_order() {
        let game = GameState::blank(fixtures::rounds());
        let roster = Roster::from_players([
            Player::new("zoe".into(), None, &game, 1),
            Player::new("ada".into(), Some("owl".into()), &game, 2),
        ]);

        let json = serde_json::to_string(&RosterEntity::from(&roster)).unwrap();
        let back = Roster::try_from(serde_json::from_str::<RosterEntity>(&json).unwrap()).unwrap();

        assert_eq!(back, roster);
        assert!(json.find("zoe") < json.find("ada"));
    }
}
