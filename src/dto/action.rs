use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        game::{GameSnapshot, PlayerView},
        validation::{validate_access_code, validate_attempt, validate_round_id, validate_username},
    },
    state::{
        engine::{CheckOutcome, Completion, RoundUpdate},
        game::{Difficulty, MAX_HINTS, ModeKind},
    },
};

/// Body of `POST /api/game`: one action per request, selected by the `action` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum GameAction {
    /// Check an access code against the current game.
    ValidateCode { code: String },
    /// Provision a new game. A code is generated when omitted.
    CreateGame {
        #[serde(default)]
        code: Option<String>,
    },
    /// Add or update a roster entry.
    Join {
        username: String,
        #[serde(default)]
        avatar: Option<String>,
    },
    /// Remove a roster entry.
    Leave { username: String },
    /// Resume without re-joining.
    Reconnect { username: String },
    /// Best-effort presence refresh.
    Heartbeat { username: String },
    /// Begin play.
    Start,
    /// Return to the lobby, keeping progress.
    Stop,
    /// Switch mode, wiping round progress.
    SetMode { mode: ModeKind },
    /// Launch the next controlled round.
    LaunchRound,
    /// Close the current controlled round.
    EndRound,
    /// Reveal one more hint of a round.
    #[serde(rename_all = "camelCase")]
    RevealHint { round_id: u8 },
    /// Compare an attempt with a round's solution.
    #[serde(rename_all = "camelCase")]
    Check { round_id: u8, attempt: String },
    /// Record a round completion.
    #[serde(rename_all = "camelCase")]
    CompleteRound {
        username: String,
        round_id: u8,
        #[serde(default)]
        elapsed_seconds: Option<u32>,
    },
    /// Wipe progress and roster, keeping the game joinable.
    Reset,
    /// Remove the game entirely.
    EndGame,
    /// Bind the admin session.
    #[serde(rename_all = "camelCase")]
    AdminLogin {
        #[serde(default)]
        password: Option<String>,
        /// Previously issued session to refresh.
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Release the admin session and wipe the game.
    AdminLogout,
}

impl GameAction {
    /// Kebab-case action name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            GameAction::ValidateCode { .. } => "validate-code",
            GameAction::CreateGame { .. } => "create-game",
            GameAction::Join { .. } => "join",
            GameAction::Leave { .. } => "leave",
            GameAction::Reconnect { .. } => "reconnect",
            GameAction::Heartbeat { .. } => "heartbeat",
            GameAction::Start => "start",
            GameAction::Stop => "stop",
            GameAction::SetMode { .. } => "set-mode",
            GameAction::LaunchRound => "launch-round",
            GameAction::EndRound => "end-round",
            GameAction::RevealHint { .. } => "reveal-hint",
            GameAction::Check { .. } => "check",
            GameAction::CompleteRound { .. } => "complete-round",
            GameAction::Reset => "reset",
            GameAction::EndGame => "end-game",
            GameAction::AdminLogin { .. } => "admin-login",
            GameAction::AdminLogout => "admin-logout",
        }
    }

    /// Whether the action requires the bound admin session.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            GameAction::CreateGame { .. }
                | GameAction::Start
                | GameAction::Stop
                | GameAction::SetMode { .. }
                | GameAction::LaunchRound
                | GameAction::EndRound
                | GameAction::RevealHint { .. }
                | GameAction::Reset
                | GameAction::EndGame
                | GameAction::AdminLogout
        )
    }
}

impl Validate for GameAction {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self {
            GameAction::ValidateCode { code } => {
                if code.trim().is_empty() {
                    errors.add("code", validator::ValidationError::new("code_required"));
                }
            }
            GameAction::CreateGame { code: Some(code) } => {
                if let Err(e) = validate_access_code(code) {
                    errors.add("code", e);
                }
            }
            GameAction::Join { username, .. }
            | GameAction::Leave { username }
            | GameAction::Reconnect { username }
            | GameAction::Heartbeat { username } => {
                if let Err(e) = validate_username(username) {
                    errors.add("username", e);
                }
            }
            GameAction::RevealHint { round_id } => {
                if let Err(e) = validate_round_id(*round_id) {
                    errors.add("roundId", e);
                }
            }
            GameAction::Check { round_id, attempt } => {
                if let Err(e) = validate_round_id(*round_id) {
                    errors.add("roundId", e);
                }
                if let Err(e) = validate_attempt(attempt) {
                    errors.add("attempt", e);
                }
            }
            GameAction::CompleteRound {
                username, round_id, ..
            } => {
                if let Err(e) = validate_username(username) {
                    errors.add("username", e);
                }
                if let Err(e) = validate_round_id(*round_id) {
                    errors.add("roundId", e);
                }
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Body of `PUT /api/game`: partial edit of one round.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundUpdateRequest {
    /// Round to edit, 1 to 6.
    pub round_id: u8,
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Normalized server-side to six uppercase letters.
    #[serde(default)]
    pub solution: Option<String>,
    /// New difficulty.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// New flavor text.
    #[serde(default)]
    pub question: Option<String>,
    /// Replacement hint list, at most three.
    #[serde(default)]
    pub hints: Option<Vec<String>>,
}

impl Validate for RoundUpdateRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_round_id(self.round_id) {
            errors.add("roundId", e);
        }
        if let Some(hints) = &self.hints
            && hints.len() > MAX_HINTS
        {
            let mut err = validator::ValidationError::new("hints_length");
            err.message = Some(format!("A round has at most {MAX_HINTS} hints").into());
            errors.add("hints", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<RoundUpdateRequest> for RoundUpdate {
    fn from(value: RoundUpdateRequest) -> Self {
        Self {
            name: value.name,
            solution: value.solution,
            difficulty: value.difficulty,
            question: value.question,
            hints: value.hints,
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AckResponse {
    /// Always `true`; failures use the error body.
    pub success: bool,
}

impl AckResponse {
    /// Successful acknowledgement.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Returned by `create-game`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameCreatedResponse {
    /// Code players type to join.
    pub access_code: String,
    /// Admin projection of the new game.
    pub snapshot: GameSnapshot,
}

/// Returned by `join`: the caller's entry plus the full roster.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// The caller's roster entry.
    pub player: PlayerView,
    /// Every player in join order.
    pub players: Vec<PlayerView>,
    /// `false` when an existing entry was updated.
    pub created: bool,
}

/// How a `reconnect` was resolved server-side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStatus {
    /// The player already existed.
    Resumed,
    /// The player was re-registered because the game is still in its lobby.
    Rejoined,
}

/// Returned by `reconnect`: the server's copy of the player and the public snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectResponse {
    /// Whether the entry existed or was recreated.
    pub status: ReconnectStatus,
    /// Server copy of the player.
    pub player: PlayerView,
    /// Public snapshot at reconnect time.
    pub snapshot: GameSnapshot,
}

/// Returned by `launch-round`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundLaunchedResponse {
    /// Round that is now active.
    pub current_round: u8,
}

/// Returned by `end-round`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundEndedResponse {
    /// Players who became finished when the last round closed.
    pub finished: Vec<String>,
}

/// Returned by `reveal-hint`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HintRevealedResponse {
    /// Round the hint belongs to.
    pub round_id: u8,
    /// Hints revealed so far for that round.
    pub revealed_hints: u8,
    /// Text of the hint just revealed.
    pub hint: String,
}

/// Returned by `check`. `solution` is absent unless the attempt is correct.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    /// Whether the attempt matched.
    pub correct: bool,
    /// Stored solution, only on a correct attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

impl From<CheckOutcome> for CheckResponse {
    fn from(outcome: CheckOutcome) -> Self {
        Self {
            correct: outcome.correct,
            solution: outcome.solution,
        }
    }
}

/// Returned by `complete-round`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(untagged)]
pub enum CompletionResponse {
    /// Controlled mode: finishing position within the round.
    #[serde(rename_all = "camelCase")]
    Controlled {
        /// 1-based finishing position.
        position: usize,
        /// Seconds recorded for the round.
        round_time: u32,
    },
    /// Free mode: next round to play, `null` once finished.
    #[serde(rename_all = "camelCase")]
    Free {
        /// 1-based id of the next round.
        next_round: Option<u8>,
        /// Set once all six rounds are done.
        is_finished: bool,
        /// Seconds recorded for the round.
        round_time: u32,
    },
}

impl From<Completion> for CompletionResponse {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Controlled {
                position,
                elapsed_seconds,
            } => CompletionResponse::Controlled {
                position,
                round_time: elapsed_seconds,
            },
            Completion::Free {
                next_round,
                elapsed_seconds,
            } => CompletionResponse::Free {
                next_round,
                is_finished: next_round.is_none(),
                round_time: elapsed_seconds,
            },
        }
    }
}

/// Returned by `admin-login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminSessionResponse {
    /// Value to send back in the `x-admin-session` header.
    pub session_id: String,
    /// Epoch milliseconds.
    pub connected_at: i64,
}

/// Any response of `POST /api/game`.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(untagged)]
pub enum ActionResponse {
    /// Plain acknowledgement.
    Ack(AckResponse),
    /// `create-game`.
    Created(GameCreatedResponse),
    /// `join`.
    Joined(JoinResponse),
    /// `reconnect`.
    Reconnected(ReconnectResponse),
    /// `launch-round`.
    RoundLaunched(RoundLaunchedResponse),
    /// `end-round`.
    RoundEnded(RoundEndedResponse),
    /// `reveal-hint`.
    HintRevealed(HintRevealedResponse),
    /// `check`.
    Checked(CheckResponse),
    /// `complete-round`.
    Completed(CompletionResponse),
    /// `admin-login`.
    AdminSession(AdminSessionResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn actions_are_tagged_in_kebab_case_with_camel_case_fields() {
        let action: GameAction = serde_json::from_value(json!({
            "action": "complete-round",
            "username": "ada",
            "roundId": 3,
            "elapsedSeconds": 42
        }))
        .unwrap();
        assert_eq!(
            action,
            GameAction::CompleteRound {
                username: "ada".into(),
                round_id: 3,
                elapsed_seconds: Some(42)
            }
        );

        let start: GameAction = serde_json::from_value(json!({"action": "launch-round"})).unwrap();
        assert_eq!(start, GameAction::LaunchRound);
    }

    #[test]
    fn missing_username_is_rejected_before_touching_state() {
        let action = GameAction::Join {
            username: " ".into(),
            avatar: None,
        };
        let errors = action.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
    }

    #[test]
    fn out_of_range_round_is_a_validation_error() {
        let action = GameAction::Check {
            round_id: 9,
            attempt: "ANCHOR".into(),
        };
        assert!(action.validate().is_err());
    }

    #[test]
    fn wrong_check_omits_solution_field() {
        let body = serde_json::to_value(CheckResponse {
            correct: false,
            solution: None,
        })
        .unwrap();
        assert_eq!(body, json!({"correct": false}));
    }

    #[test]
    fn finished_free_completion_serializes_null_next_round() {
        let body = serde_json::to_value(CompletionResponse::from(Completion::Free {
            next_round: None,
            elapsed_seconds: 12,
        }))
        .unwrap();
        assert_eq!(
            body,
            json!({"nextRound": null, "isFinished": true, "roundTime": 12})
        );
    }

    #[test]
    fn admin_actions_are_flagged() {
        assert!(GameAction::LaunchRound.requires_admin());
        assert!(
            !GameAction::Heartbeat {
                username: "ada".into()
            }
            .requires_admin()
        );
    }
}
