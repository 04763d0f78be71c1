//! Game Session Engine: synchronous transitions over the two shared documents.
//!
//! Every function here runs inside the mutation gate, between the store read and the
//! store write, so none of them may await. A rejected operation returns a [`GameError`]
//! and leaves the documents exactly as they were.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::state::game::{
    AdminSession, Difficulty, Documents, GameMode, GameState, ModeKind, Player, ROUND_COUNT,
    RoundConfig, Solution, Timestamp, MAX_HINTS,
};

/// Minimum accepted access code length.
pub const MIN_ACCESS_CODE_LENGTH: usize = 4;
/// Round time recorded when neither the client nor the player's timer provides one.
pub const FALLBACK_ROUND_SECONDS: u32 = 60;

/// Business-rule rejection returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Malformed or missing input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// No game has been created.
    #[error("no active game")]
    NoActiveGame,
    /// The game is past its expiry or was deactivated.
    #[error("game has expired")]
    GameExpired,
    /// Access code mismatch.
    #[error("invalid access code")]
    InvalidCode,
    /// Unknown player tried to join after play began.
    #[error("game has already started")]
    GameAlreadyStarted,
    /// Operation not available in the current mode.
    #[error("operation requires {expected:?} mode")]
    WrongMode {
        /// Mode the operation needs.
        expected: ModeKind,
    },
    /// Play has not begun yet.
    #[error("game has not started")]
    GameNotStarted,
    /// All six rounds have already been launched.
    #[error("all rounds have been played")]
    AllRoundsDone,
    /// The current controlled round does not accept answers.
    #[error("round is not active")]
    RoundNotActive,
    /// The submitted round is not the launched one.
    #[error("round {requested} is not the current round ({current})")]
    NotCurrentRound {
        /// Round the client referred to.
        requested: u8,
        /// Round currently launched.
        current: u8,
    },
    /// Every hint of the round is already revealed.
    #[error("no more hints for round {0}")]
    NoMoreHints(u8),
    /// Unknown username.
    #[error("player `{0}` not found")]
    PlayerNotFound(String),
    /// Round identifier outside 1..=6.
    #[error("round {0} not found")]
    RoundNotFound(u8),
    /// Another admin session is already bound.
    #[error("another admin is already connected")]
    AdminAlreadyConnected,
}

impl GameError {
    /// Stable symbolic name exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidInput(_) => "InvalidInput",
            GameError::NoActiveGame => "NoActiveGame",
            GameError::GameExpired => "GameExpired",
            GameError::InvalidCode => "InvalidCode",
            GameError::GameAlreadyStarted => "GameAlreadyStarted",
            GameError::WrongMode { .. } => "WrongMode",
            GameError::GameNotStarted => "GameNotStarted",
            GameError::AllRoundsDone => "AllRoundsDone",
            GameError::RoundNotActive => "RoundNotActive",
            GameError::NotCurrentRound { .. } => "NotCurrentRound",
            GameError::NoMoreHints(_) => "NoMoreHints",
            GameError::PlayerNotFound(_) => "PlayerNotFound",
            GameError::RoundNotFound(_) => "RoundNotFound",
            GameError::AdminAlreadyConnected => "AdminAlreadyConnected",
        }
    }
}

/// Tunables applied by the engine.
#[derive(Debug, Clone, Copy)]
pub struct Rules {
    /// Lifetime of a freshly created game.
    pub game_ttl: Duration,
    /// Age after which a bound admin session may be taken over.
    pub admin_session_timeout: Duration,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            game_ttl: Duration::from_secs(48 * 60 * 60),
            admin_session_timeout: Duration::from_secs(12 * 60 * 60),
        }
    }
}

fn millis(duration: Duration) -> Timestamp {
    duration.as_millis() as Timestamp
}

fn ensure_exists(game: &GameState) -> Result<&str, GameError> {
    game.access_code.as_deref().ok_or(GameError::NoActiveGame)
}

fn ensure_joinable(game: &GameState, now: Timestamp) -> Result<&str, GameError> {
    let code = ensure_exists(game)?;
    if !game.is_active || game.is_expired(now) {
        return Err(GameError::GameExpired);
    }
    Ok(code)
}

fn ensure_started(game: &GameState) -> Result<(), GameError> {
    ensure_exists(game)?;
    if game.is_started {
        Ok(())
    } else {
        Err(GameError::GameNotStarted)
    }
}

fn ensure_round(game: &GameState, round_id: u8) -> Result<&RoundConfig, GameError> {
    if !(1..=ROUND_COUNT).contains(&usize::from(round_id)) {
        return Err(GameError::RoundNotFound(round_id));
    }
    game.round(round_id).ok_or(GameError::RoundNotFound(round_id))
}

fn controlled_cursor_mut(
    game: &mut GameState,
) -> Result<&mut crate::state::game::RoundCursor, GameError> {
    match &mut game.mode {
        GameMode::Controlled(cursor) => Ok(cursor),
        GameMode::Free => Err(GameError::WrongMode {
            expected: ModeKind::Controlled,
        }),
    }
}

fn normalize_access_code(code: &str) -> Result<String, GameError> {
    let code = code.trim().to_uppercase();
    if code.chars().count() < MIN_ACCESS_CODE_LENGTH {
        return Err(GameError::InvalidInput(format!(
            "access code must be at least {MIN_ACCESS_CODE_LENGTH} characters"
        )));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(GameError::InvalidInput(
            "access code must be alphanumeric".into(),
        ));
    }
    Ok(code)
}

// ---------------------------------------------------------------------------
// Access and admin session
// ---------------------------------------------------------------------------

/// Compare `code` with the stored access code, case-insensitively.
pub fn validate_access(game: &GameState, code: &str, now: Timestamp) -> Result<(), GameError> {
    let expected = ensure_joinable(game, now)?;
    if code.trim().to_uppercase() == expected {
        Ok(())
    } else {
        Err(GameError::InvalidCode)
    }
}

/// Bind an admin session, refusing while another fresh session holds the game.
///
/// Presenting the currently bound id refreshes it; a stale session may be taken over.
pub fn bind_admin(
    game: &mut GameState,
    rules: &Rules,
    presented: Option<&str>,
    now: Timestamp,
) -> Result<AdminSession, GameError> {
    if let Some(current) = &game.admin {
        let is_same = presented == Some(current.id.as_str());
        let is_stale = now - current.connected_at >= millis(rules.admin_session_timeout);
        if !is_same && !is_stale {
            return Err(GameError::AdminAlreadyConnected);
        }
    }

    let id = match (&game.admin, presented) {
        (Some(current), Some(presented)) if current.id == presented => current.id.clone(),
        _ => Uuid::new_v4().simple().to_string(),
    };
    let session = AdminSession {
        id,
        connected_at: now,
    };
    game.admin = Some(session.clone());
    Ok(session)
}

/// Whether `session_id` is the admin session bound to the game.
pub fn is_admin(game: &GameState, session_id: &str) -> bool {
    game.admin
        .as_ref()
        .is_some_and(|session| session.id == session_id)
}

/// Release the admin session and wipe the game and roster.
pub fn admin_logout(docs: &mut Documents, now: Timestamp) {
    end_game(docs, now);
    docs.game.admin = None;
}

// ---------------------------------------------------------------------------
// Game lifecycle
// ---------------------------------------------------------------------------

/// Replace the game with a fresh one gated by `code` and clear the roster.
///
/// Authored rounds and the bound admin session survive; everything else is new.
pub fn create_game(
    docs: &mut Documents,
    rules: &Rules,
    code: &str,
    now: Timestamp,
) -> Result<String, GameError> {
    let code = normalize_access_code(code)?;
    let previous = &docs.game;
    docs.game = GameState {
        id: Uuid::new_v4(),
        access_code: Some(code.clone()),
        is_active: true,
        expires_at: Some(now + millis(rules.game_ttl)),
        is_started: false,
        started_at: None,
        mode: GameMode::initial(previous.mode.kind()),
        revealed_hints: [0; ROUND_COUNT],
        rounds: previous.rounds.clone(),
        reset_at: previous.next_reset_at(now),
        admin: previous.admin.clone(),
    };
    docs.roster.clear();
    Ok(code)
}

/// Begin play. Starting an already started game is a no-op.
pub fn start(docs: &mut Documents, now: Timestamp) -> Result<(), GameError> {
    ensure_exists(&docs.game)?;
    if docs.game.is_started {
        return Ok(());
    }
    docs.game.is_started = true;
    docs.game.started_at = Some(now);
    if matches!(docs.game.mode, GameMode::Free) {
        for player in docs.roster.iter_mut() {
            if !player.is_finished {
                player.round_start_time = Some(now);
            }
        }
    }
    Ok(())
}

/// Return to the lobby with round progress intact.
pub fn stop(docs: &mut Documents) -> Result<(), GameError> {
    ensure_exists(&docs.game)?;
    docs.game.is_started = false;
    docs.game.started_at = None;
    Ok(())
}

/// Wipe progress and roster while keeping the game joinable, stamping a new `reset_at`.
pub fn reset_game(docs: &mut Documents, now: Timestamp) {
    let previous = &docs.game;
    docs.game = GameState {
        id: Uuid::new_v4(),
        access_code: previous.access_code.clone(),
        is_active: previous.is_active,
        expires_at: previous.expires_at,
        is_started: false,
        started_at: None,
        mode: GameMode::initial(previous.mode.kind()),
        revealed_hints: [0; ROUND_COUNT],
        rounds: previous.rounds.clone(),
        reset_at: previous.next_reset_at(now),
        admin: previous.admin.clone(),
    };
    docs.roster.clear();
}

/// Remove the game entirely: no access code, empty roster, new `reset_at`.
pub fn end_game(docs: &mut Documents, now: Timestamp) {
    reset_game(docs, now);
    docs.game.access_code = None;
    docs.game.is_active = false;
    docs.game.expires_at = None;
}

/// Switch mode, dropping every piece of round progress. Same-mode switches are no-ops.
pub fn set_mode(docs: &mut Documents, mode: ModeKind, now: Timestamp) -> Result<(), GameError> {
    ensure_exists(&docs.game)?;
    if docs.game.mode.kind() == mode {
        return Ok(());
    }
    docs.game.mode = GameMode::initial(mode);
    docs.game.revealed_hints = [0; ROUND_COUNT];
    for player in docs.roster.iter_mut() {
        player.clear_progress(now);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Controlled rounds and hints
// ---------------------------------------------------------------------------

/// Launch the next controlled round and restart every player's timer at `now`.
pub fn launch_round(docs: &mut Documents, now: Timestamp) -> Result<u8, GameError> {
    ensure_exists(&docs.game)?;
    let is_started = docs.game.is_started;
    let cursor = controlled_cursor_mut(&mut docs.game)?;
    if !is_started {
        return Err(GameError::GameNotStarted);
    }
    if usize::from(cursor.current_round) >= ROUND_COUNT {
        return Err(GameError::AllRoundsDone);
    }

    cursor.current_round += 1;
    cursor.round_active = true;
    cursor.round_winners.clear();
    let round = cursor.current_round;

    for player in docs.roster.iter_mut() {
        player.current_round = round;
        player.has_found_current_round = false;
        player.round_start_time = Some(now);
    }
    Ok(round)
}

/// Close the current controlled round. Closing the last round finishes complete players.
///
/// Returns the usernames that became finished.
pub fn end_round(docs: &mut Documents, now: Timestamp) -> Result<Vec<String>, GameError> {
    ensure_exists(&docs.game)?;
    let cursor = controlled_cursor_mut(&mut docs.game)?;
    if !cursor.round_active {
        return Err(GameError::RoundNotActive);
    }
    cursor.round_active = false;
    if usize::from(cursor.current_round) < ROUND_COUNT {
        return Ok(Vec::new());
    }

    let mut finished = Vec::new();
    for player in docs.roster.iter_mut() {
        if player.completed_all() && !player.is_finished {
            player.is_finished = true;
            player.finished_at = Some(now);
            finished.push(player.username.clone());
        }
    }
    Ok(finished)
}

/// Reveal exactly one more hint for `round_id`, returning the new count.
pub fn reveal_hint(game: &mut GameState, round_id: u8) -> Result<u8, GameError> {
    ensure_exists(game)?;
    let limit = ensure_round(game, round_id)?.hint_limit();
    let slot = &mut game.revealed_hints[usize::from(round_id) - 1];
    if *slot >= limit || usize::from(*slot) >= MAX_HINTS {
        return Err(GameError::NoMoreHints(round_id));
    }
    *slot += 1;
    Ok(*slot)
}

/// Outcome of a solution check. `solution` is only ever set for a correct attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Whether the attempt matched.
    pub correct: bool,
    /// The stored solution, present only when `correct`.
    pub solution: Option<String>,
}

/// Compare `attempt` with the round's solution without touching state.
pub fn check_solution(
    game: &GameState,
    round_id: u8,
    attempt: &str,
) -> Result<CheckOutcome, GameError> {
    ensure_started(game)?;
    let round = ensure_round(game, round_id)?;
    if let Some(cursor) = game.mode.cursor() {
        if round_id != cursor.current_round {
            return Err(GameError::NotCurrentRound {
                requested: round_id,
                current: cursor.current_round,
            });
        }
        if !cursor.round_active {
            return Err(GameError::RoundNotActive);
        }
    }

    let correct = round.solution.matches(attempt);
    Ok(CheckOutcome {
        correct,
        solution: correct.then(|| round.solution.as_str().to_owned()),
    })
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Whether `join` created the player or refreshed an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// A new roster entry was created.
    Created,
    /// An existing entry was kept as canonical.
    Existing,
}

fn validate_username(username: &str) -> Result<&str, GameError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(GameError::InvalidInput("username is required".into()));
    }
    Ok(trimmed)
}

/// Add `username` to the roster or update the mutable fields of its existing entry.
pub fn join(
    docs: &mut Documents,
    username: &str,
    avatar: Option<String>,
    now: Timestamp,
) -> Result<Membership, GameError> {
    let username = validate_username(username)?;
    ensure_joinable(&docs.game, now)?;

    if let Some(existing) = docs.roster.get_mut(username) {
        if avatar.is_some() {
            existing.avatar = avatar;
        }
        return Ok(Membership::Existing);
    }

    if docs.game.is_started {
        return Err(GameError::GameAlreadyStarted);
    }
    docs.roster
        .insert(Player::new(username.to_owned(), avatar, &docs.game, now));
    Ok(Membership::Created)
}

/// Remove `username` from the roster.
pub fn leave(docs: &mut Documents, username: &str) -> Result<Player, GameError> {
    let username = validate_username(username)?;
    docs.roster
        .remove(username)
        .ok_or_else(|| GameError::PlayerNotFound(username.to_owned()))
}

/// Resume an existing player, or lazily register one while the game is still in its lobby.
pub fn reconnect(
    docs: &mut Documents,
    username: &str,
    now: Timestamp,
) -> Result<Membership, GameError> {
    let username = validate_username(username)?;
    if docs.roster.contains(username) {
        return Ok(Membership::Existing);
    }
    let lobby_open = ensure_joinable(&docs.game, now).is_ok() && !docs.game.is_started;
    if !lobby_open {
        return Err(GameError::PlayerNotFound(username.to_owned()));
    }
    docs.roster
        .insert(Player::new(username.to_owned(), None, &docs.game, now));
    Ok(Membership::Created)
}

/// Presence refresh. Shares the lazy-registration rule of [`reconnect`].
pub fn heartbeat(
    docs: &mut Documents,
    username: &str,
    now: Timestamp,
) -> Result<Membership, GameError> {
    reconnect(docs, username, now)
}

/// Result of recording a round completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Controlled mode: 1-based finishing position within the round.
    Controlled {
        /// Position in `round_winners`.
        position: usize,
        /// Seconds recorded for the round.
        elapsed_seconds: u32,
    },
    /// Free mode: next round to play, `None` once finished.
    Free {
        /// 1-based id of the next round.
        next_round: Option<u8>,
        /// Seconds recorded for the round.
        elapsed_seconds: u32,
    },
}

/// Record that `username` solved `round_id`. Repeated calls for the same round are idempotent.
pub fn complete_round(
    docs: &mut Documents,
    username: &str,
    round_id: u8,
    elapsed_seconds: Option<u32>,
    now: Timestamp,
) -> Result<Completion, GameError> {
    let username = validate_username(username)?;
    ensure_started(&docs.game)?;
    ensure_round(&docs.game, round_id)?;
    if let Some(cursor) = docs.game.mode.cursor() {
        if round_id != cursor.current_round {
            return Err(GameError::NotCurrentRound {
                requested: round_id,
                current: cursor.current_round,
            });
        }
        if !cursor.round_active {
            // A retry from an existing winner still gets its position back.
            let recorded = cursor
                .round_winners
                .iter()
                .position(|winner| winner == username)
                .zip(docs.roster.get(username));
            return match recorded {
                Some((index, player)) => Ok(Completion::Controlled {
                    position: index + 1,
                    elapsed_seconds: player.round_times[usize::from(round_id) - 1],
                }),
                None => Err(GameError::RoundNotActive),
            };
        }
    }
    let player = docs
        .roster
        .get_mut(username)
        .ok_or_else(|| GameError::PlayerNotFound(username.to_owned()))?;

    let index = usize::from(round_id) - 1;
    if !player.rounds_completed[index] {
        let elapsed = elapsed_seconds
            .or_else(|| {
                player
                    .round_start_time
                    .map(|started| ((now - started).max(0) / 1000) as u32)
            })
            .unwrap_or(FALLBACK_ROUND_SECONDS);
        player.rounds_completed[index] = true;
        player.round_times[index] = elapsed;
    }
    let recorded = player.round_times[index];

    match &mut docs.game.mode {
        GameMode::Controlled(cursor) => {
            player.has_found_current_round = true;
            player.current_round = cursor.current_round;
            if !cursor.round_winners.iter().any(|winner| winner == username) {
                cursor.round_winners.push(username.to_owned());
            }
            let position = cursor
                .round_winners
                .iter()
                .position(|winner| winner == username)
                .map_or(cursor.round_winners.len(), |index| index + 1);
            Ok(Completion::Controlled {
                position,
                elapsed_seconds: recorded,
            })
        }
        GameMode::Free => {
            if player.completed_all() {
                if !player.is_finished {
                    player.is_finished = true;
                    player.finished_at = Some(now);
                }
                return Ok(Completion::Free {
                    next_round: None,
                    elapsed_seconds: recorded,
                });
            }
            player.current_round = round_id;
            player.round_start_time = Some(now);
            Ok(Completion::Free {
                next_round: Some(round_id + 1),
                elapsed_seconds: recorded,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Round authoring
// ---------------------------------------------------------------------------

/// Partial edit of a round. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundUpdate {
    /// New display name.
    pub name: Option<String>,
    /// Raw solution, normalized before storage.
    pub solution: Option<String>,
    /// New difficulty.
    pub difficulty: Option<Difficulty>,
    /// New flavor text.
    pub question: Option<String>,
    /// Replacement hint list.
    pub hints: Option<Vec<String>>,
}

/// Apply `update` to round `round_id`, normalizing the solution server-side.
pub fn update_round_config(
    game: &mut GameState,
    round_id: u8,
    update: RoundUpdate,
) -> Result<RoundConfig, GameError> {
    if let Some(hints) = &update.hints
        && hints.len() > MAX_HINTS
    {
        return Err(GameError::InvalidInput(format!(
            "a round has at most {MAX_HINTS} hints"
        )));
    }
    let round = game
        .round_mut(round_id)
        .ok_or(GameError::RoundNotFound(round_id))?;

    if let Some(name) = update.name {
        round.name = name;
    }
    if let Some(solution) = update.solution {
        round.solution = Solution::normalize(&solution);
    }
    if let Some(difficulty) = update.difficulty {
        round.difficulty = difficulty;
    }
    if let Some(question) = update.question {
        round.question = question;
    }
    if let Some(hints) = update.hints {
        round.hints = hints;
    }
    Ok(round.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::fixtures;

    const HOUR: Timestamp = 60 * 60 * 1000;

    fn docs() -> Documents {
        Documents::initial(fixtures::rounds())
    }

    fn created(now: Timestamp) -> Documents {
        let mut docs = docs();
        create_game(&mut docs, &Rules::default(), "quiz42", now).unwrap();
        docs
    }

    fn controlled_started(players: &[&str]) -> Documents {
        let mut docs = created(0);
        set_mode(&mut docs, ModeKind::Controlled, 0).unwrap();
        for name in players {
            join(&mut docs, name, None, 0).unwrap();
        }
        start(&mut docs, 0).unwrap();
        docs
    }

    fn winners(docs: &Documents) -> Vec<String> {
        docs.game.mode.cursor().unwrap().round_winners.clone()
    }

    #[test]
    fn create_game_requires_four_characters() {
        let mut docs = docs();
        let err = create_game(&mut docs, &Rules::default(), "abc", 0).unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
        assert!(!docs.game.exists());
    }

    #[test]
    fn create_game_replaces_previous_game_and_roster() {
        let mut docs = created(0);
        join(&mut docs, "ada", None, 1).unwrap();
        let first_id = docs.game.id;

        create_game(&mut docs, &Rules::default(), "next", 5).unwrap();

        assert_ne!(docs.game.id, first_id);
        assert!(docs.roster.is_empty());
        assert_eq!(docs.game.access_code.as_deref(), Some("NEXT"));
        assert_eq!(docs.game.expires_at, Some(5 + 48 * HOUR));
    }

    #[test]
    fn validate_access_is_case_insensitive() {
        let docs = created(0);
        assert_eq!(validate_access(&docs.game, "Quiz42", 1), Ok(()));
        assert_eq!(
            validate_access(&docs.game, "nope", 1),
            Err(GameError::InvalidCode)
        );
    }

    #[test]
    fn validate_access_without_game_fails() {
        let docs = docs();
        assert_eq!(
            validate_access(&docs.game, "quiz42", 0),
            Err(GameError::NoActiveGame)
        );
    }

    #[test]
    fn expiry_blocks_join_and_validation() {
        let mut docs = created(0);
        let after_expiry = 48 * HOUR + 1;

        assert_eq!(
            validate_access(&docs.game, "quiz42", after_expiry),
            Err(GameError::GameExpired)
        );
        assert_eq!(
            join(&mut docs, "ada", None, after_expiry),
            Err(GameError::GameExpired)
        );
        assert!(docs.roster.is_empty());
    }

    #[test]
    fn join_is_idempotent_and_keeps_progress() {
        let mut docs = created(0);
        assert_eq!(join(&mut docs, "ada", None, 1), Ok(Membership::Created));
        start(&mut docs, 2).unwrap();
        complete_round(&mut docs, "ada", 1, Some(30), 3).unwrap();

        assert_eq!(
            join(&mut docs, "ada", Some("fox.png".into()), 4),
            Ok(Membership::Existing)
        );

        assert_eq!(docs.roster.len(), 1);
        let ada = docs.roster.get("ada").unwrap();
        assert_eq!(ada.avatar.as_deref(), Some("fox.png"));
        assert!(ada.rounds_completed[0]);
        assert_eq!(ada.round_times[0], 30);
        assert_eq!(ada.joined_at, 1);
    }

    #[test]
    fn late_joiners_are_rejected_but_existing_players_may_rejoin() {
        let mut docs = created(0);
        join(&mut docs, "ada", None, 0).unwrap();
        start(&mut docs, 1).unwrap();

        assert_eq!(
            join(&mut docs, "bob", None, 2),
            Err(GameError::GameAlreadyStarted)
        );
        assert_eq!(join(&mut docs, "ada", None, 2), Ok(Membership::Existing));
    }

    #[test]
    fn join_requires_username() {
        let mut docs = created(0);
        assert!(matches!(
            join(&mut docs, "   ", None, 0),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn launch_round_requires_controlled_mode_and_started_game() {
        let mut docs = created(0);
        assert_eq!(
            launch_round(&mut docs, 0),
            Err(GameError::WrongMode {
                expected: ModeKind::Controlled
            })
        );
        set_mode(&mut docs, ModeKind::Controlled, 0).unwrap();
        assert_eq!(launch_round(&mut docs, 0), Err(GameError::GameNotStarted));
    }

    #[test]
    fn launch_round_resets_players_for_fairness() {
        let mut docs = controlled_started(&["ada", "bob"]);
        launch_round(&mut docs, 10).unwrap();
        complete_round(&mut docs, "ada", 1, None, 15_000).unwrap();
        end_round(&mut docs, 16_000).unwrap();

        assert_eq!(launch_round(&mut docs, 20_000), Ok(2));

        let cursor = docs.game.mode.cursor().unwrap();
        assert!(cursor.round_active);
        assert!(cursor.round_winners.is_empty());
        for player in docs.roster.iter() {
            assert!(!player.has_found_current_round);
            assert_eq!(player.round_start_time, Some(20_000));
            assert_eq!(player.current_round, 2);
        }
    }

    #[test]
    fn launch_round_stops_after_six() {
        let mut docs = controlled_started(&[]);
        for round in 1..=6 {
            assert_eq!(launch_round(&mut docs, 0), Ok(round));
            end_round(&mut docs, 0).unwrap();
        }
        assert_eq!(launch_round(&mut docs, 0), Err(GameError::AllRoundsDone));
    }

    #[test]
    fn ending_round_six_finishes_complete_players() {
        let mut docs = controlled_started(&["ada", "bob"]);
        for round in 1..=6 {
            launch_round(&mut docs, 0).unwrap();
            complete_round(&mut docs, "ada", round, Some(5), 0).unwrap();
            if round < 6 {
                complete_round(&mut docs, "bob", round, Some(5), 0).unwrap();
                assert_eq!(end_round(&mut docs, 0), Ok(vec![]));
            }
        }
        assert!(!docs.roster.get("ada").unwrap().is_finished);

        assert_eq!(end_round(&mut docs, 99), Ok(vec!["ada".to_string()]));
        assert!(docs.roster.get("ada").unwrap().is_finished);
        assert_eq!(docs.roster.get("ada").unwrap().finished_at, Some(99));
        assert!(!docs.roster.get("bob").unwrap().is_finished);
    }

    #[test]
    fn closed_round_refuses_late_completions() {
        let mut docs = controlled_started(&["ada", "bob"]);
        for round in 1..=6 {
            launch_round(&mut docs, 0).unwrap();
            complete_round(&mut docs, "ada", round, Some(5), 0).unwrap();
            if round < 6 {
                complete_round(&mut docs, "bob", round, Some(5), 0).unwrap();
            }
            end_round(&mut docs, 0).unwrap();
        }
        let before = docs.clone();

        assert_eq!(
            complete_round(&mut docs, "bob", 6, Some(5), 10),
            Err(GameError::RoundNotActive)
        );
        assert_eq!(docs, before);
        assert_eq!(winners(&docs), ["ada"]);
        let bob = docs.roster.get("bob").unwrap();
        assert!(!bob.completed_all());
        assert!(!bob.is_finished);

        assert_eq!(
            complete_round(&mut docs, "ada", 6, Some(99), 10),
            Ok(Completion::Controlled {
                position: 1,
                elapsed_seconds: 5
            })
        );
        assert_eq!(docs, before);
    }

    #[test]
    fn end_round_twice_is_rejected() {
        let mut docs = controlled_started(&[]);
        launch_round(&mut docs, 0).unwrap();
        end_round(&mut docs, 0).unwrap();
        assert_eq!(end_round(&mut docs, 0), Err(GameError::RoundNotActive));
    }

    #[test]
    fn hints_are_revealed_one_at_a_time_up_to_authored_count() {
        let mut docs = created(0);
        assert_eq!(reveal_hint(&mut docs.game, 2), Ok(1));
        assert_eq!(reveal_hint(&mut docs.game, 2), Ok(2));
        assert_eq!(
            reveal_hint(&mut docs.game, 2),
            Err(GameError::NoMoreHints(2))
        );
        assert_eq!(docs.game.revealed_hints, [0, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn hints_are_capped_at_three() {
        let mut docs = created(0);
        docs.game.round_mut(1).unwrap().hints =
            vec!["a".into(), "b".into(), "c".into(), "d".into()];
        for expected in 1..=3 {
            assert_eq!(reveal_hint(&mut docs.game, 1), Ok(expected));
        }
        assert_eq!(
            reveal_hint(&mut docs.game, 1),
            Err(GameError::NoMoreHints(1))
        );
    }

    #[test]
    fn reveal_hint_rejects_unknown_round() {
        let mut docs = created(0);
        assert_eq!(
            reveal_hint(&mut docs.game, 7),
            Err(GameError::RoundNotFound(7))
        );
    }

    #[test]
    fn check_solution_reveals_solution_only_when_correct() {
        let mut docs = created(0);
        start(&mut docs, 0).unwrap();

        let wrong = check_solution(&docs.game, 1, "wrong!").unwrap();
        assert_eq!(
            wrong,
            CheckOutcome {
                correct: false,
                solution: None
            }
        );

        let right = check_solution(&docs.game, 1, "anchor").unwrap();
        assert!(right.correct);
        assert_eq!(right.solution.as_deref(), Some("ANCHOR"));
    }

    #[test]
    fn controlled_check_is_limited_to_the_active_round() {
        let mut docs = controlled_started(&["ada"]);
        launch_round(&mut docs, 0).unwrap();

        assert_eq!(
            check_solution(&docs.game, 2, "bridge"),
            Err(GameError::NotCurrentRound {
                requested: 2,
                current: 1
            })
        );

        end_round(&mut docs, 0).unwrap();
        assert_eq!(
            check_solution(&docs.game, 1, "anchor"),
            Err(GameError::RoundNotActive)
        );
    }

    #[test]
    fn controlled_winners_follow_submission_order() {
        let mut docs = controlled_started(&["a", "b", "c"]);
        launch_round(&mut docs, 0).unwrap();

        let positions: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| complete_round(&mut docs, name, 1, Some(1), 0).unwrap())
            .collect();

        assert_eq!(winners(&docs), ["a", "b", "c"]);
        for (expected, completion) in (1..).zip(positions) {
            assert!(matches!(
                completion,
                Completion::Controlled { position, .. } if position == expected
            ));
        }
    }

    #[test]
    fn repeated_completion_does_not_duplicate_winner() {
        let mut docs = controlled_started(&["a", "b"]);
        launch_round(&mut docs, 0).unwrap();
        complete_round(&mut docs, "a", 1, Some(12), 0).unwrap();
        complete_round(&mut docs, "b", 1, Some(14), 0).unwrap();

        let retry = complete_round(&mut docs, "a", 1, Some(99), 0).unwrap();

        assert_eq!(winners(&docs), ["a", "b"]);
        assert_eq!(
            retry,
            Completion::Controlled {
                position: 1,
                elapsed_seconds: 12
            }
        );
        assert!(docs.roster.get("a").unwrap().has_found_current_round);
    }

    #[test]
    fn completion_requires_known_player() {
        let mut docs = created(0);
        start(&mut docs, 0).unwrap();
        assert_eq!(
            complete_round(&mut docs, "ghost", 1, None, 0),
            Err(GameError::PlayerNotFound("ghost".into()))
        );
    }

    #[test]
    fn elapsed_time_falls_back_to_player_timer() {
        let mut docs = created(0);
        join(&mut docs, "ada", None, 0).unwrap();
        start(&mut docs, 1_000).unwrap();

        complete_round(&mut docs, "ada", 1, None, 43_500).unwrap();
        assert_eq!(docs.roster.get("ada").unwrap().round_times[0], 42);

        docs.roster.get_mut("ada").unwrap().round_start_time = None;
        complete_round(&mut docs, "ada", 2, None, 50_000).unwrap();
        assert_eq!(
            docs.roster.get("ada").unwrap().round_times[1],
            FALLBACK_ROUND_SECONDS
        );
    }

    #[test]
    fn free_mode_progression_finishes_after_round_six() {
        let mut docs = created(0);
        join(&mut docs, "ada", None, 0).unwrap();
        start(&mut docs, 0).unwrap();

        for round in 1..=5 {
            let completion = complete_round(&mut docs, "ada", round, Some(10), 0).unwrap();
            assert_eq!(
                completion,
                Completion::Free {
                    next_round: Some(round + 1),
                    elapsed_seconds: 10
                }
            );
        }
        let ada = docs.roster.get("ada").unwrap();
        assert!(!ada.is_finished);
        assert_eq!(ada.current_round, 5);

        let last = complete_round(&mut docs, "ada", 6, Some(10), 7).unwrap();
        assert_eq!(
            last,
            Completion::Free {
                next_round: None,
                elapsed_seconds: 10
            }
        );
        let ada = docs.roster.get("ada").unwrap();
        assert!(ada.is_finished);
        assert_eq!(ada.finished_at, Some(7));
    }

    #[test]
    fn set_mode_wipes_round_progress() {
        let mut docs = created(0);
        join(&mut docs, "ada", None, 0).unwrap();
        start(&mut docs, 0).unwrap();
        complete_round(&mut docs, "ada", 1, Some(10), 0).unwrap();
        reveal_hint(&mut docs.game, 1).unwrap();

        set_mode(&mut docs, ModeKind::Controlled, 5).unwrap();

        assert_eq!(docs.game.mode, GameMode::initial(ModeKind::Controlled));
        assert_eq!(docs.game.revealed_hints, [0; ROUND_COUNT]);
        let ada = docs.roster.get("ada").unwrap();
        assert_eq!(ada.completed_count(), 0);
        assert_eq!(ada.current_round, 0);
        assert_eq!(ada.round_start_time, Some(5));
    }

    #[test]
    fn reset_strictly_increases_reset_at_and_empties_roster() {
        let mut docs = created(1_000);
        join(&mut docs, "ada", None, 1_000).unwrap();
        let before = docs.game.reset_at;

        reset_game(&mut docs, before);

        assert!(docs.game.reset_at > before);
        assert!(docs.roster.is_empty());
        assert!(docs.game.exists());
        assert!(!docs.game.is_started);
    }

    #[test]
    fn end_game_removes_access_code() {
        let mut docs = created(0);
        end_game(&mut docs, 1);
        assert!(!docs.game.exists());
        assert_eq!(
            join(&mut docs, "ada", None, 2),
            Err(GameError::NoActiveGame)
        );
    }

    #[test]
    fn second_admin_is_rejected_until_session_goes_stale() {
        let rules = Rules::default();
        let mut game = GameState::blank(fixtures::rounds());
        let first = bind_admin(&mut game, &rules, None, 0).unwrap();

        assert_eq!(
            bind_admin(&mut game, &rules, None, 1),
            Err(GameError::AdminAlreadyConnected)
        );
        let refreshed = bind_admin(&mut game, &rules, Some(&first.id), 2).unwrap();
        assert_eq!(refreshed.id, first.id);

        let stale = 2 + millis(rules.admin_session_timeout);
        let takeover = bind_admin(&mut game, &rules, None, stale).unwrap();
        assert_ne!(takeover.id, first.id);
        assert!(is_admin(&game, &takeover.id));
    }

    #[test]
    fn reconnect_resumes_or_registers_only_in_lobby() {
        let mut docs = created(0);
        assert_eq!(reconnect(&mut docs, "ada", 0), Ok(Membership::Created));
        assert_eq!(reconnect(&mut docs, "ada", 1), Ok(Membership::Existing));

        start(&mut docs, 2).unwrap();
        assert_eq!(
            reconnect(&mut docs, "bob", 3),
            Err(GameError::PlayerNotFound("bob".into()))
        );
        assert_eq!(heartbeat(&mut docs, "ada", 3), Ok(Membership::Existing));
    }

    #[test]
    fn round_update_normalizes_solution_and_limits_hints() {
        let mut docs = created(0);
        let update = RoundUpdate {
            solution: Some("tre".into()),
            ..RoundUpdate::default()
        };
        let round = update_round_config(&mut docs.game, 3, update).unwrap();
        assert_eq!(round.solution.as_str(), "TREAAA");

        let too_many = RoundUpdate {
            hints: Some(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
            ..RoundUpdate::default()
        };
        assert!(matches!(
            update_round_config(&mut docs.game, 3, too_many),
            Err(GameError::InvalidInput(_))
        ));
        assert_eq!(
            update_round_config(&mut docs.game, 0, RoundUpdate::default()),
            Err(GameError::RoundNotFound(0))
        );
    }
}
