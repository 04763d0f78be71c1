use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of rounds in every game.
pub const ROUND_COUNT: usize = 6;
/// Length every stored solution is normalized to.
pub const SOLUTION_LENGTH: usize = 6;
/// Hard cap on authored and revealed hints per round.
pub const MAX_HINTS: usize = 3;
/// Character used to right-pad short solutions.
const SOLUTION_PAD: char = 'A';

/// Wall-clock instant expressed in milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Discriminant of [`GameMode`] used on the wire and in requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Every player advances through the rounds at their own pace.
    Free,
    /// The admin drives a single shared round cursor.
    Controlled,
}

/// Play mode of the game together with the data that only exists in that mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameMode {
    /// No shared round machine; progress lives on each player.
    Free,
    /// Shared round cursor driven by the admin.
    Controlled(RoundCursor),
}

impl GameMode {
    /// Build a mode in its initial state.
    pub fn initial(kind: ModeKind) -> Self {
        match kind {
            ModeKind::Free => GameMode::Free,
            ModeKind::Controlled => GameMode::Controlled(RoundCursor::default()),
        }
    }

    /// Discriminant of this mode.
    pub fn kind(&self) -> ModeKind {
        match self {
            GameMode::Free => ModeKind::Free,
            GameMode::Controlled(_) => ModeKind::Controlled,
        }
    }

    /// Shared round cursor, present only in controlled mode.
    pub fn cursor(&self) -> Option<&RoundCursor> {
        match self {
            GameMode::Free => None,
            GameMode::Controlled(cursor) => Some(cursor),
        }
    }
}

/// Shared round progress in controlled mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundCursor {
    /// Round currently launched (1..=6), `0` before the first launch.
    pub current_round: u8,
    /// Whether the current round accepts answers.
    pub round_active: bool,
    /// Usernames in the order their correct submissions were serialized.
    pub round_winners: Vec<String>,
}

/// Authored difficulty level of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Warm-up round.
    Easy,
    /// Standard round.
    Medium,
    /// Demanding round.
    Hard,
    /// Final-boss round.
    Expert,
}

/// Six-letter uppercase solution of a round.
///
/// Values coming from clients go through [`Solution::normalize`]; values read back from
/// storage go through [`Solution::from_stored`] and are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution(String);

impl Solution {
    /// Strip non-letters, uppercase, truncate to six characters and right-pad with `A`.
    pub fn normalize(raw: &str) -> Self {
        let mut letters: String = raw
            .chars()
            .filter(char::is_ascii_alphabetic)
            .map(|c| c.to_ascii_uppercase())
            .take(SOLUTION_LENGTH)
            .collect();
        while letters.len() < SOLUTION_LENGTH {
            letters.push(SOLUTION_PAD);
        }
        Self(letters)
    }

    /// Wrap a persisted value without touching it.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// Borrow the stored text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-case the attempt and compare it with the stored solution.
    pub fn matches(&self, attempt: &str) -> bool {
        attempt.to_uppercase() == self.0
    }
}

/// Authored configuration of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundConfig {
    /// Round number, 1..=6.
    pub id: u8,
    /// Display name.
    pub name: String,
    /// Expected answer.
    pub solution: Solution,
    /// Difficulty level.
    pub difficulty: Difficulty,
    /// Flavor text shown to players.
    pub question: String,
    /// Ordered hints, at most [`MAX_HINTS`].
    pub hints: Vec<String>,
}

impl RoundConfig {
    /// Number of hints that can be revealed for this round.
    pub fn hint_limit(&self) -> u8 {
        self.hints.len().min(MAX_HINTS) as u8
    }
}

/// Admin session currently bound to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    /// Opaque session identifier handed to the admin client.
    pub id: String,
    /// Time the session was bound or last refreshed.
    pub connected_at: Timestamp,
}

/// Singleton game configuration and status document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    /// Opaque identifier, regenerated on every create/reset.
    pub id: Uuid,
    /// Code gating joins; `None` means there is no joinable game.
    pub access_code: Option<String>,
    /// Whether the game accepts players.
    pub is_active: bool,
    /// Soft-expiry instant of the game.
    pub expires_at: Option<Timestamp>,
    /// Whether play has begun.
    pub is_started: bool,
    /// Instant play began.
    pub started_at: Option<Timestamp>,
    /// Mode and mode-specific progress.
    pub mode: GameMode,
    /// Revealed hint counter per round.
    pub revealed_hints: [u8; ROUND_COUNT],
    /// The six authored rounds.
    pub rounds: Vec<RoundConfig>,
    /// Last time the game was wiped; a change forces clients to log out.
    pub reset_at: Timestamp,
    /// Admin session bound to the game, if any.
    pub admin: Option<AdminSession>,
}

impl GameState {
    /// State used when nothing was ever persisted: no game, stable identifiers.
    pub fn blank(rounds: Vec<RoundConfig>) -> Self {
        Self {
            id: Uuid::nil(),
            access_code: None,
            is_active: false,
            expires_at: None,
            is_started: false,
            started_at: None,
            mode: GameMode::Free,
            revealed_hints: [0; ROUND_COUNT],
            rounds,
            reset_at: 0,
            admin: None,
        }
    }

    /// Whether a game exists (an access code is set).
    pub fn exists(&self) -> bool {
        self.access_code.is_some()
    }

    /// Whether the game is past its soft-expiry instant.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Look up a round by its 1-based identifier.
    pub fn round(&self, round_id: u8) -> Option<&RoundConfig> {
        self.rounds.iter().find(|round| round.id == round_id)
    }

    /// Mutable lookup of a round by its 1-based identifier.
    pub fn round_mut(&mut self, round_id: u8) -> Option<&mut RoundConfig> {
        self.rounds.iter_mut().find(|round| round.id == round_id)
    }

    /// Next `reset_at` value, strictly greater than the current one.
    pub fn next_reset_at(&self, now: Timestamp) -> Timestamp {
        now.max(self.reset_at + 1)
    }
}

/// Roster entry keyed by username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Username, the player's only identity.
    pub username: String,
    /// First join instant.
    pub joined_at: Timestamp,
    /// Opaque avatar reference.
    pub avatar: Option<String>,
    /// Completion flag per round, indexed by `round - 1`.
    pub rounds_completed: [bool; ROUND_COUNT],
    /// Seconds spent per round, indexed by `round - 1`.
    pub round_times: [u32; ROUND_COUNT],
    /// Free mode: 0-based cursor of the next round. Controlled: mirror of the game round.
    pub current_round: u8,
    /// Set once all rounds are complete.
    pub is_finished: bool,
    /// Instant the player finished.
    pub finished_at: Option<Timestamp>,
    /// Start of the timer for the current round.
    pub round_start_time: Option<Timestamp>,
    /// Controlled mode: already solved the launched round.
    pub has_found_current_round: bool,
}

impl Player {
    /// Fresh player joining at `now`, aligned with the game's round cursor.
    pub fn new(username: String, avatar: Option<String>, game: &GameState, now: Timestamp) -> Self {
        Self {
            username,
            joined_at: now,
            avatar,
            rounds_completed: [false; ROUND_COUNT],
            round_times: [0; ROUND_COUNT],
            current_round: game.mode.cursor().map_or(0, |cursor| cursor.current_round),
            is_finished: false,
            finished_at: None,
            round_start_time: Some(now),
            has_found_current_round: false,
        }
    }

    /// Number of completed rounds.
    pub fn completed_count(&self) -> usize {
        self.rounds_completed.iter().filter(|done| **done).count()
    }

    /// Whether every round has been completed.
    pub fn completed_all(&self) -> bool {
        self.rounds_completed.iter().all(|done| *done)
    }

    /// Sum of recorded round times in seconds.
    pub fn total_time(&self) -> u64 {
        self.round_times.iter().map(|secs| u64::from(*secs)).sum()
    }

    /// Drop every piece of per-round progress and restart the timer.
    pub fn clear_progress(&mut self, now: Timestamp) {
        self.rounds_completed = [false; ROUND_COUNT];
        self.round_times = [0; ROUND_COUNT];
        self.current_round = 0;
        self.is_finished = false;
        self.finished_at = None;
        self.round_start_time = Some(now);
        self.has_found_current_round = false;
    }
}

/// Player roster document, ordered by first join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    players: IndexMap<String, Player>,
}

impl Roster {
    /// Build a roster from players in join order.
    pub fn from_players(players: impl IntoIterator<Item = Player>) -> Self {
        Self {
            players: players
                .into_iter()
                .map(|player| (player.username.clone(), player))
                .collect(),
        }
    }

    /// Look up a player by username.
    pub fn get(&self, username: &str) -> Option<&Player> {
        self.players.get(username)
    }

    /// Mutable lookup of a player by username.
    pub fn get_mut(&mut self, username: &str) -> Option<&mut Player> {
        self.players.get_mut(username)
    }

    /// Whether a player with this username exists.
    pub fn contains(&self, username: &str) -> bool {
        self.players.contains_key(username)
    }

    /// Insert a player, keeping its original position when replacing.
    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.username.clone(), player);
    }

    /// Remove a player, preserving the order of the others.
    pub fn remove(&mut self, username: &str) -> Option<Player> {
        self.players.shift_remove(username)
    }

    /// Drop every player.
    pub fn clear(&mut self) {
        self.players.clear();
    }

    /// Iterate over players in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Mutably iterate over players in join order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Number of players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Both shared documents, always read and written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    /// Game configuration/status document.
    pub game: GameState,
    /// Player roster document.
    pub roster: Roster,
}

impl Documents {
    /// Documents used before anything was persisted.
    pub fn initial(rounds: Vec<RoundConfig>) -> Self {
        Self {
            game: GameState::blank(rounds),
            roster: Roster::default(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn rounds() -> Vec<RoundConfig> {
        (1..=ROUND_COUNT as u8)
            .map(|id| RoundConfig {
                id,
                name: format!("Round {id}"),
                solution: Solution::normalize(["ANCHOR", "BRIDGE", "CASTLE", "DRAGON", "EMBERS", "FOREST"][id as usize - 1]),
                difficulty: Difficulty::Medium,
                question: format!("Question {id}"),
                hints: vec!["first".into(), "second".into()],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_solutions_are_padded() {
        assert_eq!(Solution::normalize("tre").as_str(), "TREAAA");
    }

    #[test]
    fn long_solutions_are_truncated() {
        assert_eq!(Solution::normalize("treasurex").as_str(), "TREASU");
    }

    #[test]
    fn non_letters_are_stripped_before_truncation() {
        assert_eq!(Solution::normalize("t-r 3e!a$s").as_str(), "TREASA");
        assert_eq!(Solution::normalize("").as_str(), "AAAAAA");
        assert_eq!(Solution::normalize("été 2024").as_str(), "TAAAAA");
    }

    #[test]
    fn normalized_solutions_are_six_uppercase_letters() {
        for raw in ["", "a", "Zz9zZ", "long answer with spaces", "ÅÄÖ", "mixedCASE"] {
            let solution = Solution::normalize(raw);
            assert_eq!(solution.as_str().len(), SOLUTION_LENGTH, "input {raw:?}");
            assert!(solution.as_str().chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn stored_solutions_are_not_corrected() {
        assert_eq!(Solution::from_stored("bad".into()).as_str(), "bad");
    }

    #[test]
    fn attempts_are_compared_upper_cased() {
        let solution = Solution::normalize("anchor");
        assert!(solution.matches("anchor"));
        assert!(solution.matches("AnChOr"));
        assert!(!solution.matches("anchors"));
    }

    #[test]
    fn reset_at_strictly_increases_even_with_clock_skew() {
        let mut game = GameState::blank(fixtures::rounds());
        game.reset_at = 10_000;
        assert_eq!(game.next_reset_at(5_000), 10_001);
        assert_eq!(game.next_reset_at(20_000), 20_000);
    }

    #[test]
    fn roster_keeps_join_order_on_update() {
        let game = GameState::blank(fixtures::rounds());
        let mut roster = Roster::default();
        roster.insert(Player::new("ada".into(), None, &game, 1));
        roster.insert(Player::new("bob".into(), None, &game, 2));
        roster.insert(Player::new("ada".into(), Some("cat.png".into()), &game, 3));

        let names: Vec<_> = roster.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, ["ada", "bob"]);
        assert_eq!(roster.len(), 2);
    }
}
