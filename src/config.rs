//! Application-level configuration loading, including the default round set.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{
    engine::Rules,
    game::{Difficulty, MAX_HINTS, ROUND_COUNT, RoundConfig, Solution},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PUZZLE_SYNC_CONFIG_PATH";
const DEFAULT_GAME_TTL_HOURS: u64 = 48;
const DEFAULT_ADMIN_SESSION_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);
const DEFAULT_SSE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Lifetime of a freshly created game.
    pub game_ttl: Duration,
    /// Password required to bind an admin session, if any.
    pub admin_password: Option<String>,
    /// Age after which a bound admin session may be taken over.
    pub admin_session_timeout: Duration,
    /// Capacity of each SSE broadcast channel.
    pub sse_capacity: usize,
    /// Rounds used when no game state was ever persisted.
    pub default_rounds: Vec<RoundConfig>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        ttl_hours = app_config.game_ttl.as_secs() / 3600,
                        admin_password = app_config.admin_password.is_some(),
                        "loaded application config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Engine tunables derived from this configuration.
    pub fn rules(&self) -> Rules {
        Rules {
            game_ttl: self.game_ttl,
            admin_session_timeout: self.admin_session_timeout,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_ttl: Duration::from_secs(DEFAULT_GAME_TTL_HOURS * 60 * 60),
            admin_password: None,
            admin_session_timeout: DEFAULT_ADMIN_SESSION_TIMEOUT,
            sse_capacity: DEFAULT_SSE_CAPACITY,
            default_rounds: default_rounds(),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    game_ttl_hours: Option<u64>,
    #[serde(default)]
    admin_password: Option<String>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    admin_session_timeout: Option<Duration>,
    #[serde(default)]
    sse_capacity: Option<usize>,
    #[serde(default)]
    rounds: Option<Vec<RawRound>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let default_rounds = match value.rounds {
            Some(rounds) if rounds.len() == ROUND_COUNT => rounds
                .into_iter()
                .zip(1u8..)
                .map(|(raw, id)| raw.into_round(id))
                .collect(),
            Some(rounds) => {
                warn!(
                    count = rounds.len(),
                    expected = ROUND_COUNT,
                    "configured rounds ignored; using built-in rounds"
                );
                defaults.default_rounds
            }
            None => defaults.default_rounds,
        };

        Self {
            game_ttl: value
                .game_ttl_hours
                .map(|hours| Duration::from_secs(hours * 60 * 60))
                .unwrap_or(defaults.game_ttl),
            admin_password: value.admin_password.filter(|password| !password.is_empty()),
            admin_session_timeout: value
                .admin_session_timeout
                .unwrap_or(defaults.admin_session_timeout),
            sse_capacity: value.sse_capacity.unwrap_or(defaults.sse_capacity).max(1),
            default_rounds,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single authored round inside the configuration file.
struct RawRound {
    name: String,
    solution: String,
    difficulty: Difficulty,
    #[serde(default)]
    question: String,
    #[serde(default)]
    hints: Vec<String>,
}

impl RawRound {
    fn into_round(self, id: u8) -> RoundConfig {
        let mut hints = self.hints;
        hints.truncate(MAX_HINTS);
        RoundConfig {
            id,
            name: self.name,
            solution: Solution::normalize(&self.solution),
            difficulty: self.difficulty,
            question: self.question,
            hints,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in round set shipped with the binary.
fn default_rounds() -> Vec<RoundConfig> {
    let authored: [(&str, &str, Difficulty, &str, &[&str]); ROUND_COUNT] = [
        (
            "Warm-up",
            "PLANET",
            Difficulty::Easy,
            "It wanders around a star.",
            &["There are eight of them nearby", "Mars is one"],
        ),
        (
            "Green thumb",
            "GARDEN",
            Difficulty::Easy,
            "Where vegetables grow behind the house.",
            &["You need a spade", "Eden had one"],
        ),
        (
            "Second place",
            "SILVER",
            Difficulty::Medium,
            "A medal nobody brags about.",
            &["Chemical symbol Ag", "Between gold and bronze", "Wedding anniversary number 25"],
        ),
        (
            "Citrus",
            "ORANGE",
            Difficulty::Medium,
            "Both a fruit and a color.",
            &["Rhymes with nothing", "Squeezed at breakfast"],
        ),
        (
            "Cold season",
            "WINTER",
            Difficulty::Hard,
            "When the days are shortest.",
            &["Snow", "Comes after autumn", "Solstice in December"],
        ),
        (
            "Final boss",
            "CASTLE",
            Difficulty::Expert,
            "A king's fortified home.",
            &["Moat", "Drawbridge", "Rook in chess"],
        ),
    ];

    authored
        .into_iter()
        .zip(1u8..)
        .map(|((name, solution, difficulty, question, hints), id)| RoundConfig {
            id,
            name: name.to_string(),
            solution: Solution::normalize(solution),
            difficulty,
            question: question.to_string(),
            hints: hints.iter().map(|hint| hint.to_string()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_rounds_are_complete() {
        let rounds = default_rounds();
        assert_eq!(rounds.len(), ROUND_COUNT);
        for (round, id) in rounds.iter().zip(1u8..) {
            assert_eq!(round.id, id);
            assert_eq!(round.solution.as_str().len(), 6);
            assert!(round.hints.len() <= MAX_HINTS);
        }
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"game_ttl_hours": 2, "admin_session_timeout": 90}"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.game_ttl, Duration::from_secs(2 * 3600));
        assert_eq!(config.admin_session_timeout, Duration::from_secs(90));
        assert_eq!(config.sse_capacity, DEFAULT_SSE_CAPACITY);
        assert_eq!(config.default_rounds, default_rounds());
    }

    #[test]
    fn configured_rounds_are_normalized() {
        let round = r#"{"name": "r", "solution": "ab-c", "difficulty": "hard", "hints": ["1","2","3","4"]}"#;
        let json = format!(r#"{{"rounds": [{round},{round},{round},{round},{round},{round}]}}"#);
        let config = AppConfig::from(serde_json::from_str::<RawConfig>(&json).unwrap());

        assert_eq!(config.default_rounds[5].id, 6);
        assert_eq!(config.default_rounds[0].solution.as_str(), "ABCAAA");
        assert_eq!(config.default_rounds[0].hints.len(), MAX_HINTS);
    }
}
