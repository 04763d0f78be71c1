//! Derived ranking of the roster. Never stored, recomputed for every response.

use std::cmp::Ordering;

use crate::state::game::{Player, Roster};

/// One ranked line of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing<'a> {
    /// 1-based rank.
    pub rank: usize,
    /// Ranked player.
    pub player: &'a Player,
}

/// Rank players: finished first, then most rounds completed, then least total time.
///
/// Username order breaks remaining ties so the output is deterministic.
pub fn rank(roster: &Roster) -> Vec<Standing<'_>> {
    let mut players: Vec<&Player> = roster.iter().collect();
    players.sort_by(|a, b| compare(a, b));
    players
        .into_iter()
        .enumerate()
        .map(|(index, player)| Standing {
            rank: index + 1,
            player,
        })
        .collect()
}

fn compare(a: &Player, b: &Player) -> Ordering {
    b.is_finished
        .cmp(&a.is_finished)
        .then_with(|| b.completed_count().cmp(&a.completed_count()))
        .then_with(|| a.total_time().cmp(&b.total_time()))
        .then_with(|| a.username.cmp(&b.username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{GameState, fixtures};

    fn player(name: &str, completed: usize, secs: u32, finished: bool) -> Player {
        let game = GameState::blank(fixtures::rounds());
        let mut player = Player::new(name.into(), None, &game, 0);
        for index in 0..completed {
            player.rounds_completed[index] = true;
            player.round_times[index] = secs;
        }
        player.is_finished = finished;
        player
    }

    #[test]
    fn finished_players_rank_first() {
        let roster = Roster::from_players([
            player("slow-finisher", 6, 100, true),
            player("fast-but-unfinished", 5, 1, false),
        ]);
        let names: Vec<_> = rank(&roster)
            .iter()
            .map(|s| s.player.username.as_str())
            .collect();
        assert_eq!(names, ["slow-finisher", "fast-but-unfinished"]);
    }

    #[test]
    fn more_rounds_beat_less_time() {
        let roster = Roster::from_players([player("quick", 2, 10, false), player("thorough", 3, 60, false)]);
        assert_eq!(rank(&roster)[0].player.username, "thorough");
    }

    #[test]
    fn lower_total_time_breaks_ties_then_username() {
        let roster = Roster::from_players([
            player("zed", 3, 30, false),
            player("amy", 3, 30, false),
            player("bob", 3, 20, false),
        ]);
        let ranked = rank(&roster);
        let names: Vec<_> = ranked.iter().map(|s| s.player.username.as_str()).collect();
        assert_eq!(names, ["bob", "amy", "zed"]);
        assert_eq!(ranked.iter().map(|s| s.rank).collect::<Vec<_>>(), [1, 2, 3]);
    }
}
