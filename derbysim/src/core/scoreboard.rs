use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::warn;

/// ScoreboardEntry holds the cumulative results of one horse. wins <= races always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardEntry {
    pub name: String,
    pub wins: u32,
    pub races: u32,
}

impl ScoreboardEntry {
    pub fn new(name: &str) -> ScoreboardEntry {
        ScoreboardEntry {
            name: name.to_owned(),
            wins: 0,
            races: 0,
        }
    }

    pub fn losses(&self) -> u32 {
        self.races - self.wins
    }

    /// win_percentage returns wins / races in percent, 0.0 if no race was run yet.
    pub fn win_percentage(&self) -> f64 {
        if self.races > 0 {
            self.wins as f64 / self.races as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Scoreboard maps horse names to their cumulative results, kept in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    entries: Vec<ScoreboardEntry>,
}

impl Scoreboard {
    /// Creates zero-valued entries for every name of the roster.
    pub fn new(roster: &[String]) -> Scoreboard {
        let mut scoreboard = Scoreboard::default();
        scoreboard.seed(roster);
        scoreboard
    }

    /// adopt_or_initialize takes over the persisted values if there are any, otherwise it starts
    /// from zero. Roster names unknown to the store get a fresh entry.
    pub fn adopt_or_initialize(roster: &[String], store: &ScoreStore) -> Scoreboard {
        let mut scoreboard = Scoreboard {
            entries: store.entries.to_owned(),
        };
        scoreboard.seed(roster);
        scoreboard
    }

    fn seed(&mut self, roster: &[String]) {
        for name in roster.iter() {
            if self.position(name).is_none() {
                self.entries.push(ScoreboardEntry::new(name));
            }
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }

    pub fn entries(&self) -> &[ScoreboardEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// entry returns the entry of the given horse. Unknown names yield a zero-valued entry.
    pub fn entry(&self, name: &str) -> ScoreboardEntry {
        match self.position(name) {
            Some(idx) => self.entries[idx].to_owned(),
            None => {
                warn!(horse = name, "scoreboard lookup for unknown horse");
                ScoreboardEntry::new(name)
            }
        }
    }

    /// record_result counts one more race for every entry and one more win for the winner. An
    /// unknown winner leaves the scoreboard untouched.
    pub fn record_result(&mut self, winner: &str) {
        let winner_idx = match self.position(winner) {
            Some(idx) => idx,
            None => {
                warn!(horse = winner, "ignoring result for unknown horse");
                return;
            }
        };

        for entry in self.entries.iter_mut() {
            entry.races += 1;
        }
        self.entries[winner_idx].wins += 1;
    }

    /// reset clears all results and starts again with zero entries for the roster.
    pub fn reset(&mut self, roster: &[String]) {
        self.entries.clear();
        self.seed(roster);
    }

    /// render returns one line per horse, e.g. `Bolt: 1-3 | 25%`.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            // writing into a String cannot fail
            let _ = write!(
                out,
                "{}: {}-{} | {:.0}%",
                entry.name,
                entry.wins,
                entry.losses(),
                entry.win_percentage()
            );
        }

        out
    }

    /// Adds the results of another scoreboard, e.g. from an independent session.
    pub fn merge(&mut self, other: &Scoreboard) {
        for entry in other.entries.iter() {
            match self.position(&entry.name) {
                Some(idx) => {
                    self.entries[idx].wins += entry.wins;
                    self.entries[idx].races += entry.races;
                }
                None => self.entries.push(entry.to_owned()),
            }
        }
    }
}

/// ScoreStore keeps scoreboard values across race restarts. It lives as long as the session that
/// owns it and is never written to disk.
#[derive(Debug, Clone, Default)]
pub struct ScoreStore {
    entries: Vec<ScoreboardEntry>,
}

impl ScoreStore {
    pub fn new() -> ScoreStore {
        ScoreStore::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn persist(&mut self, scoreboard: &Scoreboard) {
        self.entries = scoreboard.entries.to_owned();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
