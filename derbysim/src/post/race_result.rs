use crate::core::scoreboard::{Scoreboard, ScoreboardEntry};
use helpers::general::format_racetime;
use serde::Serialize;
use std::fmt::Write;

/// RaceResult contains the outcome of a single completed race.
#[derive(Debug, Serialize, Clone)]
pub struct RaceResult {
    pub race_no: u32,
    pub winner: String,
    pub race_time: f64,
    /// Scoreboard right after the race was recorded
    pub scoreboard: Vec<ScoreboardEntry>,
}

/// SessionResult contains all information of a session that is required for post-processing.
#[derive(Debug, Serialize, Clone)]
pub struct SessionResult {
    pub seed: u64,
    pub races: Vec<RaceResult>,
    pub aborted_races: u32,
    pub scoreboard: Scoreboard,
}

impl SessionResult {
    /// get_results_string returns the race winners and the final scoreboard as text.
    pub fn get_results_string(&self) -> String {
        let mut out = String::new();

        // writing into a String cannot fail
        let _ = writeln!(out, "RESULT: Session with seed {}", self.seed);
        let _ = writeln!(out, "race, winner, race time");
        for race in self.races.iter() {
            let _ = writeln!(
                out,
                "{:4}, {}, {} ({:.3}s)",
                race.race_no,
                race.winner,
                format_racetime(race.race_time),
                race.race_time
            );
        }
        if self.aborted_races > 0 {
            let _ = writeln!(out, "aborted races: {}", self.aborted_races);
        }
        let _ = writeln!(out, "RESULT: Scoreboard");
        let _ = writeln!(out, "{}", self.scoreboard.render());

        out
    }

    /// print_results prints the race winners and the final scoreboard to the console output.
    pub fn print_results(&self) {
        println!("{}", self.get_results_string());
    }
}

/// merge_scoreboards sums up the scoreboards of independent sessions.
pub fn merge_scoreboards(results: &[SessionResult]) -> Scoreboard {
    let mut total = Scoreboard::default();
    for result in results.iter() {
        total.merge(&result.scoreboard);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(seed: u64, winners: &[&str]) -> SessionResult {
        let roster = vec!["Bolt".to_owned(), "Comet".to_owned()];
        let mut scoreboard = Scoreboard::new(&roster);
        let mut races = Vec::new();
        for (i, winner) in winners.iter().enumerate() {
            scoreboard.record_result(winner);
            races.push(RaceResult {
                race_no: i as u32 + 1,
                winner: winner.to_string(),
                race_time: 12.5,
                scoreboard: scoreboard.entries().to_vec(),
            });
        }
        SessionResult {
            seed,
            races,
            aborted_races: 0,
            scoreboard,
        }
    }

    #[test]
    fn results_string_lists_races_and_scoreboard() {
        let text = session(1, &["Bolt", "Comet", "Bolt"]).get_results_string();

        assert!(text.contains("   2, Comet, 00:12:500 (12.500s)"));
        assert!(text.contains("Bolt: 2-1 | 67%\nComet: 1-2 | 33%"));
        assert!(!text.contains("aborted"));
    }

    #[test]
    fn scoreboards_of_sessions_are_summed() {
        let results = vec![session(1, &["Bolt"]), session(2, &["Comet", "Comet"])];

        let total = merge_scoreboards(&results);

        assert_eq!(total.entry("Bolt").wins, 1);
        assert_eq!(total.entry("Comet").wins, 2);
        assert_eq!(total.entry("Comet").races, 3);
    }

    #[test]
    fn json_output_contains_winners() {
        let json = serde_json::to_string(&session(9, &["Comet"])).unwrap();

        assert!(json.contains("\"seed\":9"));
        assert!(json.contains("\"winner\":\"Comet\""));
    }
}
