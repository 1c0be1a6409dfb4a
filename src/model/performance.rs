//! Per-team rolling performance records and recency-weighted aggregates.
//!
//! Each team keeps two bounded logs of recent-game observations (one for home
//! games, one for away) plus a set of skater "edge" ratings. Aggregates decay
//! exponentially so the most recent game dominates.

use serde::{Deserialize, Serialize};

/// Maximum games retained per team per situation. Oldest evicted beyond this.
pub const MAX_STORED_GAMES: usize = 20;

/// League-neutral baselines used when a team has no history and as the
/// denominators that put every feature on a comparable scale.
pub const NEUTRAL_EXPECTED_GOALS: f64 = 2.5;
pub const NEUTRAL_HIGH_DANGER: f64 = 10.0;
pub const NEUTRAL_SHOT_ATTEMPTS: f64 = 55.0;
pub const NEUTRAL_GOALS: f64 = 3.0;

/// One team's line from one observed game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObservation {
    pub expected_goals: f64,
    pub high_danger_chances: f64,
    pub shot_attempts: f64,
    pub goals: f64,
}

impl GameObservation {
    /// League-average observation, used whenever real data is unavailable.
    pub fn neutral() -> Self {
        GameObservation {
            expected_goals: NEUTRAL_EXPECTED_GOALS,
            high_danger_chances: NEUTRAL_HIGH_DANGER,
            shot_attempts: NEUTRAL_SHOT_ATTEMPTS,
            goals: NEUTRAL_GOALS,
        }
    }
}

impl Default for GameObservation {
    fn default() -> Self {
        GameObservation::neutral()
    }
}

/// Auxiliary per-team skater ratings (0–100 scale, 50 = league average).
/// These feed the small capped "edge" adjustment, not the main linear score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeScores {
    pub speed: f64,
    pub distance: f64,
    pub burst: f64,
}

impl Default for EdgeScores {
    fn default() -> Self {
        EdgeScores {
            speed: 50.0,
            distance: 50.0,
            burst: 50.0,
        }
    }
}

/// Bounded FIFO log of a team's recent games in one situation (home or away).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SituationalRecord {
    #[serde(default)]
    pub games: Vec<GameObservation>,
}

impl SituationalRecord {
    /// Append an observation, evicting the oldest beyond the cap.
    pub fn push(&mut self, obs: GameObservation) {
        self.games.push(obs);
        if self.games.len() > MAX_STORED_GAMES {
            let overflow = self.games.len() - MAX_STORED_GAMES;
            self.games.drain(..overflow);
        }
    }

    /// Exponentially recency-weighted mean of the stored games. The newest
    /// game gets weight 1, the one before it `decay`, then `decay²`, etc.
    /// Returns the neutral observation when the log is empty.
    pub fn recency_aggregate(&self, decay: f64) -> GameObservation {
        if self.games.is_empty() {
            return GameObservation::neutral();
        }

        let mut weight = 1.0;
        let mut total_weight = 0.0;
        let mut agg = GameObservation {
            expected_goals: 0.0,
            high_danger_chances: 0.0,
            shot_attempts: 0.0,
            goals: 0.0,
        };
        for obs in self.games.iter().rev() {
            agg.expected_goals += obs.expected_goals * weight;
            agg.high_danger_chances += obs.high_danger_chances * weight;
            agg.shot_attempts += obs.shot_attempts * weight;
            agg.goals += obs.goals * weight;
            total_weight += weight;
            weight *= decay;
        }
        agg.expected_goals /= total_weight;
        agg.high_danger_chances /= total_weight;
        agg.shot_attempts /= total_weight;
        agg.goals /= total_weight;
        agg
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

/// Everything we persist about one team: home log, away log, edge ratings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamSituationalRecord {
    #[serde(default)]
    pub home: SituationalRecord,
    #[serde(default)]
    pub away: SituationalRecord,
    #[serde(default)]
    pub edge: EdgeScores,
}

impl TeamSituationalRecord {
    pub fn record(&mut self, is_home: bool) -> &mut SituationalRecord {
        if is_home {
            &mut self.home
        } else {
            &mut self.away
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn obs(xg: f64, hdc: f64, attempts: f64, goals: f64) -> GameObservation {
        GameObservation {
            expected_goals: xg,
            high_danger_chances: hdc,
            shot_attempts: attempts,
            goals,
        }
    }

    #[test]
    fn empty_record_aggregates_to_neutral() {
        let rec = SituationalRecord::default();
        let agg = rec.recency_aggregate(0.85);
        assert_relative_eq!(agg.expected_goals, NEUTRAL_EXPECTED_GOALS, epsilon = 1e-9);
        assert_relative_eq!(agg.goals, NEUTRAL_GOALS, epsilon = 1e-9);
    }

    #[test]
    fn single_game_aggregate_is_that_game() {
        let mut rec = SituationalRecord::default();
        rec.push(obs(3.1, 12.0, 60.0, 4.0));
        let agg = rec.recency_aggregate(0.85);
        assert_relative_eq!(agg.expected_goals, 3.1, epsilon = 1e-9);
        assert_relative_eq!(agg.shot_attempts, 60.0, epsilon = 1e-9);
    }

    #[test]
    fn newest_game_dominates_aggregate() {
        let mut rec = SituationalRecord::default();
        rec.push(obs(1.0, 5.0, 40.0, 1.0)); // older
        rec.push(obs(4.0, 15.0, 70.0, 5.0)); // newest
        let agg = rec.recency_aggregate(0.5);
        // weights: newest 1.0, older 0.5 -> (4*1 + 1*0.5)/1.5 = 3.0
        assert_relative_eq!(agg.expected_goals, 3.0, epsilon = 1e-9);
        assert!(agg.goals > 3.0);
    }

    #[test]
    fn eviction_caps_at_twenty_games() {
        let mut rec = SituationalRecord::default();
        for i in 0..100 {
            rec.push(obs(i as f64, 10.0, 55.0, 3.0));
        }
        assert_eq!(rec.len(), MAX_STORED_GAMES);
        // Oldest surviving observation is game #80
        assert_relative_eq!(rec.games[0].expected_goals, 80.0, epsilon = 1e-9);
        assert_relative_eq!(rec.games[19].expected_goals, 99.0, epsilon = 1e-9);
    }

    #[test]
    fn home_and_away_logs_are_independent() {
        let mut team = TeamSituationalRecord::default();
        team.record(true).push(obs(3.0, 11.0, 58.0, 4.0));
        assert_eq!(team.home.len(), 1);
        assert!(team.away.is_empty());
    }

    #[test]
    fn missing_fields_default_on_load() {
        let team: TeamSituationalRecord = serde_json::from_str("{\"home\":{}}").unwrap();
        assert!(team.home.is_empty());
        assert!(team.away.is_empty());
        assert_relative_eq!(team.edge.speed, 50.0, epsilon = 1e-9);
    }
}
