//! The win-probability estimator.
//!
//! Pre-game: a weighted linear score over each team's recency-decayed
//! situational aggregate, a small capped edge adjustment, and a home-ice
//! multiplier, normalized to a pair of percentages summing to 100.
//! In-game: a boost toward the leader scaled by goal differential and how
//! much of regulation has elapsed (minutes-remaining proxy per period).
//!
//! Prediction is pure given loaded state; only `record_outcome` mutates.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use super::performance::{
    EdgeScores, GameObservation, NEUTRAL_EXPECTED_GOALS, NEUTRAL_GOALS, NEUTRAL_HIGH_DANGER,
    NEUTRAL_SHOT_ATTEMPTS,
};
use super::weights::{update_weights, ModelWeights, UpdateOutcome, UpdateParams};
use crate::store::models::{
    FeatureSnapshot, ModelState, PredictionRecord, TeamFeatures, TeamStatsFile,
};

/// Hard bounds on any emitted probability.
pub const PROB_FLOOR: f64 = 5.0;
pub const PROB_CEILING: f64 = 95.0;

/// Maximum relative effect of the speed/distance/burst edge adjustment.
const EDGE_CAP: f64 = 0.05;

/// Probability points added to the leader per goal of differential at the
/// end of regulation (scaled down earlier in the game).
const LIVE_BOOST_PER_GOAL: f64 = 12.0;

const REGULATION_MINUTES: f64 = 60.0;

/// How many decided predictions the update pass looks back over.
pub const UPDATE_WINDOW: usize = 20;

/// Current score and period of an in-progress game.
#[derive(Debug, Clone, Copy)]
pub struct LiveState {
    pub away_score: i32,
    pub home_score: i32,
    pub period: u8,
}

/// Output of a prediction: percentages summing to 100 plus the feature
/// snapshot that produced them.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub away_prob: f64,
    pub home_prob: f64,
    pub features: FeatureSnapshot,
}

/// Owns the model state and team stats for the duration of a run.
pub struct WinProbabilityEstimator {
    pub state: ModelState,
    pub teams: TeamStatsFile,
    recency_decay: f64,
}

impl WinProbabilityEstimator {
    pub fn new(state: ModelState, teams: TeamStatsFile, recency_decay: f64) -> Self {
        WinProbabilityEstimator {
            state,
            teams,
            recency_decay,
        }
    }

    /// Estimate win probabilities for `away` at `home`. Teams with no stored
    /// history evaluate at league-neutral baselines; this never fails.
    pub fn predict(&self, away: &str, home: &str, live: Option<LiveState>) -> Prediction {
        let away_features = self.team_features(away, false);
        let home_features = self.team_features(home, true);
        let weights = &self.state.weights;

        let away_raw =
            linear_score(weights, &away_features.aggregate) * edge_multiplier(weights, &away_features.edge);
        let home_raw =
            linear_score(weights, &home_features.aggregate) * edge_multiplier(weights, &home_features.edge);

        // Normalize to percentages, then give home its ice. All-zero
        // aggregates on both sides (every stored stat line zero) would make
        // the total vanish; that degenerate matchup splits evenly.
        let total = away_raw + home_raw;
        let base_away = if total > 0.0 {
            100.0 * away_raw / total
        } else {
            50.0
        };
        let home_prob = (100.0 - base_away) * (1.0 + weights.home_ice);
        let mut away_prob = 100.0 - home_prob;

        if let Some(live) = live {
            away_prob = apply_live_adjustment(away_prob, live);
        }

        let away_prob = away_prob.clamp(PROB_FLOOR, PROB_CEILING);
        let home_prob = 100.0 - away_prob;

        debug!(
            "predict {} @ {}: away {:.1}%, home {:.1}%",
            away, home, away_prob, home_prob
        );

        Prediction {
            away_prob,
            home_prob,
            features: FeatureSnapshot {
                away: away_features,
                home: home_features,
            },
        }
    }

    fn team_features(&self, team: &str, is_home: bool) -> TeamFeatures {
        let (aggregate, edge) = match self.teams.team(team) {
            Some(rec) => {
                let situational = if is_home { &rec.home } else { &rec.away };
                (situational.recency_aggregate(self.recency_decay), rec.edge)
            }
            None => (GameObservation::neutral(), EdgeScores::default()),
        };
        TeamFeatures {
            team: team.to_string(),
            aggregate,
            edge,
        }
    }

    /// Log a decided game: append the prediction record with its accuracy
    /// score, bump the lifetime counters, and fold one observation per team
    /// into the situational logs (evicting beyond the cap).
    pub fn record_outcome(
        &mut self,
        game_id: &str,
        date: NaiveDate,
        prediction: &Prediction,
        winner: &str,
        away_obs: GameObservation,
        home_obs: GameObservation,
    ) {
        let away_team = prediction.features.away.team.clone();
        let home_team = prediction.features.home.team.clone();
        let winner_prob = if winner == away_team {
            prediction.away_prob
        } else {
            prediction.home_prob
        };

        self.state.games_analyzed += 1;
        if winner_prob >= 50.0 {
            self.state.correct_predictions += 1;
        }

        self.state.predictions.push(PredictionRecord {
            game_id: game_id.to_string(),
            date,
            away_team: away_team.clone(),
            home_team: home_team.clone(),
            away_prob: prediction.away_prob,
            home_prob: prediction.home_prob,
            features: prediction.features.clone(),
            actual_winner: Some(winner.to_string()),
            accuracy: Some(winner_prob / 100.0),
            recorded_at: Utc::now(),
        });

        self.teams.team_mut(&away_team).record(false).push(away_obs);
        self.teams.team_mut(&home_team).record(true).push(home_obs);
    }

    /// The nominally-daily weight update over the recent decided window.
    pub fn update_weights(&mut self, params: UpdateParams) -> UpdateOutcome {
        let recent: Vec<PredictionRecord> = self
            .state
            .recent_decided(UPDATE_WINDOW)
            .into_iter()
            .cloned()
            .collect();
        let refs: Vec<&PredictionRecord> = recent.iter().collect();
        update_weights(
            &mut self.state.weights,
            &mut self.state.momentum,
            &refs,
            params,
        )
    }

    pub fn set_edge(&mut self, team: &str, edge: EdgeScores) {
        self.teams.team_mut(team).edge = edge;
    }
}

fn linear_score(w: &ModelWeights, agg: &GameObservation) -> f64 {
    w.expected_goals * (agg.expected_goals / NEUTRAL_EXPECTED_GOALS)
        + w.high_danger * (agg.high_danger_chances / NEUTRAL_HIGH_DANGER)
        + w.shot_attempts * (agg.shot_attempts / NEUTRAL_SHOT_ATTEMPTS)
        + w.goals * (agg.goals / NEUTRAL_GOALS)
}

/// Edge ratings sit on a 0–100 scale centered at 50; the weighted deviation
/// becomes a multiplier capped at ±5% relative effect.
fn edge_multiplier(w: &ModelWeights, edge: &EdgeScores) -> f64 {
    let deviation = (w.speed_edge * (edge.speed - 50.0)
        + w.distance_edge * (edge.distance - 50.0)
        + w.burst_edge * (edge.burst - 50.0))
        / 50.0;
    1.0 + deviation.clamp(-EDGE_CAP, EDGE_CAP)
}

/// Rough minutes left in regulation at the start of each period; OT counts
/// as one minute.
fn minutes_remaining(period: u8) -> f64 {
    match period {
        0 | 1 => 40.0,
        2 => 20.0,
        3 => 5.0,
        _ => 1.0,
    }
}

/// Shift the away probability toward the current leader, proportional to the
/// goal differential and the fraction of regulation already played.
fn apply_live_adjustment(away_prob: f64, live: LiveState) -> f64 {
    let diff = (live.away_score - live.home_score) as f64;
    if diff == 0.0 {
        return away_prob;
    }
    let elapsed_frac = 1.0 - minutes_remaining(live.period) / REGULATION_MINUTES;
    away_prob + diff * LIVE_BOOST_PER_GOAL * elapsed_frac
}
