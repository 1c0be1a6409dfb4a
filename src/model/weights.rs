//! Model weights, momentum accumulators, and the post-game update rule.
//!
//! The seven feature/edge weights form a normalized set: after every update
//! they are floored at [`WEIGHT_FLOOR`] and renormalized to sum to exactly 1.
//! `home_ice` sits outside that set; it is a fixed multiplier applied to the
//! home side after the scores are normalized to percentages.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::models::PredictionRecord;

/// Minimum value any normalized weight may take after an update.
pub const WEIGHT_FLOOR: f64 = 0.01;

/// Decay applied to each momentum accumulator before adding the new delta.
pub const MOMENTUM_DECAY: f64 = 0.9;

/// Home-ice advantage applied to the home percentage (2.3%).
pub const HOME_ICE_ADVANTAGE: f64 = 0.023;

/// Named linear coefficients of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelWeights {
    pub expected_goals: f64,
    pub high_danger: f64,
    pub shot_attempts: f64,
    pub goals: f64,
    pub speed_edge: f64,
    pub distance_edge: f64,
    pub burst_edge: f64,
    /// Outside the normalized set.
    pub home_ice: f64,
}

impl Default for ModelWeights {
    fn default() -> Self {
        ModelWeights {
            expected_goals: 0.30,
            high_danger: 0.25,
            shot_attempts: 0.10,
            goals: 0.25,
            speed_edge: 0.04,
            distance_edge: 0.03,
            burst_edge: 0.03,
            home_ice: HOME_ICE_ADVANTAGE,
        }
    }
}

impl ModelWeights {
    /// Sum of the normalized weight set (excludes `home_ice`).
    pub fn normalized_sum(&self) -> f64 {
        self.expected_goals
            + self.high_danger
            + self.shot_attempts
            + self.goals
            + self.speed_edge
            + self.distance_edge
            + self.burst_edge
    }

    fn normalized_mut(&mut self) -> [&mut f64; 7] {
        [
            &mut self.expected_goals,
            &mut self.high_danger,
            &mut self.shot_attempts,
            &mut self.goals,
            &mut self.speed_edge,
            &mut self.distance_edge,
            &mut self.burst_edge,
        ]
    }

    /// Floor every normalized weight and rescale so the set sums to exactly 1
    /// with every member still at or above the floor.
    pub fn floor_and_renormalize(&mut self, floor: f64) {
        let n = 7.0;
        let mut excess_sum = 0.0;
        for w in self.normalized_mut() {
            *w = w.max(floor);
            excess_sum += *w - floor;
        }
        let target_excess = 1.0 - n * floor;
        if excess_sum <= 0.0 {
            // Degenerate: everything sat at the floor. Spread evenly.
            for w in self.normalized_mut() {
                *w = 1.0 / n;
            }
            return;
        }
        let scale = target_excess / excess_sum;
        for w in self.normalized_mut() {
            *w = floor + (*w - floor) * scale;
        }
    }
}

/// Exponentially decayed accumulation of past deltas, one per normalized
/// weight. Persisted alongside the weights so smoothing survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Momentum {
    pub expected_goals: f64,
    pub high_danger: f64,
    pub shot_attempts: f64,
    pub goals: f64,
    pub speed_edge: f64,
    pub distance_edge: f64,
    pub burst_edge: f64,
}

/// Tunables for the update pass, filled from CLI config.
#[derive(Debug, Clone, Copy)]
pub struct UpdateParams {
    pub learning_rate: f64,
    pub momentum_decay: f64,
    pub weight_floor: f64,
    pub min_samples: usize,
}

impl Default for UpdateParams {
    fn default() -> Self {
        UpdateParams {
            learning_rate: 0.01,
            momentum_decay: MOMENTUM_DECAY,
            weight_floor: WEIGHT_FLOOR,
            min_samples: 5,
        }
    }
}

/// What the update pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Not enough decided predictions; weights untouched.
    Skipped { decided: usize },
    /// Update applied over `decided` recent predictions, `wrong` of which
    /// the model got wrong.
    Applied { decided: usize, wrong: usize },
}

/// Run the heuristic weight update over the supplied recent decided
/// predictions (callers pass at most the latest 20).
///
/// For each wrong prediction the expected-goals and high-danger weights are
/// nudged: up by the learning rate when the metric favored the actual winner
/// (the signal was informative but under-weighted), down by half the rate
/// when it favored the losing pick too. Deltas pass through the momentum
/// accumulators before touching the weights.
pub fn update_weights(
    weights: &mut ModelWeights,
    momentum: &mut Momentum,
    recent: &[&PredictionRecord],
    params: UpdateParams,
) -> UpdateOutcome {
    let decided: Vec<&PredictionRecord> = recent
        .iter()
        .copied()
        .filter(|p| p.actual_winner.is_some())
        .collect();

    if decided.len() < params.min_samples {
        info!(
            "Weight update skipped: {} decided prediction(s), need {}",
            decided.len(),
            params.min_samples
        );
        return UpdateOutcome::Skipped {
            decided: decided.len(),
        };
    }

    let lr = params.learning_rate;
    let mut delta_xg = 0.0;
    let mut delta_hdc = 0.0;
    let mut wrong = 0usize;

    for pred in &decided {
        let winner = match pred.actual_winner.as_deref() {
            Some(w) => w,
            None => continue,
        };
        let away_predicted = pred.away_prob > pred.home_prob;
        let predicted_winner = if away_predicted {
            pred.features.away.team.as_str()
        } else {
            pred.features.home.team.as_str()
        };
        if predicted_winner == winner {
            continue;
        }
        wrong += 1;

        // Snapshots: the actual winner vs the team we picked.
        let (winner_agg, picked_agg) = if winner == pred.features.away.team {
            (&pred.features.away.aggregate, &pred.features.home.aggregate)
        } else {
            (&pred.features.home.aggregate, &pred.features.away.aggregate)
        };

        if winner_agg.expected_goals > picked_agg.expected_goals {
            delta_xg += lr;
        } else {
            delta_xg -= lr * 0.5;
        }
        if winner_agg.high_danger_chances > picked_agg.high_danger_chances {
            delta_hdc += lr;
        } else {
            delta_hdc -= lr * 0.5;
        }
    }

    let d = params.momentum_decay;
    momentum.expected_goals = d * momentum.expected_goals + delta_xg;
    momentum.high_danger = d * momentum.high_danger + delta_hdc;
    momentum.shot_attempts *= d;
    momentum.goals *= d;
    momentum.speed_edge *= d;
    momentum.distance_edge *= d;
    momentum.burst_edge *= d;

    weights.expected_goals += momentum.expected_goals;
    weights.high_danger += momentum.high_danger;
    weights.shot_attempts += momentum.shot_attempts;
    weights.goals += momentum.goals;
    weights.speed_edge += momentum.speed_edge;
    weights.distance_edge += momentum.distance_edge;
    weights.burst_edge += momentum.burst_edge;

    weights.floor_and_renormalize(params.weight_floor);

    debug!(
        "Weight update: {} decided, {} wrong, xG delta {:+.4}, HDC delta {:+.4}",
        decided.len(),
        wrong,
        delta_xg,
        delta_hdc
    );

    UpdateOutcome::Applied {
        decided: decided.len(),
        wrong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::performance::GameObservation;
    use crate::store::models::{FeatureSnapshot, TeamFeatures};
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, Utc};

    fn obs(xg: f64, hdc: f64) -> GameObservation {
        GameObservation {
            expected_goals: xg,
            high_danger_chances: hdc,
            shot_attempts: 55.0,
            goals: 3.0,
        }
    }

    fn record(
        away: &str,
        home: &str,
        away_prob: f64,
        winner: Option<&str>,
        away_obs: GameObservation,
        home_obs: GameObservation,
    ) -> PredictionRecord {
        PredictionRecord {
            game_id: "2024020001".into(),
            date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            away_team: away.into(),
            home_team: home.into(),
            away_prob,
            home_prob: 100.0 - away_prob,
            features: FeatureSnapshot {
                away: TeamFeatures {
                    team: away.into(),
                    aggregate: away_obs,
                    edge: Default::default(),
                },
                home: TeamFeatures {
                    team: home.into(),
                    aggregate: home_obs,
                    edge: Default::default(),
                },
            },
            actual_winner: winner.map(String::from),
            accuracy: winner.map(|_| 0.4),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn default_weights_are_normalized() {
        let w = ModelWeights::default();
        assert_relative_eq!(w.normalized_sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn skips_below_minimum_sample_count() {
        let mut w = ModelWeights::default();
        let before = w.clone();
        let mut m = Momentum::default();
        let recs: Vec<PredictionRecord> = (0..4)
            .map(|_| record("TOR", "MTL", 60.0, Some("MTL"), obs(2.0, 8.0), obs(3.0, 12.0)))
            .collect();
        let refs: Vec<&PredictionRecord> = recs.iter().collect();
        let outcome = update_weights(&mut w, &mut m, &refs, UpdateParams::default());
        assert_eq!(outcome, UpdateOutcome::Skipped { decided: 4 });
        assert_eq!(w, before);
        assert_eq!(m, Momentum::default());
    }

    #[test]
    fn undecided_records_do_not_count_toward_minimum() {
        let mut w = ModelWeights::default();
        let mut m = Momentum::default();
        let recs: Vec<PredictionRecord> = (0..10)
            .map(|_| record("TOR", "MTL", 60.0, None, obs(2.0, 8.0), obs(3.0, 12.0)))
            .collect();
        let refs: Vec<&PredictionRecord> = recs.iter().collect();
        let outcome = update_weights(&mut w, &mut m, &refs, UpdateParams::default());
        assert_eq!(outcome, UpdateOutcome::Skipped { decided: 0 });
    }

    #[test]
    fn update_keeps_weights_normalized_and_floored() {
        let mut w = ModelWeights::default();
        let mut m = Momentum::default();
        // Wrong predictions where the winner out-produced the pick on both
        // metrics: xG and HDC weights should rise.
        let recs: Vec<PredictionRecord> = (0..8)
            .map(|_| record("TOR", "MTL", 65.0, Some("MTL"), obs(2.0, 8.0), obs(3.2, 13.0)))
            .collect();
        let refs: Vec<&PredictionRecord> = recs.iter().collect();
        let outcome = update_weights(&mut w, &mut m, &refs, UpdateParams::default());
        assert_eq!(
            outcome,
            UpdateOutcome::Applied {
                decided: 8,
                wrong: 8
            }
        );
        assert_relative_eq!(w.normalized_sum(), 1.0, epsilon = 1e-9);
        assert!(w.expected_goals > 0.30);
        assert!(w.high_danger > 0.25);
        for v in [
            w.expected_goals,
            w.high_danger,
            w.shot_attempts,
            w.goals,
            w.speed_edge,
            w.distance_edge,
            w.burst_edge,
        ] {
            assert!(v >= WEIGHT_FLOOR - 1e-12, "weight {} below floor", v);
        }
    }

    #[test]
    fn correct_predictions_produce_no_delta() {
        let mut w = ModelWeights::default();
        let before = w.clone();
        let mut m = Momentum::default();
        let recs: Vec<PredictionRecord> = (0..6)
            .map(|_| record("TOR", "MTL", 65.0, Some("TOR"), obs(3.0, 12.0), obs(2.0, 8.0)))
            .collect();
        let refs: Vec<&PredictionRecord> = recs.iter().collect();
        update_weights(&mut w, &mut m, &refs, UpdateParams::default());
        // Zero deltas through zero momentum: renormalization is a no-op.
        assert_relative_eq!(w.expected_goals, before.expected_goals, epsilon = 1e-9);
        assert_relative_eq!(w.normalized_sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn momentum_persists_across_updates() {
        let mut w = ModelWeights::default();
        let mut m = Momentum::default();
        let recs: Vec<PredictionRecord> = (0..6)
            .map(|_| record("TOR", "MTL", 65.0, Some("MTL"), obs(2.0, 8.0), obs(3.2, 13.0)))
            .collect();
        let refs: Vec<&PredictionRecord> = recs.iter().collect();
        update_weights(&mut w, &mut m, &refs, UpdateParams::default());
        let m1 = m.expected_goals;
        assert!(m1 > 0.0);
        // Second pass with only correct predictions: delta 0, momentum decays.
        let ok: Vec<PredictionRecord> = (0..6)
            .map(|_| record("TOR", "MTL", 65.0, Some("TOR"), obs(3.0, 12.0), obs(2.0, 8.0)))
            .collect();
        let ok_refs: Vec<&PredictionRecord> = ok.iter().collect();
        update_weights(&mut w, &mut m, &ok_refs, UpdateParams::default());
        assert_relative_eq!(m.expected_goals, m1 * MOMENTUM_DECAY, epsilon = 1e-9);
    }

    #[test]
    fn floor_and_renormalize_handles_extreme_values() {
        let mut w = ModelWeights {
            expected_goals: 5.0,
            high_danger: -2.0,
            shot_attempts: 0.0,
            goals: 0.001,
            speed_edge: 0.0,
            distance_edge: 0.0,
            burst_edge: 0.0,
            home_ice: HOME_ICE_ADVANTAGE,
        };
        w.floor_and_renormalize(WEIGHT_FLOOR);
        assert_relative_eq!(w.normalized_sum(), 1.0, epsilon = 1e-9);
        assert!(w.high_danger >= WEIGHT_FLOOR - 1e-12);
        assert!(w.expected_goals > 0.9);
    }
}
