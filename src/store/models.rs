//! Typed records persisted to the two flat JSON state files.
//!
//! Every field carries a serde default so a missing key loads as its
//! documented default instead of failing the whole file.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::performance::{EdgeScores, GameObservation, TeamSituationalRecord};
use crate::model::weights::{ModelWeights, Momentum};

/// The feature values one team contributed to a prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamFeatures {
    pub team: String,
    pub aggregate: GameObservation,
    pub edge: EdgeScores,
}

/// Both teams' inputs as seen at prediction time. Stored with the record so
/// the weight-update pass can revisit what the model actually looked at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSnapshot {
    pub away: TeamFeatures,
    pub home: TeamFeatures,
}

/// One predicted game, decided once `actual_winner` is filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub game_id: String,
    pub date: NaiveDate,
    pub away_team: String,
    pub home_team: String,
    /// Percentages summing to 100.
    pub away_prob: f64,
    pub home_prob: f64,
    #[serde(default)]
    pub features: FeatureSnapshot,
    /// Team abbreviation of the winner, once known.
    #[serde(default)]
    pub actual_winner: Option<String>,
    /// Predicted probability assigned to the actual winner, divided by 100.
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Contents of the predictions/model state file: current weights, momentum,
/// lifetime counters, and the append-only prediction log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelState {
    pub weights: ModelWeights,
    pub momentum: Momentum,
    pub games_analyzed: u64,
    pub correct_predictions: u64,
    pub predictions: Vec<PredictionRecord>,
}

impl ModelState {
    /// The most recent `limit` decided predictions, oldest first.
    pub fn recent_decided(&self, limit: usize) -> Vec<&PredictionRecord> {
        let decided: Vec<&PredictionRecord> = self
            .predictions
            .iter()
            .filter(|p| p.actual_winner.is_some())
            .collect();
        let skip = decided.len().saturating_sub(limit);
        decided.into_iter().skip(skip).collect()
    }

    /// Lifetime hit rate in [0,1], or None before any decided game.
    pub fn accuracy_rate(&self) -> Option<f64> {
        if self.games_analyzed == 0 {
            None
        } else {
            Some(self.correct_predictions as f64 / self.games_analyzed as f64)
        }
    }
}

/// Contents of the team-performance stats file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamStatsFile {
    pub teams: HashMap<String, TeamSituationalRecord>,
}

impl TeamStatsFile {
    pub fn team(&self, abbrev: &str) -> Option<&TeamSituationalRecord> {
        self.teams.get(abbrev)
    }

    pub fn team_mut(&mut self, abbrev: &str) -> &mut TeamSituationalRecord {
        self.teams.entry(abbrev.to_string()).or_default()
    }
}
