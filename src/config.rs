use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::model::UpdateParams;

/// Self-learning NHL win-probability estimator
#[derive(Parser, Debug, Clone)]
#[command(name = "puckprob", version, about)]
pub struct Config {
    /// Path to the predictions / model state JSON file
    #[arg(
        long,
        env = "PREDICTIONS_PATH",
        default_value = "predictions.json",
        global = true
    )]
    pub predictions_path: String,

    /// Path to the team performance stats JSON file
    #[arg(
        long,
        env = "TEAM_STATS_PATH",
        default_value = "team_stats.json",
        global = true
    )]
    pub team_stats_path: String,

    /// NHL API base URL
    #[arg(
        long,
        env = "NHL_API_URL",
        default_value = "https://api-web.nhle.com/v1",
        global = true
    )]
    pub nhl_api_url: String,

    /// Skip all network calls; run on stored/neutral stats only (demo mode)
    #[arg(long, env = "OFFLINE", default_value = "false", global = true)]
    pub offline: bool,

    /// Exponential decay applied per game of age in the recency aggregate
    #[arg(long, env = "RECENCY_DECAY", default_value = "0.85", global = true)]
    pub recency_decay: f64,

    /// Learning rate for the heuristic weight update
    #[arg(long, env = "LEARNING_RATE", default_value = "0.01", global = true)]
    pub learning_rate: f64,

    /// Decay factor for the momentum accumulators
    #[arg(long, env = "MOMENTUM_DECAY", default_value = "0.9", global = true)]
    pub momentum_decay: f64,

    /// Minimum value any normalized weight may take after an update
    #[arg(long, env = "WEIGHT_FLOOR", default_value = "0.01", global = true)]
    pub weight_floor: f64,

    /// Decided predictions required before a weight update runs
    #[arg(long, env = "MIN_UPDATE_SAMPLES", default_value = "5", global = true)]
    pub min_update_samples: usize,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Predict a single matchup, optionally mid-game
    Predict {
        /// Away team abbreviation (e.g. TOR)
        away: String,
        /// Home team abbreviation (e.g. MTL)
        home: String,
        /// Current away goals (enables the live adjustment with --home-score)
        #[arg(long)]
        away_score: Option<i32>,
        /// Current home goals
        #[arg(long)]
        home_score: Option<i32>,
        /// Current period (1-3, 4+ = overtime)
        #[arg(long)]
        period: Option<u8>,
    },
    /// Predict from an NHL game id, live-aware
    Game {
        /// NHL game id (e.g. 2024020001)
        game_id: i64,
    },
    /// Predict every game on a date's schedule
    Slate {
        /// Date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record a finished game's outcome and update team logs
    Record {
        /// NHL game id
        game_id: i64,
        /// Away team abbreviation (required with --offline)
        #[arg(long)]
        away: Option<String>,
        /// Home team abbreviation (required with --offline)
        #[arg(long)]
        home: Option<String>,
        /// Winner abbreviation (required with --offline)
        #[arg(long)]
        winner: Option<String>,
        /// Game date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Run the weight-update pass over recent decided predictions
    UpdateWeights,
    /// Set a team's speed/distance/burst edge ratings (0-100)
    Edge {
        team: String,
        speed: f64,
        distance: f64,
        burst: f64,
    },
    /// Show current weights and lifetime accuracy
    Stats,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..1.0).contains(&self.recency_decay) {
            anyhow::bail!("recency_decay must be in [0.0, 1.0)");
        }
        if !(0.0..1.0).contains(&self.momentum_decay) {
            anyhow::bail!("momentum_decay must be in [0.0, 1.0)");
        }
        if self.learning_rate <= 0.0 || self.learning_rate > 0.5 {
            anyhow::bail!("learning_rate must be in (0.0, 0.5]");
        }
        if !(0.0..0.14).contains(&self.weight_floor) {
            // Seven normalized weights must be able to sum to 1 above the floor.
            anyhow::bail!("weight_floor must be in [0.0, 1/7)");
        }
        if self.min_update_samples == 0 {
            anyhow::bail!("min_update_samples must be at least 1");
        }
        Ok(())
    }

    pub fn update_params(&self) -> UpdateParams {
        UpdateParams {
            learning_rate: self.learning_rate,
            momentum_decay: self.momentum_decay,
            weight_floor: self.weight_floor,
            min_samples: self.min_update_samples,
        }
    }
}
