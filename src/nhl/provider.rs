use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::model::performance::GameObservation;

/// Trait every upstream game-data source must implement.
#[async_trait]
pub trait GameDataProvider: Send + Sync {
    /// List the games scheduled for the given date.
    async fn fetch_schedule(&self, date: NaiveDate) -> Result<Vec<ScheduledGame>>;

    /// Fetch score, period, and per-team stat lines for one game.
    /// `None` means the upstream knows nothing about this game id.
    async fn fetch_game_data(&self, game_id: i64) -> Result<Option<GameData>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Scheduled,
    Live,
    Final,
}

/// One schedule entry.
#[derive(Debug, Clone)]
pub struct ScheduledGame {
    pub game_id: i64,
    pub away_team: String,
    pub home_team: String,
    pub start_time_utc: Option<DateTime<Utc>>,
    pub state: GameState,
}

/// Score and stat lines for one game, as far as the upstream exposes them.
#[derive(Debug, Clone)]
pub struct GameData {
    pub game_id: i64,
    pub away_team: String,
    pub home_team: String,
    pub away_score: i32,
    pub home_score: i32,
    pub period: Option<u8>,
    pub state: GameState,
    pub away_stats: Option<GameObservation>,
    pub home_stats: Option<GameObservation>,
}

impl GameData {
    /// Winner abbreviation for a final game, if the score is not level.
    pub fn winner(&self) -> Option<&str> {
        if self.state != GameState::Final {
            return None;
        }
        if self.away_score > self.home_score {
            Some(&self.away_team)
        } else if self.home_score > self.away_score {
            Some(&self.home_team)
        } else {
            None
        }
    }
}
