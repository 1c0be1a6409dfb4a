use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use tracing::debug;

use super::provider::{GameData, GameDataProvider, GameState, ScheduledGame};
use crate::model::performance::GameObservation;

/// Client for the NHL api-web endpoints.
/// Docs: <https://api-web.nhle.com/v1/> (undocumented but stable public API).
pub struct NhlApi {
    http: Client,
    /// Base URL for overriding in tests
    base_url: String,
}

impl NhlApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(NhlApi {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn state_from_str(s: &str) -> GameState {
        match s.to_uppercase().as_str() {
            "LIVE" | "CRIT" => GameState::Live,
            "FINAL" | "OFF" => GameState::Final,
            _ => GameState::Scheduled,
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        match self.get_json_opt(url).await? {
            Some(v) => Ok(v),
            None => anyhow::bail!("NHL API error 404 Not Found for {}", url),
        }
    }

    /// GET a JSON body. `Ok(None)` means a true HTTP 404; every other
    /// failure (5xx, transport, malformed body) is an error.
    async fn get_json_opt(&self, url: &str) -> Result<Option<serde_json::Value>> {
        debug!("GET {}", url);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("NHL API request failed: {}", url))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            anyhow::bail!("NHL API error {} for {}", resp.status(), url);
        }
        let value = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse NHL API response from {}", url))?;
        Ok(Some(value))
    }
}

#[async_trait]
impl GameDataProvider for NhlApi {
    fn name(&self) -> &str {
        "NHL api-web"
    }

    async fn fetch_schedule(&self, date: NaiveDate) -> Result<Vec<ScheduledGame>> {
        let url = format!("{}/schedule/{}", self.base_url, date.format("%Y-%m-%d"));
        let raw = self.get_json(&url).await?;
        Ok(parse_schedule_response(&raw, date))
    }

    async fn fetch_game_data(&self, game_id: i64) -> Result<Option<GameData>> {
        let url = format!("{}/gamecenter/{}/boxscore", self.base_url, game_id);
        // A 404 here means an unknown game id, not an outage.
        let raw = match self.get_json_opt(&url).await? {
            Some(v) => v,
            None => return Ok(None),
        };
        Ok(parse_boxscore_response(&raw))
    }
}

/// The schedule endpoint returns a whole game week; keep only the asked-for
/// date. Entries missing an id or a team abbreviation are skipped.
pub fn parse_schedule_response(raw: &serde_json::Value, date: NaiveDate) -> Vec<ScheduledGame> {
    let days = match raw["gameWeek"].as_array() {
        Some(a) => a,
        None => return vec![],
    };
    let wanted = date.format("%Y-%m-%d").to_string();

    days.iter()
        .filter(|day| day["date"].as_str() == Some(wanted.as_str()))
        .flat_map(|day| day["games"].as_array().cloned().unwrap_or_default())
        .filter_map(|game| {
            let game_id = game["id"].as_i64()?;
            let away_team = game["awayTeam"]["abbrev"].as_str()?.to_string();
            let home_team = game["homeTeam"]["abbrev"].as_str()?.to_string();
            let state = NhlApi::state_from_str(game["gameState"].as_str().unwrap_or("FUT"));
            let start_time_utc = game["startTimeUTC"]
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc));
            Some(ScheduledGame {
                game_id,
                away_team,
                home_team,
                start_time_utc,
                state,
            })
        })
        .collect()
}

pub fn parse_boxscore_response(raw: &serde_json::Value) -> Option<GameData> {
    let game_id = raw["id"].as_i64()?;
    let away = &raw["awayTeam"];
    let home = &raw["homeTeam"];
    let away_team = away["abbrev"].as_str()?.to_string();
    let home_team = home["abbrev"].as_str()?.to_string();
    let away_score = away["score"].as_i64().unwrap_or(0) as i32;
    let home_score = home["score"].as_i64().unwrap_or(0) as i32;
    let state = NhlApi::state_from_str(raw["gameState"].as_str().unwrap_or("FUT"));
    let period = raw["periodDescriptor"]["number"]
        .as_i64()
        .map(|p| p.clamp(1, 10) as u8);

    Some(GameData {
        game_id,
        away_team,
        home_team,
        away_score,
        home_score,
        period,
        state,
        away_stats: team_observation(away),
        home_stats: team_observation(home),
    })
}

/// Derive a stat line from one side of the boxscore. The public boxscore
/// carries goals and shots on goal only; xG, high-danger chances, and shot
/// attempts are approximated from shot volume at league-average rates.
fn team_observation(side: &serde_json::Value) -> Option<GameObservation> {
    let goals = side["score"].as_i64()? as f64;
    let sog = side["sog"].as_i64()? as f64;
    Some(GameObservation {
        expected_goals: sog * 0.082,
        high_danger_chances: sog * 0.30,
        shot_attempts: sog * 1.8,
        goals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn parses_schedule_for_requested_date_only() {
        let raw = json!({
            "gameWeek": [
                {
                    "date": "2024-11-01",
                    "games": [
                        {
                            "id": 2024020001i64,
                            "startTimeUTC": "2024-11-01T23:00:00Z",
                            "gameState": "FUT",
                            "awayTeam": {"abbrev": "TOR"},
                            "homeTeam": {"abbrev": "MTL"}
                        },
                        {
                            "id": 2024020002i64,
                            "gameState": "LIVE",
                            "awayTeam": {"abbrev": "WSH"},
                            "homeTeam": {"abbrev": "VAN"}
                        }
                    ]
                },
                {
                    "date": "2024-11-02",
                    "games": [
                        {
                            "id": 2024020003i64,
                            "gameState": "FUT",
                            "awayTeam": {"abbrev": "BOS"},
                            "homeTeam": {"abbrev": "NYR"}
                        }
                    ]
                }
            ]
        });
        let date = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        let games = parse_schedule_response(&raw, date);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].away_team, "TOR");
        assert_eq!(games[0].state, GameState::Scheduled);
        assert!(games[0].start_time_utc.is_some());
        assert_eq!(games[1].state, GameState::Live);
        assert!(games[1].start_time_utc.is_none());
    }

    #[test]
    fn schedule_skips_malformed_entries() {
        let raw = json!({
            "gameWeek": [
                {
                    "date": "2024-11-01",
                    "games": [
                        {"id": "not-a-number", "awayTeam": {"abbrev": "TOR"}, "homeTeam": {"abbrev": "MTL"}},
                        {"id": 2024020005i64, "awayTeam": {}, "homeTeam": {"abbrev": "MTL"}},
                        {"id": 2024020006i64, "awayTeam": {"abbrev": "EDM"}, "homeTeam": {"abbrev": "CGY"}}
                    ]
                }
            ]
        });
        let date = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        let games = parse_schedule_response(&raw, date);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].away_team, "EDM");
    }

    #[test]
    fn empty_schedule_body_parses_to_no_games() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        assert!(parse_schedule_response(&json!({}), date).is_empty());
    }

    #[test]
    fn parses_live_boxscore() {
        let raw = json!({
            "id": 2024020101i64,
            "gameState": "LIVE",
            "periodDescriptor": {"number": 3},
            "awayTeam": {"abbrev": "WSH", "score": 2, "sog": 25},
            "homeTeam": {"abbrev": "VAN", "score": 0, "sog": 18}
        });
        let data = parse_boxscore_response(&raw).expect("boxscore should parse");
        assert_eq!(data.away_team, "WSH");
        assert_eq!(data.away_score, 2);
        assert_eq!(data.period, Some(3));
        assert_eq!(data.state, GameState::Live);
        let away = data.away_stats.clone().expect("away stats");
        assert_relative_eq!(away.goals, 2.0, epsilon = 1e-9);
        assert_relative_eq!(away.expected_goals, 25.0 * 0.082, epsilon = 1e-9);
        assert!(data.winner().is_none(), "live game has no winner yet");
    }

    #[test]
    fn final_boxscore_reports_winner() {
        let raw = json!({
            "id": 2024020102i64,
            "gameState": "OFF",
            "periodDescriptor": {"number": 3},
            "awayTeam": {"abbrev": "TOR", "score": 4, "sog": 31},
            "homeTeam": {"abbrev": "MTL", "score": 1, "sog": 22}
        });
        let data = parse_boxscore_response(&raw).unwrap();
        assert_eq!(data.state, GameState::Final);
        assert_eq!(data.winner(), Some("TOR"));
    }

    #[test]
    fn boxscore_without_sog_still_parses_scoreline() {
        let raw = json!({
            "id": 2024020103i64,
            "gameState": "LIVE",
            "awayTeam": {"abbrev": "TOR", "score": 1},
            "homeTeam": {"abbrev": "MTL", "score": 1}
        });
        let data = parse_boxscore_response(&raw).unwrap();
        assert!(data.away_stats.is_none());
        assert_eq!(data.away_score, 1);
        assert!(data.period.is_none());
    }

    /// One-shot HTTP stub that answers every request with the given status
    /// line and an empty body.
    async fn spawn_stub_server(status_line: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = sock.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        status_line
                    );
                    let _ = sock.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn http_404_maps_to_missing_game() {
        let base = spawn_stub_server("404 Not Found").await;
        let api = NhlApi::new(&base).unwrap();
        let res = api.fetch_game_data(2024020001).await;
        assert!(matches!(res, Ok(None)), "404 should mean missing game");
    }

    #[tokio::test]
    async fn server_error_surfaces_even_when_game_id_contains_404() {
        // Game ids like 2024020404 put "404" in the URL; an outage must not
        // be mistaken for a missing game.
        let base = spawn_stub_server("500 Internal Server Error").await;
        let api = NhlApi::new(&base).unwrap();
        let res = api.fetch_game_data(2024020404).await;
        match res {
            Err(e) => assert!(e.to_string().contains("500"), "unexpected error: {}", e),
            Ok(v) => panic!("500 must be an error, got {:?}", v),
        }
    }

    #[test]
    fn state_mapping_covers_known_values() {
        assert_eq!(NhlApi::state_from_str("FUT"), GameState::Scheduled);
        assert_eq!(NhlApi::state_from_str("PRE"), GameState::Scheduled);
        assert_eq!(NhlApi::state_from_str("LIVE"), GameState::Live);
        assert_eq!(NhlApi::state_from_str("CRIT"), GameState::Live);
        assert_eq!(NhlApi::state_from_str("FINAL"), GameState::Final);
        assert_eq!(NhlApi::state_from_str("OFF"), GameState::Final);
    }
}
