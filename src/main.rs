use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use futures_util::future::join_all;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

mod config;
mod model;
mod nhl;
mod store;

use config::{Command, Config};
use model::performance::GameObservation;
use model::{LiveState, Prediction, UpdateOutcome, WinProbabilityEstimator};
use nhl::{GameDataProvider, GameState, NhlApi};
use store::models::ModelState;
use store::JsonStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let store = JsonStore::new(&config.predictions_path, &config.team_stats_path);

    // Load failures are not fatal: warn and continue on fresh defaults.
    let state = store.load_model().unwrap_or_else(|e| {
        warn!("⚠️ {}; continuing with a fresh model", e);
        ModelState::default()
    });
    let teams = store.load_team_stats().unwrap_or_else(|e| {
        warn!("⚠️ {}; continuing with empty team stats", e);
        Default::default()
    });
    let mut estimator = WinProbabilityEstimator::new(state, teams, config.recency_decay);

    let provider: Option<NhlApi> = if config.offline {
        info!("🔌 Offline mode — upstream data disabled, neutral stats where needed");
        None
    } else {
        match NhlApi::new(&config.nhl_api_url) {
            Ok(p) => {
                info!("📡 Upstream provider: {}", p.name());
                Some(p)
            }
            Err(e) => {
                warn!("⚠️ {}; running in demo mode", e);
                None
            }
        }
    };

    let mut mutated = false;
    match config.command.clone() {
        None => run_repl(&estimator).await?,
        Some(Command::Predict {
            away,
            home,
            away_score,
            home_score,
            period,
        }) => {
            let live = match (away_score, home_score) {
                (Some(a), Some(h)) => Some(LiveState {
                    away_score: a,
                    home_score: h,
                    period: period.unwrap_or(1),
                }),
                _ => None,
            };
            let away = away.to_uppercase();
            let home = home.to_uppercase();
            let p = estimator.predict(&away, &home, live);
            print_prediction(&away, &home, &p);
        }
        Some(Command::Game { game_id }) => cmd_game(&estimator, provider.as_ref(), game_id).await,
        Some(Command::Slate { date }) => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            cmd_slate(&estimator, provider.as_ref(), date).await;
        }
        Some(Command::Record {
            game_id,
            away,
            home,
            winner,
            date,
        }) => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            mutated = cmd_record(
                &mut estimator,
                provider.as_ref(),
                game_id,
                away,
                home,
                winner,
                date,
            )
            .await;
        }
        Some(Command::UpdateWeights) => {
            match estimator.update_weights(config.update_params()) {
                UpdateOutcome::Skipped { decided } => {
                    println!(
                        "⏭️  Update skipped: {} decided prediction(s) available, need {}",
                        decided, config.min_update_samples
                    );
                }
                UpdateOutcome::Applied { decided, wrong } => {
                    println!(
                        "✅ Weights updated over {} recent decided game(s), {} missed",
                        decided, wrong
                    );
                    print_weights(&estimator);
                    mutated = true;
                }
            }
        }
        Some(Command::Edge {
            team,
            speed,
            distance,
            burst,
        }) => {
            let team = team.to_uppercase();
            estimator.set_edge(
                &team,
                model::performance::EdgeScores {
                    speed,
                    distance,
                    burst,
                },
            );
            println!(
                "✅ Edge ratings for {}: speed {:.0}, distance {:.0}, burst {:.0}",
                team, speed, distance, burst
            );
            mutated = true;
        }
        Some(Command::Stats) => cmd_stats(&estimator),
    }

    if mutated {
        if let Err(e) = store.save_model(&estimator.state) {
            warn!("⚠️ {}; model changes not persisted", e);
        }
        if let Err(e) = store.save_team_stats(&estimator.teams) {
            warn!("⚠️ {}; team stat changes not persisted", e);
        }
    }

    Ok(())
}

fn print_prediction(away: &str, home: &str, p: &Prediction) {
    println!(
        "🏒 {} @ {} — {} {:.1}% / {} {:.1}%",
        away, home, away, p.away_prob, home, p.home_prob
    );
}

fn print_weights(est: &WinProbabilityEstimator) {
    let w = &est.state.weights;
    println!(
        "   weights: xG {:.3}  HDC {:.3}  attempts {:.3}  goals {:.3}  \
         speed {:.3}  distance {:.3}  burst {:.3}  (home ice {:.3})",
        w.expected_goals,
        w.high_danger,
        w.shot_attempts,
        w.goals,
        w.speed_edge,
        w.distance_edge,
        w.burst_edge,
        w.home_ice
    );
}

async fn cmd_game(est: &WinProbabilityEstimator, provider: Option<&NhlApi>, game_id: i64) {
    let provider = match provider {
        Some(p) => p,
        None => {
            println!("📡 No upstream data available; use `predict AWAY HOME` instead");
            return;
        }
    };
    let data = match provider.fetch_game_data(game_id).await {
        Ok(Some(d)) => d,
        Ok(None) => {
            println!("❓ Game {} not found upstream", game_id);
            return;
        }
        Err(e) => {
            warn!("⚠️ Upstream fetch failed: {}", e);
            println!("📡 Upstream unavailable; use `predict AWAY HOME` instead");
            return;
        }
    };

    let live = match data.state {
        GameState::Live => Some(LiveState {
            away_score: data.away_score,
            home_score: data.home_score,
            period: data.period.unwrap_or(1),
        }),
        GameState::Scheduled => None,
        GameState::Final => {
            println!(
                "🏁 Final: {} {} – {} {} (use `record {}` to log the outcome)",
                data.away_team, data.away_score, data.home_team, data.home_score, data.game_id
            );
            None
        }
    };

    if data.state == GameState::Live {
        println!(
            "🔴 Live: {} {} – {} {}, period {}",
            data.away_team,
            data.away_score,
            data.home_team,
            data.home_score,
            data.period.unwrap_or(1)
        );
    }
    let p = est.predict(&data.away_team, &data.home_team, live);
    print_prediction(&data.away_team, &data.home_team, &p);
}

async fn cmd_slate(est: &WinProbabilityEstimator, provider: Option<&NhlApi>, date: NaiveDate) {
    let provider = match provider {
        Some(p) => p,
        None => {
            println!("📡 Schedule requires upstream data; not available offline");
            return;
        }
    };
    let games = match provider.fetch_schedule(date).await {
        Ok(g) => g,
        Err(e) => {
            warn!("⚠️ Schedule fetch failed: {}", e);
            println!("📡 Upstream unavailable; no slate for {}", date);
            return;
        }
    };
    if games.is_empty() {
        println!("📅 No games scheduled on {}", date);
        return;
    }
    println!("📅 {} — {} game(s)", date, games.len());

    // Pull live boxscores for in-progress games concurrently.
    let live_fetches = join_all(games.iter().map(|g| async move {
        if g.state == GameState::Live {
            provider.fetch_game_data(g.game_id).await.ok().flatten()
        } else {
            None
        }
    }))
    .await;

    for (game, live_data) in games.iter().zip(live_fetches) {
        let live = live_data.as_ref().map(|d| LiveState {
            away_score: d.away_score,
            home_score: d.home_score,
            period: d.period.unwrap_or(1),
        });
        let p = est.predict(&game.away_team, &game.home_team, live);
        let marker = match game.state {
            GameState::Live => "🔴",
            GameState::Final => "🏁",
            GameState::Scheduled => "🕐",
        };
        println!(
            "{} {} @ {} — {} {:.1}% / {} {:.1}%",
            marker, game.away_team, game.home_team, game.away_team, p.away_prob, game.home_team,
            p.home_prob
        );
    }
}

async fn cmd_record(
    est: &mut WinProbabilityEstimator,
    provider: Option<&NhlApi>,
    game_id: i64,
    away: Option<String>,
    home: Option<String>,
    winner: Option<String>,
    date: NaiveDate,
) -> bool {
    let fetched = match provider {
        Some(p) => match p.fetch_game_data(game_id).await {
            Ok(d) => d,
            Err(e) => {
                warn!("⚠️ Upstream fetch failed: {}; falling back to flags", e);
                None
            }
        },
        None => None,
    };

    let (away, home, winner, away_obs, home_obs) = match fetched {
        Some(data) => {
            if data.state != GameState::Final {
                println!("⏳ Game {} is not final yet; nothing recorded", game_id);
                return false;
            }
            let winner = match data.winner() {
                Some(w) => w.to_string(),
                None => {
                    println!("❓ Game {} has no winner upstream; nothing recorded", game_id);
                    return false;
                }
            };
            let away_obs = data.away_stats.clone().unwrap_or_else(|| {
                info!("No away stat line upstream; recording neutral values");
                GameObservation::neutral()
            });
            let home_obs = data.home_stats.clone().unwrap_or_else(|| {
                info!("No home stat line upstream; recording neutral values");
                GameObservation::neutral()
            });
            (data.away_team, data.home_team, winner, away_obs, home_obs)
        }
        None => match (away, home, winner) {
            (Some(a), Some(h), Some(w)) => {
                info!("Demo mode: recording neutral stat lines for game {}", game_id);
                (
                    a.to_uppercase(),
                    h.to_uppercase(),
                    w.to_uppercase(),
                    GameObservation::neutral(),
                    GameObservation::neutral(),
                )
            }
            _ => {
                println!("❌ Without upstream data, `record` needs --away, --home, and --winner");
                return false;
            }
        },
    };

    if winner != away && winner != home {
        println!("❌ Winner {} is neither {} nor {}", winner, away, home);
        return false;
    }

    let prediction = est.predict(&away, &home, None);
    est.record_outcome(
        &game_id.to_string(),
        date,
        &prediction,
        &winner,
        away_obs,
        home_obs,
    );
    let rec = est
        .state
        .predictions
        .last()
        .expect("outcome was just recorded");
    println!(
        "✅ Recorded {}: {} beat {} — model had the winner at {:.1}%",
        game_id,
        winner,
        if winner == away { &home } else { &away },
        rec.accuracy.unwrap_or_default() * 100.0
    );
    true
}

fn cmd_stats(est: &WinProbabilityEstimator) {
    println!("📊 Model state");
    print_weights(est);
    match est.state.accuracy_rate() {
        Some(rate) => println!(
            "   record: {}/{} correct ({:.1}%)",
            est.state.correct_predictions,
            est.state.games_analyzed,
            rate * 100.0
        ),
        None => println!("   record: no decided games yet"),
    }
    println!(
        "   prediction log: {} entries, {} team(s) tracked",
        est.state.predictions.len(),
        est.teams.teams.len()
    );
}

/// Interactive prompt: `AWAY HOME` predicts a matchup, `quit` exits.
/// Bad input prints a hint and the loop continues.
async fn run_repl(est: &WinProbabilityEstimator) -> Result<()> {
    println!("🏒 puckprob — enter 'AWAY HOME' (e.g. TOR MTL), or 'quit' to exit");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 2 {
            println!("❓ Expected two team abbreviations, e.g. TOR MTL");
            continue;
        }
        let away = parts[0].to_uppercase();
        let home = parts[1].to_uppercase();
        let p = est.predict(&away, &home, None);
        print_prediction(&away, &home, &p);
    }
    Ok(())
}
