pub mod client;
pub mod provider;

pub use client::NhlApi;
pub use provider::{GameDataProvider, GameState};
