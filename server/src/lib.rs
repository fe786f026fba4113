//! Minesweeper board engine and the multiplayer server built around it.
//!
//! [`data::Board`] holds the grid and game outcome; its operations live in
//! [`logic`], which also hosts the shared game sessions that clients play
//! over WebSockets.

pub mod cleanup;
pub mod config;
pub mod cors;
pub mod data;
pub mod error;
pub mod logic;
pub mod rate_limit;
pub mod routes;

use std::sync::Arc;

use dashmap::DashMap;
use rocket::{Build, Rocket, routes};
use tracing::info;

use crate::{
    cleanup::CleanupFairing,
    config::Config,
    cors::create_cors,
    logic::Games,
    rate_limit::RateLimiter,
    routes::{create_game, websocket_handler},
};

pub use crate::{data::Board, error::BoardError};

/// Assembles the server with its shared state, fairings and routes.
pub fn build_rocket(config: Config) -> Result<Rocket<Build>, rocket_cors::Error> {
    let cors = create_cors(&config.cors_allowed_origins)?;
    let games: Games = Arc::new(DashMap::new());
    let rate_limiter = RateLimiter::per_minute(config.rate_limit_games_per_minute);

    info!("Initialized game storage and rate limiter");

    Ok(rocket::build()
        .attach(cors)
        .attach(CleanupFairing)
        .manage(games)
        .manage(rate_limiter)
        .manage(config)
        .mount("/", routes![create_game, websocket_handler]))
}
