use std::time::{Duration, Instant};

use rocket::{
    Build, Rocket,
    fairing::{self, Fairing, Info, Kind},
};
use tokio::time;
use tracing::{debug, info, warn};

use crate::{config::Config, logic::Games};

/// Spawns the periodic sweep of stale games once rocket ignites.
pub struct CleanupFairing;

#[rocket::async_trait]
impl Fairing for CleanupFairing {
    fn info(&self) -> Info {
        Info {
            name: "Cleanup Task",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> fairing::Result {
        match (rocket.state::<Games>(), rocket.state::<Config>()) {
            (Some(games), Some(config)) => {
                info!("Starting cleanup task for game management");
                let games = games.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    start_cleanup_task(games, config).await;
                });
            }
            _ => warn!("Failed to get games state for cleanup task"),
        }
        Ok(rocket)
    }
}

pub async fn start_cleanup_task(games: Games, config: Config) {
    // tokio panics on a zero period
    let period = config.cleanup_interval.max(Duration::from_secs(1));
    let mut interval = time::interval(period);

    info!(
        "Started game cleanup task: checking every {}s, inactive timeout: {}s, active timeout: {}s",
        period.as_secs(),
        config.inactive_game_timeout.as_secs(),
        config.active_game_timeout.as_secs()
    );

    loop {
        interval.tick().await;
        cleanup_games(
            &games,
            Instant::now(),
            config.inactive_game_timeout,
            config.active_game_timeout,
        );
    }
}

/// Drops every stale game and returns how many were removed.
pub fn cleanup_games(
    games: &Games,
    now: Instant,
    inactive_timeout: Duration,
    active_timeout: Duration,
) -> usize {
    let mut games_to_remove = Vec::new();

    for entry in games.iter() {
        // A locked game is in use right now, so it is not stale.
        if let Ok(game) = entry.value().try_lock()
            && game.should_cleanup(now, inactive_timeout, active_timeout)
        {
            games_to_remove.push(entry.key().clone());
        }
    }

    let removed_count = games_to_remove.len();
    for game_id in games_to_remove {
        games.remove(&game_id);
        debug!("Cleaned up game: {}", game_id);
    }

    if removed_count > 0 {
        info!("Cleaned up {} inactive games", removed_count);
    }
    removed_count
}
