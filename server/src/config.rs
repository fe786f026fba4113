use std::{env, fmt::Display, str::FromStr, time::Duration};

use minesweeper_common::models::Difficulty;
use tracing::warn;

/// Server settings, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cleanup_interval: Duration,
    pub inactive_game_timeout: Duration,
    pub active_game_timeout: Duration,
    pub rate_limit_games_per_minute: u32,
    pub cors_allowed_origins: Vec<String>,
    pub default_difficulty: Difficulty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(60),
            inactive_game_timeout: Duration::from_secs(600),
            active_game_timeout: Duration::from_secs(86_400),
            rate_limit_games_per_minute: 10,
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
            default_difficulty: Difficulty::Beginner,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Ignoring invalid {}={:?}: {}", key, raw, e);
            default
        }),
    }
}

fn seconds_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    Duration::from_secs(parse_or(lookup, key, default.as_secs()))
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key/value source; unset or malformed keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let cors_allowed_origins = match lookup("CORS_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_allowed_origins,
        };

        let default_difficulty = parse_or(
            &lookup,
            "DEFAULT_DIFFICULTY",
            defaults.default_difficulty,
        );
        let default_difficulty = if default_difficulty == Difficulty::Custom {
            warn!("DEFAULT_DIFFICULTY must name a preset, using {}", defaults.default_difficulty);
            defaults.default_difficulty
        } else {
            default_difficulty
        };

        Self {
            cleanup_interval: seconds_or(&lookup, "CLEANUP_INTERVAL_SECONDS", defaults.cleanup_interval),
            inactive_game_timeout: seconds_or(
                &lookup,
                "INACTIVE_GAME_TIMEOUT_SECONDS",
                defaults.inactive_game_timeout,
            ),
            active_game_timeout: seconds_or(
                &lookup,
                "ACTIVE_GAME_TIMEOUT_SECONDS",
                defaults.active_game_timeout,
            ),
            rate_limit_games_per_minute: parse_or(
                &lookup,
                "RATE_LIMIT_GAMES_PER_MINUTE",
                defaults.rate_limit_games_per_minute,
            ),
            cors_allowed_origins,
            default_difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config_from(&[]), Config::default());
    }

    #[test]
    fn reads_every_setting() {
        let config = config_from(&[
            ("CLEANUP_INTERVAL_SECONDS", "5"),
            ("INACTIVE_GAME_TIMEOUT_SECONDS", "30"),
            ("ACTIVE_GAME_TIMEOUT_SECONDS", "3600"),
            ("RATE_LIMIT_GAMES_PER_MINUTE", "2"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("DEFAULT_DIFFICULTY", "Expert"),
        ]);

        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
        assert_eq!(config.inactive_game_timeout, Duration::from_secs(30));
        assert_eq!(config.active_game_timeout, Duration::from_secs(3600));
        assert_eq!(config.rate_limit_games_per_minute, 2);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.default_difficulty, Difficulty::Expert);
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = config_from(&[
            ("CLEANUP_INTERVAL_SECONDS", "soon"),
            ("RATE_LIMIT_GAMES_PER_MINUTE", "-3"),
            ("DEFAULT_DIFFICULTY", "custom"),
        ]);
        assert_eq!(config, Config::default());
    }
}
