use std::sync::Arc;

use dashmap::Entry;
use nanoid::nanoid;
use rocket::{State, futures::StreamExt, get, http::Status, post, serde::json::Json};
use rocket_ws::{Channel, Message, WebSocket};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use minesweeper_common::{
    models::{CreateResponse, ErrorResponse, GameSetup},
    protocol::{ClientMessage, ServerMessage},
};

use crate::{
    config::Config,
    error::BoardError,
    logic::{Game, Games, build_board},
    rate_limit::{ClientIp, RateLimiter},
};

type ApiError = (Status, Json<ErrorResponse>);

fn api_error(status: Status, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

#[instrument(level = "trace", skip(games, game))]
fn add_game(games: &Games, game: Game) -> String {
    let mut id_length = 5;
    let max_attempts_per_length = 10;
    let game = Arc::new(Mutex::new(game));

    loop {
        for _ in 0..max_attempts_per_length {
            let id = nanoid!(id_length);
            match games.entry(id.clone()) {
                Entry::Occupied(_) => {
                    debug!("Game ID collision, trying another: {}", id);
                }
                Entry::Vacant(entry) => {
                    entry.insert(game);
                    info!("Created new game with ID: {}", id);
                    return id;
                }
            }
        }

        warn!(
            "Exhausted ID attempts at length {}, increasing to {}",
            id_length,
            id_length + 1
        );
        id_length += 1;
    }
}

#[post("/create", data = "<setup>")]
#[instrument(level = "trace", skip(games, rate_limiter), fields(client_ip = %client_ip.0))]
pub fn create_game(
    setup: Json<GameSetup>,
    games: &State<Games>,
    rate_limiter: &State<RateLimiter>,
    client_ip: ClientIp,
) -> Result<Json<CreateResponse>, ApiError> {
    info!("Game creation request from {}: {:?}", client_ip.0, setup.0);

    rate_limiter
        .check(client_ip.0)
        .map_err(|status| api_error(status, "too many games created, try again later"))?;

    let board = build_board(setup.0).map_err(|e| {
        warn!("Rejected game setup from {}: {}", client_ip.0, e);
        api_error(Status::BadRequest, e)
    })?;

    let id = add_game(games, Game::new(board));
    info!("Successfully created game {} for client {}", id, client_ip.0);
    Ok(Json(CreateResponse { id }))
}

async fn handle_message(
    game: &Mutex<Game>,
    stream_id: &Uuid,
    message: ClientMessage,
    config: &Config,
) {
    let mut game = game.lock().await;
    let result: Result<(), BoardError> = match message {
        ClientMessage::Reveal { pos } => game.reveal(pos).await,
        ClientMessage::Flag { pos } => game.flag(pos).await,
        ClientMessage::Restart { setup } => {
            let setup = setup.unwrap_or_else(|| config.default_difficulty.into());
            game.restart(setup).await
        }
    };

    if let Err(e) = result {
        debug!("Rejected request from stream {}: {}", stream_id, e);
        game.send_to(
            stream_id,
            &ServerMessage::Error {
                message: e.to_string(),
            },
        )
        .await;
    }
}

#[get("/ws?<id>")]
#[instrument(level = "trace", skip(ws, games, config), fields(game_id = %id))]
pub fn websocket_handler(
    ws: WebSocket,
    games: &State<Games>,
    config: &State<Config>,
    id: String,
) -> Result<Channel<'static>, Status> {
    let game = match games.get(&id) {
        None => {
            warn!("WebSocket connection attempt for non-existent game: {}", id);
            return Err(Status::NotFound);
        }
        Some(value) => {
            info!("WebSocket connection established for game: {}", id);
            value.value().clone()
        }
    };
    let config = config.inner().clone();

    Ok(ws.channel(move |stream| {
        Box::pin(async move {
            let (write, mut read) = stream.split();

            let stream_id = game.lock().await.add_stream(write).await;
            info!("Client connected to game {} (stream: {})", id, stream_id);

            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => {
                            debug!("Received message from game {}: {:?}", id, message);
                            handle_message(&game, &stream_id, message, &config).await;
                        }
                        Err(e) => {
                            warn!("Invalid message format in game {}: {} - Error: {}", id, text, e);
                            game.lock()
                                .await
                                .send_to(
                                    &stream_id,
                                    &ServerMessage::Error {
                                        message: format!("invalid message: {e}"),
                                    },
                                )
                                .await;
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("WebSocket connection closed for game {} (stream: {})", id, stream_id);
                        break;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Ok(_) => {
                        debug!("Received non-text message in game {}, closing", id);
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error in game {} (stream: {}): {}", id, stream_id, e);
                        break;
                    }
                }
            }

            game.lock().await.remove_stream(&stream_id).await;
            info!("Client disconnected from game {} (stream: {})", id, stream_id);
            Ok(())
        })
    }))
}

#[cfg(test)]
mod tests {
    use minesweeper_common::models::{Difficulty, GameParams, Pos};

    use super::*;
    use crate::data::Board;

    fn game() -> Mutex<Game> {
        Mutex::new(Game::new(Board::with_mines(3, 3, &[(1, 1)]).unwrap()))
    }

    #[tokio::test]
    async fn out_of_bounds_request_leaves_board_untouched() {
        let game = game();
        let before = game.lock().await.board().clone();

        for pos in [Pos { row: -1, col: 0 }, Pos { row: 3, col: 3 }] {
            handle_message(
                &game,
                &Uuid::new_v4(),
                ClientMessage::Reveal { pos },
                &Config::default(),
            )
            .await;
            handle_message(
                &game,
                &Uuid::new_v4(),
                ClientMessage::Flag { pos },
                &Config::default(),
            )
            .await;
        }

        let game = game.lock().await;
        let after = game.board();
        assert!(before.rows().eq(after.rows()));
        assert_eq!(after.remaining_mine_count(), before.remaining_mine_count());
        assert_eq!(after.flags_placed(), 0);
        assert!(!after.is_game_over());
        assert!(!after.is_game_won());
    }

    #[tokio::test]
    async fn valid_actions_reach_the_board() {
        let game = game();
        let stream = Uuid::new_v4();

        handle_message(
            &game,
            &stream,
            ClientMessage::Flag {
                pos: Pos { row: 1, col: 1 },
            },
            &Config::default(),
        )
        .await;
        handle_message(
            &game,
            &stream,
            ClientMessage::Reveal {
                pos: Pos { row: 0, col: 0 },
            },
            &Config::default(),
        )
        .await;

        let game = game.lock().await;
        assert!(game.board().cell(1, 1).unwrap().is_flagged);
        assert!(game.board().cell(0, 0).unwrap().is_revealed);
        assert_eq!(game.board().remaining_mine_count(), 0);
    }

    #[tokio::test]
    async fn restart_uses_requested_or_default_setup() {
        let game = game();
        let stream = Uuid::new_v4();

        handle_message(
            &game,
            &stream,
            ClientMessage::Restart {
                setup: Some(GameSetup::Custom(GameParams {
                    rows: 4,
                    cols: 6,
                    mines: 2,
                })),
            },
            &Config::default(),
        )
        .await;
        assert_eq!(game.lock().await.board().board_dimensions(), (4, 6));

        let config = Config {
            default_difficulty: Difficulty::Intermediate,
            ..Config::default()
        };
        handle_message(&game, &stream, ClientMessage::Restart { setup: None }, &config).await;
        let game = game.lock().await;
        assert_eq!(game.board().board_dimensions(), (16, 16));
        assert_eq!(game.board().difficulty(), Difficulty::Intermediate);
    }

    #[tokio::test]
    async fn rejected_restart_keeps_the_current_board() {
        let game = game();
        handle_message(
            &game,
            &Uuid::new_v4(),
            ClientMessage::Restart {
                setup: Some(GameSetup::Custom(GameParams {
                    rows: 2,
                    cols: 2,
                    mines: 4,
                })),
            },
            &Config::default(),
        )
        .await;
        assert_eq!(game.lock().await.board().board_dimensions(), (3, 3));
    }
}
