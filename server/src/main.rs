use minesweeper_server::{build_rocket, config::Config};
use tracing::info;

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    info!("Starting Minesweeper multiplayer server");

    let config = Config::from_env();
    info!("Loaded configuration: {:?}", config);

    let rocket = build_rocket(config)?;
    info!("Endpoints: POST /create, GET /ws");

    rocket.launch().await?;
    Ok(())
}
