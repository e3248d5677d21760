mod app;
mod audio;
mod clips;
mod config;
mod messages;
mod playback;
mod services;
mod state;
mod timer;
mod ui;

use app::App;
use config::Config;
use state::MemoState;
use ui::KeyBindings;

use anyhow::Result;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting voxpad voice memo recorder");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // LocalSet for !Send futures (the App holds cpal and rodio streams)
    let local = tokio::task::LocalSet::new();

    local.run_until(async move { run_app(config).await }).await
}

async fn run_app(config: Config) -> Result<()> {
    let (snapshot_tx, snapshot_rx) = watch::channel(MemoState::default().snapshot());
    let (ui_tx, ui_rx) = mpsc::channel(10);

    let bindings = KeyBindings::from_config(&config);
    println!("voxpad: {}", bindings.help());

    tokio::spawn(ui::read_commands(bindings, ui_tx));
    tokio::spawn(ui::render_status(snapshot_rx));

    let app = App::new(&config, ui_rx, snapshot_tx);
    app.run().await?;

    tracing::info!("voxpad shutdown complete");
    Ok(())
}
