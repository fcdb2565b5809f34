use chess_core::Lobby;
use chess_server::config::Config;
use chess_server::{AppState, app};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialise tracing (respects RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let (lobby, _hub_task) = Lobby::start(config.max_connections, config.connection);
    let state = AppState {
        lobby,
        max_message_size: config.max_message_size,
    };
    let app = app(state, &config.static_dir);

    let addr = config.socket_addr_string();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Chess server listening on {addr}");
    tracing::info!("Serving static files from {}", config.static_dir);
    tracing::info!(
        max_connections = config.max_connections,
        keepalive = ?config.connection.keepalive_interval,
        peer_timeout = ?config.connection.peer_timeout,
        "Connection limits"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
