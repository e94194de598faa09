mod ack;
mod config;
mod counter;
mod errors;
mod matchroom;
mod protocol;
mod registry;
mod seat;
mod session;
mod timer;
mod watchdog;

use counter::PlayerCounter;
use registry::Registry;
use session::SessionContext;
use std::fs::File;
use std::sync::Arc;
use tokio::net::TcpListener;

////////////////////////////////////////////////////////////////////////////////
// Set up logging //////////////////////////////////////////////////////////////
////////////////////////////////////////////////////////////////////////////////

fn init_logger() {
    use simplelog::*;

    CombinedLogger::init(vec![
        TermLogger::new(LevelFilter::Info, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Debug, Config::default(), File::create("server.log").unwrap()),
    ])
    .unwrap();

    log::debug!("Logger successfully initialized");
}

////////////////////////////////////////////////////////////////////////////////
// Start the server ////////////////////////////////////////////////////////////
////////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let config = config::load_config();
    log::info!("Starting chess-server on {}:{}", config.bind_ip, config.port);

    let ctx = Arc::new(SessionContext {
        registry: Arc::new(Registry::new(config.room_limit)),
        counter: Arc::new(PlayerCounter::new(config.player_limit)),
    });

    let listener = TcpListener::bind((config.bind_ip, config.port)).await?;
    log::info!("Listening for connections");

    loop {
        let (stream, peer) = listener.accept().await?;
        log::debug!("Accepted connection from {peer}");
        let ctx = ctx.clone();
        tokio::spawn(async move {
            session::handle_connection(stream, ctx).await;
        });
    }
}
