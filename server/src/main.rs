use clap::Parser;
use log::{error, info};
use server::network::GameServer;
use shared::discovery::{Broadcaster, RoomInfo};
use shared::game::GameConfig;
use std::sync::Arc;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "9999")]
    port: u16,
    /// Board width in tiles (even values are rounded up)
    #[clap(long, default_value = "15")]
    width: i32,
    /// Board height in tiles (even values are rounded up)
    #[clap(long, default_value = "13")]
    height: i32,
    /// Maximum number of players
    #[clap(short, long, default_value = "4")]
    max_players: usize,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "20")]
    tick_rate: u32,
    /// Fraction of free tiles filled with destructible walls
    #[clap(long, default_value = "0.4")]
    soft_wall_density: f64,
    /// Room name advertised over LAN discovery
    #[clap(long, default_value = "bombergrid")]
    room: String,
    /// Host name advertised over LAN discovery
    #[clap(long, default_value = "server")]
    name: String,
    /// Disable LAN discovery broadcasts
    #[clap(long)]
    no_discovery: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = GameConfig {
        width: args.width,
        height: args.height,
        max_players: args.max_players,
        tick_rate: args.tick_rate,
        soft_wall_density: args.soft_wall_density,
        ..GameConfig::default()
    };

    let server = GameServer::new(config);
    let mut broadcaster = None;

    if !args.no_discovery {
        let b = Arc::new(Broadcaster::new(RoomInfo {
            room_name: args.room.clone(),
            host_name: args.name.clone(),
            player_count: 0,
            max_players: args.max_players,
            game_addr: format!("{}:{}", args.host, args.port),
        }));
        server.attach_broadcaster(Arc::clone(&b));
        let runner = Arc::clone(&b);
        tokio::spawn(async move {
            if let Err(e) = runner.run().await {
                error!("discovery broadcaster failed: {}", e);
            }
        });
        broadcaster = Some(b);
    }

    let addr = server.start(&format!("{}:{}", args.host, args.port)).await?;
    info!("room {:?} up on {}", args.room, addr);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.stop();
    if let Some(b) = broadcaster {
        b.stop();
    }
    Ok(())
}
