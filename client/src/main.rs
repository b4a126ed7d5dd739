use clap::Parser;
use client::input::{parse_command, Command};
use client::network::Client;
use client::rendering::render;
use log::error;
use shared::discovery::RoomListener;
use shared::game::ActionType;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to connect to
    #[clap(short, long, default_value = "127.0.0.1:9999")]
    addr: String,
    /// Display name
    #[clap(short, long, default_value = "player")]
    name: String,
    /// List rooms advertised on the LAN instead of connecting
    #[clap(long)]
    browse: bool,
    /// How many seconds to listen when browsing
    #[clap(long, default_value = "3")]
    browse_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if args.browse {
        return browse(args.browse_secs).await;
    }

    let client = Arc::new(Client::connect(&args.addr, &args.name).await?);
    println!("connected to {} as {}", args.addr, args.name);
    println!("commands: w/a/s/d move, b bomb, start, q quit");

    // Render every snapshot as it lands.
    let renderer = {
        let client = Arc::clone(&client);
        let mut state_rx = client.state_receiver();
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let state = state_rx.borrow().clone();
                if let Some(state) = state {
                    // Clear the terminal between frames.
                    print!("\x1B[2J\x1B[H{}", render(&state, client.player_id()));
                }
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };
                let command = match parse_command(&line) {
                    Some(command) => command,
                    None => continue,
                };
                let result = match command {
                    Command::Move(dir) => {
                        client.send_action(ActionType::Move, Some(dir)).await
                    }
                    Command::PlaceBomb => client.send_action(ActionType::PlaceBomb, None).await,
                    Command::Start => client.send_start().await,
                    Command::Quit => break,
                };
                if let Err(e) = result {
                    error!("send failed: {}", e);
                    break;
                }
            }
        }
    }

    client.close().await;
    renderer.abort();
    Ok(())
}

/// Listens for room advertisements for a few seconds and prints the table.
async fn browse(secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    let listener = Arc::new(RoomListener::new());
    let runner = {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move { listener.run().await })
    };

    println!("browsing for rooms ({}s)...", secs);
    tokio::time::sleep(Duration::from_secs(secs)).await;
    listener.stop();
    let _ = runner.await;

    let rooms = listener.rooms();
    if rooms.is_empty() {
        println!("no rooms found");
        return Ok(());
    }
    for room in rooms {
        println!(
            "{:<20} {:<15} {}/{}  {}",
            room.room_name, room.host_name, room.player_count, room.max_players, room.game_addr
        );
    }
    Ok(())
}
