//! Best-effort LAN room discovery over UDP datagrams.
//!
//! Hosts advertise a small `RoomInfo` record once a second; clients listen
//! on the discovery port and keep a table of rooms, dropping any room that
//! stops re-advertising. This layer shares no state with the game engine:
//! the server only pushes player-count updates into the broadcaster.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::interval;

/// UDP port used for room discovery, separate from the game port.
pub const DISCOVERY_PORT: u16 = 9998;
/// How often hosts advertise their room.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(1);
/// How long a room stays visible after its last advertisement.
pub const ROOM_EXPIRY: Duration = Duration::from_secs(4);

/// Advertised description of a joinable room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_name: String,
    pub host_name: String,
    pub player_count: usize,
    pub max_players: usize,
    /// TCP `host:port` to connect to.
    pub game_addr: String,
}

/// Periodically advertises a room on the local network.
pub struct Broadcaster {
    info: Mutex<RoomInfo>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Broadcaster {
    pub fn new(info: RoomInfo) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            info: Mutex::new(info),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Updates the advertised player count; picked up by the next datagram.
    pub fn update_player_count(&self, count: usize) {
        if let Ok(mut info) = self.info.lock() {
            info.player_count = count;
        }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Sends one advertisement per interval until `stop()` is called.
    pub async fn run(&self) -> std::io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;

        let mut shutdown = self.shutdown_rx.clone();
        let mut ticker = interval(BROADCAST_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    let info = match self.info.lock() {
                        Ok(info) => info.clone(),
                        Err(_) => continue,
                    };
                    let datagram = match bincode::serialize(&info) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!("failed to encode room info: {}", e);
                            continue;
                        }
                    };
                    // Broadcast plus a loopback unicast: some host firewalls
                    // swallow broadcast traffic addressed to the same machine.
                    for dst in [Ipv4Addr::BROADCAST, Ipv4Addr::LOCALHOST] {
                        if let Err(e) = socket.send_to(&datagram, (dst, DISCOVERY_PORT)).await {
                            debug!("discovery send to {} failed: {}", dst, e);
                        }
                    }
                }
            }
        }
    }
}

/// Collects room advertisements seen on the discovery port.
pub struct RoomListener {
    rooms: Mutex<HashMap<String, (RoomInfo, Instant)>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Default for RoomListener {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomListener {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            rooms: Mutex::new(HashMap::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Currently visible rooms, with expired entries pruned.
    pub fn rooms(&self) -> Vec<RoomInfo> {
        let mut rooms = match self.rooms.lock() {
            Ok(rooms) => rooms,
            Err(_) => return Vec::new(),
        };
        let now = Instant::now();
        rooms.retain(|_, (_, seen)| now.duration_since(*seen) < ROOM_EXPIRY);

        let mut list: Vec<RoomInfo> = rooms.values().map(|(info, _)| info.clone()).collect();
        list.sort_by(|a, b| a.room_name.cmp(&b.room_name));
        list
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Receives advertisements until `stop()` is called.
    pub async fn run(&self) -> std::io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, DISCOVERY_PORT)).await?;
        let mut shutdown = self.shutdown_rx.clone();
        let mut buf = [0u8; 2048];

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
                result = socket.recv_from(&mut buf) => {
                    let (len, from) = match result {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("discovery receive error: {}", e);
                            continue;
                        }
                    };
                    match bincode::deserialize::<RoomInfo>(&buf[..len]) {
                        Ok(info) => self.record(info),
                        Err(e) => debug!("ignoring malformed datagram from {}: {}", from, e),
                    }
                }
            }
        }
    }

    fn record(&self, info: RoomInfo) {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.insert(info.game_addr.clone(), (info, Instant::now()));
        }
    }
}
