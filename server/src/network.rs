//! Server network layer handling UDP communications and the host tick loop

use crate::client_manager::ClientManager;
use crate::config::NetworkSettings;
use crate::error::RequestResult;
use crate::round::RoundStateMachine;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, PROTOCOL_VERSION};
pub use shared::MAX_PACKET_SIZE;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Largest frame time fed to the round in one tick.
const MAX_TICK_DT: f32 = 0.25;

/// Messages sent from network tasks to the session loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: PlayerId },
    Shutdown,
}

/// Messages sent from the session loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<PlayerId>,
    },
}

/// UDP front end for one hosted round
///
/// Only the `run` loop touches the round state machine. The receiver, sender
/// and timeout tasks talk to it over channels.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    round: RoundStateMachine,
    tick_duration: Duration,
    snapshot_interval: u32,
    ticks: u64,
    position_sequences: HashMap<PlayerId, u32>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        settings: &NetworkSettings,
        round: RoundStateMachine,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let addr = format!("{}:{}", settings.host, settings.port);
        let socket = Arc::new(UdpSocket::bind(&addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                settings.max_clients,
                Duration::from_secs(settings.client_timeout_secs),
            ))),
            round,
            tick_duration: Duration::from_secs_f64(1.0 / settings.tick_rate.max(1) as f64),
            snapshot_interval: settings.snapshot_interval_ticks.max(1),
            ticks: 0,
            position_sequences: HashMap::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for asking the loop to stop
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that drops clients whose heartbeats stopped
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        if data.len() > MAX_PACKET_SIZE {
            warn!("Outgoing packet of {} bytes exceeds {}", data.len(), MAX_PACKET_SIZE);
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<PlayerId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Removes a client from both the connection table and the round
    async fn drop_client(&mut self, client_id: PlayerId) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id);
        }
        self.position_sequences.remove(&client_id);
        self.round.disconnect(client_id);
    }

    async fn handle_connect(&mut self, client_version: u32, name: String, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // A reconnect from the same address replaces the old session
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };
        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.drop_client(existing_id).await;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        match client_id {
            Some(client_id) => {
                self.round.connect(client_id, &name);
                self.send_packet(Packet::Connected { client_id }, addr);
                self.send_packet(Packet::Snapshot(self.round.snapshot()), addr);
            }
            None => self.send_packet(
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
                addr,
            ),
        }
    }

    /// Validates and applies one client request
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect {
            client_version,
            name,
        } = packet
        {
            self.handle_connect(client_version, name, addr).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.touch_addr(addr)
        };
        let Some(client_id) = client_id else {
            debug!("Ignoring packet from unknown sender {}", addr);
            return;
        };

        let result: RequestResult = match packet {
            Packet::Heartbeat => Ok(()),
            Packet::Position { sequence, position } => {
                if let Some(last) = self.position_sequences.get(&client_id) {
                    if sequence <= *last {
                        // Reordered datagram; a newer position already arrived
                        return;
                    }
                }
                self.position_sequences.insert(client_id, sequence);
                self.round.update_position(client_id, position)
            }
            Packet::Interact { object_id } => self.round.request_interact(object_id, client_id),
            Packet::CastBallot { choice } => self.round.cast_ballot(client_id, choice),
            Packet::ReportBody => self.round.report_body(client_id),
            Packet::Kill { target } => self.round.kill(client_id, target),
            Packet::SabotageLights => self.round.sabotage_lights(client_id),
            Packet::RequestRestart => self.round.request_restart(client_id),
            Packet::Disconnect => {
                self.drop_client(client_id).await;
                Ok(())
            }
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
                Ok(())
            }
        };

        if let Err(rejection) = result {
            debug!("Rejected request from client {}: {}", client_id, rejection);
        }
    }

    /// Advances the round and publishes what changed
    fn tick(&mut self, dt: f32) {
        self.round.tick(dt);
        self.ticks += 1;

        for event in self.round.drain_events() {
            self.broadcast_packet(Packet::Event(event), None);
        }

        if self.ticks % self.snapshot_interval as u64 == 0 {
            self.broadcast_packet(Packet::Snapshot(self.round.snapshot()), None);
        }
    }

    /// Main server loop: the only place the round is mutated
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        self.round.scene_loaded();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.position_sequences.remove(&client_id);
                            self.round.disconnect(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > MAX_TICK_DT {
                        warn!("Large delta time detected ({:.3}s), capping to {:.3}s", dt, MAX_TICK_DT);
                        dt = MAX_TICK_DT;
                    }

                    self.tick(dt);

                    if self.ticks % 300 == 0 {
                        let client_count = self.clients.read().await.len();
                        debug!("Tick {}: {} clients, phase {:?}", self.ticks, client_count, self.round.phase());
                    }
                },
            }
        }

        let farewell = Packet::Disconnected {
            reason: "Server shutting down".to_string(),
        };
        self.broadcast_packet(farewell, None);
        Ok(())
    }
}
