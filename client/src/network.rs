use crate::input::{Command, InputManager, HELP};
use crate::view::ClientView;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, ServerEvent, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

/// Heartbeats are sent well inside the server's timeout.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: String,
    connected: bool,

    view: ClientView,
    input_manager: InputManager,

    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            name: name.to_string(),
            connected: false,
            view: ClientView::new(),
            input_manager: InputManager::new(),
            fake_ping_ms,
        })
    }

    pub fn view(&self) -> &ClientView {
        &self.view
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Applies one packet from the server. Returns false once disconnected.
    pub fn handle_packet(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::Connected { client_id } => {
                println!("Connected as player {}. Type `help` for commands.", client_id);
                self.view.connected(client_id);
                self.connected = true;
            }

            Packet::Snapshot(snapshot) => {
                let previous = self.view.headline();
                if self.view.apply_snapshot(snapshot) {
                    let current = self.view.headline();
                    if current != previous {
                        println!("{}", current);
                    }
                }
            }

            Packet::Event(event) => self.announce(&event),

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                println!("Disconnected: {}", reason);
                self.connected = false;
                self.view.disconnected();
                return false;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
        true
    }

    /// Prints an advisory event. The screen itself only follows snapshots.
    fn announce(&self, event: &ServerEvent) {
        debug!("event: {:?}", event);
        let me = self.view.me();
        match event {
            ServerEvent::RolesAssigned { impostor, .. } if Some(*impostor) == me => {
                println!("You are the IMPOSTOR.")
            }
            ServerEvent::RolesAssigned { total_tasks, .. } => {
                println!("You are a crewmate. Crew task target: {}", total_tasks)
            }
            ServerEvent::MeetingCalled { reporter } => {
                println!("Meeting called by player {}", reporter)
            }
            ServerEvent::VoteCast { voter } => println!("Player {} has voted", voter),
            ServerEvent::EmergencyStarted { duration } => println!(
                "EMERGENCY: two players must hold both consoles within {:.0}s",
                duration
            ),
            ServerEvent::EmergencyResolved => println!("Emergency averted"),
            ServerEvent::PlayerKilled { victim } if Some(*victim) == me => {
                println!("You were killed.")
            }
            ServerEvent::LightsChanged { sabotaged } => println!(
                "{}",
                if *sabotaged {
                    "The lights went out!"
                } else {
                    "Lights restored"
                }
            ),
            ServerEvent::PlayerHidden { player, hidden, .. } if Some(*player) == me => {
                println!("{}", if *hidden { "You are hiding." } else { "You left your hiding spot." })
            }
            ServerEvent::DoorChanged { door, open } => {
                println!("Door #{} {}", door, if *open { "opened" } else { "closed" })
            }
            ServerEvent::TrapTriggered { victims, .. } if !victims.is_empty() => {
                println!("A trap caught {} player(s)", victims.len())
            }
            ServerEvent::GameOver { result } => println!("Game over: {:?}", result),
            _ => {}
        }
    }

    /// Handles one typed line. Returns false when the user quits.
    async fn handle_line(&mut self, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
        if line.trim().is_empty() {
            return Ok(true);
        }
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                return Ok(true);
            }
        };

        match command {
            Command::Help => println!("{}", HELP),
            Command::Status => println!("{}", self.view.render()),
            _ => {
                let goto = match command {
                    Command::Goto(object) => {
                        let position = self
                            .view
                            .snapshot()
                            .and_then(|s| s.object(object))
                            .map(|o| o.position);
                        if position.is_none() {
                            println!("No object #{}", object);
                        }
                        position
                    }
                    _ => None,
                };
                if let Some(packet) = self.input_manager.to_packet(&command, goto) {
                    self.send_packet(&packet).await?;
                }
            }
        }
        Ok(command != Command::Quit)
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => {
                                    if !self.handle_packet(packet) {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Failed to decode packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.handle_line(&line).await? {
                                self.connected = false;
                                break;
                            }
                        }
                        // stdin closed
                        Ok(None) => break,
                        Err(e) => {
                            error!("Error reading stdin: {}", e);
                            break;
                        }
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
