//! # Round Server Library
//!
//! The authoritative host for a social-deduction round. One process owns the
//! round state; clients only send requests and receive replicated state.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Round State
//! [`round::RoundStateMachine`] drives the phase cycle (lobby, gameplay,
//! meeting, voting, ended), assigns the impostor, accounts tasks, runs the
//! dual-console emergency and evaluates win conditions. Every request is
//! re-validated against the current phase and actor when it is processed.
//!
//! ### Client Management
//! [`client_manager::ClientManager`] maps remote addresses to participant
//! ids, enforces capacity and drops clients whose heartbeats stop.
//!
//! ### State Broadcasting
//! Events are broadcast as they are produced; full [`shared::RoundSnapshot`]s
//! go out on a fixed tick interval. Snapshots are authoritative, so a client
//! that misses events recovers on the next snapshot.
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! Receiving, sending and timeout detection run as separate tasks, but all of
//! them hand their work to one loop over channels. That loop is the only code
//! that mutates the round, so there is no locking around game state.
//!
//! ### Tick-Driven Timers
//! Phase timers, emergency timers and deferred transitions advance from the
//! host tick. Nothing sleeps inside the round.
//!
//! ## Module Organization
//!
//! - `config`: TOML settings and map layout
//! - `roster`: participants, liveness and roles
//! - `tasks`: task stations and completion accounting
//! - `voting`: ballot collection and tally
//! - `emergency`: the dual-console rendezvous
//! - `world`: interactable objects and spawn points
//! - `round`: the state machine tying the above together
//! - `timer`, `events`, `error`: shared plumbing
//! - `client_manager`, `network`: the UDP front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::round::RoundStateMachine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let round = RoundStateMachine::new(config.game, &config.map, StdRng::from_entropy());
//!
//!     // Runs the host loop: receives requests, ticks the round and
//!     // broadcasts events and snapshots until shut down
//!     let mut server = Server::new(&config.server, round).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod emergency;
pub mod error;
pub mod events;
pub mod network;
pub mod roster;
pub mod round;
pub mod tasks;
pub mod timer;
pub mod voting;
pub mod world;
