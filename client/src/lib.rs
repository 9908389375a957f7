//! # Round Client Library
//!
//! A console client for the round server. It sends typed requests and shows
//! whatever the server last replicated; it never decides game outcomes itself.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Parses console lines into [`input::Command`]s and turns them into request
//! packets, numbering position updates so the server can drop stale ones.
//!
//! ### View Module (`view`)
//! Holds the newest [`shared::RoundSnapshot`] and derives the current
//! [`view::Screen`] from it. Out-of-order snapshots are ignored by tick.
//!
//! ### Network Module (`network`)
//! Owns the UDP socket, the stdin reader and the heartbeat, multiplexed in a
//! single `tokio::select!` loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", "Blue", 0).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
pub mod view;
