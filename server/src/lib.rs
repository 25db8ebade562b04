//! # Arena Server Library
//!
//! This library provides the authoritative session and synchronization server for
//! a shared multiplayer arena. Players steer an avatar that grows by consuming
//! scattered collectibles while avoiding hazards, and every client sees the same
//! registry of players and pool of world objects.
//!
//! ## Core Responsibilities
//!
//! ### Admission and Lifecycle
//! Each WebSocket connection is admitted under a fixed capacity bound or rejected
//! with an `admission_rejected` message. Admitted connections own exactly one
//! player for their lifetime; the player is removed the moment the connection
//! ends, however it ends.
//!
//! ### Authoritative State
//! Positions are taken from the owning client as given. Sizes only grow, and only
//! through the server: a collectible is identified by a stable ID and removed at
//! most once, so two players racing for the same object can never both grow.
//!
//! ### State Broadcasting
//! Every applied mutation is followed by full snapshots of whatever changed. A
//! consumption produces an objects snapshot and then a players snapshot carrying
//! the same revision number.
//!
//! ## Architecture Design
//!
//! ### Single Session Loop
//! Connection tasks never touch shared state. They forward decoded messages over
//! a channel to one loop that owns the [`session::Session`] and applies events
//! one at a time: receive, validate, mutate, broadcast. This serializes all
//! mutations without locks.
//!
//! ### Independent Outbound Paths
//! Every connection drains its own bounded queue. The [`dispatcher::Dispatcher`]
//! never waits on a slow client; a full queue loses messages for that client only.
//!
//! ### Connection-Local Latency Probes
//! `probe` messages are echoed by the connection task itself and never enter the
//! session loop.
//!
//! ## Module Organization
//!
//! - `config`: server settings, defaults and validation
//! - `connection_manager`: admission, capacity and the connection state machine
//! - `registry`: the player registry
//! - `world`: the collectible and hazard pool
//! - `session`: the aggregate the session loop owns
//! - `dispatcher`: snapshot fan-out
//! - `network`: the listener, connection tasks and the session loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:3000".to_string(),
//!         max_players: 20,
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection_manager;
pub mod dispatcher;
pub mod network;
pub mod registry;
pub mod session;
pub mod world;

pub use config::ServerConfig;
pub use network::Server;
