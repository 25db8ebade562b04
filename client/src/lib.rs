//! # Headless Arena Client Library
//!
//! This library provides a rendering-free client for the arena server. It speaks
//! the full wire protocol and is used for load testing, soak testing and as a
//! reference for client implementations.
//!
//! ## Architecture Overview
//!
//! A [`network::Client`] owns one WebSocket connection and multiplexes three
//! timers on a single task:
//!
//! ### Movement
//! Every move tick the client walks toward a random point in the arena and
//! reports its new position. Once reached, a new point is picked.
//!
//! ### Consumption
//! Whenever the client's position or the objects snapshot changes, it asks to
//! consume the nearest collectible it is touching. Each object ID is requested
//! at most once; the server decides who actually gets it.
//!
//! ### Latency Probing
//! Once per probe interval the client sends a `probe` with a fresh nonce. The
//! [`latency::LatencyMonitor`] matches acks to probes and keeps a bounded RTT
//! history. Lost probes are forgotten, never retried.
//!
//! ## Module Organization
//!
//! - `game`: [`game::ArenaView`], the client's copy of the latest snapshots
//! - `latency`: round-trip measurement
//! - `network`: connection handling and the client loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientOptions, SessionOutcome};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let options = ClientOptions {
//!         server_url: "ws://127.0.0.1:3000".to_string(),
//!         duration: Some(Duration::from_secs(30)),
//!         ..ClientOptions::default()
//!     };
//!
//!     let mut client = Client::connect(options).await?;
//!     match client.run().await? {
//!         SessionOutcome::Left { final_size } => println!("final size {:?}", final_size),
//!         other => println!("session ended: {:?}", other),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod latency;
pub mod network;
