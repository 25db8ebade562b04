//! Server configuration
//!
//! Defaults reproduce a single 20-player arena with 100 collectibles and 3 hazards.
//! Optional hardening knobs (idle timeout, consume distance) are off unless set.

use shared::{
    DEFAULT_COLLECTIBLES, DEFAULT_HAZARDS, DEFAULT_MAX_PLAYERS, DEFAULT_PORT, GROWTH_INCREMENT,
};
use std::time::Duration;
use thiserror::Error;

/// Capacity of each connection's outbound queue before messages are dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_players must be at least 1")]
    NoCapacity,
    #[error("growth increment must be finite and positive, got {0}")]
    InvalidGrowth(f32),
    #[error("max consume distance must be finite and non-negative, got {0}")]
    InvalidConsumeDistance(f32),
    #[error("outbound queue capacity must be at least 1")]
    NoOutboundCapacity,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_players: usize,
    pub collectibles: usize,
    pub hazards: usize,
    pub growth_increment: f32,
    /// Disconnect connections silent for this long. `None` keeps idle players forever.
    pub idle_timeout: Option<Duration>,
    /// Reject consumption of objects farther than this (plus the player's size) from the player.
    pub max_consume_distance: Option<f32>,
    /// Regenerate collectibles with fresh identities once the pool is empty.
    pub new_round_when_empty: bool,
    /// Let clients grow themselves with `report_size`. Off means size changes
    /// only through consumption.
    pub accept_size_reports: bool,
    pub seed: Option<u64>,
    pub outbound_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_players: DEFAULT_MAX_PLAYERS,
            collectibles: DEFAULT_COLLECTIBLES,
            hazards: DEFAULT_HAZARDS,
            growth_increment: GROWTH_INCREMENT,
            idle_timeout: None,
            max_consume_distance: None,
            new_round_when_empty: false,
            accept_size_reports: false,
            seed: None,
            outbound_capacity: OUTBOUND_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players == 0 {
            return Err(ConfigError::NoCapacity);
        }
        if !self.growth_increment.is_finite() || self.growth_increment <= 0.0 {
            return Err(ConfigError::InvalidGrowth(self.growth_increment));
        }
        if let Some(distance) = self.max_consume_distance {
            if !distance.is_finite() || distance < 0.0 {
                return Err(ConfigError::InvalidConsumeDistance(distance));
            }
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::NoOutboundCapacity);
        }
        Ok(())
    }
}
