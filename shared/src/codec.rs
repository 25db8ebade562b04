//! Frame encoding for protocol messages.
//!
//! Text frames carry JSON, binary frames carry bincode. Which one a peer uses is
//! tracked as an [`Encoding`] so replies go out the same way requests came in.

use crate::{ClientMessage, ServerMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid bincode payload: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("non-finite value in {0} message")]
    NonFinite(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    Bincode,
}

/// A message encoded for one frame type.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedFrame {
    Text(String),
    Binary(Vec<u8>),
}

pub fn encode<T: Serialize>(message: &T, encoding: Encoding) -> Result<EncodedFrame, ProtocolError> {
    match encoding {
        Encoding::Json => Ok(EncodedFrame::Text(serde_json::to_string(message)?)),
        Encoding::Bincode => Ok(EncodedFrame::Binary(bincode::serialize(message)?)),
    }
}

pub fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_binary<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(bincode::deserialize(bytes)?)
}

impl ClientMessage {
    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        let message: ClientMessage = decode_text(text)?;
        message.validate()?;
        Ok(message)
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let message: ClientMessage = decode_binary(bytes)?;
        message.validate()?;
        Ok(message)
    }
}

impl ServerMessage {
    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        decode_text(text)
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode_binary(bytes)
    }
}
