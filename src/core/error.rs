use thiserror::Error;

use crate::core::types::{DeviceId, RoomId};

#[derive(Error, Debug)]
pub enum HearthError {
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("Device already registered: {0}")]
    DuplicateDevice(DeviceId),

    #[error("Room not found: {0:?}")]
    RoomNotFound(RoomId),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid rule pack: {0}")]
    InvalidRulePack(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Planner error: {0}")]
    PlannerError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, HearthError>;
