//! Hearth - deterministic household device mediation
//!
//! Devices propose actions, rule packs constrain them, and a mediator
//! decides who acts when claims collide. Every decision lands in an
//! append-only event log and every run is reproducible from its seed.

pub mod actions;
pub mod core;
pub mod llm;
pub mod planning;
pub mod rules;
pub mod simulation;
pub mod world;

pub use crate::core::error::{HearthError, Result};
pub use crate::world::{World, WorldState};
