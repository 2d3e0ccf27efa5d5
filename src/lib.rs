//! # world-protocol
//!
//! The network-facing core of a multiplayer world server: a bit-packed wire
//! codec, a component-based entity replication model, and a two-tier handler
//! dispatch engine with per-zone session state.
//!
//! ## Architecture
//! - [`core`]: bit-level codec primitives and the frame envelope
//! - [`replica`]: game objects and their construct/serialize component encodings
//! - [`protocol`]: the startup-built handler registry and the entity-addressed
//!   game-message dispatcher
//! - [`world`]: sessions, zones with single-flight creation, and the frame
//!   intake loop
//! - [`config`] / [`error`]: configuration and the error taxonomy
//!
//! ## Design
//! Malformed or unknown inbound frames never produce protocol-level error
//! replies; they are logged and dropped server-side. Dispatch tables are built
//! once at startup and immutable afterwards, so lookup needs no
//! synchronization. Ordering is guaranteed within one connection's frame
//! sequence and within one entity's mutation sequence, and nowhere else.

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod replica;
pub mod world;

pub use config::WorldConfig;
pub use error::{Result, WorldError};
