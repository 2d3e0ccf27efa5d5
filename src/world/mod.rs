//! # World Session Layer
//!
//! Per-zone entity universes and per-connection sessions.
//!
//! ## Components
//! - **Session Cache**: endpoint-keyed client sessions with TTL expiry
//! - **Zone**: a spatial partition owning its game objects
//! - **Zone Registry**: lazy, single-flight zone creation shared by all connections
//! - **Physics**: the consumed physics-engine collaborator interface
//! - **Server**: frame intake tying the dispatch tables to the world state

pub mod physics;
pub mod server;
pub mod session_cache;
pub mod zone;
pub mod zone_cache;

pub use physics::{PhysicsEngine, PhysicsHandle};
pub use server::{WorldContext, WorldServer};
pub use session_cache::{Session, SessionCache};
pub use zone::{Zone, ZoneDescriptor, ZoneId, ZoneInfo, ZoneObjectInfo, ZoneParser};
pub use zone_cache::ZoneRegistry;
