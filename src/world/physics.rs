//! Physics engine collaborator interface.
//!
//! The simulation itself is a black box. The world consults it only through
//! handle-based registration, release, lookup, and stepping.

use crate::replica::{ObjectId, Transform};

/// Opaque handle for an object registered with the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicsHandle(pub u64);

pub trait PhysicsEngine: Send + Sync {
    /// Registers an object with the simulation at its current pose.
    fn register_object(&self, object_id: ObjectId, transform: Transform) -> PhysicsHandle;

    fn release_object(&self, handle: PhysicsHandle);

    fn object_for_handle(&self, handle: PhysicsHandle) -> Option<ObjectId>;

    /// Advances the simulation. Delta time is in milliseconds since the last tick.
    fn step(&self, delta_ms: f32);
}
