//! # Replica Component Model
//!
//! Networked entity state and its two-mode wire encoding.
//!
//! A [`GameObject`] is a replicated entity composed of [`ReplicaComponent`]
//! facets. Each facet has two serialization modes: *construct* emits full
//! state once when the entity becomes visible to a client, and *serialize*
//! emits a per-tick delta in which every optional field is guarded by exactly
//! one presence bit.
//!
//! Component kind membership is fixed at construction; values mutate,
//! membership does not. Mutating operations are serialized per entity, and a
//! shared [`DirtyFlag`] lets any component request a re-serialization of its
//! owning object.

pub mod component;
pub mod inventory;
pub mod object;
pub mod phantom_physics;

pub use component::{Component107, ComponentKind, DirtyFlag, ReplicaComponent};
pub use inventory::{EquipSlot, InventoryComponent, InventoryItem, Item, ItemType, Persistence};
pub use object::{GameObject, GameObjectBuilder, Lot, ObjectId, Quaternion, Transform, Vector3};
pub use phantom_physics::PhantomPhysicsComponent;
