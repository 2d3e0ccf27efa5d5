//! Replica component contract and the shared dirty flag.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::BitWriter;
use crate::error::Result;

/// Stable component-kind identifier. Values match the wire protocol's
/// component registry and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ComponentKind {
    Inventory = 17,
    PhantomPhysics = 40,
    Component107 = 107,
}

/// One networked facet of a game object.
///
/// `construct` must be idempotent: repeated calls against unchanged state
/// produce identical bytes, since a client re-entering visibility range is
/// sent a fresh construct. `serialize` emits a delta that is independently
/// decodable without replay of prior frames.
pub trait ReplicaComponent: Send + Sync {
    fn kind(&self) -> ComponentKind;

    /// Emits full state.
    fn construct(&self, writer: &mut BitWriter) -> Result<()>;

    /// Emits the per-tick delta.
    fn serialize(&self, writer: &mut BitWriter) -> Result<()>;

    /// Finalizer invoked when the owning object despawns.
    fn detach(&self) {}
}

/// Re-serialization request flag shared between a game object and its
/// components. Marking is idempotent; the zone's flush pass takes and clears it.
#[derive(Debug, Default)]
pub struct DirtyFlag(AtomicBool);

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Placeholder facet carried by some object templates: a single cleared bit.
#[derive(Debug, Default)]
pub struct Component107;

impl ReplicaComponent for Component107 {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Component107
    }

    fn construct(&self, writer: &mut BitWriter) -> Result<()> {
        self.serialize(writer)
    }

    fn serialize(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_bit(false);
        Ok(())
    }
}
