//! Game objects: replicated entities composed of components.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::debug;

use crate::core::{BitReader, BitWriter, FromBitStream, ToBitStream};
use crate::error::Result;
use crate::replica::component::{ComponentKind, DirtyFlag, ReplicaComponent};

/// Stable object id, unique within a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub i64);

impl FromBitStream for ObjectId {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(ObjectId(reader.read_i64()?))
    }
}

impl ToBitStream for ObjectId {
    fn encode(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_i64(self.0);
        Ok(())
    }
}

/// Template (class) identifier of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lot(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn scaled(self, factor: f32) -> Vector3 {
        Vector3 {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
        }
    }
}

impl FromBitStream for Vector3 {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(Vector3 {
            x: reader.read_f32()?,
            y: reader.read_f32()?,
            z: reader.read_f32()?,
        })
    }
}

impl ToBitStream for Vector3 {
    fn encode(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_f32(self.x);
        writer.write_f32(self.y);
        writer.write_f32(self.z);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl FromBitStream for Quaternion {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(Quaternion {
            x: reader.read_f32()?,
            y: reader.read_f32()?,
            z: reader.read_f32()?,
            w: reader.read_f32()?,
        })
    }
}

impl ToBitStream for Quaternion {
    fn encode(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_f32(self.x);
        writer.write_f32(self.y);
        writer.write_f32(self.z);
        writer.write_f32(self.w);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vector3,
    pub rotation: Quaternion,
}

/// A replicated entity.
///
/// The component set is fixed at construction: values mutate, kind membership
/// does not. Snapshot encodings concatenate component output in attachment
/// order, which the construction side keeps stable.
pub struct GameObject {
    id: ObjectId,
    lot: Lot,
    transform: Mutex<Transform>,
    components: Vec<Arc<dyn ReplicaComponent>>,
    dirty: Arc<DirtyFlag>,
}

impl GameObject {
    pub fn builder(id: ObjectId, lot: Lot) -> GameObjectBuilder {
        GameObjectBuilder {
            id,
            lot,
            transform: Transform::default(),
            components: Vec::new(),
            kinds: HashSet::new(),
            dirty: Arc::new(DirtyFlag::new()),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn lot(&self) -> Lot {
        self.lot
    }

    /// The re-serialization flag shared with this object's components.
    pub fn dirty(&self) -> &Arc<DirtyFlag> {
        &self.dirty
    }

    pub fn transform(&self) -> Transform {
        *self.transform.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_transform(&self, transform: Transform) {
        *self.transform.lock().unwrap_or_else(|e| e.into_inner()) = transform;
        self.dirty.mark();
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&Arc<dyn ReplicaComponent>> {
        self.components.iter().find(|c| c.kind() == kind)
    }

    pub fn components(&self) -> &[Arc<dyn ReplicaComponent>] {
        &self.components
    }

    /// Encodes the full-state snapshot of every component, in attachment order.
    pub fn construct_snapshot(&self) -> Result<Bytes> {
        let mut writer = BitWriter::new();
        for component in &self.components {
            component.construct(&mut writer)?;
        }
        Ok(writer.finish())
    }

    /// Encodes the delta snapshot of every component, in attachment order.
    pub fn serialize_snapshot(&self) -> Result<Bytes> {
        let mut writer = BitWriter::new();
        for component in &self.components {
            component.serialize(&mut writer)?;
        }
        Ok(writer.finish())
    }

    /// Runs every component finalizer. Called by the zone on despawn, before
    /// the object is removed.
    pub fn detach_all(&self) {
        for component in &self.components {
            component.detach();
        }
    }
}

impl std::fmt::Debug for GameObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("lot", &self.lot)
            .field("components", &self.components.len())
            .finish()
    }
}

/// Builder fixing a game object's component set before spawn.
pub struct GameObjectBuilder {
    id: ObjectId,
    lot: Lot,
    transform: Transform,
    components: Vec<Arc<dyn ReplicaComponent>>,
    kinds: HashSet<ComponentKind>,
    dirty: Arc<DirtyFlag>,
}

impl GameObjectBuilder {
    /// The dirty flag the built object will own; components that request
    /// re-serialization are constructed with a clone of this.
    pub fn dirty_flag(&self) -> Arc<DirtyFlag> {
        self.dirty.clone()
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Attaches a component. Kinds are unique by construction: attaching a
    /// second component of the same kind replaces the first.
    pub fn attach(mut self, component: Arc<dyn ReplicaComponent>) -> Self {
        let kind = component.kind();
        if !self.kinds.insert(kind) {
            debug!(?kind, object = self.id.0, "Component of same kind replaced");
            self.components.retain(|c| c.kind() != kind);
        }
        self.components.push(component);
        self
    }

    pub fn build(self) -> Arc<GameObject> {
        Arc::new(GameObject {
            id: self.id,
            lot: self.lot,
            transform: Mutex::new(self.transform),
            components: self.components,
            dirty: self.dirty,
        })
    }
}
