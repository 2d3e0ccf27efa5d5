//! Zones: spatial partitions owning a set of game objects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::replica::{GameObject, Lot, ObjectId, Quaternion, Transform, Vector3};
use crate::world::physics::{PhysicsEngine, PhysicsHandle};

/// Spawned-object ids carry this base so they can never collide with
/// persistent ids from the character store.
const SPAWNED_OBJECT_BASE: i64 = 1 << 58;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u16);

/// Locator for a zone's definition data, resolved by the parser collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDescriptor {
    pub zone_id: ZoneId,
    pub resource: String,
}

impl From<&crate::config::ZoneEntry> for ZoneDescriptor {
    fn from(entry: &crate::config::ZoneEntry) -> Self {
        ZoneDescriptor {
            zone_id: ZoneId(entry.zone_id),
            resource: entry.resource.clone(),
        }
    }
}

/// One object declared in the zone definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneObjectInfo {
    pub lot: Lot,
    pub position: Vector3,
    pub rotation: Quaternion,
}

/// Parsed zone definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneInfo {
    pub zone_id: ZoneId,
    pub name: String,
    pub spawn_point: Vector3,
    pub objects: Vec<ZoneObjectInfo>,
}

/// Zone definition parser collaborator.
#[async_trait]
pub trait ZoneParser: Send + Sync {
    async fn parse(&self, descriptor: &ZoneDescriptor) -> Result<ZoneInfo>;
}

/// A per-zone entity universe, shared by every connection in the zone.
pub struct Zone {
    info: ZoneInfo,
    objects: Mutex<HashMap<ObjectId, Arc<GameObject>>>,
    physics_handles: Mutex<HashMap<ObjectId, PhysicsHandle>>,
    next_object_id: AtomicI64,
    initialized: AtomicBool,
    physics: Option<Arc<dyn PhysicsEngine>>,
    snapshot_sink: Mutex<Option<UnboundedSender<(ObjectId, Bytes)>>>,
}

impl Zone {
    pub fn new(info: ZoneInfo, physics: Option<Arc<dyn PhysicsEngine>>) -> Self {
        Self {
            info,
            objects: Mutex::new(HashMap::new()),
            physics_handles: Mutex::new(HashMap::new()),
            next_object_id: AtomicI64::new(SPAWNED_OBJECT_BASE),
            initialized: AtomicBool::new(false),
            physics,
            snapshot_sink: Mutex::new(None),
        }
    }

    pub fn zone_id(&self) -> ZoneId {
        self.info.zone_id
    }

    pub fn info(&self) -> &ZoneInfo {
        &self.info
    }

    /// Allocates a fresh spawned-object id, monotonic within this zone.
    pub fn allocate_object_id(&self) -> ObjectId {
        ObjectId(self.next_object_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Spawns the objects the zone definition declares. Runs once; later
    /// calls are no-ops.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }

        for object_info in &self.info.objects {
            let id = self.allocate_object_id();
            let object = GameObject::builder(id, object_info.lot)
                .transform(Transform {
                    position: object_info.position,
                    rotation: object_info.rotation,
                })
                .build();
            self.spawn(object);
        }

        info!(
            zone = self.info.zone_id.0,
            name = %self.info.name,
            objects = self.object_count(),
            "Zone initialized"
        );
    }

    /// Inserts an object into the zone and registers it with the physics
    /// collaborator when one is attached.
    pub fn spawn(&self, object: Arc<GameObject>) {
        let id = object.id();
        if let Some(physics) = &self.physics {
            let handle = physics.register_object(id, object.transform());
            self.lock(&self.physics_handles).insert(id, handle);
        }
        self.lock(&self.objects).insert(id, object);
        debug!(zone = self.info.zone_id.0, object = id.0, "Object spawned");
    }

    /// Removes an object, detaching and finalizing its components and
    /// releasing its physics handle before removal. Returns false when the id
    /// is unknown.
    pub fn despawn(&self, id: ObjectId) -> bool {
        let Some(object) = self.lock(&self.objects).remove(&id) else {
            warn!(zone = self.info.zone_id.0, object = id.0, "Despawn of unknown object");
            return false;
        };

        object.detach_all();

        if let Some(handle) = self.lock(&self.physics_handles).remove(&id) {
            if let Some(physics) = &self.physics {
                physics.release_object(handle);
            }
        }

        debug!(zone = self.info.zone_id.0, object = id.0, "Object despawned");
        true
    }

    pub fn object(&self, id: ObjectId) -> Option<Arc<GameObject>> {
        self.lock(&self.objects).get(&id).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.lock(&self.objects).len()
    }

    /// Attaches the outbound snapshot sink that [`flush`](Self::flush) drains
    /// dirty-object serializations into.
    pub fn set_snapshot_sink(&self, sink: UnboundedSender<(ObjectId, Bytes)>) {
        *self.lock(&self.snapshot_sink) = Some(sink);
    }

    /// Re-serializes every object whose dirty flag is set, clearing the flags
    /// and pushing the snapshots to the sink. Returns the number of objects
    /// flushed.
    pub fn flush(&self) -> Result<usize> {
        let dirty: Vec<Arc<GameObject>> = self
            .lock(&self.objects)
            .values()
            .filter(|object| object.dirty().take())
            .cloned()
            .collect();

        let sink = self.lock(&self.snapshot_sink).clone();
        let mut flushed = 0;
        for object in dirty {
            let snapshot = object.serialize_snapshot()?;
            if let Some(sink) = &sink {
                // A closed sink only means no observer is attached.
                let _ = sink.send((object.id(), snapshot));
            }
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Advances the physics collaborator.
    pub fn step_physics(&self, delta_ms: f32) {
        if let Some(physics) = &self.physics {
            physics.step(delta_ms);
        }
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("zone_id", &self.info.zone_id)
            .field("objects", &self.object_count())
            .finish()
    }
}
