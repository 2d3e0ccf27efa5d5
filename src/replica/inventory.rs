//! # Inventory Component
//!
//! Equip-slot keyed item state and its bit-packed wire encoding.
//!
//! The wire layout writes a dirty flag, an entry count, per-entry fields each
//! guarded by their own presence bit, and a trailing terminator flag with a
//! zero count so an empty update is distinguishable from "no change".
//!
//! Equip and unequip are asynchronous and serialized per entity through an
//! operation lock: concurrent equips on the same entity cannot interleave
//! their slot-map writes. Unequip by an unknown id is an expected race with
//! the client and is a silent no-op.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::core::{BitReader, BitWriter};
use crate::error::Result;
use crate::replica::component::{ComponentKind, DirtyFlag, ReplicaComponent};
use crate::replica::object::{Lot, ObjectId};

/// Closed set of equip locations. One occupant per slot; uniqueness is
/// enforced by the slot map's keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EquipSlot {
    Hair,
    Chest,
    Legs,
    LeftHand,
    RightHand,
    Neck,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Generic,
    Hat,
    Chest,
    Legs,
    Weapon,
    Model,
    LootModel,
    Consumable,
}

/// One replicated inventory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub item_id: ObjectId,
    pub lot: Lot,
    pub count: u64,
    pub slot: Option<u16>,
    pub inventory_type: Option<u32>,
    /// Opaque extra-data block carried through unparsed.
    pub extra: Option<Vec<u8>>,
}

/// An equippable item: its type, target slot, and replicated instance.
#[derive(Debug, Clone)]
pub struct Item {
    pub item_type: ItemType,
    pub equip_slot: EquipSlot,
    pub instance: InventoryItem,
}

/// Persistence collaborator: saves the equipped flag of an item instance.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn set_item_equipped(&self, item_id: ObjectId, equipped: bool) -> Result<()>;
}

type EquipHook = Box<dyn Fn(&Item) + Send + Sync>;

/// Inventory facet of a game object.
pub struct InventoryComponent {
    items: Mutex<BTreeMap<EquipSlot, InventoryItem>>,
    /// At-most-one in-flight mutating operation per entity.
    op_lock: tokio::sync::Mutex<()>,
    on_equipped: Mutex<Vec<EquipHook>>,
    on_unequipped: Mutex<Vec<EquipHook>>,
    dirty: Arc<DirtyFlag>,
    persistence: Option<Arc<dyn Persistence>>,
    building: AtomicBool,
}

impl InventoryComponent {
    pub fn new(dirty: Arc<DirtyFlag>, persistence: Option<Arc<dyn Persistence>>) -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            op_lock: tokio::sync::Mutex::new(()),
            on_equipped: Mutex::new(Vec::new()),
            on_unequipped: Mutex::new(Vec::new()),
            dirty,
            persistence,
            building: AtomicBool::new(false),
        }
    }

    /// Registers a pre-equip observer, invoked in registration order. The
    /// notification does not block or veto the equip.
    pub fn on_equipped(&self, hook: impl Fn(&Item) + Send + Sync + 'static) {
        self.lock(&self.on_equipped).push(Box::new(hook));
    }

    pub fn on_unequipped(&self, hook: impl Fn(&Item) + Send + Sync + 'static) {
        self.lock(&self.on_unequipped).push(Box::new(hook));
    }

    /// Build mode lifts the model-item equip restriction.
    pub fn set_building(&self, building: bool) {
        self.building.store(building, Ordering::Release);
    }

    pub fn equipped_items(&self) -> Vec<(EquipSlot, InventoryItem)> {
        self.lock(&self.items)
            .iter()
            .map(|(slot, item)| (*slot, item.clone()))
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.lock(&self.items).len()
    }

    /// Inserts an entry directly, bypassing validation and persistence. Used
    /// when populating an NPC's template inventory at spawn.
    pub fn equip_unmanaged(&self, slot: EquipSlot, item: InventoryItem) {
        self.lock(&self.items).insert(slot, item);
        self.dirty.mark();
    }

    /// Equips an item.
    ///
    /// Fires the pre-equip hooks, validates the target unless `ignore_checks`,
    /// fully unequips any occupant of the same slot first, inserts the item,
    /// persists the equipped flag, and marks the owning object for
    /// re-serialization.
    pub async fn equip(&self, item: Item, ignore_checks: bool) -> Result<()> {
        for hook in self.lock(&self.on_equipped).iter() {
            hook(&item);
        }

        if !ignore_checks
            && !self.building.load(Ordering::Acquire)
            && matches!(item.item_type, ItemType::Model | ItemType::LootModel)
        {
            debug!(item = item.instance.item_id.0, "Refusing to equip model item outside build mode");
            return Ok(());
        }

        let _guard = self.op_lock.lock().await;

        debug!(item = item.instance.item_id.0, slot = ?item.equip_slot, "Equipping item");

        // Unequip every same-slot occupant fully before inserting; two
        // occupants must never share a slot, even transiently.
        let occupants: Vec<ObjectId> = self
            .lock(&self.items)
            .iter()
            .filter(|(slot, _)| **slot == item.equip_slot)
            .map(|(_, occupant)| occupant.item_id)
            .collect();
        for id in occupants {
            self.unequip_locked(id).await?;
        }

        let id = item.instance.item_id;
        self.lock(&self.items).insert(item.equip_slot, item.instance);

        self.persist_equipped(id, true).await?;
        self.dirty.mark();
        Ok(())
    }

    /// Unequips an item, firing the unequip hooks first.
    pub async fn unequip(&self, item: &Item) -> Result<()> {
        for hook in self.lock(&self.on_unequipped).iter() {
            hook(item);
        }

        let _guard = self.op_lock.lock().await;
        self.unequip_locked(item.instance.item_id).await
    }

    /// Unequips by instance id. An id absent from the slot map is an expected
    /// race with the client and no-ops.
    pub async fn unequip_by_id(&self, id: ObjectId) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.unequip_locked(id).await
    }

    /// Removal half shared by equip replacement and the public unequips.
    /// Caller holds the operation lock.
    async fn unequip_locked(&self, id: ObjectId) -> Result<()> {
        let slot = self
            .lock(&self.items)
            .iter()
            .find(|(_, item)| item.item_id == id)
            .map(|(slot, _)| *slot);

        let Some(slot) = slot else {
            // Clients routinely request un-equips for items they consumed
            // or that the server already removed.
            return Ok(());
        };

        self.lock(&self.items).remove(&slot);
        self.persist_equipped(id, false).await?;
        self.dirty.mark();
        Ok(())
    }

    async fn persist_equipped(&self, id: ObjectId, equipped: bool) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            persistence.set_item_equipped(id, equipped).await?;
        }
        Ok(())
    }

    /// Decodes the entry list a [`serialize`](ReplicaComponent::serialize)
    /// call produced, for state reconstruction.
    pub fn decode_items(reader: &mut BitReader<'_>) -> Result<Vec<InventoryItem>> {
        if !reader.read_bit()? {
            return Ok(Vec::new());
        }

        let count = reader.read_u32()?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let item_id = ObjectId(reader.read_i64()?);
            let lot = Lot(reader.read_i32()?);

            reader.read_bit()?;

            let count = if reader.read_bit()? {
                reader.read_u32()? as u64
            } else {
                1
            };

            let slot = if reader.read_bit()? {
                Some(reader.read_u16()?)
            } else {
                None
            };

            let inventory_type = if reader.read_bit()? {
                Some(reader.read_u32()?)
            } else {
                None
            };

            let extra = if reader.read_bit()? {
                let len = reader.read_u32()? as usize;
                Some(reader.read_bytes(len)?)
            } else {
                None
            };

            reader.read_bit()?;

            items.push(InventoryItem {
                item_id,
                lot,
                count,
                slot,
                inventory_type,
                extra,
            });
        }

        // Trailing terminator flag and zero count.
        reader.read_bit()?;
        reader.read_u32()?;

        Ok(items)
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ReplicaComponent for InventoryComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Inventory
    }

    fn construct(&self, writer: &mut BitWriter) -> Result<()> {
        self.serialize(writer)
    }

    fn serialize(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_bit(true);

        let items = self.lock(&self.items);
        writer.write_u32(items.len() as u32);

        for item in items.values() {
            writer.write_i64(item.item_id.0);
            writer.write_i32(item.lot.0);

            writer.write_bit(false);

            // Single items are not flagged as stacked; only counts greater
            // than one set the stack-presence bit.
            let stack = item.count > 1;
            writer.write_bit(stack);
            if stack {
                writer.write_u32(item.count as u32);
            }

            writer.write_bit(item.slot.is_some());
            if let Some(slot) = item.slot {
                writer.write_u16(slot);
            }

            writer.write_bit(item.inventory_type.is_some());
            if let Some(inventory_type) = item.inventory_type {
                writer.write_u32(inventory_type);
            }

            writer.write_bit(item.extra.is_some());
            if let Some(extra) = &item.extra {
                writer.write_u32(extra.len() as u32);
                writer.write_bytes(extra);
            }

            writer.write_bit(true);
        }

        writer.write_bit(true);
        writer.write_u32(0);
        Ok(())
    }

    fn detach(&self) {
        self.lock(&self.on_equipped).clear();
        self.lock(&self.on_unequipped).clear();
    }
}
