#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Replica component properties: construct idempotence, the stack-presence
//! threshold, empty updates, and the equip/unequip lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use world_protocol::core::{BitReader, BitWriter};
use world_protocol::error::{Result, WorldError};
use world_protocol::replica::{
    Component107, ComponentKind, DirtyFlag, EquipSlot, GameObject, InventoryComponent,
    InventoryItem, Item, ItemType, Lot, ObjectId, Persistence, PhantomPhysicsComponent,
    ReplicaComponent, Vector3,
};

fn item(id: i64, slot: EquipSlot, count: u64) -> Item {
    Item {
        item_type: ItemType::Weapon,
        equip_slot: slot,
        instance: InventoryItem {
            item_id: ObjectId(id),
            lot: Lot(4732),
            count,
            slot: Some(0),
            inventory_type: None,
            extra: None,
        },
    }
}

/// Records every equipped-flag save, in call order.
#[derive(Default)]
struct RecordingPersistence {
    saves: Mutex<Vec<(ObjectId, bool)>>,
}

#[async_trait]
impl Persistence for RecordingPersistence {
    async fn set_item_equipped(&self, item_id: ObjectId, equipped: bool) -> Result<()> {
        self.saves.lock().unwrap().push((item_id, equipped));
        Ok(())
    }
}

fn serialize_bits(component: &dyn ReplicaComponent) -> (Vec<u8>, usize) {
    let mut writer = BitWriter::new();
    component.serialize(&mut writer).unwrap();
    let bits = writer.bit_len();
    (writer.finish().to_vec(), bits)
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[test]
fn construct_is_idempotent() {
    let inventory = InventoryComponent::new(Arc::new(DirtyFlag::new()), None);
    inventory.equip_unmanaged(EquipSlot::RightHand, item(1, EquipSlot::RightHand, 3).instance);
    inventory.equip_unmanaged(EquipSlot::Hair, item(2, EquipSlot::Hair, 1).instance);

    let mut first = BitWriter::new();
    inventory.construct(&mut first).unwrap();
    let mut second = BitWriter::new();
    inventory.construct(&mut second).unwrap();

    assert_eq!(first.finish(), second.finish());
}

#[test]
fn stack_presence_threshold_is_exactly_two() {
    let single = InventoryComponent::new(Arc::new(DirtyFlag::new()), None);
    single.equip_unmanaged(EquipSlot::Neck, item(1, EquipSlot::Neck, 1).instance);

    let stacked = InventoryComponent::new(Arc::new(DirtyFlag::new()), None);
    stacked.equip_unmanaged(EquipSlot::Neck, item(1, EquipSlot::Neck, 2).instance);

    let (_, single_bits) = serialize_bits(&single);
    let (stacked_bytes, stacked_bits) = serialize_bits(&stacked);

    // A count of 2 adds exactly the 32-bit count payload after the presence bit.
    assert_eq!(stacked_bits, single_bits + 32);

    let mut reader = BitReader::new(&stacked_bytes);
    let decoded = InventoryComponent::decode_items(&mut reader).unwrap();
    assert_eq!(decoded[0].count, 2);

    // And a count of 1 decodes back to 1 without a stack payload on the wire.
    let (single_bytes, _) = serialize_bits(&single);
    let mut reader = BitReader::new(&single_bytes);
    let decoded = InventoryComponent::decode_items(&mut reader).unwrap();
    assert_eq!(decoded[0].count, 1);
}

#[test]
fn empty_inventory_is_count_zero_plus_terminator() {
    let inventory = InventoryComponent::new(Arc::new(DirtyFlag::new()), None);
    let (bytes, bits) = serialize_bits(&inventory);

    // dirty bit + u32 count + terminator bit + u32 zero
    assert_eq!(bits, 1 + 32 + 1 + 32);

    let mut reader = BitReader::new(&bytes);
    let decoded = InventoryComponent::decode_items(&mut reader).unwrap();
    assert!(decoded.is_empty());
    // Decoding must not advance past the declared length.
    assert_eq!(reader.bit_position(), bits);
}

#[test]
fn inventory_round_trip_reproduces_state() {
    let inventory = InventoryComponent::new(Arc::new(DirtyFlag::new()), None);
    inventory.equip_unmanaged(
        EquipSlot::Special,
        InventoryItem {
            item_id: ObjectId(31),
            lot: Lot(6086),
            count: 5,
            slot: None,
            inventory_type: Some(4),
            extra: Some(vec![0xCA, 0xFE]),
        },
    );
    inventory.equip_unmanaged(EquipSlot::Chest, item(7, EquipSlot::Chest, 1).instance);

    let (bytes, _) = serialize_bits(&inventory);
    let mut reader = BitReader::new(&bytes);
    let decoded = InventoryComponent::decode_items(&mut reader).unwrap();

    let mut expected: Vec<InventoryItem> = inventory
        .equipped_items()
        .into_iter()
        .map(|(_, item)| item)
        .collect();
    expected.sort_by_key(|i| i.item_id);
    let mut decoded_sorted = decoded.clone();
    decoded_sorted.sort_by_key(|i| i.item_id);
    assert_eq!(decoded_sorted, expected);
}

#[test]
fn phantom_physics_scales_effect_direction_by_amount() {
    let component = PhantomPhysicsComponent::new(Arc::new(DirtyFlag::new()));
    component.set_effect(
        3,
        2.5,
        Some(Vector3 {
            x: 1.0,
            y: 0.0,
            z: -1.0,
        }),
    );

    let (bytes, _) = serialize_bits(&component);
    let mut reader = BitReader::new(&bytes);

    assert!(reader.read_bit().unwrap()); // has position
    reader.read_bytes(28).unwrap(); // position + rotation
    assert!(reader.read_bit().unwrap());
    assert!(reader.read_bit().unwrap()); // effect active
    assert_eq!(reader.read_u32().unwrap(), 3);
    assert_eq!(reader.read_f32().unwrap(), 2.5);
    assert!(!reader.read_bit().unwrap());
    assert!(reader.read_bit().unwrap()); // has direction
    assert_eq!(reader.read_f32().unwrap(), 2.5);
    assert_eq!(reader.read_f32().unwrap(), 0.0);
    assert_eq!(reader.read_f32().unwrap(), -2.5);
}

#[test]
fn game_object_snapshot_concatenates_components_in_order() {
    let builder = GameObject::builder(ObjectId(1), Lot(2290));
    let dirty = builder.dirty_flag();
    let object = builder
        .attach(Arc::new(InventoryComponent::new(dirty, None)))
        .attach(Arc::new(Component107))
        .build();

    assert!(object.component(ComponentKind::Inventory).is_some());
    assert!(object.component(ComponentKind::Component107).is_some());
    assert!(object.component(ComponentKind::PhantomPhysics).is_none());

    let snapshot = object.construct_snapshot().unwrap();
    // Empty inventory (66 bits) + component 107 (1 bit) = 67 bits, 9 bytes.
    assert_eq!(snapshot.len(), 9);
    assert_eq!(snapshot, object.serialize_snapshot().unwrap());
}

// ============================================================================
// EQUIP / UNEQUIP LIFECYCLE
// ============================================================================

#[tokio::test]
async fn equip_unequips_same_slot_occupant_first() {
    let persistence = Arc::new(RecordingPersistence::default());
    let inventory = InventoryComponent::new(Arc::new(DirtyFlag::new()), Some(persistence.clone()));

    inventory
        .equip(item(1, EquipSlot::RightHand, 1), false)
        .await
        .unwrap();
    inventory
        .equip(item(2, EquipSlot::RightHand, 1), false)
        .await
        .unwrap();

    assert_eq!(inventory.item_count(), 1);
    let (_, equipped) = inventory.equipped_items().pop().unwrap();
    assert_eq!(equipped.item_id, ObjectId(2));

    // The old occupant was fully unequipped before the new one was inserted.
    let saves = persistence.saves.lock().unwrap().clone();
    assert_eq!(
        saves,
        vec![
            (ObjectId(1), true),
            (ObjectId(1), false),
            (ObjectId(2), true),
        ]
    );
}

#[tokio::test]
async fn equip_marks_owner_dirty() {
    let dirty = Arc::new(DirtyFlag::new());
    let inventory = InventoryComponent::new(dirty.clone(), None);

    inventory
        .equip(item(9, EquipSlot::Hair, 1), false)
        .await
        .unwrap();
    assert!(dirty.take());
}

#[tokio::test]
async fn equip_fires_pre_equip_hooks_in_order() {
    let inventory = InventoryComponent::new(Arc::new(DirtyFlag::new()), None);
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
        let order = order.clone();
        inventory.on_equipped(move |_| order.lock().unwrap().push(tag));
    }

    inventory
        .equip(item(3, EquipSlot::Legs, 1), false)
        .await
        .unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn model_items_require_override_outside_build_mode() {
    let inventory = InventoryComponent::new(Arc::new(DirtyFlag::new()), None);
    let mut model = item(4, EquipSlot::Special, 1);
    model.item_type = ItemType::Model;

    inventory.equip(model.clone(), false).await.unwrap();
    assert_eq!(inventory.item_count(), 0);

    // The override flag bypasses validation.
    inventory.equip(model, true).await.unwrap();
    assert_eq!(inventory.item_count(), 1);
}

#[tokio::test]
async fn unequip_by_unknown_id_is_a_noop() {
    let persistence = Arc::new(RecordingPersistence::default());
    let dirty = Arc::new(DirtyFlag::new());
    let inventory = InventoryComponent::new(dirty.clone(), Some(persistence.clone()));
    inventory.equip_unmanaged(EquipSlot::Chest, item(5, EquipSlot::Chest, 1).instance);
    dirty.take();

    inventory.unequip_by_id(ObjectId(999)).await.unwrap();

    assert_eq!(inventory.item_count(), 1);
    assert!(persistence.saves.lock().unwrap().is_empty());
    assert!(!dirty.is_dirty());
}

/// Persistence stub that sleeps inside every save, widening the window in
/// which overlapping equips could interleave their slot-map writes.
#[derive(Default)]
struct SlowPersistence {
    saves: Mutex<Vec<(ObjectId, bool)>>,
}

#[async_trait]
impl Persistence for SlowPersistence {
    async fn set_item_equipped(&self, item_id: ObjectId, equipped: bool) -> Result<()> {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.saves.lock().unwrap().push((item_id, equipped));
        Ok(())
    }
}

#[tokio::test]
async fn concurrent_equips_on_one_entity_do_not_interleave() {
    let persistence = Arc::new(SlowPersistence::default());
    let inventory = Arc::new(InventoryComponent::new(
        Arc::new(DirtyFlag::new()),
        Some(persistence.clone()),
    ));

    let a = {
        let inventory = inventory.clone();
        tokio::spawn(async move { inventory.equip(item(1, EquipSlot::RightHand, 1), false).await })
    };
    let b = {
        let inventory = inventory.clone();
        tokio::spawn(async move { inventory.equip(item(2, EquipSlot::RightHand, 1), false).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // One occupant survives; both equips ran, one after the other.
    assert_eq!(inventory.item_count(), 1);

    // Whichever equip won the lock ran to completion before the other
    // touched the slot map: its insert is followed by the loser's
    // unequip-of-occupant and then the loser's insert, never two bare
    // inserts from both seeing an empty slot.
    let saves = persistence.saves.lock().unwrap().clone();
    let first_then_second = vec![
        (ObjectId(1), true),
        (ObjectId(1), false),
        (ObjectId(2), true),
    ];
    let second_then_first = vec![
        (ObjectId(2), true),
        (ObjectId(2), false),
        (ObjectId(1), true),
    ];
    assert!(
        saves == first_then_second || saves == second_then_first,
        "interleaved equip sequence: {saves:?}"
    );
}

/// Persistence stub that always fails its saves.
struct BrokenPersistence;

#[async_trait]
impl Persistence for BrokenPersistence {
    async fn set_item_equipped(&self, _item_id: ObjectId, _equipped: bool) -> Result<()> {
        Err(WorldError::Persistence("item store offline".into()))
    }
}

#[tokio::test]
async fn persistence_failure_surfaces_from_equip() {
    let inventory = InventoryComponent::new(Arc::new(DirtyFlag::new()), Some(Arc::new(BrokenPersistence)));

    let err = inventory
        .equip(item(8, EquipSlot::LeftHand, 1), false)
        .await
        .unwrap_err();
    assert!(matches!(err, WorldError::Persistence(_)));
}

#[tokio::test]
async fn detach_clears_lifecycle_hooks() {
    let inventory = InventoryComponent::new(Arc::new(DirtyFlag::new()), None);
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let fired = fired.clone();
        inventory.on_equipped(move |_| {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }

    inventory.detach();
    inventory
        .equip(item(6, EquipSlot::Neck, 1), false)
        .await
        .unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
