//! Phantom physics component: trigger volumes and area effects.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::BitWriter;
use crate::error::Result;
use crate::replica::component::{ComponentKind, DirtyFlag, ReplicaComponent};
use crate::replica::object::{Quaternion, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct PhantomPhysicsState {
    pub has_position: bool,
    pub position: Vector3,
    pub rotation: Quaternion,
    pub effect_active: bool,
    pub effect_type: u32,
    pub effect_amount: f32,
    pub effect_direction: Option<Vector3>,
}

impl Default for PhantomPhysicsState {
    fn default() -> Self {
        Self {
            has_position: true,
            position: Vector3::ZERO,
            rotation: Quaternion::default(),
            effect_active: false,
            effect_type: 0,
            effect_amount: 0.0,
            effect_direction: None,
        }
    }
}

/// Physics pose and optional area effect of a phantom (non-solid) object.
pub struct PhantomPhysicsComponent {
    state: Mutex<PhantomPhysicsState>,
    dirty: Arc<DirtyFlag>,
}

impl PhantomPhysicsComponent {
    pub fn new(dirty: Arc<DirtyFlag>) -> Self {
        Self {
            state: Mutex::new(PhantomPhysicsState::default()),
            dirty,
        }
    }

    pub fn with_state(dirty: Arc<DirtyFlag>, state: PhantomPhysicsState) -> Self {
        Self {
            state: Mutex::new(state),
            dirty,
        }
    }

    pub fn state(&self) -> PhantomPhysicsState {
        self.lock().clone()
    }

    pub fn set_pose(&self, position: Vector3, rotation: Quaternion) {
        let mut state = self.lock();
        state.position = position;
        state.rotation = rotation;
        drop(state);
        self.dirty.mark();
    }

    pub fn set_effect(&self, effect_type: u32, amount: f32, direction: Option<Vector3>) {
        let mut state = self.lock();
        state.effect_active = true;
        state.effect_type = effect_type;
        state.effect_amount = amount;
        state.effect_direction = direction;
        drop(state);
        self.dirty.mark();
    }

    pub fn clear_effect(&self) {
        self.lock().effect_active = false;
        self.dirty.mark();
    }

    fn lock(&self) -> MutexGuard<'_, PhantomPhysicsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ReplicaComponent for PhantomPhysicsComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::PhantomPhysics
    }

    fn construct(&self, writer: &mut BitWriter) -> Result<()> {
        self.serialize(writer)
    }

    fn serialize(&self, writer: &mut BitWriter) -> Result<()> {
        let state = self.lock();

        writer.write_bit(state.has_position);
        if state.has_position {
            writer.encode(&state.position)?;
            writer.encode(&state.rotation)?;
        }

        writer.write_bit(true);
        writer.write_bit(state.effect_active);
        if !state.effect_active {
            return Ok(());
        }

        writer.write_u32(state.effect_type);
        writer.write_f32(state.effect_amount);
        writer.write_bit(false);

        writer.write_bit(state.effect_direction.is_some());
        if let Some(direction) = state.effect_direction {
            // The direction is pre-scaled by the effect amount on the wire.
            writer.encode(&direction.scaled(state.effect_amount))?;
        }

        Ok(())
    }
}
