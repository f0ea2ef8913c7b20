use std::collections::VecDeque;

use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

use crate::{
    config::EvictionPolicy,
    glyph::Visual,
    types::{EntityId, Transform},
};

use super::physics::PhysicsWorld;

const SIDE_LABEL_POSITION: [f32; 3] = [-1.13, 0.4, 3.15];
const SIDE_LABEL_SCALE: f32 = 0.2;
const SIDE_CODE_POSITION: [f32; 3] = [0.0, 0.77, 2.8];
const SIDE_CODE_SCALE: f32 = 0.25;

/// A spawned glyph. Its dynamic body lives in `PhysicsWorld` under the
/// same id.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    pub insertion_order: u64,
    pub visual: Visual,
}

/// Small copies of the latest label and its key code next to the computer.
#[derive(Clone, Debug, Default)]
pub struct SideDisplay {
    pub label: Option<Visual>,
    pub code: Option<Visual>,
}

/// Live glyphs, oldest first, bounded by `capacity`.
pub struct WorkingSet {
    entities: VecDeque<Entity>,
    capacity: usize,
    policy: EvictionPolicy,
    next_order: u64,
    side: SideDisplay,
}

impl WorkingSet {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            entities: VecDeque::with_capacity(capacity + 1),
            capacity,
            policy,
            next_order: 0,
            side: SideDisplay::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.id).collect()
    }

    /// Appends a new entity whose body is already in `physics`. Under
    /// `OnInsert` an overfull set drops its oldest entity straight away;
    /// the evicted id is returned.
    pub fn insert(
        &mut self,
        id: EntityId,
        visual: Visual,
        physics: &mut PhysicsWorld,
    ) -> Option<EntityId> {
        let insertion_order = self.next_order;
        self.next_order += 1;
        self.entities.push_back(Entity {
            id,
            insertion_order,
            visual,
        });
        match self.policy {
            EvictionPolicy::OnInsert => self.evict_if_over_capacity(physics),
            EvictionPolicy::PerFrame => None,
        }
    }

    /// Evicts at most one entity, and only when the set is over capacity.
    pub fn evict_if_over_capacity(&mut self, physics: &mut PhysicsWorld) -> Option<EntityId> {
        if self.entities.len() > self.capacity {
            self.evict_oldest(physics)
        } else {
            None
        }
    }

    /// Removes the entity with the smallest insertion order along with its
    /// body. No-op on an empty set.
    pub fn evict_oldest(&mut self, physics: &mut PhysicsWorld) -> Option<EntityId> {
        let oldest = self.entities.pop_front()?;
        physics.remove_body(oldest.id);
        debug!(
            entity = oldest.id,
            order = oldest.insertion_order,
            label = %oldest.visual.text,
            remaining = self.entities.len(),
            "entity_evicted"
        );
        Some(oldest.id)
    }

    /// Copies every body's pose onto its visual.
    pub fn sync_all(&mut self, physics: &PhysicsWorld) {
        for entity in &mut self.entities {
            if let Some(transform) = physics.body_transform(entity.id) {
                entity.visual.transform = transform;
            }
        }
    }

    /// Tears down every entity and its body. Side display is kept.
    pub fn clear(&mut self, physics: &mut PhysicsWorld) {
        for entity in self.entities.drain(..) {
            physics.remove_body(entity.id);
        }
    }

    pub fn side_display(&self) -> &SideDisplay {
        &self.side
    }

    /// Replaces the side display with shrunken copies of `label` and `code`.
    pub fn replace_side_display(&mut self, label: &Visual, code: &Visual) {
        self.side.label = Some(
            label
                .clone()
                .with_scale(SIDE_LABEL_SCALE)
                .placed(Transform::at(Vector3::from(SIDE_LABEL_POSITION))),
        );
        self.side.code = Some(
            code.clone()
                .with_scale(SIDE_CODE_SCALE)
                .placed(Transform::at(Vector3::from(SIDE_CODE_POSITION))),
        );
    }

    /// Sets the side label's rotation about +Y.
    pub fn spin_side_label(&mut self, angle: f32) {
        if let Some(label) = &mut self.side.label {
            label.transform.rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle);
        }
    }
}
