use std::{collections::HashMap, num::NonZeroUsize};

use nalgebra::Vector3;
use rapier3d::prelude::{
    CCDSolver, ColliderBuilder, ColliderSet, DefaultBroadPhase, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{EntityId, Transform};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhysicsError {
    #[error("entity {0} already has a rigid body")]
    BodyAlreadyPresent(EntityId),
}

/// Friction and restitution shared by every collider in the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactProperties {
    pub friction: f32,
    pub restitution: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropShape {
    /// Infinite floor through the prop origin with a +Y normal.
    Plane,
    Cuboid { half_extents: Vector3<f32> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StaticProp {
    pub name: &'static str,
    pub transform: Transform,
    pub shape: PropShape,
}

impl StaticProp {
    /// Floor, computer and side block of the desk scene.
    pub fn desk_scene() -> Vec<StaticProp> {
        vec![
            StaticProp {
                name: "floor",
                transform: Transform::default(),
                shape: PropShape::Plane,
            },
            StaticProp {
                name: "computer",
                transform: Transform::at(Vector3::new(0.0, 0.0, 2.5)),
                shape: PropShape::Cuboid {
                    half_extents: Vector3::new(0.7, 1.2, 0.7),
                },
            },
            StaticProp {
                name: "side_block",
                transform: Transform::at(Vector3::new(-1.1, 0.0, 3.2)),
                shape: PropShape::Cuboid {
                    half_extents: Vector3::new(0.5, 0.5, 0.5),
                },
            },
        ]
    }
}

/// What a dynamic body is built from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodySpec {
    pub half_extents: Vector3<f32>,
    pub mass: f32,
    pub transform: Transform,
}

/// Outcome of one `step` call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    pub substeps: u32,
    /// Whole substeps of accumulated time thrown away because the cap was hit.
    pub dropped_backlog: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct SubstepPlan {
    substeps: u32,
    remaining: f32,
    dropped_backlog: f32,
}

fn plan_substeps(mut accumulator: f32, fixed_substep: f32, max_substeps: u32) -> SubstepPlan {
    let mut substeps = 0u32;
    while accumulator >= fixed_substep && substeps < max_substeps {
        accumulator -= fixed_substep;
        substeps += 1;
    }

    if accumulator >= fixed_substep {
        let remaining = accumulator % fixed_substep;
        SubstepPlan {
            substeps,
            remaining,
            dropped_backlog: accumulator - remaining,
        }
    } else {
        SubstepPlan {
            substeps,
            remaining: accumulator,
            dropped_backlog: 0.0,
        }
    }
}

pub struct PhysicsWorld {
    gravity: Vector3<f32>,
    contact: ContactProperties,
    max_substeps: u32,
    accumulator: f32,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    dynamic: HashMap<EntityId, RigidBodyHandle>,
    statics: Vec<RigidBodyHandle>,
}

impl PhysicsWorld {
    pub fn new(gravity: Vector3<f32>, contact: ContactProperties, max_substeps: u32) -> Self {
        Self {
            gravity,
            contact,
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            dynamic: HashMap::new(),
            statics: Vec::new(),
        }
    }

    pub fn gravity(&self) -> Vector3<f32> {
        self.gravity
    }

    pub fn contact_properties(&self) -> ContactProperties {
        self.contact
    }

    /// Adds a fixed body. Static props live as long as the world.
    pub fn add_static(&mut self, prop: &StaticProp) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed()
            .position(prop.transform.to_isometry())
            .build();
        let handle = self.bodies.insert(body);
        let builder = match prop.shape {
            PropShape::Plane => ColliderBuilder::halfspace(Vector3::y_axis()),
            PropShape::Cuboid { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
        };
        let collider = builder
            .friction(self.contact.friction)
            .restitution(self.contact.restitution)
            .build();
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        self.statics.push(handle);
        debug!(prop = prop.name, "static_prop_added");
        handle
    }

    pub fn add_body(&mut self, id: EntityId, spec: BodySpec) -> Result<(), PhysicsError> {
        if self.dynamic.contains_key(&id) {
            return Err(PhysicsError::BodyAlreadyPresent(id));
        }
        let body = RigidBodyBuilder::dynamic()
            .position(spec.transform.to_isometry())
            .build();
        let handle = self.bodies.insert(body);
        let half = spec.half_extents;
        let collider = ColliderBuilder::cuboid(half.x, half.y, half.z)
            .friction(self.contact.friction)
            .restitution(self.contact.restitution)
            .mass(spec.mass)
            .build();
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        self.dynamic.insert(id, handle);
        Ok(())
    }

    /// Removes the body owned by `id` together with its collider. Returns
    /// `false` when there was nothing to remove.
    pub fn remove_body(&mut self, id: EntityId) -> bool {
        let Some(handle) = self.dynamic.remove(&id) else {
            return false;
        };
        let removed = self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        if removed.is_none() {
            warn!(entity = id, "body handle was already gone");
        }
        true
    }

    /// Advances the world by `delta` seconds of wall-clock time in whole
    /// `fixed_substep` increments. Leftover time carries over to the next
    /// call; whole substeps past `max_substeps` are dropped.
    pub fn step(
        &mut self,
        fixed_substep: f32,
        delta: f32,
        solver_iterations: usize,
    ) -> StepReport {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        if !(fixed_substep.is_finite() && fixed_substep > 0.0) {
            return StepReport::default();
        }

        let plan = plan_substeps(self.accumulator + delta, fixed_substep, self.max_substeps);
        self.accumulator = plan.remaining;
        if plan.dropped_backlog > 0.0 {
            warn!(
                dropped_secs = plan.dropped_backlog,
                max_substeps = self.max_substeps,
                "physics fell behind; dropping backlog"
            );
        }

        self.integration_parameters.dt = fixed_substep;
        self.integration_parameters.num_solver_iterations =
            NonZeroUsize::new(solver_iterations).unwrap_or(NonZeroUsize::MIN);
        for _ in 0..plan.substeps {
            self.pipeline.step(
                &self.gravity,
                &self.integration_parameters,
                &mut self.islands,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                None,
                &(),
                &(),
            );
        }

        StepReport {
            substeps: plan.substeps,
            dropped_backlog: plan.dropped_backlog,
        }
    }

    pub fn body_transform(&self, id: EntityId) -> Option<Transform> {
        let handle = self.dynamic.get(&id)?;
        let body = self.bodies.get(*handle)?;
        Some(Transform::from_isometry(body.position()))
    }

    #[cfg(test)]
    pub fn body_velocity(&self, id: EntityId) -> Option<Vector3<f32>> {
        let handle = self.dynamic.get(&id)?;
        self.bodies.get(*handle).map(|body| *body.linvel())
    }

    #[cfg(test)]
    pub fn contains(&self, id: EntityId) -> bool {
        self.dynamic.contains_key(&id)
    }

    pub fn dynamic_body_count(&self) -> usize {
        self.dynamic.len()
    }

    pub fn static_body_count(&self) -> usize {
        self.statics.len()
    }

    #[cfg(test)]
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }
}
