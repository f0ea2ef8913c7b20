pub mod clock;
pub mod frame_loop;
pub mod physics;
pub mod working_set;

use std::f32::consts::PI;

use nalgebra::Vector3;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, error, info, warn};

use crate::{
    anim::KeyboardProp,
    config::{self, SimConfig},
    glyph::{Glyph, GlyphFactory, ShapeError, SpawnOrigin, resolver::FontSource},
    input::KeyPress,
    render::Scene,
    types::{EntityId, Transform, euler_xyz},
};

use clock::Clock;
use physics::{BodySpec, ContactProperties, PhysicsError, PhysicsWorld, StaticProp};
use working_set::WorkingSet;

/// Everything one session owns: clock, physics, the live glyphs and the
/// decorative props. Input handling and the frame loop borrow it mutably.
pub struct Simulation {
    config: SimConfig,
    clock: Clock,
    physics: PhysicsWorld,
    working_set: WorkingSet,
    glyphs: GlyphFactory,
    keyboard: KeyboardProp,
    props: Vec<StaticProp>,
    rng: StdRng,
    next_id: EntityId,
    resolved: Vec<Result<Glyph, ShapeError>>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self::with_clock(config, Clock::monotonic())
    }

    pub fn with_clock(config: SimConfig, clock: Clock) -> Self {
        let mut physics = PhysicsWorld::new(
            config.gravity(),
            ContactProperties {
                friction: config.friction,
                restitution: config.restitution,
            },
            config.max_substeps,
        );
        let props = StaticProp::desk_scene();
        for prop in &props {
            physics.add_static(prop);
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let working_set = WorkingSet::new(config.capacity, config.eviction);
        let glyphs = GlyphFactory::new(FontSource::from_config(config.typeface.clone()));

        info!(
            gravity = ?physics.gravity(),
            contact = ?physics.contact_properties(),
            props = physics.static_body_count(),
            capacity = config.capacity,
            eviction = ?config.eviction,
            typeface = ?config.typeface,
            seed = ?config.seed,
            "simulation_created"
        );

        Self {
            config,
            clock,
            physics,
            working_set,
            glyphs,
            keyboard: KeyboardProp::new(),
            props,
            rng,
            next_id: 1,
            resolved: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    #[cfg(test)]
    pub fn keyboard(&self) -> &KeyboardProp {
        &self.keyboard
    }

    pub fn pending_glyphs(&self) -> usize {
        self.glyphs.pending_len()
    }

    /// Queues the "Press Key" glyph shown before any input.
    pub fn request_initial_glyph(&mut self) {
        self.glyphs.create_glyph(
            config::INITIAL_LABEL,
            config::INITIAL_CODE,
            SpawnOrigin::Initial,
        );
    }

    /// Queues a glyph for the key and dips a random key cap from the
    /// moment of the press.
    pub fn handle_key(&mut self, press: &KeyPress) {
        self.glyphs.create_glyph(
            press.label.clone(),
            press.code_label(),
            SpawnOrigin::Keyboard,
        );
        let cap = self.keyboard.press_random(&mut self.rng, self.clock.now());
        debug!(label = %press.label, code = press.code, cap, "key_pressed");
    }

    /// Spawns every glyph whose shape has resolved since the last call and
    /// returns how many were spawned. Unresolvable requests are dropped.
    pub fn poll_glyphs(&mut self) -> usize {
        let mut resolved = std::mem::take(&mut self.resolved);
        self.glyphs.poll(&mut resolved);

        let mut spawned = 0;
        for outcome in resolved.drain(..) {
            match outcome {
                Ok(glyph) => match self.spawn(glyph) {
                    Ok(_) => spawned += 1,
                    Err(err) => error!(error = %err, "failed to spawn glyph"),
                },
                Err(err) => warn!(error = %err, "glyph dropped"),
            }
        }

        self.resolved = resolved;
        spawned
    }

    /// Creates the body for `glyph`, makes it the side display and appends
    /// it to the working set.
    pub fn spawn(&mut self, glyph: Glyph) -> Result<EntityId, PhysicsError> {
        let id = self.next_id;
        let transform = self.spawn_pose(glyph.origin);
        self.physics.add_body(
            id,
            BodySpec {
                half_extents: glyph.collider_half_extents,
                mass: self.config.glyph_mass,
                transform,
            },
        )?;
        self.next_id += 1;

        self.working_set.replace_side_display(&glyph.label, &glyph.code);
        let label = glyph.label.text.clone();
        let visual = glyph.label.placed(transform);
        let evicted = self.working_set.insert(id, visual, &mut self.physics);

        debug!(
            entity = id,
            label = %label,
            live = self.working_set.len(),
            evicted = ?evicted,
            "glyph_spawned"
        );
        Ok(id)
    }

    pub fn scene(&self) -> Scene<'_> {
        Scene {
            working_set: &self.working_set,
            key_caps: self.keyboard.caps(),
            props: &self.props,
            elapsed: self.clock.elapsed(),
        }
    }

    /// Removes every glyph and its body.
    pub fn teardown(&mut self) {
        let live = self.working_set.len();
        self.working_set.clear(&mut self.physics);
        info!(
            removed = live,
            bodies_left = self.physics.dynamic_body_count(),
            "simulation_torn_down"
        );
    }

    fn spawn_pose(&mut self, origin: SpawnOrigin) -> Transform {
        let height = self.config.spawn_height;
        match origin {
            SpawnOrigin::Initial => Transform::new(
                Vector3::new(0.0, height, 0.0),
                euler_xyz(0.0, 0.0, 0.1 * PI),
            ),
            SpawnOrigin::Keyboard => {
                let jitter = self.config.spawn_jitter;
                let position = Vector3::new(
                    self.rng.gen_range(0.0_f32..1.0) * jitter,
                    height,
                    self.rng.gen_range(0.0_f32..1.0) * jitter,
                );
                let rotation = euler_xyz(
                    0.0,
                    self.rng.gen_range(0.0_f32..1.0) * PI,
                    self.rng.gen_range(0.0_f32..1.0) * PI,
                );
                Transform::new(position, rotation)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{config::EvictionPolicy, core::clock::ManualTime};

    fn seeded(capacity: usize) -> (Simulation, ManualTime) {
        let time = ManualTime::new();
        let config = SimConfig {
            capacity,
            seed: Some(11),
            ..SimConfig::default()
        };
        let sim = Simulation::with_clock(config, Clock::new(Box::new(time.clone())));
        (sim, time)
    }

    mod new {
        use super::*;

        #[test]
        fn adds_static_props_and_no_glyphs() {
            let (sim, _time) = seeded(5);
            assert_eq!(sim.physics().static_body_count(), 3);
            assert_eq!(sim.physics().dynamic_body_count(), 0);
            assert!(sim.working_set().is_empty());
        }
    }

    mod poll_glyphs {
        use super::*;

        #[test]
        fn initial_glyph_spawns_at_fixed_pose() {
            let (mut sim, _time) = seeded(5);
            sim.request_initial_glyph();
            assert_eq!(sim.poll_glyphs(), 1);

            let entity = sim.working_set().iter().next().expect("entity");
            assert_eq!(entity.visual.text, config::INITIAL_LABEL);
            assert_eq!(
                entity.visual.transform.position,
                Vector3::new(0.0, config::SPAWN_HEIGHT, 0.0)
            );
            let side = sim.working_set().side_display();
            assert_eq!(side.code.as_ref().expect("code").text, config::INITIAL_CODE);
        }

        #[test]
        fn key_glyph_spawns_within_jitter() {
            let (mut sim, _time) = seeded(5);
            for _ in 0..20 {
                sim.handle_key(&KeyPress::new("a", 65));
            }
            assert_eq!(sim.poll_glyphs(), 20);
            assert_eq!(sim.working_set().len(), 5);
            for entity in sim.working_set().iter() {
                let p = entity.visual.transform.position;
                assert!((0.0..1.0).contains(&p.x));
                assert!((0.0..1.0).contains(&p.z));
                assert_eq!(p.y, config::SPAWN_HEIGHT);
            }
        }

        #[test]
        fn unshapeable_key_is_dropped() {
            let (mut sim, _time) = seeded(5);
            sim.handle_key(&KeyPress::new(" ", 32));
            assert_eq!(sim.poll_glyphs(), 0);
            assert!(sim.working_set().is_empty());
            assert_eq!(sim.pending_glyphs(), 0);
        }

        #[test]
        fn nothing_pending_spawns_nothing() {
            let (mut sim, _time) = seeded(5);
            assert_eq!(sim.poll_glyphs(), 0);
        }

        #[test]
        fn bodies_stay_paired_with_visuals() {
            let (mut sim, _time) = seeded(3);
            for ch in ['a', 'b', 'c', 'd', 'e'] {
                sim.handle_key(&KeyPress::new(ch.to_string(), ch as u32));
            }
            sim.poll_glyphs();
            assert_eq!(sim.working_set().len(), 3);
            assert_eq!(sim.physics().dynamic_body_count(), 3);
            let labels: Vec<&str> = sim
                .working_set()
                .iter()
                .map(|e| e.visual.text.as_str())
                .collect();
            assert_eq!(labels, vec!["c", "d", "e"]);
        }
    }

    mod handle_key {
        use super::*;

        #[test]
        fn starts_a_key_cap_tween() {
            let (mut sim, time) = seeded(5);
            time.advance(Duration::from_millis(100));
            sim.handle_key(&KeyPress::new("a", 65));
            assert_eq!(sim.keyboard().active_tweens(), 1);
            assert_eq!(sim.pending_glyphs(), 1);
        }
    }

    mod spawn {
        use super::*;

        #[test]
        fn ids_are_unique_and_increasing() {
            let (mut sim, _time) = seeded(10);
            sim.handle_key(&KeyPress::new("a", 65));
            sim.handle_key(&KeyPress::new("b", 66));
            sim.poll_glyphs();
            assert_eq!(sim.working_set().ids(), vec![1, 2]);
        }
    }

    mod teardown {
        use super::*;

        #[test]
        fn removes_glyphs_but_keeps_props() {
            let (mut sim, _time) = seeded(10);
            sim.request_initial_glyph();
            sim.poll_glyphs();
            sim.teardown();
            assert!(sim.working_set().is_empty());
            assert_eq!(sim.physics().dynamic_body_count(), 0);
            assert_eq!(sim.physics().static_body_count(), 3);
        }
    }

    mod eviction_policy {
        use super::*;

        #[test]
        fn per_frame_policy_lets_inserts_overshoot() {
            let time = ManualTime::new();
            let config = SimConfig {
                capacity: 2,
                eviction: EvictionPolicy::PerFrame,
                seed: Some(1),
                ..SimConfig::default()
            };
            let mut sim = Simulation::with_clock(config, Clock::new(Box::new(time)));
            for ch in ['a', 'b', 'c', 'd'] {
                sim.handle_key(&KeyPress::new(ch.to_string(), ch as u32));
            }
            sim.poll_glyphs();
            assert_eq!(sim.working_set().len(), 4);
        }
    }
}
