use std::{io, time::Duration};

use tracing::{debug, trace};

use crate::{render::Scene, types::EntityId};

use super::Simulation;

/// Consumes the scene once per frame.
pub trait RenderSink {
    fn render(&mut self, scene: &Scene<'_>) -> io::Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// What happened during one iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub delta: f32,
    pub elapsed: f32,
    pub substeps: u32,
    pub dropped_backlog: f32,
    pub evicted: Option<EntityId>,
    pub live: usize,
}

/// Drives a `Simulation` one frame at a time. The caller decides when the
/// next frame runs, usually after sleeping for `FramePacer::sleep_for`.
#[derive(Debug)]
pub struct SimulationLoop {
    state: LoopState,
    frames: u64,
}

impl Default for SimulationLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            frames: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Tick, step, evict, sync, animate, render, in that order.
    pub fn run_frame<S: RenderSink>(
        &mut self,
        sim: &mut Simulation,
        sink: &mut S,
    ) -> io::Result<FrameReport> {
        if self.state == LoopState::Idle {
            debug!(live = sim.working_set.len(), "loop_started");
        }
        self.state = LoopState::Running;

        let delta = sim.clock.tick();
        let step = sim.physics.step(
            sim.config.fixed_substep,
            delta,
            sim.config.solver_iterations,
        );
        let evicted = sim.working_set.evict_if_over_capacity(&mut sim.physics);
        sim.working_set.sync_all(&sim.physics);

        let elapsed = sim.clock.elapsed();
        sim.keyboard.update(elapsed);
        sim.working_set.spin_side_label(elapsed);

        sink.render(&sim.scene())?;

        let report = FrameReport {
            frame: self.frames,
            delta,
            elapsed,
            substeps: step.substeps,
            dropped_backlog: step.dropped_backlog,
            evicted,
            live: sim.working_set.len(),
        };
        self.frames += 1;
        trace!(
            frame = report.frame,
            delta = report.delta,
            elapsed = report.elapsed,
            substeps = report.substeps,
            dropped = report.dropped_backlog,
            live = report.live,
            evicted = ?report.evicted,
            "frame"
        );
        Ok(report)
    }
}

/// Works out how long to wait so frames start `1 / target_fps` apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePacer {
    frame_target: Duration,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        Self {
            frame_target: Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1))),
        }
    }

    pub fn frame_target(&self) -> Duration {
        self.frame_target
    }

    /// Time left in the frame budget after `frame_elapsed` of work.
    pub fn sleep_for(&self, frame_elapsed: Duration) -> Duration {
        self.frame_target.saturating_sub(frame_elapsed)
    }
}
