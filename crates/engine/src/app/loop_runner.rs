use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::world::Simulation;

use super::metrics::LoopMetrics;
use super::{InputSnapshot, LoopMetricsSnapshot, Scene, SceneCommand};

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(33),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

impl LoopConfig {
    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_tps.max(1)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub ticks_run: u32,
    pub dropped_backlog: Duration,
    pub command: SceneCommand,
}

/// Drives one scene over the simulation at a fixed tick rate.
///
/// Frame deltas come from the caller (wall clock or synthetic), are clamped to
/// `max_frame_delta` and accumulated; each whole `fixed_dt` becomes one `Scene::update`.
pub struct SceneRunner {
    scene: Box<dyn Scene>,
    world: Simulation,
    is_loaded: bool,
    quit_requested: bool,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    fixed_dt: Duration,
    accumulator: Duration,
    metrics: LoopMetrics,
    last_metrics: Option<LoopMetricsSnapshot>,
}

impl SceneRunner {
    pub fn new(config: LoopConfig, scene: Box<dyn Scene>, world: Simulation) -> Self {
        let fixed_dt = config.fixed_dt();
        let max_frame_delta =
            normalize_non_zero_duration(config.max_frame_delta, fixed_dt).max(fixed_dt);
        let metrics_log_interval =
            normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
        Self {
            scene,
            world,
            is_loaded: false,
            quit_requested: false,
            max_frame_delta,
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            fixed_dt,
            accumulator: Duration::ZERO,
            metrics: LoopMetrics::new(metrics_log_interval),
            last_metrics: None,
        }
    }

    pub fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load(&mut self.world);
        self.is_loaded = true;
        info!(
            characters = self.world.registry().len(),
            active = self.world.registry().active_id().unwrap_or("<none>"),
            tick_ms = self.fixed_dt.as_secs_f64() * 1000.0,
            max_frame_delta_ms = self.max_frame_delta.as_millis() as u64,
            max_ticks_per_frame = self.max_ticks_per_frame,
            "scene_loaded"
        );
    }

    pub fn advance_frame(&mut self, frame_delta: Duration, input: &InputSnapshot) -> FrameReport {
        if !self.is_loaded {
            self.load();
        }
        if self.quit_requested || input.quit_requested() {
            self.quit_requested = true;
            return FrameReport {
                ticks_run: 0,
                dropped_backlog: Duration::ZERO,
                command: SceneCommand::Quit,
            };
        }

        let clamped = clamp_frame_delta(frame_delta, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped);
        let plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);

        let fixed_dt_seconds = self.fixed_dt.as_secs_f32();
        let mut command = SceneCommand::None;
        let mut ticks_run = 0u32;
        for _ in 0..plan.ticks_to_run {
            command = self.scene.update(fixed_dt_seconds, input, &mut self.world);
            ticks_run = ticks_run.saturating_add(1);
            if command == SceneCommand::Quit {
                self.quit_requested = true;
                info!(tick = self.world.tick_count(), "scene_requested_quit");
                break;
            }
        }
        self.accumulator = plan.remaining_accumulator;

        if plan.dropped_backlog > Duration::ZERO {
            self.metrics.record_dropped_backlog(plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        self.metrics.record_frame(frame_delta, ticks_run);
        if let Some(snapshot) = self.metrics.take_snapshot(Instant::now()) {
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                busiest_frame_ticks = snapshot.busiest_frame_ticks,
                characters = self.world.registry().len(),
                "loop_metrics"
            );
            self.last_metrics = Some(snapshot);
        }

        FrameReport {
            ticks_run,
            dropped_backlog: plan.dropped_backlog,
            command,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn is_quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn world(&self) -> &Simulation {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut Simulation {
        &mut self.world
    }

    pub fn scene_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }

    pub fn metrics_snapshot(&self) -> Option<LoopMetricsSnapshot> {
        self.last_metrics
    }

    /// Unloads the scene (if loaded) and hands the simulation back.
    pub fn shutdown(mut self) -> Simulation {
        if self.is_loaded {
            self.scene.unload(&mut self.world);
            self.is_loaded = false;
        }
        info!(ticks = self.world.tick_count(), "shutdown");
        self.world
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
