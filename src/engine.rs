//! The frame loop.
//!
//! [`Engine`] owns the [`World`] and turns frame deltas into phases:
//!
//! 1. **Simulation**: the delta (milliseconds, times the time multiplier)
//!    feeds an accumulator. With a fixed step, every whole step triggers
//!    `subtick` on the root followed by the collision pass; without one, the
//!    full delta runs as a single step.
//! 2. **Input**: `touchmove` while the pointer is held, `touchend` once it
//!    was released. `touchstart` is dispatched as soon as
//!    [`Engine::input`] sees the press.
//! 3. **Render** (only when a step ran): reset the transform, clear the view
//!    with the background colour, trigger `subrender` on the root, then
//!    `gizmos` when debugging.
//!
//! [`Engine::run`] drives all of it from a [`FrameScheduler`] until the
//! world asks to stop or the scheduler runs dry.

use std::time::Instant;

use log::{debug, info};

use crate::events::{self, Event, TouchEvent};
use crate::resources::engineconfig::EngineConfig;
use crate::resources::framestats::FrameStats;
use crate::resources::renderer::Renderer;
use crate::resources::timer::{ClockTimer, FrameRequest, FrameScheduler};
use crate::resources::world::World;
use crate::systems::collision::handle_collisions;
use crate::systems::input::PointerState;

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

pub struct Engine {
    pub world: World,
    config: EngineConfig,
    timer: ClockTimer,
    /// Milliseconds per simulation step.
    fixed_step: Option<f64>,
    time_multiplier: f64,
    remaining: f64,
    /// Simulated time in milliseconds.
    timestamp: f64,
    stats: FrameStats,
    pointer: PointerState,
    pub debugging: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::new())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut world = World::new();
        world.gravity = config.gravity;
        Self {
            world,
            timer: ClockTimer::new(config.max_advance_ms),
            fixed_step: config.fixed_step(),
            time_multiplier: config.time_multiplier,
            remaining: 0.0,
            timestamp: 0.0,
            stats: FrameStats::new(),
            pointer: PointerState::default(),
            debugging: config.debug,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `None` switches to one variable step per frame.
    pub fn set_fixed_step(&mut self, step_ms: Option<f64>) {
        self.fixed_step = step_ms.filter(|s| *s > 0.0);
        self.remaining = 0.0;
    }

    pub fn fixed_step(&self) -> Option<f64> {
        self.fixed_step
    }

    pub fn set_time_multiplier(&mut self, multiplier: f64) {
        self.time_multiplier = multiplier;
    }

    /// Simulated time in seconds.
    pub fn timestamp(&self) -> f64 {
        self.timestamp / 1000.0
    }

    pub fn fps(&self) -> i64 {
        self.stats.fps()
    }

    pub fn update_times(&self) -> &[f64] {
        self.stats.update_times()
    }

    pub fn render_times(&self) -> &[f64] {
        self.stats.render_times()
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    // ==================== SIMULATION ====================

    /// Feed `delta_ms` of real time through the simulation and input phases.
    ///
    /// Returns the number of simulation steps that ran.
    pub fn advance(&mut self, delta_ms: f64) -> usize {
        let started = Instant::now();
        let delta = delta_ms * self.time_multiplier;
        let mut steps = 0;

        match self.fixed_step {
            Some(step) => {
                self.remaining += delta;
                while self.remaining >= step {
                    self.timestamp += step;
                    self.step(step);
                    self.remaining -= step;
                    steps += 1;
                }
            }
            None => {
                self.timestamp += delta;
                self.step(delta);
                steps = 1;
            }
        }

        self.stats.record_update(elapsed_ms(started));
        self.input_phase();
        steps
    }

    fn step(&mut self, step_ms: f64) {
        let root = self.world.root();
        let mut tick = Event::tick((step_ms / 1000.0) as f32, self.timestamp / 1000.0);
        self.world.trigger(root, events::SUBTICK, &mut tick);
        handle_collisions(&mut self.world);
    }

    /// [`advance`](Self::advance), then render if anything was simulated.
    pub fn advance_and_render(&mut self, delta_ms: f64, renderer: &mut dyn Renderer) -> usize {
        let steps = self.advance(delta_ms);
        if steps > 0 {
            self.render(renderer);
            self.stats.sample_fps(self.timestamp);
        }
        steps
    }

    // ==================== RENDER ====================

    pub fn render(&mut self, renderer: &mut dyn Renderer) {
        let started = Instant::now();
        let root = self.world.root();
        let [a, b, c, d, e, f] = IDENTITY;

        renderer.set_transform(a, b, c, d, e, f);
        renderer.set_fill_style(&self.config.background);
        renderer.fill_rect(
            0.0,
            0.0,
            self.config.view_width as f32,
            self.config.view_height as f32,
        );
        self.world
            .trigger(root, events::SUBRENDER, &mut Event::Render(&mut *renderer));
        self.stats.record_render(elapsed_ms(started));

        if self.debugging {
            renderer.set_transform(a, b, c, d, e, f);
            self.world
                .trigger(root, events::GIZMOS, &mut Event::Render(&mut *renderer));
        }
    }

    // ==================== INPUT ====================

    /// Report the pointer in view coordinates. A press is dispatched as
    /// `touchstart` right away.
    pub fn input(&mut self, x: f32, y: f32, is_down: bool) {
        let pressed = is_down && !self.pointer.is_down;
        self.pointer.x = x;
        self.pointer.y = y;
        self.pointer.is_down = is_down;
        if pressed {
            self.pointer.was_down = true;
            self.dispatch_touch(events::TOUCHSTART);
        }
    }

    fn input_phase(&mut self) {
        if self.pointer.is_down {
            self.dispatch_touch(events::TOUCHMOVE);
        } else if self.pointer.was_down {
            self.dispatch_touch(events::TOUCHEND);
        }
        self.pointer.was_down = self.pointer.is_down;
    }

    fn dispatch_touch(&mut self, name: &str) {
        let root = self.world.root();
        let mut touch = Event::Touch(TouchEvent::new(self.pointer.x, self.pointer.y));
        self.world.trigger(root, name, &mut touch);
    }

    // ==================== FRAME LOOP ====================

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) {
        info!(
            "Engine starting: step={:?}ms, multiplier={}, {} entities",
            self.fixed_step,
            self.time_multiplier,
            self.world.len()
        );
        self.timer.start(scheduler);
    }

    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) {
        self.timer.stop(scheduler);
        info!("Engine stopped at {:.3}s", self.timestamp());
    }

    /// Handle one frame callback. Stale callbacks return `None`.
    pub fn frame(
        &mut self,
        scheduler: &mut dyn FrameScheduler,
        request: FrameRequest,
        timestamp: f64,
        renderer: &mut dyn Renderer,
    ) -> Option<usize> {
        let delta = self.timer.on_frame(scheduler, request, timestamp)?;
        Some(self.advance_and_render(delta, renderer))
    }

    /// Run frames until stopped. Returns the number of frames handled.
    pub fn run(&mut self, scheduler: &mut dyn FrameScheduler, renderer: &mut dyn Renderer) -> usize {
        self.start(scheduler);
        let mut frames = 0;
        while self.timer.is_running() {
            let Some((request, timestamp)) = scheduler.next_frame() else {
                debug!("Scheduler has no more frames");
                break;
            };
            if self.frame(scheduler, request, timestamp, renderer).is_some() {
                frames += 1;
            }
            if self.world.take_stop_request() {
                self.stop(scheduler);
            }
        }
        if self.timer.is_running() {
            self.stop(scheduler);
        }
        frames
    }
}
