//! Cadence demo runner.
//!
//! Spawns a handful of bouncing `mass` + `collider` boxes inside a walled
//! playfield and runs the frame loop headless against a recording renderer,
//! logging simulation steps, collisions and draw calls.
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --frames 300 --entities 24
//! RUST_LOG=debug cargo run -- --realtime --frames 120
//! ```

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use serde_json::json;

use cadence::components::collider::COLLIDER;
use cadence::components::mass::{APPLY_FORCE, MASS};
use cadence::events;
use cadence::resources::renderer::Recorder;
use cadence::resources::timer::{FrameScheduler, ManualScheduler, TickScheduler};
use cadence::{Engine, EngineConfig, EntityBuilder, EntityId, World};

#[derive(Parser, Debug)]
#[command(name = "cadence", version, about = "Headless entity-composition demo")]
struct Args {
    /// INI file with loop, world and view settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulation steps to run before stopping.
    #[arg(long, default_value_t = 240)]
    frames: usize,

    /// Number of bouncing boxes.
    #[arg(long, default_value_t = 16)]
    entities: usize,

    /// Simulation step in milliseconds; 0 for one variable step per frame.
    #[arg(long)]
    fixed_step: Option<f64>,

    /// Pace frames with a wall-clock ticker instead of scripted 60 Hz.
    #[arg(long)]
    realtime: bool,
}

const BOX_SIZE: f32 = 24.0;

fn spawn_box(world: &mut World, width: f32, height: f32, hits: Rc<Cell<usize>>) -> Option<EntityId> {
    let root = world.root();
    let x = fastrand::f32() * (width - BOX_SIZE);
    let y = fastrand::f32() * (height * 0.5);
    let launch = fastrand::f32() * 400.0 - 200.0;
    let builder = EntityBuilder::new()
        .behaviours([MASS, COLLIDER])
        .at(x, y)
        .size(BOX_SIZE, BOX_SIZE)
        .init(move |ctx| {
            ctx.call(APPLY_FORCE, &[json!(launch), json!(0)]);
        })
        .on(events::TICK, move |ctx, _ev| {
            let Some(e) = ctx.entity_mut() else {
                return;
            };
            let (w, h) = (e.width.unwrap_or(0.0), e.height.unwrap_or(0.0));
            if e.y + h > height && e.dy > 0.0 {
                e.y = height - h;
                e.dy = -e.dy * 0.8;
            }
            if (e.x < 0.0 && e.dx < 0.0) || (e.x + w > width && e.dx > 0.0) {
                e.dx = -e.dx;
            }
        })
        .on(events::RENDER, |ctx, ev| {
            let Some(bb) = ctx.entity().map(|e| e.bounding_box()) else {
                return;
            };
            if let Some(r) = ev.renderer() {
                r.set_fill_style("#3a6ea5");
                r.fill_rect(bb.x, bb.y, bb.width, bb.height);
            }
        })
        .on(events::COLLISION, move |_ctx, _ev| hits.set(hits.get() + 1));
    match world.spawn_child(root, builder) {
        Ok(id) => Some(id),
        Err(e) => {
            error!("Failed to spawn box: {}", e);
            None
        }
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::with_path(path),
        None => EngineConfig::new(),
    };
    if args.config.is_some() || config.config_path.exists() {
        if let Err(e) = config.load_from_file() {
            error!("{}", e);
        }
    }
    if let Some(step) = args.fixed_step {
        config.set_fixed_step(Some(step));
    }

    let (width, height) = (config.view_width as f32, config.view_height as f32);
    let mut engine = Engine::with_config(config);

    let hits = Rc::new(Cell::new(0));
    let boxes: Vec<EntityId> = (0..args.entities)
        .filter_map(|_| spawn_box(&mut engine.world, width, height, hits.clone()))
        .collect();
    if let Some(first) = boxes.first() {
        engine
            .world
            .call(*first, APPLY_FORCE, &[json!(0), json!(-900)]);
    }

    let steps = Rc::new(Cell::new(0usize));
    let counter = steps.clone();
    let limit = args.frames;
    let root = engine.world.root();
    engine.world.on(
        root,
        events::TICK,
        cadence::listener(move |ctx, _ev| {
            counter.set(counter.get() + 1);
            if counter.get() >= limit {
                ctx.world.request_stop();
            }
        }),
        None,
    );

    let mut renderer = Recorder::new();
    let mut scheduler: Box<dyn FrameScheduler> = if args.realtime {
        Box::new(TickScheduler::sixty_hertz())
    } else {
        Box::new(ManualScheduler::with_deltas(
            std::iter::repeat_n(1000.0 / 60.0, args.frames.saturating_mul(2)),
        ))
    };

    let handled = engine.run(scheduler.as_mut(), &mut renderer);
    info!(
        "Ran {} frames, {} steps, {:.3}s simulated",
        handled,
        steps.get(),
        engine.timestamp()
    );
    info!(
        "{} collision events, {} draw calls recorded, fps {}",
        hits.get(),
        renderer.draw_calls(),
        engine.fps()
    );
}
