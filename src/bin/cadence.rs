//! Cadence runtime.
//!
//! Drives the frame orchestrator for `--frames` frames at `--fps`, with a
//! small set of demonstration modules: a game-state module exercising the
//! simulation, seed-management, snapshot, and parallel phases; a render
//! module contributing the canonical forward pipeline to the frame graph;
//! and a telemetry module running as async + detached background work.
//!
//! Exit code 0 on normal completion, non-zero on argument or
//! initialization errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;
use rand::{RngExt, SeedableRng, rngs::StdRng};

use cadence::content::{AssetLoader, AssetLoaderConfig};
use cadence::errors::Result;
use cadence::frame::{EngineProps, FrameContext, FrameOrchestrator, FrameSnapshot, ModulePhases};
use cadence::gfx::{GraphicsLayer, RenderSurface};
use cadence::graph::{
    PassCost, PassScope, ResourceLifetime, ResourceScope, ResourceState, TextureDesc,
    TextureFormat, TextureUsage, ViewContext,
};
use cadence::module::{EngineModule, ModuleManager, ModulePriority};

#[derive(Parser)]
#[command(name = "cadence", version, about = "Cadence frame-orchestration runtime")]
struct Cli {
    /// Number of frames to run.
    #[arg(long)]
    frames: u32,

    /// Target frames per second; 0 runs uncapped.
    #[arg(long, default_value_t = 0)]
    fps: u32,
}

// ============================================================================
// Game state module
// ============================================================================

/// Synthetic gameplay: spawns and despawns entities, reseeds its RNG each
/// frame for determinism, publishes the snapshot, and checks it from the
/// parallel phase.
struct GameStateModule {
    rng: StdRng,
    entity_count: u32,
    parallel_checksum: AtomicU64,
}

impl GameStateModule {
    fn new() -> Self {
        Self {
            rng: StdRng::seed_from_u64(0),
            entity_count: 64,
            parallel_checksum: AtomicU64::new(0),
        }
    }
}

impl EngineModule for GameStateModule {
    fn name(&self) -> &str {
        "game-state"
    }

    fn priority(&self) -> ModulePriority {
        ModulePriority::HIGH
    }

    fn supported_phases(&self) -> ModulePhases {
        ModulePhases::GAMEPLAY
            | ModulePhases::RANDOM_SEED_MANAGEMENT
            | ModulePhases::SNAPSHOT_BUILD
            | ModulePhases::PARALLEL_WORK
    }

    fn on_gameplay(&mut self, _ctx: &mut FrameContext) -> Result<()> {
        let spawned = self.rng.random_range(0..4u32);
        let despawned = self.rng.random_range(0..3u32).min(self.entity_count);
        self.entity_count = self.entity_count + spawned - despawned;
        Ok(())
    }

    fn on_random_seed_management(&mut self, ctx: &mut FrameContext) -> Result<()> {
        // Reseed from the frame index so replays are deterministic.
        self.rng = StdRng::seed_from_u64(ctx.frame_index());
        Ok(())
    }

    fn on_snapshot_build(&mut self, ctx: &mut FrameContext) -> Result<()> {
        let mut snapshot = FrameSnapshot::new(ctx.frame_index());
        snapshot.insert("entity_count", self.entity_count);
        ctx.publish_snapshot(snapshot);
        Ok(())
    }

    fn on_parallel_work(&self, ctx: &FrameContext) -> Result<()> {
        if let Some(snapshot) = ctx.snapshot() {
            let entities = snapshot.get::<u32>("entity_count").copied().unwrap_or(0);
            self.parallel_checksum
                .fetch_add(u64::from(entities), Ordering::Relaxed);
        }
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut FrameContext) -> Result<()> {
        log::info!(
            "game-state: {} entities live, parallel checksum {}",
            self.entity_count,
            self.parallel_checksum.load(Ordering::Relaxed)
        );
        Ok(())
    }
}

// ============================================================================
// Render module
// ============================================================================

/// Contributes the forward pipeline to the frame graph each frame.
struct RenderModule;

impl EngineModule for RenderModule {
    fn name(&self) -> &str {
        "renderer"
    }

    fn priority(&self) -> ModulePriority {
        ModulePriority::NORMAL
    }

    fn supported_phases(&self) -> ModulePhases {
        ModulePhases::FRAME_GRAPH
    }

    fn on_frame_graph(&mut self, ctx: &mut FrameContext) -> Result<()> {
        let Some(builder) = ctx.render_graph_builder() else {
            return Ok(());
        };

        let color_usage = TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE;
        let depth = builder.create_texture(
            "scene_depth",
            TextureDesc::d2(1920, 1080, TextureFormat::Depth32Float, TextureUsage::DEPTH_STENCIL),
            ResourceLifetime::FrameLocal,
            ResourceScope::Shared,
        );
        let hdr = builder.create_texture(
            "hdr_color",
            TextureDesc::d2(1920, 1080, TextureFormat::Rgba16Float, color_usage),
            ResourceLifetime::FrameLocal,
            ResourceScope::Shared,
        );
        let lit = builder.create_texture(
            "lit_color",
            TextureDesc::d2(1920, 1080, TextureFormat::Rgba16Float, color_usage),
            ResourceLifetime::FrameLocal,
            ResourceScope::Shared,
        );
        let ldr = builder.create_texture(
            "ldr_color",
            TextureDesc::d2(1920, 1080, TextureFormat::Rgba8Unorm, color_usage),
            ResourceLifetime::FrameLocal,
            ResourceScope::Shared,
        );
        let backbuffer = builder.create_surface_target("backbuffer", 0);

        builder.add_raster_pass("depth_prepass", |p| {
            p.write(depth, ResourceState::DepthWrite)
                .set_estimated_cost(PassCost {
                    cpu_us: 200,
                    gpu_us: 400,
                    memory_bytes: 0,
                })
                .set_executor(|ctx| {
                    log::trace!("recording {}", ctx.pass_name);
                    Ok(())
                })
        });
        builder.add_raster_pass("opaque", |p| {
            p.read(depth, ResourceState::DepthRead)
                .outputs(hdr)
                .set_estimated_cost(PassCost {
                    cpu_us: 600,
                    gpu_us: 900,
                    memory_bytes: 0,
                })
                .set_executor(|ctx| {
                    log::trace!("recording {}", ctx.pass_name);
                    Ok(())
                })
        });
        builder.add_raster_pass("transparency", |p| {
            p.read(depth, ResourceState::DepthRead)
                .outputs(hdr)
                .set_estimated_cost(PassCost {
                    cpu_us: 300,
                    gpu_us: 450,
                    memory_bytes: 0,
                })
                .set_executor(|ctx| {
                    log::trace!("recording {}", ctx.pass_name);
                    Ok(())
                })
        });
        builder.add_raster_pass("lighting", |p| {
            p.reads(hdr)
                .outputs(lit)
                .set_estimated_cost(PassCost {
                    cpu_us: 400,
                    gpu_us: 600,
                    memory_bytes: 0,
                })
                .set_executor(|ctx| {
                    log::trace!("recording {}", ctx.pass_name);
                    Ok(())
                })
        });
        builder.add_raster_pass("post", |p| {
            p.reads(lit)
                .outputs(ldr)
                .set_estimated_cost(PassCost {
                    cpu_us: 250,
                    gpu_us: 350,
                    memory_bytes: 0,
                })
                .set_executor(|ctx| {
                    log::trace!("recording {}", ctx.pass_name);
                    Ok(())
                })
        });
        builder.add_raster_pass("ui", |p| {
            p.set_scope(PassScope::PerView)
                .reads(ldr)
                .outputs(backbuffer)
                .set_estimated_cost(PassCost {
                    cpu_us: 150,
                    gpu_us: 200,
                    memory_bytes: 0,
                })
                .set_executor(|ctx| {
                    log::trace!("recording {}", ctx.pass_name);
                    Ok(())
                })
        });
        Ok(())
    }
}

// ============================================================================
// Telemetry module
// ============================================================================

/// Background counters ticked as async and detached work.
struct TelemetryModule {
    frames_seen: AtomicU64,
}

impl EngineModule for TelemetryModule {
    fn name(&self) -> &str {
        "telemetry"
    }

    fn priority(&self) -> ModulePriority {
        ModulePriority::BACKGROUND
    }

    fn supported_phases(&self) -> ModulePhases {
        ModulePhases::ASYNC_WORK | ModulePhases::DETACHED_WORK
    }

    fn on_async_work(&mut self, _ctx: &mut FrameContext) -> Result<()> {
        let seen = self.frames_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % 60 == 0 {
            log::info!("telemetry: {seen} frames observed");
        }
        Ok(())
    }

    fn on_detached_work(&self, _ctx: &FrameContext) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Entry point
// ============================================================================

fn run(cli: &Cli) -> Result<()> {
    let pool = Arc::new(cadence::tasks::TaskPool::new(0)?);
    let graphics = Arc::new(GraphicsLayer::new());
    graphics.add_surface(RenderSurface::new("main"));
    graphics.add_view(ViewContext::named("main"));

    let loader = Arc::new(AssetLoader::new(AssetLoaderConfig::default())?);
    loader.register_default_loaders();

    let mut manager = ModuleManager::new();
    manager.register(Box::new(GameStateModule::new()));
    manager.register(Box::new(RenderModule));
    manager.register(Box::new(TelemetryModule {
        frames_seen: AtomicU64::new(0),
    }));

    let mut orchestrator = FrameOrchestrator::new(
        manager,
        pool,
        graphics,
        EngineProps {
            target_fps: cli.fps,
        },
    )
    .with_loader(loader);

    orchestrator.run(cli.frames)?;

    if let Some(metrics) = orchestrator.last_metrics() {
        log::info!(
            "final frame: {:?} cpu, {} parallel job(s)",
            metrics.frame_cpu_time,
            metrics.parallel_jobs
        );
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("cadence: {e}");
        std::process::exit(1);
    }
}
