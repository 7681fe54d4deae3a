use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::{Mat4, Vec3};
use mirrorfloor_common::{ReflectorConfig, Transform};
use mirrorfloor_material::{patch_shader, MaterialDescriptor, ReflectorBindings};
use mirrorfloor_reflect::{CameraState, FrameContext, ReflectivePlane};
use mirrorfloor_render::{DebugExecutor, DemoScene, FrameOutcome, PassKind, Reflector, Scene};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mirrorfloor-cli", about = "CLI tool for mirrorfloor operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Reflector config (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and the active reflector config
    Info,
    /// Compute the mirror camera and texture matrix for one camera pose
    Mirror {
        /// Camera position as x,y,z
        #[arg(long, default_value = "0,2,5", value_parser = parse_vec3, allow_hyphen_values = true)]
        eye: Vec3,
        /// Point the camera looks at as x,y,z
        #[arg(long, default_value = "0,0,0", value_parser = parse_vec3, allow_hyphen_values = true)]
        target: Vec3,
        /// Height of the horizontal floor plane
        #[arg(long, default_value = "-1.5", allow_hyphen_values = true)]
        floor: f32,
        /// World point to project into reflection UV space, as x,y,z
        #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
        probe: Option<Vec3>,
    },
    /// Dry-run reflection frames against the demo scene without a GPU
    Frames {
        /// Number of frames to run
        #[arg(short, long, default_value = "3")]
        count: u32,
        /// Pass that fails (reflection, depth, blur or save)
        #[arg(long, value_parser = parse_pass)]
        fail_pass: Option<PassKind>,
        /// Frame on which `--fail-pass` fails; every frame when omitted
        #[arg(long)]
        fail_frame: Option<u32>,
        /// Print the recorded pass trace
        #[arg(long)]
        trace: bool,
    },
    /// Print the floor shader after the reflection patch
    Shader,
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got {s:?}")),
    }
}

fn parse_pass(s: &str) -> Result<PassKind, String> {
    PassKind::ORDER
        .into_iter()
        .filter(|kind| !kind.is_hook())
        .find(|kind| kind.name() == s)
        .ok_or_else(|| format!("unknown pass {s:?}"))
}

fn projection() -> Mat4 {
    Mat4::perspective_rh(75.0_f32.to_radians(), 16.0 / 9.0, 0.1, 100.0)
}

/// Camera circling the scene at a fixed height, one step per frame.
fn orbit_camera(frame: u32) -> CameraState {
    let angle = frame as f32 * 0.1;
    let eye = Vec3::new(angle.sin() * 5.0, 1.0, angle.cos() * 5.0);
    CameraState::look_at(eye, Vec3::ZERO, projection())
}

fn run_mirror(config: &ReflectorConfig, eye: Vec3, target: Vec3, floor: f32, probe: Option<Vec3>) -> anyhow::Result<()> {
    let plane = ReflectivePlane::new(
        Vec3::new(0.0, floor, 0.0),
        Vec3::Y,
        config.texture_width,
        config.texture_height,
    )?;
    let ctx = FrameContext {
        camera: CameraState::look_at(eye, target, projection()),
        plane,
        clip_bias: config.clip_bias,
    };
    println!("Camera: eye={eye}, target={target}, floor y={floor}");

    let update = match mirrorfloor_reflect::update(&ctx) {
        Ok(update) => update,
        Err(reason) => {
            println!("Skipped: {reason}");
            return Ok(());
        }
    };
    println!("Mirror position: {}", update.mirror.position);
    println!("Texture matrix (columns):");
    for col in update.texture_matrix.to_cols_array_2d() {
        println!("  [{:>9.4} {:>9.4} {:>9.4} {:>9.4}]", col[0], col[1], col[2], col[3]);
    }
    if let Some(point) = probe {
        match update.texture_matrix.uv(point) {
            Some(uv) => println!("Probe {point} -> uv ({:.4}, {:.4})", uv.x, uv.y),
            None => println!("Probe {point} is behind the mirror camera"),
        }
    }
    Ok(())
}

fn run_frames(
    config: &ReflectorConfig,
    count: u32,
    fail_pass: Option<PassKind>,
    fail_frame: Option<u32>,
    trace: bool,
) -> anyhow::Result<Vec<FrameOutcome>> {
    let mut demo = DemoScene::new();
    let floor = demo.floor;
    let reflector = Reflector::from_transform(config, &demo.floor_transform())?;
    let parts = reflector.split(
        move |scene: &mut Scene| {
            scene.set_visible(floor, false);
        },
        move |scene: &mut Scene| {
            scene.set_visible(floor, true);
        },
    );
    let (mut pipeline, mut uniforms) = parts.into_pipeline()?;
    println!("Passes: {}", pipeline.kinds().iter().map(|k| k.name()).collect::<Vec<_>>().join(" -> "));

    let mut executor = DebugExecutor::new();
    let mut outcomes = Vec::with_capacity(count as usize);
    for frame in 0..count {
        let failing = fail_pass.filter(|_| fail_frame.is_none_or(|f| f == frame));
        executor.fail_on(failing);
        demo.animate(frame as f32 / 60.0);

        let report = pipeline.run_frame(&orbit_camera(frame), &mut demo.scene, &mut executor, &mut uniforms);
        let saved = uniforms
            .t_diffuse
            .map_or_else(|| "none".to_string(), |id| format!("#{}", id.0));
        match &report.outcome {
            FrameOutcome::Rendered => println!("Frame {}: rendered, t_diffuse={saved}", report.frame),
            FrameOutcome::Skipped(reason) => println!("Frame {}: skipped ({reason})", report.frame),
            FrameOutcome::Degraded { pass, error } => {
                println!("Frame {}: degraded at {pass} ({error}), t_diffuse={saved}", report.frame)
            }
        }
        if trace {
            for line in executor.take_trace() {
                println!("  {line}");
            }
        }
        outcomes.push(report.outcome);
    }
    Ok(outcomes)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => ReflectorConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ReflectorConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("mirrorfloor-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("render: {}", mirrorfloor_render::crate_info());
            println!(
                "reflector: {}x{}, color={:#08x}, intensity={}, clip_bias={}",
                config.texture_width, config.texture_height, config.color, config.intensity, config.clip_bias
            );
            println!(
                "passes: depth={}, blur radius={} iterations={}",
                config.depth_pass, config.blur.radius, config.blur.iterations
            );
            let floor = DemoScene::new().floor_transform();
            println!("floor: {}", describe(&floor));
        }
        Commands::Mirror {
            eye,
            target,
            floor,
            probe,
        } => run_mirror(&config, eye, target, floor, probe)?,
        Commands::Frames {
            count,
            fail_pass,
            fail_frame,
            trace,
        } => {
            let outcomes = run_frames(&config, count, fail_pass, fail_frame, trace)?;
            let degraded = outcomes
                .iter()
                .filter(|o| matches!(o, FrameOutcome::Degraded { .. }))
                .count();
            println!("{} frames, {degraded} degraded", outcomes.len());
        }
        Commands::Shader => {
            let base = MaterialDescriptor::physical();
            let bindings = ReflectorBindings::after(&base);
            let patched = patch_shader(&base, &bindings)?;
            println!("{}", patched.source);
        }
    }

    Ok(())
}

fn describe(transform: &Transform) -> String {
    format!("position={}, scale={}", transform.position, transform.scale)
}
