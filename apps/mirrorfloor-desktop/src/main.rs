use anyhow::{Context, Result};
use clap::Parser;
use mirrorfloor_common::ReflectorConfig;
use mirrorfloor_material::ReflectorUniforms;
use mirrorfloor_render::{DemoScene, FrameOutcome, PassPipeline, Reflector, Scene};
use mirrorfloor_render_wgpu::{OrbitCamera, WgpuRenderer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "mirrorfloor-desktop", about = "Reflective floor demo")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Reflector config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Per-second frame counters, logged in place of an on-screen overlay.
#[derive(Debug)]
struct FrameStats {
    window_start: Instant,
    frames: u32,
    skipped: u32,
    degraded: u32,
}

impl FrameStats {
    const WINDOW: Duration = Duration::from_secs(1);

    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            skipped: 0,
            degraded: 0,
        }
    }

    /// Count a frame; returns the frame rate when a full window has elapsed.
    fn record(&mut self, outcome: &FrameOutcome, now: Instant) -> Option<f32> {
        self.frames += 1;
        match outcome {
            FrameOutcome::Rendered => {}
            FrameOutcome::Skipped(_) => self.skipped += 1,
            FrameOutcome::Degraded { .. } => self.degraded += 1,
        }
        let elapsed = now.duration_since(self.window_start);
        if elapsed < Self::WINDOW {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        tracing::info!(
            fps = format_args!("{fps:.1}"),
            skipped = self.skipped,
            degraded = self.degraded,
            "frame stats"
        );
        *self = Self::new(now);
        Some(fps)
    }
}

/// Application state.
struct AppState {
    demo: DemoScene,
    camera: OrbitCamera,
    pipeline: PassPipeline<Scene>,
    uniforms: ReflectorUniforms,
    config: ReflectorConfig,
    config_path: Option<PathBuf>,
    dragging: bool,
    started: Instant,
    stats: FrameStats,
}

impl AppState {
    fn new(config: ReflectorConfig, config_path: Option<PathBuf>) -> Result<Self> {
        let demo = DemoScene::new();
        let (pipeline, uniforms) = build_pipeline(&demo, &config)?;
        let now = Instant::now();

        Ok(Self {
            demo,
            camera: OrbitCamera::default(),
            pipeline,
            uniforms,
            config,
            config_path,
            dragging: false,
            started: now,
            stats: FrameStats::new(now),
        })
    }

    /// Re-read `--config` and rebuild the reflector from it.
    /// Returns the new texture size when it changed.
    fn reload_config(&mut self) -> Result<Option<(u32, u32)>> {
        let Some(path) = &self.config_path else {
            tracing::info!("no --config given, nothing to reload");
            return Ok(None);
        };
        let config = ReflectorConfig::load(path).with_context(|| format!("reloading {}", path.display()))?;
        let (pipeline, uniforms) = build_pipeline(&self.demo, &config)?;
        let old_size = (self.config.texture_width, self.config.texture_height);
        let new_size = (config.texture_width, config.texture_height);
        self.pipeline = pipeline;
        self.uniforms = uniforms;
        self.config = config;
        tracing::info!(width = new_size.0, height = new_size.1, "reflector config reloaded");
        Ok((old_size != new_size).then_some(new_size))
    }

    fn handle_key(&mut self, key: KeyCode, event_loop: &ActiveEventLoop) {
        match key {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::KeyB => {
                let configured = self.config.blur.radius;
                if let Some(blur) = self.pipeline.blur_settings_mut() {
                    blur.radius = if blur.radius > 0.0 { 0.0 } else { configured };
                    tracing::info!(radius = blur.radius, "reflection blur toggled");
                }
            }
            KeyCode::KeyR => {
                self.camera = OrbitCamera {
                    aspect: self.camera.aspect,
                    ..OrbitCamera::default()
                };
            }
            _ => {}
        }
    }
}

/// Reflector passes for `demo`; the hooks hide the floor from its own reflection.
fn build_pipeline(demo: &DemoScene, config: &ReflectorConfig) -> Result<(PassPipeline<Scene>, ReflectorUniforms)> {
    let reflector = Reflector::from_transform(config, &demo.floor_transform())?;
    let floor = demo.floor;
    let parts = reflector.split(
        move |scene: &mut Scene| {
            scene.set_visible(floor, false);
        },
        move |scene: &mut Scene| {
            scene.set_visible(floor, true);
        },
    );
    Ok(parts.into_pipeline()?)
}

struct GpuContext {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
}

impl GpuContext {
    fn new(event_loop: &ActiveEventLoop, reflector: &ReflectorConfig) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("mirrorfloor")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone()).context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("find adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("mirrorfloor_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .context("surface has no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = WgpuRenderer::new(&device, &queue, surface_format, config.width, config.height, reflector)?;

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
        })
    }

    fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<GpuContext>,
}

impl GpuApp {
    fn reload(&mut self) {
        match self.state.reload_config() {
            Ok(Some((width, height))) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.renderer.resize_reflection(width, height);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("config reload failed, keeping current reflector: {e:#}"),
        }
    }

    fn redraw(&mut self) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        let state = &mut self.state;

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        state.demo.animate(state.started.elapsed().as_secs_f32());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("reflection_encoder"),
            });
        let report = {
            let mut executor = gpu
                .renderer
                .reflection_executor(&gpu.device, &gpu.queue, &mut encoder);
            state.pipeline.run_frame(
                &state.camera.camera_state(),
                &mut state.demo.scene,
                &mut executor,
                &mut state.uniforms,
            )
        };
        gpu.queue.submit(std::iter::once(encoder.finish()));

        gpu.renderer.render(
            &gpu.device,
            &gpu.queue,
            &view,
            &state.camera,
            &state.demo.scene,
            &state.uniforms,
        );
        output.present();

        state.stats.record(&report.outcome, Instant::now());
        gpu.window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match GpuContext::new(event_loop, &self.state.config) {
            Ok(gpu) => {
                self.state.camera.aspect = gpu.aspect();
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!("failed to initialize GPU: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.config.width = new_size.width.max(1);
                    gpu.config.height = new_size.height.max(1);
                    gpu.surface.configure(&gpu.device, &gpu.config);
                    gpu.renderer
                        .resize(&gpu.device, gpu.config.width, gpu.config.height);
                    self.state.camera.aspect = gpu.aspect();
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if key == KeyCode::F5 {
                    self.reload();
                } else {
                    self.state.handle_key(key, event_loop);
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: btn_state,
                ..
            } => {
                self.state.dragging = btn_state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 50.0,
                };
                self.state.camera.zoom(amount);
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.dragging {
                self.state.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => ReflectorConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ReflectorConfig::default(),
    };
    let config_path = cli.config;
    tracing::info!(
        width = config.texture_width,
        height = config.texture_height,
        "mirrorfloor-desktop starting"
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp {
        state: AppState::new(config, config_path)?,
        gpu: None,
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorfloor_render::{DebugExecutor, PassKind};

    #[test]
    fn stats_report_once_per_window() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);
        for i in 1..60 {
            let at = start + Duration::from_millis(i * 10);
            assert!(stats.record(&FrameOutcome::Rendered, at).is_none());
        }
        let fps = stats
            .record(&FrameOutcome::Rendered, start + Duration::from_secs(1))
            .unwrap();
        assert!((fps - 60.0).abs() < 1e-3);
        assert_eq!(stats.frames, 0);
    }

    #[test]
    fn app_state_renders_reflection_frames() {
        let mut state = AppState::new(ReflectorConfig::default(), None).unwrap();
        let mut exec = DebugExecutor::new();
        let report = state.pipeline.run_frame(
            &state.camera.camera_state(),
            &mut state.demo.scene,
            &mut exec,
            &mut state.uniforms,
        );
        assert_eq!(report.outcome, FrameOutcome::Rendered);
        assert_eq!(report.executed.first(), Some(&PassKind::BeforeHook));
        assert!(state.demo.scene.is_visible(state.demo.floor));
        assert!(state.uniforms.t_diffuse.is_some());
    }

    #[test]
    fn reload_reports_texture_size_changes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"texture_width": 512, "texture_height": 512}"#).unwrap();
        let config = ReflectorConfig::load(file.path()).unwrap();
        let mut state = AppState::new(config, Some(file.path().to_path_buf())).unwrap();
        assert_eq!(state.reload_config().unwrap(), None);

        std::fs::write(file.path(), r#"{"texture_width": 256, "texture_height": 128, "depth_pass": false}"#).unwrap();
        assert_eq!(state.reload_config().unwrap(), Some((256, 128)));
        assert!(!state.pipeline.kinds().contains(&PassKind::Depth));
        assert_eq!(state.pipeline.state().plane().width(), 256);
    }

    #[test]
    fn failed_reload_keeps_reflector() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{}").unwrap();
        let mut state = AppState::new(ReflectorConfig::default(), Some(file.path().to_path_buf())).unwrap();
        std::fs::write(file.path(), r#"{"texture_width": 0}"#).unwrap();
        assert!(state.reload_config().is_err());
        assert_eq!(state.config, ReflectorConfig::default());
        assert!(state.pipeline.kinds().contains(&PassKind::Depth));
    }
}
