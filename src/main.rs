// Walker sandbox: a population of wandering walkers on a bounded floor.
// Opens a wgpu window with an egui panel by default; `--headless` runs a
// fixed number of ticks with recorded audio and prints where everyone ended up.

use anyhow::Context as _;
use clap::Parser;
use glam::{Mat4, Vec3};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wgpu::util::DeviceExt;
use winit::{
    event::{Event as WinitEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::KeyCode,
    window::Window,
};

use walker_sandbox::engine::camera::OrbitCamera;
use walker_sandbox::engine::input::InputState;
use walker_sandbox::engine::systems::PassReport;
use walker_sandbox::sandbox::assets::ManifestLoader;
use walker_sandbox::sandbox::audio::RecordingAudio;
use walker_sandbox::sandbox::panel::{NameTag, Panel, PanelView};
use walker_sandbox::sandbox::scene::{self, InstanceData};
use walker_sandbox::sandbox::{Command, SandboxConfig, Session, name_store};

const HEADLESS_DT: f32 = 1.0 / 60.0;
const LOAD_TIMEOUT: Duration = Duration::from_secs(10);
/// Click radius for picking, in physical pixels.
const PICK_RADIUS: f32 = 48.0;
const DEFAULT_SCATTER: usize = 6;
const FLOOR_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

#[derive(Parser, Debug)]
#[command(name = "walker-sandbox", about = "Wandering walkers with live-tunable steering")]
struct Cli {
    /// TOML config file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run without a window and print a summary.
    #[arg(long)]
    headless: bool,

    /// Ticks to simulate in headless mode (at 60 Hz).
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Walkers to spawn at start.
    #[arg(long, default_value_t = 3)]
    spawn: usize,

    /// Seed for spawn positions, speeds and audio variants.
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// VERTEX DEFINITION
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Unit cube centred on the origin, four vertices per face so each face
/// keeps a flat normal. Faces wind counter-clockwise seen from outside.
fn unit_cube() -> (Vec<Vertex>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for n in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
        let u = if n.x != 0.0 { Vec3::Z } else { Vec3::X };
        let v = n.cross(u);
        let base = vertices.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (n + u * su + v * sv) * 0.5;
            vertices.push(Vertex { position: p.to_array(), normal: n.to_array() });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
}

impl Uniforms {
    fn new(view_proj: Mat4) -> Self {
        let light = Vec3::new(0.4, 1.0, 0.3).normalize();
        Self { view_proj: view_proj.to_cols_array_2d(), light_dir: light.extend(0.0).to_array() }
    }
}

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

// ============================================================================
// VIEWER STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    depth_view: wgpu::TextureView,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    num_indices: u32,
    max_instances: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    session: Session,
    camera: OrbitCamera,
    input: InputState,
    panel: Panel,
    scatter_count: usize,
    last_update: Instant,
    fps: u32,
}

impl State {
    async fn new(window: Arc<Window>, session: Session, scatter_count: usize) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes.first().copied().unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_walkers.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[Uniforms::new(Mat4::IDENTITY)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("uniform_bind_group_layout"),
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc(), InstanceData::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let (cube_vertices, cube_indices) = unit_cube();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&cube_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(&cube_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        // Floor + obstacles + ~10 parts per walker leaves room for hundreds.
        let max_instances = 10000;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (max_instances * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let panel = Panel::new(&window, &device, config.format);
        let camera = OrbitCamera::new(session.population().arena().half);
        let mut input = InputState::new();
        input.window_size = (size.width, size.height);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth_view,
            render_pipeline,
            vertex_buffer,
            index_buffer,
            instance_buffer,
            num_indices: cube_indices.len() as u32,
            max_instances,
            uniform_buffer,
            uniform_bind_group,
            session,
            camera,
            input,
            panel,
            scatter_count,
            last_update: Instant::now(),
            fps: 0,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }
    }

    fn screen(&self) -> (f32, f32) {
        (self.size.width as f32, self.size.height as f32)
    }

    fn handle_hotkeys(&mut self) {
        if self.panel.wants_keyboard() {
            return;
        }
        let input = &self.input;
        let population = self.session.population();

        if input.was_pressed(KeyCode::Space) {
            self.session.send(Command::Spawn);
        }
        if input.was_pressed(KeyCode::KeyP) {
            let mut tuning = population.tuning();
            tuning.paused = !tuning.paused;
            self.session.send(Command::Retune(tuning));
        }
        if input.was_pressed(KeyCode::KeyF) {
            self.camera.follow = !self.camera.follow;
        }
        if input.was_pressed(KeyCode::KeyH) {
            self.panel.toggle();
        }
        if input.was_pressed(KeyCode::Escape) {
            self.session.send(Command::Select(None));
        }
        if input.was_pressed(KeyCode::Tab) {
            let ids: Vec<_> = population.walkers().iter().map(|w| w.id).collect();
            if !ids.is_empty() {
                let next = match population.selected().and_then(|id| ids.iter().position(|&i| i == id)) {
                    Some(pos) => ids[(pos + 1) % ids.len()],
                    None => ids[0],
                };
                self.session.send(Command::Select(Some(next)));
            }
        }
        if input.was_pressed(KeyCode::KeyO) {
            let count = if population.obstacles().is_empty() { self.scatter_count } else { 0 };
            self.session.send(Command::ScatterObstacles(count));
        }
        for (idx, key) in FLOOR_KEYS.iter().enumerate() {
            if input.was_pressed(*key) {
                self.session.send(Command::SelectFloor(idx));
            }
        }
    }

    fn handle_click(&mut self) {
        let Some(click) = self.input.click else {
            return;
        };
        if self.panel.wants_pointer() {
            return;
        }
        let screen = self.screen();
        let population = self.session.population();
        let ground_y = population.arena().ground_y;
        let candidates = population.entries().into_iter().filter_map(|(walker, body)| {
            let mid = body.map_or(0.5, |b| b.tag_height * 0.5);
            let centre = walker.position + Vec3::Y * (ground_y + mid);
            self.camera.project(centre, screen).map(|p| (walker.id, p))
        });
        let picked = scene::pick(candidates.collect::<Vec<_>>(), click, PICK_RADIUS);
        self.session.send(Command::Select(picked));
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32();
        self.last_update = now;

        self.handle_hotkeys();
        self.handle_click();

        self.session.frame(dt);

        let population = self.session.population();
        self.camera.bounds = population.arena().half;
        let followed = population
            .selected()
            .and_then(|id| population.walker(id))
            .map(|w| (w.position, w.yaw));
        self.camera.update(&self.input, dt, followed);
    }

    fn name_tags(&self) -> Vec<NameTag> {
        let screen = self.screen();
        let ppp = self.window.scale_factor() as f32;
        let population = self.session.population();
        let ground_y = population.arena().ground_y;
        let t = self.session.pose_time();
        let selected = population.selected();
        population
            .entries()
            .into_iter()
            .filter_map(|(walker, body)| {
                let anchor = scene::tag_anchor(walker, body, t, ground_y);
                let (x, y) = self.camera.project(anchor, screen)?;
                Some(NameTag {
                    pos: egui::pos2(x / ppp, y / ppp),
                    text: walker.name().to_string(),
                    selected: selected == Some(walker.id),
                })
            })
            .collect()
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let instance_data = scene::scene_instances(self.session.population(), self.session.pose_time());
        let instance_count = instance_data.len().min(self.max_instances);
        if instance_data.len() > self.max_instances {
            log::warn!("{} instances exceed the buffer; drawing {}", instance_data.len(), self.max_instances);
        }
        if instance_count > 0 {
            self.queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instance_data[..instance_count]));
        }

        let aspect = self.size.width as f32 / self.size.height.max(1) as f32;
        let uniforms = Uniforms::new(self.camera.view_projection(aspect));
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.53,
                            g: 0.72,
                            b: 0.9,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..self.num_indices, 0, 0..instance_count as u32);
        }

        let tags = self.name_tags();
        let population = self.session.population();
        let panel_view = PanelView {
            tuning: population.tuning(),
            floors: self.session.floors(),
            active_floor: population.arena().floor,
            walkers: population.walkers().iter().map(|w| (w.id, w.name().to_string())).collect(),
            selected: population.selected(),
            pending_loads: self.session.pending_loads(),
            follow: self.camera.follow,
            fps: self.fps,
        };
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        let commands = self.panel.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            &panel_view,
            &tags,
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        for command in commands {
            self.session.send(command);
        }
        Ok(())
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn run_headless(config: &SandboxConfig, base_dir: &Path, spawn: usize, ticks: u32) -> anyhow::Result<()> {
    let audio = RecordingAudio::new(&config.audio);
    let audio_log = audio.log();
    let mut session = Session::new(
        config,
        Arc::new(ManifestLoader::new(base_dir)),
        name_store(config, base_dir),
        Box::new(audio),
    )?;

    for _ in 0..spawn {
        session.send(Command::Spawn);
    }
    let spawned = session.finish_loads(LOAD_TIMEOUT);
    log::info!("spawned {spawned} of {spawn} walkers");

    let mut totals = PassReport::default();
    for _ in 0..ticks {
        if let Some(report) = session.frame(HEADLESS_DT) {
            totals += report;
        }
    }
    log::info!(
        "{ticks} ticks: {} retargets, {} footfalls, {} footsteps, {} failed steps",
        totals.retargeted,
        totals.footfalls,
        totals.footsteps_played,
        totals.failed
    );

    println!("after {:.1}s on a floor of half-extent {}", session.clock(), session.population().arena().half);
    for walker in session.population().walkers() {
        let footsteps = walker.foot.map_or(0, |foot| audio_log.plays_for(foot));
        println!(
            "{:>4} {:<24} at ({:6.2}, {:6.2}) heading {:5.2} footsteps {}",
            walker.id.to_string(),
            walker.name(),
            walker.position.x,
            walker.position.z,
            walker.yaw,
            footsteps
        );
    }
    Ok(())
}

fn run_viewer(config: &SandboxConfig, base_dir: &Path, spawn: usize) -> anyhow::Result<()> {
    let session = Session::from_config(config, base_dir)?;
    for _ in 0..spawn {
        session.send(Command::Spawn);
    }
    let scatter_count = config.obstacles.count.max(DEFAULT_SCATTER);

    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title("Walker Sandbox")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window.clone(), session, scatter_count))?;
    let mut frame_count = 0;
    let mut last_fps_update = Instant::now();

    event_loop.run(move |event, control_flow| match event {
        WinitEvent::WindowEvent { ref event, window_id } if window_id == window.id() => {
            let response = state.panel.handle_window_event(&window, event);
            match event {
                WindowEvent::CloseRequested => control_flow.exit(),
                WindowEvent::Resized(physical_size) => {
                    state.resize(*physical_size);
                    state.input.process_event(event);
                }
                WindowEvent::RedrawRequested => {
                    state.update();
                    match state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => state.resize(state.size),
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("surface out of memory");
                            control_flow.exit();
                        }
                        Err(e) => log::warn!("render: {e:?}"),
                    }
                    state.input.end_frame();

                    frame_count += 1;
                    let now = Instant::now();
                    if (now - last_fps_update).as_secs_f32() >= 1.0 {
                        state.fps = frame_count;
                        log::debug!("FPS: {} | Walkers: {}", frame_count, state.session.population().len());
                        frame_count = 0;
                        last_fps_update = now;
                    }
                }
                _ if !response.consumed => state.input.process_event(event),
                _ => {}
            }
        }
        WinitEvent::AboutToWait => {
            window.request_redraw();
        }
        _ => {}
    })?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = SandboxConfig::load_or_default(cli.config.as_deref())?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    let base_dir = cli
        .config
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();

    if cli.headless {
        run_headless(&config, &base_dir, cli.spawn, cli.ticks)
    } else {
        run_viewer(&config, &base_dir, cli.spawn)
    }
}
