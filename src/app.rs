use std::{mem, process, sync::Arc};

use anyhow::{bail, Context};
use bytemuck::NoUninit;
use wgpu::{
    AddressMode, Backends, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, BlendState,
    Buffer, BufferBindingType, BufferDescriptor, BufferUsages, Color, ColorTargetState,
    ColorWrites, CommandEncoder, CompositeAlphaMode, Device, DeviceDescriptor, Extent3d,
    FilterMode, FragmentState, InstanceDescriptor, LoadOp, MemoryHints, MultisampleState,
    Operations, Origin3d, PipelineCompilationOptions, PipelineLayoutDescriptor, PresentMode,
    PrimitiveState, PrimitiveTopology, Queue, RenderPass, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, RequestAdapterOptions,
    SamplerBindingType, SamplerDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages,
    Surface, SurfaceConfiguration, SurfaceError, SurfaceTarget, TexelCopyBufferLayout,
    TexelCopyTextureInfo, Texture, TextureAspect, TextureDescriptor, TextureDimension,
    TextureFormat, TextureSampleType, TextureUsages, TextureViewDimension, VertexState,
};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::ActiveEventLoop,
    window::{Fullscreen, Window, WindowId},
};

use crate::{
    config::{Config, WindowConfig},
    engine::{Engine, EngineState},
    input::Panel,
    math::{vec2, Vec2f, Vec2u},
    pointer::PointerEvent,
    preview::PREVIEW_SIZE,
    settings::Rgb,
    surface::{Pixmap, RasterSurface},
};

/// Top-left corner of the settings panel's preview.
const PREVIEW_POS: Vec2f = vec2(10.0, 10.0);

pub struct App {
    instance: wgpu::Instance,
    window_config: WindowConfig,
    engine: Engine<Pixmap>,
    panel: Panel,
    win: Option<Win>,
}

struct Gpu {
    device: Device,
    queue: Queue,
    /// Format of the window surface, used as the format of every render target.
    format: TextureFormat,
    alpha_mode: CompositeAlphaMode,

    render_pipeline: RenderPipeline,
    sampler_bg: BindGroup,

    texture_bgl: BindGroupLayout,
    uniforms_bgl: BindGroupLayout,
}

impl Gpu {
    fn new(
        instance: &wgpu::Instance,
        surface: &Surface<'_>,
        transparent: bool,
    ) -> anyhow::Result<Self> {
        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            compatible_surface: Some(surface),
            ..Default::default()
        }))
        .context("failed to find a supported graphics adapter")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let alpha_mode = if transparent {
            if !surface_caps
                .alpha_modes
                .contains(&CompositeAlphaMode::PreMultiplied)
            {
                bail!(
                    "transparent windows need alpha compositing mode {:?} (supported: {:?})",
                    CompositeAlphaMode::PreMultiplied,
                    surface_caps.alpha_modes,
                );
            }
            CompositeAlphaMode::PreMultiplied
        } else {
            CompositeAlphaMode::Auto
        };

        // Pixels are stored and blended in sRGB space, so prefer a format that passes them
        // through unchanged.
        let Some(&format) = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or(surface_caps.formats.first())
        else {
            bail!("window surface does not support any texture format");
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&DeviceDescriptor {
            memory_hints: MemoryHints::MemoryUsage,
            ..Default::default()
        }))?;

        // Shader
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        // BGLs
        let sampler_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("sampler"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                count: None,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
            }],
        });
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("texture"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                count: None,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
            }],
        });
        let uniforms_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("uniforms"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                count: None,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
            }],
        });

        // Pipeline.
        let render_pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("quad_pipeline"),
            layout: Some(&device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some("quad_pipeline"),
                bind_group_layouts: &[&sampler_bgl, &texture_bgl, &uniforms_bgl],
                ..Default::default()
            })),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vertex"),
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fragment"),
                compilation_options: PipelineCompilationOptions::default(),
                targets: &[Some(ColorTargetState {
                    format,
                    blend: Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: ColorWrites::all(),
                })],
            }),
            multiview: None,
            cache: None,
        });
        // Surfaces are shown 1:1, so there is nothing to filter.
        let sampler = device.create_sampler(&SamplerDescriptor {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            ..Default::default()
        });
        let sampler_bg = device.create_bind_group(&BindGroupDescriptor {
            label: Some("sampler"),
            layout: &sampler_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Sampler(&sampler),
            }],
        });

        Ok(Gpu {
            device,
            queue,
            format,
            alpha_mode,
            render_pipeline,
            sampler_bg,
            texture_bgl,
            uniforms_bgl,
        })
    }
}

struct Win {
    window: Arc<Window>,
    surface: Surface<'static>,
    gpu: Gpu,
    clear_color: Color,

    canvas: Drawable,
    preview: Drawable,

    cursor_pos: Option<Vec2f>,
}

impl Win {
    fn recreate_swapchain(&self) {
        let res = self.window.inner_size();

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.gpu.format,
            width: res.width.max(1),
            height: res.height.max(1),
            present_mode: PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: self.gpu.alpha_mode,
            view_formats: Vec::new(),
        };

        log::debug!(
            "configuring window surface for {}x{} (format: {:?}, present mode: {:?}, alpha mode: {:?})",
            config.width,
            config.height,
            config.format,
            config.present_mode,
            config.alpha_mode,
        );

        self.surface.configure(&self.gpu.device, &config);
    }

    fn redraw(&mut self, engine: &mut Engine<Pixmap>) {
        let st = match self.surface.get_current_texture() {
            Ok(st) => st,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.recreate_swapchain();
                self.surface
                    .get_current_texture()
                    .expect("failed to acquire next frame after recreating swapchain")
            }
            Err(SurfaceError::Timeout) => {
                log::warn!("timed out acquiring a frame, skipping redraw");
                return;
            }
            Err(e) => {
                panic!("failed to acquire frame: {}", e);
            }
        };

        if let Some(pixmap) = engine.surface_mut() {
            if pixmap.take_dirty() {
                self.canvas.upload(&self.gpu, pixmap);
            }
        }
        if let Some(pixmap) = engine.preview_mut().surface_mut() {
            if pixmap.take_dirty() {
                self.preview.upload(&self.gpu, pixmap);
            }
        }

        let mut enc = self.gpu.device.create_command_encoder(&Default::default());

        let state = engine.state();
        let mut pass = Pass::new(&self.gpu, &mut enc, &st.texture, self.clear_color);
        if state.surface_visible {
            self.canvas.draw(&mut pass);
        }
        if state.settings_open {
            self.preview.draw(&mut pass);
        }
        drop(pass);

        self.gpu.queue.submit([enc.finish()]);
        self.window.pre_present_notify();
        st.present();
    }

    fn pointer(&mut self, engine: &mut Engine<Pixmap>, event: PointerEvent) {
        engine.pointer(event);
        self.window.request_redraw();
    }
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let state = EngineState::default()
            .with_settings(config.pen.settings())
            .with_surface_visible(config.window.surface_visible);
        let panel = Panel::new(config.bindings(), config.palette);
        Ok(Self {
            instance: wgpu::Instance::new(&InstanceDescriptor {
                backends: Backends::PRIMARY,
                ..Default::default()
            }),
            window_config: config.window,
            engine: Engine::new(state),
            panel,
            win: None,
        })
    }

    fn create_win(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Win> {
        let wc = &self.window_config;
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_transparent(wc.transparent)
                    .with_fullscreen(wc.fullscreen.then_some(Fullscreen::Borderless(None)))
                    .with_title(wc.title.clone()),
            )?,
        );

        let surface = self
            .instance
            .create_surface(SurfaceTarget::from(window.clone()))?;
        let gpu = Gpu::new(&self.instance, &surface, wc.transparent)?;

        let clear_color = if wc.transparent {
            Color::TRANSPARENT
        } else {
            let [r, g, b] = wc.background.0.map(|c| f64::from(c) / 255.0);
            Color { r, g, b, a: 1.0 }
        };

        let canvas = Drawable::new(&gpu, viewport_size(&window), vec2(0.0, 0.0), [0.0; 4]);
        let preview = Drawable::new(&gpu, PREVIEW_SIZE, PREVIEW_POS, backdrop(Rgb([0xff; 3])));

        let win = Win {
            window,
            surface,
            gpu,
            clear_color,
            canvas,
            preview,
            cursor_pos: None,
        };
        win.recreate_swapchain();
        Ok(win)
    }
}

/// The drawable extent, fixed at window creation.
fn viewport_size(window: &Window) -> Vec2u {
    let size = window.inner_size();
    vec2(size.width.max(1), size.height.max(1))
}

fn backdrop(color: Rgb) -> [f32; 4] {
    let [r, g, b] = color.0.map(|c| f32::from(c) / 255.0);
    [r, g, b, 1.0]
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.win.is_none() {
            let win = match self.create_win(event_loop) {
                Ok(win) => win,
                Err(e) => {
                    eprintln!("could not create window: {e:#}");
                    process::exit(1);
                }
            };

            let size = viewport_size(&win.window);
            log::debug!(
                "creating canvas at {}x{}, format={:?}",
                size.x(),
                size.y(),
                win.gpu.format
            );
            self.engine.attach(Pixmap::new(size));
            self.engine.attach_preview(Pixmap::new(PREVIEW_SIZE));
            win.window.request_redraw();
            self.win = Some(win);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(win) = &mut self.win else { return };

        match event {
            WindowEvent::CloseRequested => {
                self.engine.detach();
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => win.redraw(&mut self.engine),
            WindowEvent::Resized(_) => {
                win.recreate_swapchain();
                win.window.request_redraw();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let pos = vec2(position.x as f32, position.y as f32);
                win.cursor_pos = Some(pos);
                win.pointer(&mut self.engine, PointerEvent::Move(pos));
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    if let Some(pos) = win.cursor_pos {
                        win.pointer(&mut self.engine, PointerEvent::Down(pos));
                    }
                }
                ElementState::Released => win.pointer(&mut self.engine, PointerEvent::Up),
            },
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(cmd) = self.panel.key_event(&event, self.engine.state()) {
                    log::debug!("{:?}", cmd);
                    self.engine.dispatch(cmd);
                    win.window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

#[derive(Clone, Copy, NoUninit)]
#[repr(C)]
struct Uniforms {
    rect: [f32; 4],
    backdrop: [f32; 4],
    render_target_size: Vec2u,
    _padding: [u32; 2],
}

struct Pass<'a> {
    gpu: &'a Gpu,
    pass: RenderPass<'a>,
    render_target_size: Vec2u,
}

impl<'a> Pass<'a> {
    fn new(gpu: &'a Gpu, enc: &'a mut CommandEncoder, target: &Texture, clear: Color) -> Self {
        let pass = enc.begin_render_pass(&RenderPassDescriptor {
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &target.create_view(&Default::default()),
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(clear),
                    ..Default::default()
                },
            })],
            ..Default::default()
        });

        Self {
            gpu,
            pass,
            render_target_size: vec2(target.width(), target.height()),
        }
    }
}

/// A CPU surface mirrored into a texture and drawn as a screen-space quad.
struct Drawable {
    texture: Texture,
    size: Vec2u,
    pos: Vec2f,
    backdrop: [f32; 4],
    uniform_buf: Buffer,
    texture_bg: BindGroup,
    uniforms_bg: BindGroup,
}

impl Drawable {
    fn new(gpu: &Gpu, size: Vec2u, pos: Vec2f, backdrop: [f32; 4]) -> Self {
        let texture = gpu.device.create_texture(&TextureDescriptor {
            label: None,
            size: Extent3d {
                width: size.x(),
                height: size.y(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let uniform_buf = gpu.device.create_buffer(&BufferDescriptor {
            label: None,
            size: mem::size_of::<Uniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let texture_bg = gpu.device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &gpu.texture_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&texture.create_view(&Default::default())),
            }],
        });
        let uniforms_bg = gpu.device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &gpu.uniforms_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(uniform_buf.as_entire_buffer_binding()),
            }],
        });

        Self {
            texture,
            size,
            pos,
            backdrop,
            uniform_buf,
            texture_bg,
            uniforms_bg,
        }
    }

    fn upload(&self, gpu: &Gpu, pixmap: &Pixmap) {
        if pixmap.size() != self.size {
            log::warn!("surface size does not match its texture, not uploading");
            return;
        }
        gpu.queue.write_texture(
            TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            pixmap.data(),
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.size.x() * 4),
                rows_per_image: Some(self.size.y()),
            },
            Extent3d {
                width: self.size.x(),
                height: self.size.y(),
                depth_or_array_layers: 1,
            },
        );
    }

    fn draw(&self, p: &mut Pass<'_>) {
        // Each drawable owns its uniform buffer and is drawn at most once per submission, so
        // writing it here is fine.
        let uniforms = Uniforms {
            rect: [
                self.pos.x(),
                self.pos.y(),
                self.size.x() as f32,
                self.size.y() as f32,
            ],
            backdrop: self.backdrop,
            render_target_size: p.render_target_size,
            _padding: [0; 2],
        };
        p.gpu
            .queue
            .write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&uniforms));

        p.pass.set_pipeline(&p.gpu.render_pipeline);
        p.pass.set_bind_group(0, &p.gpu.sampler_bg, &[]);
        p.pass.set_bind_group(1, &self.texture_bg, &[]);
        p.pass.set_bind_group(2, &self.uniforms_bg, &[]);
        p.pass.draw(0..4, 0..1);
    }
}
