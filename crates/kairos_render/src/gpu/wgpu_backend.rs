//! wgpu Backend
//!
//! Hardware implementation of [`GpuDevice`] + [`GpuBackend`].
//!
//! wgpu hides semaphores and fences behind its queue, so the per-slot
//! primitives are modelled as follows:
//!
//! - fence: the [`wgpu::SubmissionIndex`] of the slot's last submission;
//!   waiting polls the device until that submission has completed
//! - image-available: the slot holds an acquired [`wgpu::SurfaceTexture`]
//! - render-finished: the slot's submission was queued and the texture may
//!   be presented
//!
//! `BlitToSurface` is encoded as a fullscreen-triangle pass that samples the
//! source image into the surface texture, with one pipeline cached per
//! surface format.

use std::borrow::Cow;
use std::num::NonZeroU32;

use kairos_core::{KairosError, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use super::resource::{BindingKind, BoundResource, ImageFormat, ResourceDesc, ResourceHandle, ResourceUsage};
use super::{Acquire, Extent2d, GpuBackend, GpuDevice, Present, SurfaceImage};
use crate::command::{Command, CommandStream, LoadOp};
use crate::slot::FrameSlot;

const BLIT_WGSL: &str = r"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var pos = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 3.0, -1.0),
        vec2<f32>(-1.0,  3.0)
    );
    var out: VertexOutput;
    out.position = vec4<f32>(pos[vertex_index], 0.0, 1.0);
    out.uv = pos[vertex_index] * 0.5 + 0.5;
    out.uv.y = 1.0 - out.uv.y;
    return out;
}

@group(0) @binding(0) var t_source: texture_2d<f32>;
@group(0) @binding(1) var s_source: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(t_source, s_source, in.uv);
}
";

enum GpuResource {
    Buffer(wgpu::Buffer),
    Image { view: wgpu::TextureView, _texture: wgpu::Texture },
    BindingLayout { layout: wgpu::BindGroupLayout, entries: Vec<BindingKind> },
    BindingTable(wgpu::BindGroup),
    PipelineLayout(wgpu::PipelineLayout),
    Shader(wgpu::ShaderModule),
    Pipeline(wgpu::RenderPipeline),
}

#[derive(Default)]
struct SlotSync {
    /// Fence: the last submission of the slot, until it has been waited on.
    submission: Option<wgpu::SubmissionIndex>,
    fence_reset: bool,
    /// Image-available: the surface image held by the slot.
    acquired: Option<u32>,
    /// Render-finished.
    submitted: bool,
}

struct AcquiredImage {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    suboptimal: bool,
}

/// Fullscreen blit pipelines keyed by target format.
struct SurfaceBlitter {
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    shader: wgpu::ShaderModule,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl SurfaceBlitter {
    fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Surface Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(BLIT_WGSL)),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Blit Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Surface Blit Pipeline Layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });
        Self { layout, pipeline_layout, shader, pipelines: FxHashMap::default() }
    }

    fn pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        self.pipelines
            .entry(format)
            .or_insert_with(|| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&format!("Surface Blit Pipeline {format:?}")),
                    layout: Some(&self.pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &self.shader,
                        entry_point: Some("vs_main"),
                        buffers: &[],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &self.shader,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
            })
            .clone()
    }
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    pending_extent: Option<Extent2d>,
    resources: SlotMap<ResourceHandle, GpuResource>,
    sampler: wgpu::Sampler,
    blitter: SurfaceBlitter,
    sync: Vec<Option<SlotSync>>,
    acquired: FxHashMap<u32, AcquiredImage>,
    next_image: u32,
}

impl WgpuBackend {
    /// Blocking constructor; see [`WgpuBackend::new_async`].
    pub fn new<W>(window: W, extent: Extent2d) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        pollster::block_on(Self::new_async(window, extent))
    }

    pub async fn new_async<W>(window: W, extent: Extent2d) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|e| KairosError::DeviceCreateFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| KairosError::AdapterRequestFailed(e.to_string()))?;

        // The scene pass indexes a sampled image array per material.
        let required_features = wgpu::Features::TEXTURE_BINDING_ARRAY
            | wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING;
        if !adapter.features().contains(required_features) {
            return Err(KairosError::AdapterRequestFailed(format!(
                "adapter lacks required features {:?}",
                required_features - adapter.features()
            )));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Kairos Device"),
                required_features,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| KairosError::DeviceCreateFailed(e.to_string()))?;

        let extent = extent.clamped();
        let config = surface
            .get_default_config(&adapter, extent.width, extent.height)
            .ok_or_else(|| KairosError::DeviceCreateFailed("Surface not supported by adapter".to_string()))?;
        surface.configure(&device, &config);
        log::info!("wgpu backend on '{}' ({:?})", adapter.get_info().name, config.format);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        let blitter = SurfaceBlitter::new(&device);

        Ok(Self {
            device,
            queue,
            surface,
            config,
            pending_extent: None,
            resources: SlotMap::with_key(),
            sampler,
            blitter,
            sync: Vec::new(),
            acquired: FxHashMap::default(),
            next_image: 0,
        })
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn texture_format(&self, format: ImageFormat) -> wgpu::TextureFormat {
        match format {
            ImageFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            ImageFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ImageFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            ImageFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            ImageFormat::Surface => self.config.format,
        }
    }

    fn sync_mut(&mut self, slot: FrameSlot) -> Result<&mut SlotSync> {
        let frames_in_flight = self.sync.len();
        self.sync
            .get_mut(slot.index())
            .and_then(Option::as_mut)
            .ok_or(KairosError::SlotOutOfRange { slot: slot.index(), frames_in_flight })
    }

    fn unknown(handle: ResourceHandle) -> KairosError {
        KairosError::UnknownResource(format!("{handle:?}"))
    }

    fn view(&self, handle: ResourceHandle) -> Result<&wgpu::TextureView> {
        match self.resources.get(handle) {
            Some(GpuResource::Image { view, .. }) => Ok(view),
            _ => Err(Self::unknown(handle)),
        }
    }

    fn buffer(&self, handle: ResourceHandle) -> Result<&wgpu::Buffer> {
        match self.resources.get(handle) {
            Some(GpuResource::Buffer(buffer)) => Ok(buffer),
            _ => Err(Self::unknown(handle)),
        }
    }

    fn create_bind_group(&self, label: &str, layout: ResourceHandle, bound: &[BoundResource]) -> Result<wgpu::BindGroup> {
        let Some(GpuResource::BindingLayout { layout, .. }) = self.resources.get(layout) else {
            return Err(Self::unknown(layout));
        };

        enum Resolved<'a> {
            Buffer(&'a wgpu::Buffer),
            View(&'a wgpu::TextureView),
            Views(Vec<&'a wgpu::TextureView>),
            Sampler,
        }
        let resolved = bound
            .iter()
            .map(|resource| {
                Ok(match resource {
                    BoundResource::Buffer(h) => Resolved::Buffer(self.buffer(*h)?),
                    BoundResource::Image(h) => Resolved::View(self.view(*h)?),
                    BoundResource::ImageArray(handles) => {
                        Resolved::Views(handles.iter().map(|h| self.view(*h)).collect::<Result<_>>()?)
                    }
                    BoundResource::Sampler => Resolved::Sampler,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let entries: Vec<wgpu::BindGroupEntry<'_>> = resolved
            .iter()
            .zip(0u32..)
            .map(|(resource, binding)| wgpu::BindGroupEntry {
                binding,
                resource: match resource {
                    Resolved::Buffer(buffer) => buffer.as_entire_binding(),
                    Resolved::View(view) => wgpu::BindingResource::TextureView(view),
                    Resolved::Views(views) => wgpu::BindingResource::TextureViewArray(views),
                    Resolved::Sampler => wgpu::BindingResource::Sampler(&self.sampler),
                },
            })
            .collect();

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        }))
    }

    fn create_render_pipeline(&self, desc: &super::PipelineDesc) -> Result<wgpu::RenderPipeline> {
        let Some(GpuResource::PipelineLayout(layout)) = self.resources.get(desc.layout) else {
            return Err(Self::unknown(desc.layout));
        };
        let Some(GpuResource::Shader(module)) = self.resources.get(desc.shader) else {
            return Err(Self::unknown(desc.shader));
        };

        let blend = if desc.alpha_blend {
            Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING)
        } else {
            Some(wgpu::BlendState::REPLACE)
        };
        let depth_stencil = desc.depth_format.map(|format| wgpu::DepthStencilState {
            format: self.texture_format(format),
            depth_write_enabled: !desc.alpha_blend,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        Ok(self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&desc.label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.texture_format(desc.color_format),
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        }))
    }

    /// Encodes `stream` into one command buffer targeting `surface_view`.
    fn encode(&mut self, stream: &CommandStream, surface_view: &wgpu::TextureView) -> Result<wgpu::CommandBuffer> {
        let blit_pipeline = self.blitter.pipeline(&self.device, self.config.format);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(stream.label()),
        });
        let mut pass: Option<wgpu::RenderPass<'static>> = None;

        for command in stream.commands() {
            match command {
                Command::PushDebugGroup(label) => match pass.as_mut() {
                    Some(pass) => pass.push_debug_group(label),
                    None => encoder.push_debug_group(label),
                },
                Command::PopDebugGroup => match pass.as_mut() {
                    Some(pass) => pass.pop_debug_group(),
                    None => encoder.pop_debug_group(),
                },
                Command::BeginPass { label, color, depth, load } => {
                    let color_view = self.view(*color)?;
                    let depth_view = depth.map(|d| self.view(d)).transpose()?;
                    let load = match load {
                        LoadOp::Clear(c) => wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(c.x),
                            g: f64::from(c.y),
                            b: f64::from(c.z),
                            a: f64::from(c.w),
                        }),
                        LoadOp::Load => wgpu::LoadOp::Load,
                    };
                    let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some(label),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: color_view,
                            resolve_target: None,
                            ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                            view,
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                        ..Default::default()
                    });
                    pass = Some(render_pass.forget_lifetime());
                }
                Command::SetPipeline(handle) => {
                    let Some(GpuResource::Pipeline(pipeline)) = self.resources.get(*handle) else {
                        return Err(Self::unknown(*handle));
                    };
                    if let Some(pass) = pass.as_mut() {
                        pass.set_pipeline(pipeline);
                    }
                }
                Command::SetBindings { index, table } => {
                    let Some(GpuResource::BindingTable(group)) = self.resources.get(*table) else {
                        return Err(Self::unknown(*table));
                    };
                    if let Some(pass) = pass.as_mut() {
                        pass.set_bind_group(*index, group, &[]);
                    }
                }
                Command::Draw { vertices, instances } => {
                    if let Some(pass) = pass.as_mut() {
                        pass.draw(vertices.clone(), instances.clone());
                    }
                }
                Command::EndPass => {
                    pass = None;
                }
                Command::BlitToSurface { source } => {
                    let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Surface Blit Bindings"),
                        layout: &self.blitter.layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(self.view(*source)?),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(&self.sampler),
                            },
                        ],
                    });
                    let mut blit = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Surface Blit"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: surface_view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                        ..Default::default()
                    });
                    blit.set_pipeline(&blit_pipeline);
                    blit.set_bind_group(0, &group, &[]);
                    blit.draw(0..3, 0..1);
                }
            }
        }
        drop(pass);
        Ok(encoder.finish())
    }
}

impl GpuDevice for WgpuBackend {
    fn surface_extent(&self) -> Extent2d {
        Extent2d::new(self.config.width, self.config.height)
    }

    fn create_resource(&mut self, owner: &str, desc: ResourceDesc) -> Result<ResourceHandle> {
        let resource = match &desc {
            ResourceDesc::Buffer(buffer) => GpuResource::Buffer(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&buffer.label),
                size: buffer.size,
                usage: buffer_usages(buffer.usage),
                mapped_at_creation: false,
            })),
            ResourceDesc::Image(image) => {
                let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&image.label),
                    size: wgpu::Extent3d {
                        width: image.extent.width.max(1),
                        height: image.extent.height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: self.texture_format(image.format),
                    usage: texture_usages(image.usage),
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                GpuResource::Image { view, _texture: texture }
            }
            ResourceDesc::BindingLayout(layout) => {
                let entries: Vec<wgpu::BindGroupLayoutEntry> =
                    layout.entries.iter().zip(0u32..).map(|(kind, binding)| layout_entry(binding, *kind)).collect();
                GpuResource::BindingLayout {
                    layout: self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(&layout.label),
                        entries: &entries,
                    }),
                    entries: layout.entries.clone(),
                }
            }
            ResourceDesc::BindingTable(table) => {
                if let Some(GpuResource::BindingLayout { entries, .. }) = self.resources.get(table.layout)
                    && (entries.len() != table.resources.len()
                        || entries.iter().zip(&table.resources).any(|(kind, bound)| !bound.matches(*kind)))
                {
                    return Err(KairosError::ResourceCreation {
                        label: table.label.to_string(),
                        reason: "resources do not match the binding layout".into(),
                    });
                }
                GpuResource::BindingTable(self.create_bind_group(&table.label, table.layout, &table.resources)?)
            }
            ResourceDesc::PipelineLayout(layout) => {
                let layouts = layout
                    .binding_layouts
                    .iter()
                    .map(|h| match self.resources.get(*h) {
                        Some(GpuResource::BindingLayout { layout, .. }) => Ok(layout),
                        _ => Err(Self::unknown(*h)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                GpuResource::PipelineLayout(self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&layout.label),
                    bind_group_layouts: &layouts,
                    immediate_size: 0,
                }))
            }
            ResourceDesc::Shader(shader) => {
                GpuResource::Shader(self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&shader.label),
                    source: wgpu::ShaderSource::Wgsl(shader.source.clone()),
                }))
            }
            ResourceDesc::Pipeline(pipeline) => GpuResource::Pipeline(self.create_render_pipeline(pipeline)?),
        };
        log::trace!("{owner}: created {:?} '{}'", desc.kind(), desc.label());
        Ok(self.resources.insert(resource))
    }

    fn destroy_resource(&mut self, handle: ResourceHandle) {
        if let Some(GpuResource::Buffer(buffer)) = self.resources.remove(handle) {
            buffer.destroy();
        }
    }

    fn write_buffer(&mut self, buffer: ResourceHandle, offset: u64, data: &[u8]) -> Result<()> {
        let buffer = self.buffer(buffer)?;
        self.queue.write_buffer(buffer, offset, data);
        Ok(())
    }
}

impl GpuBackend for WgpuBackend {
    fn create_frame_sync(&mut self, slot: FrameSlot) -> Result<()> {
        if self.sync.len() <= slot.index() {
            self.sync.resize_with(slot.index() + 1, || None);
        }
        self.sync[slot.index()] = Some(SlotSync::default());
        Ok(())
    }

    fn destroy_frame_sync(&mut self, slot: FrameSlot) {
        let acquired = self.sync.get_mut(slot.index()).and_then(Option::take).and_then(|s| s.acquired);
        if let Some(image) = acquired {
            self.acquired.remove(&image);
        }
    }

    fn wait_for_fence(&mut self, slot: FrameSlot) -> Result<()> {
        let submission = self.sync_mut(slot)?.submission.take();
        if let Some(index) = submission {
            self.device
                .poll(wgpu::PollType::Wait { submission_index: Some(index), timeout: None })
                .map_err(|e| KairosError::FenceWait { slot: slot.index(), reason: e.to_string() })?;
        }
        Ok(())
    }

    fn reset_fence(&mut self, slot: FrameSlot) -> Result<()> {
        let sync = self.sync_mut(slot)?;
        if sync.submission.is_some() {
            return Err(KairosError::FenceWait {
                slot: slot.index(),
                reason: "fence reset before its submission was waited on".into(),
            });
        }
        sync.fence_reset = true;
        Ok(())
    }

    fn acquire_image(&mut self, slot: FrameSlot) -> Result<Acquire> {
        if self.pending_extent.is_some() {
            return Ok(Acquire::Stale);
        }
        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => return Ok(Acquire::Stale),
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("{slot}: surface acquisition timed out");
                return Ok(Acquire::Stale);
            }
            Err(e) => return Err(KairosError::AcquireFailed(e.to_string())),
        };

        let index = self.next_image;
        self.next_image = self.next_image.wrapping_add(1);
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let suboptimal = texture.suboptimal;
        self.sync_mut(slot)?.acquired = Some(index);
        self.acquired.insert(index, AcquiredImage { texture, view, suboptimal });
        Ok(Acquire::Image(SurfaceImage { index }))
    }

    fn submit(&mut self, slot: FrameSlot, stream: &CommandStream, target: SurfaceImage) -> Result<()> {
        let sync = self.sync_mut(slot)?;
        if sync.acquired != Some(target.index) || !sync.fence_reset {
            return Err(KairosError::SubmitFailed {
                slot: slot.index(),
                reason: "no acquired image or the fence was not reset".into(),
            });
        }
        let Some(image) = self.acquired.remove(&target.index) else {
            return Err(KairosError::SubmitFailed { slot: slot.index(), reason: "unknown surface image".into() });
        };
        let commands = self.encode(stream, &image.view);
        self.acquired.insert(target.index, image);
        let index = self.queue.submit(std::iter::once(commands?));

        let sync = self.sync_mut(slot)?;
        sync.submission = Some(index);
        sync.fence_reset = false;
        sync.submitted = true;
        Ok(())
    }

    fn present(&mut self, slot: FrameSlot, target: SurfaceImage) -> Result<Present> {
        let sync = self.sync_mut(slot)?;
        if !sync.submitted {
            return Err(KairosError::PresentFailed(format!("{slot}: nothing was submitted")));
        }
        sync.submitted = false;
        sync.acquired = None;
        let image = self
            .acquired
            .remove(&target.index)
            .ok_or_else(|| KairosError::PresentFailed(format!("{slot}: unknown surface image")))?;
        let suboptimal = image.suboptimal;
        drop(image.view);
        image.texture.present();
        if suboptimal || self.pending_extent.is_some() {
            Ok(Present::Stale)
        } else {
            Ok(Present::Presented)
        }
    }

    fn recreate_surface(&mut self) -> Result<Extent2d> {
        let extent = self.pending_extent.take().unwrap_or_else(|| self.surface_extent()).clamped();
        self.config.width = extent.width;
        self.config.height = extent.height;
        self.surface.configure(&self.device, &self.config);
        Ok(extent)
    }

    fn notify_resized(&mut self, extent: Extent2d) {
        self.pending_extent = Some(extent);
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| KairosError::FenceWait { slot: 0, reason: e.to_string() })?;
        for sync in self.sync.iter_mut().flatten() {
            sync.submission = None;
        }
        Ok(())
    }
}

fn buffer_usages(usage: ResourceUsage) -> wgpu::BufferUsages {
    let mut out = wgpu::BufferUsages::empty();
    if usage.contains(ResourceUsage::UNIFORM) {
        out |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(ResourceUsage::STORAGE) {
        out |= wgpu::BufferUsages::STORAGE;
    }
    if usage.contains(ResourceUsage::COPY_SRC) {
        out |= wgpu::BufferUsages::COPY_SRC;
    }
    if usage.contains(ResourceUsage::COPY_DST) {
        out |= wgpu::BufferUsages::COPY_DST;
    }
    out
}

fn texture_usages(usage: ResourceUsage) -> wgpu::TextureUsages {
    let mut out = wgpu::TextureUsages::empty();
    if usage.contains(ResourceUsage::SAMPLED) {
        out |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.intersects(ResourceUsage::COLOR_TARGET | ResourceUsage::DEPTH_TARGET) {
        out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(ResourceUsage::COPY_SRC) {
        out |= wgpu::TextureUsages::COPY_SRC;
    }
    if usage.contains(ResourceUsage::COPY_DST) {
        out |= wgpu::TextureUsages::COPY_DST;
    }
    out
}

fn layout_entry(binding: u32, kind: BindingKind) -> wgpu::BindGroupLayoutEntry {
    let visibility = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
    let texture = wgpu::BindingType::Texture {
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
    };
    let (ty, count) = match kind {
        BindingKind::UniformBuffer => (
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            None,
        ),
        BindingKind::StorageBuffer => (
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            None,
        ),
        BindingKind::SampledImage => (texture, None),
        BindingKind::SampledImageArray { count } => (texture, NonZeroU32::new(count)),
        BindingKind::Sampler => (wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering), None),
    };
    wgpu::BindGroupLayoutEntry { binding, visibility, ty, count }
}
