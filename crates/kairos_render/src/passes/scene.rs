//! Scene Pass
//!
//! Forward-shades every visible mesh instance into a per-slot HDR target.
//!
//! # Per-slot scene tables
//!
//! Each frame slot keeps its own view of the scene ([`SlotScene`]), built
//! solely from the attach/detach entries that slot has drained: active
//! camera, viewport, environment, skybox, lights, and the model / material /
//! image tables. Materials and images are reference counted per slot, so a
//! material shared by many instances occupies one table index and is only
//! released when its last instance leaves that slot's view.
//!
//! GPU copies of images are shared across slots through [`SharedImages`].
//!
//! # Bindings
//!
//! One binding table per slot:
//!
//! | Binding | Content                                  |
//! |---------|------------------------------------------|
//! | 0       | frame uniforms ([`FrameGpu`])            |
//! | 1       | model records ([`ModelGpu`])             |
//! | 2       | material records ([`MaterialGpu`])       |
//! | 3       | light records ([`LightGpu`])             |
//! | 4       | image array, padded with a placeholder   |
//! | 5       | linear sampler                           |
//!
//! The image array is the only binding whose content changes with the scene,
//! so the slot's table is marked stale whenever an image enters or leaves
//! that slot's image table.

use std::any::Any;
use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat4, Vec3, Vec4};
use kairos_core::{KairosError, Result};
use kairos_resources::{AlphaMode, Image, Material, Mesh};
use kairos_scene::{Environment, Light, LightKind, MutationOp, NodeHandle, NodeKind, SceneMutation, Viewport};
use smallvec::SmallVec;

use super::tables::{RefCountedTable, SharedImages};
use crate::command::{Command, CommandStream, LoadOp};
use crate::gpu::{
    BindingKind, BindingLayoutDesc, BindingTableDesc, BoundResource, BufferDesc, Extent2d, GpuDevice, ImageDesc,
    ImageFormat, PipelineDesc, PipelineLayoutDesc, ResourceDesc, ResourceHandle, ResourceUsage, ShaderDesc,
};
use crate::pass::{FrameContext, RenderPass, ResourceSet};
use crate::settings::{RendererSettings, SceneLimits};
use crate::slot::{FrameSlot, PerSlot};

pub const SCENE_PASS: &str = "Scene Pass";

const SCENE_WGSL: &str = include_str!("../shaders/scene.wgsl");
const SKYBOX_WGSL: &str = include_str!("../shaders/skybox.wgsl");

pub const CUBE_VERTEX_COUNT: u32 = 36;
pub const NO_TEXTURE: u32 = u32::MAX;

pub const HDR_FORMAT: ImageFormat = ImageFormat::Rgba16Float;
pub const DEPTH_FORMAT: ImageFormat = ImageFormat::Depth32Float;

// ============================================================================
// GPU records
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameGpu {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// rgb = ambient colour * intensity
    pub ambient: [f32; 4],
    pub viewport: [f32; 4],
    pub light_count: u32,
    pub skybox_index: u32,
    pub alpha: f32,
    pub elapsed: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelGpu {
    pub world: [[f32; 4]; 4],
    pub material_index: u32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialGpu {
    pub base_color: [f32; 4],
    pub texture_index: u32,
    pub alpha_mode: u32,
    pub _pad: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightGpu {
    /// rgb = colour, w = intensity
    pub color_intensity: [f32; 4],
    /// xyz = world position, w = range
    pub position_range: [f32; 4],
    /// xyz = world direction, w = kind tag
    pub direction_kind: [f32; 4],
    /// x = cos(inner), y = cos(outer)
    pub cones: [f32; 4],
}

// ============================================================================
// Per-slot scene view
// ============================================================================

/// A drawable tracked by a slot.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub node: NodeHandle,
    pub mesh: Mesh,
}

/// What one frame slot knows about the scene.
#[derive(Debug)]
pub struct SlotScene {
    camera: Option<NodeHandle>,
    cameras: Vec<NodeHandle>,
    /// The active camera was detached during the current drain.
    camera_lost: bool,
    viewport: Option<(NodeHandle, Viewport)>,
    environment: Option<(NodeHandle, Environment)>,
    skybox: Option<(NodeHandle, Image)>,
    lights: Vec<(NodeHandle, Light)>,
    models: RefCountedTable<ModelEntry>,
    materials: RefCountedTable<Material>,
    images: RefCountedTable<Image>,
    opaque: Vec<u32>,
    transparent: Vec<u32>,
    lists_dirty: bool,
    // Filtered and sorted by `update` for the frame being recorded.
    draws_opaque: Vec<u32>,
    draws_transparent: Vec<u32>,
    draw_skybox: bool,
}

impl SlotScene {
    fn new(limits: &SceneLimits) -> Self {
        Self {
            camera: None,
            cameras: Vec::new(),
            camera_lost: false,
            viewport: None,
            environment: None,
            skybox: None,
            lights: Vec::new(),
            models: RefCountedTable::new("models", limits.max_models),
            materials: RefCountedTable::new("materials", limits.max_materials),
            images: RefCountedTable::new("images", limits.max_images),
            opaque: Vec::new(),
            transparent: Vec::new(),
            lists_dirty: false,
            draws_opaque: Vec::new(),
            draws_transparent: Vec::new(),
            draw_skybox: false,
        }
    }

    #[must_use]
    pub fn active_camera(&self) -> Option<NodeHandle> {
        self.camera
    }

    #[must_use]
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    #[must_use]
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport.map(|(_, v)| v)
    }

    #[must_use]
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref().map(|(_, e)| e)
    }

    #[must_use]
    pub fn skybox(&self) -> Option<&Image> {
        self.skybox.as_ref().map(|(_, i)| i)
    }

    #[must_use]
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn model_index(&self, node: kairos_scene::NodeId) -> Option<u32> {
        self.models.index_of(node.0)
    }

    #[must_use]
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn material_refs(&self, material: &Material) -> u32 {
        self.materials.ref_count(material.id().0)
    }

    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn image_refs(&self, image: &Image) -> u32 {
        self.images.ref_count(image.id().0)
    }

    /// Model indices of opaque drawables, ascending.
    #[must_use]
    pub fn opaque(&self) -> &[u32] {
        &self.opaque
    }

    #[must_use]
    pub fn transparent(&self) -> &[u32] {
        &self.transparent
    }

    fn rebuild_lists(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
        for (index, entry) in self.models.iter() {
            if entry.mesh.is_transparent() {
                self.transparent.push(index);
            } else {
                self.opaque.push(index);
            }
        }
        self.opaque.sort_unstable();
        self.transparent.sort_unstable();
        self.lists_dirty = false;
    }

    fn clear(&mut self) {
        self.camera = None;
        self.cameras.clear();
        self.camera_lost = false;
        self.viewport = None;
        self.environment = None;
        self.skybox = None;
        self.lights.clear();
        self.models.clear();
        self.materials.clear();
        self.images.clear();
        self.opaque.clear();
        self.transparent.clear();
        self.draws_opaque.clear();
        self.draws_transparent.clear();
        self.draw_skybox = false;
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotBuffers {
    frame: ResourceHandle,
    models: ResourceHandle,
    materials: ResourceHandle,
    lights: ResourceHandle,
}

#[derive(Debug, Default, Clone, Copy)]
struct Pipelines {
    opaque: Option<ResourceHandle>,
    transparent: Option<ResourceHandle>,
    skybox: Option<ResourceHandle>,
}

// ============================================================================
// Scene Pass
// ============================================================================

pub struct ScenePass {
    limits: SceneLimits,
    clear_color: Vec4,
    resources: ResourceSet,
    slots: PerSlot<SlotScene>,
    buffers: PerSlot<Option<SlotBuffers>>,
    color: PerSlot<Option<ResourceHandle>>,
    depth: PerSlot<Option<ResourceHandle>>,
    placeholder: Option<ResourceHandle>,
    images: SharedImages,
    pipeline_layout: Option<ResourceHandle>,
    shaders: SmallVec<[ResourceHandle; 2]>,
    pipelines: Pipelines,
}

impl ScenePass {
    #[must_use]
    pub fn new(settings: &RendererSettings) -> Self {
        let frames = settings.frames_in_flight;
        Self {
            limits: settings.limits,
            clear_color: settings.clear_color,
            resources: ResourceSet::new(frames),
            slots: PerSlot::from_fn(frames, |_| SlotScene::new(&settings.limits)),
            buffers: PerSlot::splat(frames, None),
            color: PerSlot::splat(frames, None),
            depth: PerSlot::splat(frames, None),
            placeholder: None,
            images: SharedImages::default(),
            pipeline_layout: None,
            shaders: SmallVec::new(),
            pipelines: Pipelines::default(),
        }
    }

    #[must_use]
    pub fn slot_scene(&self, slot: FrameSlot) -> Option<&SlotScene> {
        self.slots.get(slot)
    }

    /// Images currently resident on the GPU, across all slots.
    #[must_use]
    pub fn resident_images(&self) -> usize {
        self.images.len()
    }

    // ========================================================================
    // Shared-resource bookkeeping
    // ========================================================================

    /// References `image` from `slot`'s image table; returns its index.
    pub fn add_image(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, image: &Image) -> Result<u32> {
        let table = &mut self.slot_mut(slot)?.images;
        let acquired = table.acquire(image.id().0, image)?;
        if acquired.first {
            if let Err(err) = self.images.acquire(gpu, SCENE_PASS, image) {
                self.slots[slot].images.release(image.id().0);
                return Err(err);
            }
            self.resources.mark_stale(slot)?;
        }
        Ok(acquired.index)
    }

    pub fn remove_image(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, image: &Image) -> Result<()> {
        let released = self.slot_mut(slot)?.images.release(image.id().0);
        if let Some(released) = released
            && released.last.is_some()
        {
            self.images.release(gpu, image);
            self.resources.mark_stale(slot)?;
        }
        Ok(())
    }

    /// References `material` from `slot`; its images are referenced with the
    /// material's first reference.
    pub fn add_material(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, material: &Material) -> Result<u32> {
        let acquired = self.slot_mut(slot)?.materials.acquire(material.id().0, material)?;
        if acquired.first {
            for image in material.textures() {
                self.add_image(gpu, slot, image)?;
            }
        }
        Ok(acquired.index)
    }

    pub fn remove_material(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, material: &Material) -> Result<()> {
        let released = self.slot_mut(slot)?.materials.release(material.id().0);
        if let Some(released) = released
            && let Some(material) = released.last
        {
            for image in material.textures() {
                self.remove_image(gpu, slot, image)?;
            }
        }
        Ok(())
    }

    fn slot_mut(&mut self, slot: FrameSlot) -> Result<&mut SlotScene> {
        let frames_in_flight = self.slots.len();
        self.slots.get_mut(slot).ok_or(KairosError::SlotOutOfRange { slot: slot.index(), frames_in_flight })
    }

    // ========================================================================
    // Mutation classification
    // ========================================================================

    fn on_added(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, entry: &SceneMutation) -> Result<()> {
        let node = entry.node;
        match &entry.kind {
            NodeKind::Plain => {}
            NodeKind::Camera(_) => {
                let scene = self.slot_mut(slot)?;
                scene.cameras.push(node);
                if scene.camera.is_none() {
                    scene.camera = Some(node);
                    log::debug!("{slot}: camera '{}' active", entry.name);
                }
            }
            NodeKind::MeshInstance(instance) => {
                let materials = instance.mesh.materials();
                if materials.is_empty() {
                    return Err(KairosError::MeshWithoutMaterials(entry.name.clone()));
                }
                let model = ModelEntry { node, mesh: instance.mesh.clone() };
                let scene = self.slot_mut(slot)?;
                scene.models.acquire(entry.id.0, &model)?;
                scene.lists_dirty = true;
                for material in materials {
                    self.add_material(gpu, slot, material)?;
                }
            }
            NodeKind::Viewport(viewport) => {
                self.slot_mut(slot)?.viewport = Some((node, *viewport));
            }
            NodeKind::Light(light) => {
                let max = self.limits.max_lights;
                let scene = self.slot_mut(slot)?;
                if scene.lights.len() >= max {
                    return Err(KairosError::ResourceLimitExceeded { table: "lights", max });
                }
                scene.lights.push((node, *light));
            }
            NodeKind::Environment(environment) => {
                let scene = self.slot_mut(slot)?;
                if scene.environment.is_none() {
                    scene.environment = Some((node, environment.clone()));
                }
            }
            NodeKind::Skybox(skybox) => {
                let previous = self.slot_mut(slot)?.skybox.replace((node, skybox.image.clone()));
                self.add_image(gpu, slot, &skybox.image)?;
                if let Some((_, image)) = previous {
                    self.remove_image(gpu, slot, &image)?;
                }
            }
        }
        Ok(())
    }

    fn on_removed(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, entry: &SceneMutation) -> Result<()> {
        let node = entry.node;
        match &entry.kind {
            NodeKind::Plain => {}
            NodeKind::Camera(_) => {
                let scene = self.slot_mut(slot)?;
                scene.cameras.retain(|&c| c != node);
                if scene.camera == Some(node) {
                    scene.camera = None;
                    scene.camera_lost = true;
                }
            }
            NodeKind::MeshInstance(instance) => {
                let scene = self.slot_mut(slot)?;
                if scene.models.release(entry.id.0).is_none() {
                    log::warn!("{slot}: mesh instance '{}' removed but never tracked", entry.name);
                    return Ok(());
                }
                scene.lists_dirty = true;
                for material in instance.mesh.materials() {
                    self.remove_material(gpu, slot, material)?;
                }
            }
            NodeKind::Viewport(_) => {
                let scene = self.slot_mut(slot)?;
                if scene.viewport.is_some_and(|(n, _)| n == node) {
                    scene.viewport = None;
                }
            }
            NodeKind::Light(_) => {
                self.slot_mut(slot)?.lights.retain(|(n, _)| *n != node);
            }
            NodeKind::Environment(_) => {
                let scene = self.slot_mut(slot)?;
                if scene.environment.as_ref().is_some_and(|(n, _)| *n == node) {
                    scene.environment = None;
                }
            }
            NodeKind::Skybox(_) => {
                let scene = self.slot_mut(slot)?;
                if scene.skybox.as_ref().is_some_and(|(n, _)| *n == node)
                    && let Some((_, image)) = scene.skybox.take()
                {
                    self.remove_image(gpu, slot, &image)?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Resource helpers
    // ========================================================================

    fn create_slot_buffers(&self, gpu: &mut dyn GpuDevice, slot: FrameSlot) -> Result<SlotBuffers> {
        let mut buffer = |name: &str, size: usize, usage: ResourceUsage| {
            gpu.create_resource(
                SCENE_PASS,
                ResourceDesc::Buffer(BufferDesc {
                    label: format!("Scene {name} {}", slot.index()).into(),
                    size: size as u64,
                    usage: usage | ResourceUsage::COPY_DST,
                }),
            )
        };
        Ok(SlotBuffers {
            frame: buffer("Frame", size_of::<FrameGpu>(), ResourceUsage::UNIFORM)?,
            models: buffer("Models", size_of::<ModelGpu>() * self.limits.max_models, ResourceUsage::STORAGE)?,
            materials: buffer(
                "Materials",
                size_of::<MaterialGpu>() * self.limits.max_materials,
                ResourceUsage::STORAGE,
            )?,
            lights: buffer("Lights", size_of::<LightGpu>() * self.limits.max_lights, ResourceUsage::STORAGE)?,
        })
    }

    fn create_binding_table(&self, gpu: &mut dyn GpuDevice, slot: FrameSlot) -> Result<ResourceHandle> {
        let missing = |what: &'static str| KairosError::FramePhase {
            slot: slot.index(),
            operation: "build scene bindings",
            phase: what,
        };
        let layout = self.resources.layout().ok_or(missing("the binding layout is missing"))?;
        let placeholder = self.placeholder.ok_or(missing("the placeholder image is missing"))?;
        let buffers = self.buffers[slot].ok_or(missing("the slot buffers are missing"))?;

        let mut images = vec![placeholder; self.limits.max_images];
        for (index, image) in self.slots[slot].images.iter() {
            if let (Some(entry), Some(handle)) = (images.get_mut(index as usize), self.images.handle(image)) {
                *entry = handle;
            }
        }

        gpu.create_resource(
            SCENE_PASS,
            ResourceDesc::BindingTable(BindingTableDesc {
                label: format!("Scene Bindings {}", slot.index()).into(),
                layout,
                resources: vec![
                    BoundResource::Buffer(buffers.frame),
                    BoundResource::Buffer(buffers.models),
                    BoundResource::Buffer(buffers.materials),
                    BoundResource::Buffer(buffers.lights),
                    BoundResource::ImageArray(images),
                    BoundResource::Sampler,
                ],
            }),
        )
    }

    fn shader_source(&self, template: &'static str) -> Cow<'static, str> {
        template.replace("{{MAX_IMAGES}}", &self.limits.max_images.to_string()).into()
    }
}

fn node_world(frame: &FrameContext<'_>, node: NodeHandle) -> Affine3A {
    frame.scene.world_transform(node).unwrap_or(Affine3A::IDENTITY)
}

fn light_record(light: &Light, world: &Affine3A) -> LightGpu {
    let position = Vec3::from(world.translation);
    let direction = world.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
    let (inner, outer) = match light.kind {
        LightKind::Spot(spot) => (spot.inner_cone.cos(), spot.outer_cone.cos()),
        _ => (1.0, 1.0),
    };
    let range = light.kind.range();
    LightGpu {
        color_intensity: light.color.extend(light.intensity).to_array(),
        position_range: position.extend(if range.is_finite() { range } else { 0.0 }).to_array(),
        direction_kind: direction.extend(light.kind.gpu_tag() as f32).to_array(),
        cones: [inner, outer, 0.0, 0.0],
    }
}

impl RenderPass for ScenePass {
    fn name(&self) -> &str {
        SCENE_PASS
    }

    fn resource_set(&self) -> &ResourceSet {
        &self.resources
    }

    fn create_backing_resources(&mut self, gpu: &mut dyn GpuDevice, extent: Extent2d) -> Result<()> {
        let extent = extent.clamped();
        for slot in self.slots.slots() {
            self.color[slot] = Some(gpu.create_resource(
                SCENE_PASS,
                ResourceDesc::Image(ImageDesc {
                    label: format!("Scene HDR Color {}", slot.index()).into(),
                    extent,
                    format: HDR_FORMAT,
                    usage: ResourceUsage::COLOR_TARGET | ResourceUsage::SAMPLED,
                }),
            )?);
            self.depth[slot] = Some(gpu.create_resource(
                SCENE_PASS,
                ResourceDesc::Image(ImageDesc {
                    label: format!("Scene Depth {}", slot.index()).into(),
                    extent,
                    format: DEPTH_FORMAT,
                    usage: ResourceUsage::DEPTH_TARGET,
                }),
            )?);
        }
        Ok(())
    }

    fn cleanup_backing_resources(&mut self, gpu: &mut dyn GpuDevice) {
        for handle in self.color.iter_mut().chain(self.depth.iter_mut()).filter_map(Option::take) {
            gpu.destroy_resource(handle);
        }
    }

    fn create_binding_layout(&mut self, gpu: &mut dyn GpuDevice) -> Result<()> {
        let layout = gpu.create_resource(
            SCENE_PASS,
            ResourceDesc::BindingLayout(BindingLayoutDesc {
                label: "Scene Binding Layout".into(),
                entries: vec![
                    BindingKind::UniformBuffer,
                    BindingKind::StorageBuffer,
                    BindingKind::StorageBuffer,
                    BindingKind::StorageBuffer,
                    BindingKind::SampledImageArray { count: self.limits.max_images as u32 },
                    BindingKind::Sampler,
                ],
            }),
        )?;
        self.resources.layout_created(layout)?;

        self.placeholder = Some(gpu.create_resource(
            SCENE_PASS,
            ResourceDesc::Image(ImageDesc {
                label: "Scene Placeholder Image".into(),
                extent: Extent2d::new(1, 1),
                format: ImageFormat::Rgba8Unorm,
                usage: ResourceUsage::SAMPLED | ResourceUsage::COPY_DST,
            }),
        )?);
        Ok(())
    }

    fn create_or_update_bindings(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, create: bool) -> Result<()> {
        if create {
            if self.buffers[slot].is_none() {
                self.buffers[slot] = Some(self.create_slot_buffers(gpu, slot)?);
            }
            let table = self.create_binding_table(gpu, slot)?;
            self.resources.populate(slot, table)
        } else {
            let table = self.create_binding_table(gpu, slot)?;
            if let Some(previous) = self.resources.refresh(slot, table)? {
                gpu.destroy_resource(previous);
            }
            Ok(())
        }
    }

    fn create_pipeline_layout(&mut self, gpu: &mut dyn GpuDevice) -> Result<()> {
        let layout = self.resources.layout().ok_or(KairosError::InvalidResourceTransition {
            from: "Unprovisioned",
            to: "PipelineLayout",
        })?;
        self.pipeline_layout = Some(gpu.create_resource(
            SCENE_PASS,
            ResourceDesc::PipelineLayout(PipelineLayoutDesc {
                label: "Scene Pipeline Layout".into(),
                binding_layouts: vec![layout],
            }),
        )?);
        Ok(())
    }

    fn load_shader_programs(&mut self, gpu: &mut dyn GpuDevice) -> Result<()> {
        let layout = self.pipeline_layout.ok_or(KairosError::InvalidResourceTransition {
            from: "LayoutCreated",
            to: "ShadersLoaded",
        })?;

        let mut shader = |label: &'static str, source: Cow<'static, str>| {
            gpu.create_resource(SCENE_PASS, ResourceDesc::Shader(ShaderDesc { label: label.into(), source }))
        };
        let scene_shader = shader("Scene Shader", self.shader_source(SCENE_WGSL))?;
        let skybox_shader = shader("Skybox Shader", self.shader_source(SKYBOX_WGSL))?;
        self.shaders.extend([scene_shader, skybox_shader]);

        let mut pipeline = |label: &'static str, shader: ResourceHandle, alpha_blend: bool| {
            gpu.create_resource(
                SCENE_PASS,
                ResourceDesc::Pipeline(PipelineDesc {
                    label: label.into(),
                    layout,
                    shader,
                    color_format: HDR_FORMAT,
                    depth_format: Some(DEPTH_FORMAT),
                    alpha_blend,
                }),
            )
        };
        self.pipelines = Pipelines {
            opaque: Some(pipeline("Scene Opaque Pipeline", scene_shader, false)?),
            transparent: Some(pipeline("Scene Transparent Pipeline", scene_shader, true)?),
            skybox: Some(pipeline("Skybox Pipeline", skybox_shader, false)?),
        };
        log::debug!("Scene shaders compiled for {} images", self.limits.max_images);
        Ok(())
    }

    fn apply_mutation(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, entry: &SceneMutation) -> Result<()> {
        match entry.op {
            MutationOp::Added => self.on_added(gpu, slot, entry),
            MutationOp::Removed => self.on_removed(gpu, slot, entry),
        }
    }

    fn after_drain(
        &mut self,
        _gpu: &mut dyn GpuDevice,
        slot: FrameSlot,
        camera_request: Option<NodeHandle>,
        frame: &FrameContext<'_>,
    ) -> Result<()> {
        let scene = self.slot_mut(slot)?;

        if let Some(requested) = camera_request {
            if scene.cameras.contains(&requested) {
                scene.camera = Some(requested);
            } else {
                log::warn!("{slot}: camera activation ignored, node is not an attached camera");
            }
        }

        // Pausing stops callbacks, not rendering: any tracked camera will do.
        if std::mem::take(&mut scene.camera_lost) && scene.camera.is_none() && !scene.cameras.is_empty() {
            let cameras = &scene.cameras;
            let in_tree_order = frame
                .scene
                .walk(frame.scene.root())
                .into_iter()
                .find(|node| cameras.contains(node));
            scene.camera = in_tree_order.or_else(|| cameras.first().copied());
            if let Some(camera) = scene.camera {
                log::debug!("{slot}: auto-activated camera {camera:?}");
            }
        }

        if scene.lists_dirty {
            scene.rebuild_lists();
        }
        Ok(())
    }

    fn update(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, frame: &FrameContext<'_>) -> Result<()> {
        let buffers = self.buffers[slot].ok_or(KairosError::FramePhase {
            slot: slot.index(),
            operation: "update scene buffers",
            phase: "unprovisioned",
        })?;
        let skybox_index = self.slots[slot]
            .skybox
            .as_ref()
            .and_then(|(_, image)| self.slots[slot].images.index_of(image.id().0));
        let scene = &mut self.slots[slot];

        // Camera
        let viewport = scene.viewport.map_or_else(Viewport::default, |(_, v)| v);
        let camera = scene.camera.and_then(|node| {
            let component = *frame.scene.get(node)?.kind().as_camera()?;
            Some((node_world(frame, node), component))
        });
        let aspect = frame.extent.aspect() * (viewport.width / viewport.height.max(f32::EPSILON));
        let (view_proj, camera_position) = camera.map_or((Mat4::IDENTITY, Vec3::ZERO), |(world, component)| {
            (component.view_projection(&world, aspect), Vec3::from(world.translation))
        });

        let environment = scene.environment.as_ref().map_or_else(Environment::default, |(_, e)| e.clone());
        let ambient = environment.ambient_color * environment.ambient_intensity;

        let frame_record = FrameGpu {
            view_proj: view_proj.to_cols_array_2d(),
            camera_position: camera_position.extend(1.0).to_array(),
            ambient: ambient.extend(1.0).to_array(),
            viewport: [viewport.x, viewport.y, viewport.width, viewport.height],
            light_count: scene.lights.len() as u32,
            skybox_index: skybox_index.unwrap_or(NO_TEXTURE),
            alpha: frame.alpha,
            elapsed: frame.elapsed,
        };
        gpu.write_buffer(buffers.frame, 0, bytemuck::bytes_of(&frame_record))?;

        // Models
        let mut models = vec![ModelGpu::zeroed(); scene.models.high_water() as usize];
        let mut visible = vec![false; models.len()];
        for (index, entry) in scene.models.iter() {
            let material_index = entry
                .mesh
                .materials()
                .first()
                .and_then(|m| scene.materials.index_of(m.id().0))
                .unwrap_or(0);
            models[index as usize] = ModelGpu {
                world: Mat4::from(node_world(frame, entry.node)).to_cols_array_2d(),
                material_index,
                _pad: [0; 3],
            };
            visible[index as usize] = frame.scene.get(entry.node).is_some_and(|node| node.visible);
        }
        if !models.is_empty() {
            gpu.write_buffer(buffers.models, 0, bytemuck::cast_slice(&models))?;
        }

        // Materials
        let mut materials = vec![MaterialGpu::zeroed(); scene.materials.high_water() as usize];
        for (index, material) in scene.materials.iter() {
            let texture_index = material
                .textures()
                .first()
                .and_then(|image| scene.images.index_of(image.id().0))
                .unwrap_or(NO_TEXTURE);
            materials[index as usize] = MaterialGpu {
                base_color: material.base_color().to_array(),
                texture_index,
                alpha_mode: u32::from(material.alpha_mode() == AlphaMode::Blend),
                _pad: [0; 2],
            };
        }
        if !materials.is_empty() {
            gpu.write_buffer(buffers.materials, 0, bytemuck::cast_slice(&materials))?;
        }

        // Lights
        let lights: Vec<LightGpu> = scene
            .lights
            .iter()
            .map(|(node, light)| light_record(light, &node_world(frame, *node)))
            .collect();
        if !lights.is_empty() {
            gpu.write_buffer(buffers.lights, 0, bytemuck::cast_slice(&lights))?;
        }

        // Draw lists: visible nodes only, transparent back to front.
        let has_camera = camera.is_some();
        let drawable = |index: &u32| has_camera && visible[*index as usize];
        let draws_opaque: Vec<u32> = scene.opaque.iter().copied().filter(drawable).collect();
        let mut draws_transparent: Vec<u32> = scene.transparent.iter().copied().filter(drawable).collect();
        let distance = |index: u32| {
            let [x, y, z, _] = models[index as usize].world[3];
            Vec3::new(x, y, z).distance_squared(camera_position)
        };
        draws_transparent.sort_by(|a, b| distance(*b).total_cmp(&distance(*a)));

        scene.draws_opaque = draws_opaque;
        scene.draws_transparent = draws_transparent;
        scene.draw_skybox = has_camera && skybox_index.is_some();
        Ok(())
    }

    fn begin_pass(&mut self, stream: &mut CommandStream, slot: FrameSlot) -> Result<()> {
        let phase_error = |phase| KairosError::FramePhase { slot: slot.index(), operation: "begin the scene pass", phase };
        let color = self.color[slot].ok_or(phase_error("the colour target is missing"))?;
        let depth = self.depth[slot].ok_or(phase_error("the depth target is missing"))?;
        let clear = self.slots[slot].environment().map_or(self.clear_color, |e| e.clear_color);
        stream.push(Command::BeginPass {
            label: SCENE_PASS.to_string(),
            color,
            depth: Some(depth),
            load: LoadOp::Clear(clear),
        });
        Ok(())
    }

    fn record(&mut self, stream: &mut CommandStream, slot: FrameSlot) -> Result<()> {
        let scene = &self.slots[slot];
        if scene.draws_opaque.is_empty() && scene.draws_transparent.is_empty() && !scene.draw_skybox {
            return Ok(());
        }
        let table = self.resources.table(slot).ok_or(KairosError::FramePhase {
            slot: slot.index(),
            operation: "record the scene pass",
            phase: "no binding table",
        })?;

        let batches = [
            (self.pipelines.skybox, if scene.draw_skybox { &[0][..] } else { &[][..] }, 0..3),
            (self.pipelines.opaque, &scene.draws_opaque[..], 0..CUBE_VERTEX_COUNT),
            (self.pipelines.transparent, &scene.draws_transparent[..], 0..CUBE_VERTEX_COUNT),
        ];
        for (pipeline, instances, vertices) in batches {
            if instances.is_empty() {
                continue;
            }
            let pipeline = pipeline.ok_or(KairosError::FramePhase {
                slot: slot.index(),
                operation: "record the scene pass",
                phase: "shaders not loaded",
            })?;
            stream.push(Command::SetPipeline(pipeline));
            stream.push(Command::SetBindings { index: 0, table });
            for &instance in instances {
                stream.push(Command::Draw { vertices: vertices.clone(), instances: instance..instance + 1 });
            }
        }
        Ok(())
    }

    fn color_output(&self, slot: FrameSlot) -> Option<ResourceHandle> {
        self.color.get(slot).copied().flatten()
    }

    fn cleanup(&mut self, gpu: &mut dyn GpuDevice) {
        self.cleanup_backing_resources(gpu);
        let Pipelines { opaque, transparent, skybox } = std::mem::take(&mut self.pipelines);
        let singles = [opaque, transparent, skybox, self.pipeline_layout.take(), self.placeholder.take()];
        for handle in singles.into_iter().flatten().chain(self.shaders.drain(..)) {
            gpu.destroy_resource(handle);
        }
        for buffers in self.buffers.iter_mut().filter_map(Option::take) {
            for handle in [buffers.frame, buffers.models, buffers.materials, buffers.lights] {
                gpu.destroy_resource(handle);
            }
        }
        for handle in self.resources.reset() {
            gpu.destroy_resource(handle);
        }
        self.images.destroy_all(gpu);
        for scene in self.slots.iter_mut() {
            scene.clear();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_records_match_shader_layouts() {
        assert_eq!(size_of::<FrameGpu>(), 128);
        assert_eq!(size_of::<ModelGpu>(), 80);
        assert_eq!(size_of::<MaterialGpu>(), 32);
        assert_eq!(size_of::<LightGpu>(), 64);
    }

    #[test]
    fn spot_light_record_carries_cones_and_tag() {
        let light = Light::new_spot(Vec3::ONE, 2.0, 10.0, 0.2, 0.4);
        let record = light_record(&light, &Affine3A::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(record.position_range, [1.0, 2.0, 3.0, 10.0]);
        assert_eq!(record.direction_kind[3], 2.0);
        assert!((record.cones[0] - 0.2_f32.cos()).abs() < 1e-6);
        assert_eq!(record.color_intensity[3], 2.0);
    }
}
