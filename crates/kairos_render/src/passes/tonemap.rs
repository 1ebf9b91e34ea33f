//! Tone Map Pass
//!
//! Maps the previous pass's HDR colour into a displayable LDR image with the
//! ACES filmic curve. Sits last in the default chain, so its output is what
//! gets blitted to the surface.

use std::any::Any;

use bytemuck::{Pod, Zeroable};
use kairos_core::{KairosError, Result};

use crate::command::{Command, CommandStream, LoadOp};
use crate::gpu::{
    BindingKind, BindingLayoutDesc, BindingTableDesc, BoundResource, BufferDesc, Extent2d, GpuDevice, ImageDesc,
    ImageFormat, PipelineDesc, PipelineLayoutDesc, ResourceDesc, ResourceHandle, ResourceUsage, ShaderDesc,
};
use crate::pass::{FrameContext, RenderPass, ResourceSet};
use crate::settings::RendererSettings;
use crate::slot::{FrameSlot, PerSlot};

pub const TONE_MAP_PASS: &str = "Tone Map Pass";

pub const LDR_FORMAT: ImageFormat = ImageFormat::Surface;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ToneMapUniforms {
    pub exposure: f32,
    pub _pad: [f32; 3],
}

pub struct ToneMapPass {
    exposure: f32,
    resources: ResourceSet,
    input: PerSlot<Option<ResourceHandle>>,
    output: PerSlot<Option<ResourceHandle>>,
    uniforms: PerSlot<Option<ResourceHandle>>,
    pipeline_layout: Option<ResourceHandle>,
    shader: Option<ResourceHandle>,
    pipeline: Option<ResourceHandle>,
}

impl ToneMapPass {
    #[must_use]
    pub fn new(settings: &RendererSettings) -> Self {
        let frames = settings.frames_in_flight;
        Self {
            exposure: settings.exposure,
            resources: ResourceSet::new(frames),
            input: PerSlot::splat(frames, None),
            output: PerSlot::splat(frames, None),
            uniforms: PerSlot::splat(frames, None),
            pipeline_layout: None,
            shader: None,
            pipeline: None,
        }
    }

    #[must_use]
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    /// Takes effect from the next recorded frame of each slot.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    #[must_use]
    pub fn color_input(&self, slot: FrameSlot) -> Option<ResourceHandle> {
        self.input.get(slot).copied().flatten()
    }

    fn missing(slot: FrameSlot, what: &'static str) -> KairosError {
        KairosError::FramePhase { slot: slot.index(), operation: "build tone map bindings", phase: what }
    }
}

impl RenderPass for ToneMapPass {
    fn name(&self) -> &str {
        TONE_MAP_PASS
    }

    fn resource_set(&self) -> &ResourceSet {
        &self.resources
    }

    fn create_backing_resources(&mut self, gpu: &mut dyn GpuDevice, extent: Extent2d) -> Result<()> {
        for slot in self.output.slots() {
            self.output[slot] = Some(gpu.create_resource(
                TONE_MAP_PASS,
                ResourceDesc::Image(ImageDesc {
                    label: format!("Tone Map Output {}", slot.index()).into(),
                    extent: extent.clamped(),
                    format: LDR_FORMAT,
                    usage: ResourceUsage::COLOR_TARGET | ResourceUsage::SAMPLED | ResourceUsage::COPY_SRC,
                }),
            )?);
        }
        Ok(())
    }

    fn cleanup_backing_resources(&mut self, gpu: &mut dyn GpuDevice) {
        for handle in self.output.iter_mut().filter_map(Option::take) {
            gpu.destroy_resource(handle);
        }
    }

    fn create_binding_layout(&mut self, gpu: &mut dyn GpuDevice) -> Result<()> {
        let layout = gpu.create_resource(
            TONE_MAP_PASS,
            ResourceDesc::BindingLayout(BindingLayoutDesc {
                label: "Tone Map Binding Layout".into(),
                entries: vec![BindingKind::SampledImage, BindingKind::Sampler, BindingKind::UniformBuffer],
            }),
        )?;
        self.resources.layout_created(layout)
    }

    fn create_or_update_bindings(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, create: bool) -> Result<()> {
        if create && self.uniforms[slot].is_none() {
            self.uniforms[slot] = Some(gpu.create_resource(
                TONE_MAP_PASS,
                ResourceDesc::Buffer(BufferDesc {
                    label: format!("Tone Map Uniforms {}", slot.index()).into(),
                    size: size_of::<ToneMapUniforms>() as u64,
                    usage: ResourceUsage::UNIFORM | ResourceUsage::COPY_DST,
                }),
            )?);
        }

        let layout = self.resources.layout().ok_or(Self::missing(slot, "the binding layout is missing"))?;
        let input = self.input[slot].ok_or(Self::missing(slot, "no colour input is wired"))?;
        let uniforms = self.uniforms[slot].ok_or(Self::missing(slot, "the uniform buffer is missing"))?;
        let table = gpu.create_resource(
            TONE_MAP_PASS,
            ResourceDesc::BindingTable(BindingTableDesc {
                label: format!("Tone Map Bindings {}", slot.index()).into(),
                layout,
                resources: vec![
                    BoundResource::Image(input),
                    BoundResource::Sampler,
                    BoundResource::Buffer(uniforms),
                ],
            }),
        )?;

        if create {
            self.resources.populate(slot, table)
        } else {
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
            TONE_MAP_PASS,
            ResourceDesc::PipelineLayout(PipelineLayoutDesc {
                label: "Tone Map Pipeline Layout".into(),
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
        let shader = gpu.create_resource(
            TONE_MAP_PASS,
            ResourceDesc::Shader(ShaderDesc {
                label: "Tone Map Shader".into(),
                source: include_str!("../shaders/tonemap.wgsl").into(),
            }),
        )?;
        self.shader = Some(shader);
        self.pipeline = Some(gpu.create_resource(
            TONE_MAP_PASS,
            ResourceDesc::Pipeline(PipelineDesc {
                label: "Tone Map Pipeline".into(),
                layout,
                shader,
                color_format: LDR_FORMAT,
                depth_format: None,
                alpha_blend: false,
            }),
        )?);
        Ok(())
    }

    fn update(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, _frame: &FrameContext<'_>) -> Result<()> {
        if let Some(buffer) = self.uniforms.get(slot).copied().flatten() {
            let uniforms = ToneMapUniforms { exposure: self.exposure, _pad: [0.0; 3] };
            gpu.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms))?;
        }
        Ok(())
    }

    fn begin_pass(&mut self, stream: &mut CommandStream, slot: FrameSlot) -> Result<()> {
        let color = self.output[slot].ok_or(KairosError::FramePhase {
            slot: slot.index(),
            operation: "begin the tone map pass",
            phase: "the output image is missing",
        })?;
        stream.push(Command::BeginPass {
            label: TONE_MAP_PASS.to_string(),
            color,
            depth: None,
            load: LoadOp::Load,
        });
        Ok(())
    }

    fn record(&mut self, stream: &mut CommandStream, slot: FrameSlot) -> Result<()> {
        let not_ready = |phase| KairosError::FramePhase { slot: slot.index(), operation: "record the tone map pass", phase };
        let pipeline = self.pipeline.ok_or(not_ready("shaders not loaded"))?;
        let table = self.resources.table(slot).ok_or(not_ready("no binding table"))?;
        stream.push(Command::SetPipeline(pipeline));
        stream.push(Command::SetBindings { index: 0, table });
        stream.push(Command::Draw { vertices: 0..3, instances: 0..1 });
        Ok(())
    }

    fn color_output(&self, slot: FrameSlot) -> Option<ResourceHandle> {
        self.output.get(slot).copied().flatten()
    }

    /// A new input invalidates the slot's table once it exists; during
    /// provisioning the table is built afterwards from the stored input.
    fn set_color_input(&mut self, slot: FrameSlot, image: ResourceHandle) -> Result<()> {
        if self.input.get(slot).copied().flatten() == Some(image) {
            return Ok(());
        }
        self.input[slot] = Some(image);
        if self.resources.has_bindings() {
            self.resources.mark_stale(slot)?;
        }
        Ok(())
    }

    fn cleanup(&mut self, gpu: &mut dyn GpuDevice) {
        self.cleanup_backing_resources(gpu);
        let singles = [self.pipeline.take(), self.shader.take(), self.pipeline_layout.take()];
        for handle in singles.into_iter().flatten().chain(self.uniforms.iter_mut().filter_map(Option::take)) {
            gpu.destroy_resource(handle);
        }
        for handle in self.resources.reset() {
            gpu.destroy_resource(handle);
        }
        for input in self.input.iter_mut() {
            *input = None;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
