//! Render Chain Integration Tests
//!
//! Tests for:
//! - The provisioning contract order and what surface recreation repeats
//! - Chaining: each pass samples the previous pass's colour output
//! - The last pass, whatever its type, blitting to the surface
//! - Stale binding tables being rebuilt per slot
//! - Chain configuration errors

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use kairos::prelude::*;
use kairos::render::gpu::{BindingLayoutDesc, BindingTableDesc, ImageDesc, ImageFormat, ResourceUsage};
use kairos::render::{
    Command, CommandStream, FrameContext, GpuDevice, LoadOp, ResourceDesc, ResourceHandle, ResourceSet, ResourceSetState, ScenePass,
    ToneMapPass,
};

type TestEngine = Engine<HeadlessBackend, ManualClock>;
type Log = Rc<RefCell<Vec<String>>>;

const EXTENT: Extent2d = Extent2d::new(320, 200);

fn settings(frames_in_flight: usize) -> EngineSettings {
    EngineSettings {
        renderer: RendererSettings { frames_in_flight, ..Default::default() },
        ..Default::default()
    }
}

fn engine_with(settings: EngineSettings, chain: RenderChain) -> TestEngine {
    Engine::with_chain(HeadlessBackend::new(EXTENT), ManualClock::new(), settings, chain).unwrap()
}

fn tick(engine: &mut TestEngine) -> TickReport {
    engine.clock_mut().advance(Duration::from_millis(16));
    engine.tick().unwrap()
}

fn stream(engine: &TestEngine, slot: usize) -> &CommandStream {
    engine.renderer().synchronizer().command_stream(FrameSlot(slot)).unwrap()
}

fn take(log: &Log) -> Vec<String> {
    log.borrow_mut().drain(..).collect()
}

/// Minimal pass that logs every contract call it receives.
struct ProbePass {
    log: Log,
    resources: ResourceSet,
    output: Vec<Option<ResourceHandle>>,
    input: Vec<Option<ResourceHandle>>,
}

impl ProbePass {
    fn new(frames_in_flight: usize, log: &Log) -> Self {
        Self {
            log: Rc::clone(log),
            resources: ResourceSet::new(frames_in_flight),
            output: vec![None; frames_in_flight],
            input: vec![None; frames_in_flight],
        }
    }

    fn input(&self, slot: FrameSlot) -> Option<ResourceHandle> {
        self.input[slot.index()]
    }

    fn push(&self, entry: String) {
        self.log.borrow_mut().push(entry);
    }
}

impl RenderPass for ProbePass {
    fn name(&self) -> &str {
        "Probe Pass"
    }

    fn resource_set(&self) -> &ResourceSet {
        &self.resources
    }

    fn create_backing_resources(&mut self, gpu: &mut dyn GpuDevice, extent: Extent2d) -> kairos::Result<()> {
        self.push(format!("backing {}x{}", extent.width, extent.height));
        for output in &mut self.output {
            *output = Some(gpu.create_resource(
                "Probe Pass",
                ResourceDesc::Image(ImageDesc {
                    label: "Probe Output".into(),
                    extent,
                    format: ImageFormat::Surface,
                    usage: ResourceUsage::COLOR_TARGET | ResourceUsage::COPY_SRC,
                }),
            )?);
        }
        Ok(())
    }

    fn cleanup_backing_resources(&mut self, gpu: &mut dyn GpuDevice) {
        self.push("cleanup backing".into());
        for handle in self.output.iter_mut().filter_map(Option::take) {
            gpu.destroy_resource(handle);
        }
    }

    fn create_binding_layout(&mut self, gpu: &mut dyn GpuDevice) -> kairos::Result<()> {
        self.push("layout".into());
        let layout = gpu.create_resource(
            "Probe Pass",
            ResourceDesc::BindingLayout(BindingLayoutDesc { label: "Probe Layout".into(), entries: Vec::new() }),
        )?;
        self.resources.layout_created(layout)
    }

    fn create_or_update_bindings(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, create: bool) -> kairos::Result<()> {
        self.push(format!("bindings {} {}", slot.index(), if create { "create" } else { "update" }));
        let table = gpu.create_resource(
            "Probe Pass",
            ResourceDesc::BindingTable(BindingTableDesc {
                label: "Probe Bindings".into(),
                layout: self.resources.layout().unwrap(),
                resources: Vec::new(),
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

    fn create_pipeline_layout(&mut self, _gpu: &mut dyn GpuDevice) -> kairos::Result<()> {
        self.push("pipeline layout".into());
        Ok(())
    }

    fn load_shader_programs(&mut self, _gpu: &mut dyn GpuDevice) -> kairos::Result<()> {
        self.push("shaders".into());
        Ok(())
    }

    fn update(&mut self, _gpu: &mut dyn GpuDevice, slot: FrameSlot, _frame: &FrameContext<'_>) -> kairos::Result<()> {
        self.push(format!("update {}", slot.index()));
        Ok(())
    }

    fn begin_pass(&mut self, stream: &mut CommandStream, slot: FrameSlot) -> kairos::Result<()> {
        self.push(format!("begin {}", slot.index()));
        stream.push(Command::BeginPass {
            label: "Probe Pass".into(),
            color: self.output[slot.index()].unwrap(),
            depth: None,
            load: LoadOp::Load,
        });
        Ok(())
    }

    fn record(&mut self, _stream: &mut CommandStream, slot: FrameSlot) -> kairos::Result<()> {
        self.push(format!("record {}", slot.index()));
        Ok(())
    }

    fn color_output(&self, slot: FrameSlot) -> Option<ResourceHandle> {
        self.output.get(slot.index()).copied().flatten()
    }

    fn set_color_input(&mut self, slot: FrameSlot, image: ResourceHandle) -> kairos::Result<()> {
        self.push(format!("input {}", slot.index()));
        self.input[slot.index()] = Some(image);
        if self.resources.has_bindings() {
            self.resources.mark_stale(slot)?;
        }
        Ok(())
    }

    fn cleanup(&mut self, gpu: &mut dyn GpuDevice) {
        self.cleanup_backing_resources(gpu);
        for handle in self.resources.reset() {
            gpu.destroy_resource(handle);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Provisioning Contract
// ============================================================================

#[test]
fn provisioning_follows_the_contract_order() {
    let log = Log::default();
    let settings = settings(2);
    let chain = RenderChain::new(2)
        .with_pass(ScenePass::new(&settings.renderer))
        .with_pass(ProbePass::new(2, &log));
    let engine = engine_with(settings, chain);

    assert_eq!(
        take(&log),
        vec![
            "backing 320x200",
            "input 0",
            "input 1",
            "layout",
            "bindings 0 create",
            "bindings 1 create",
            "pipeline layout",
            "shaders",
        ]
    );
    assert!(engine.renderer().chain().is_provisioned());
    for index in 0..engine.renderer().chain().len() {
        let pass = engine.renderer().chain().pass(index).unwrap();
        assert_eq!(pass.resource_set().state(), ResourceSetState::BindingsPopulated, "{}", pass.name());
    }
}

#[test]
fn every_pass_updates_before_any_pass_begins() {
    let log = Log::default();
    let chain = RenderChain::new(2).with_pass(ProbePass::new(2, &log)).with_pass(ProbePass::new(2, &log));
    let mut engine = engine_with(settings(2), chain);
    take(&log);

    tick(&mut engine);
    assert_eq!(take(&log), vec!["update 0", "update 0", "begin 0", "record 0", "begin 0", "record 0"]);
    assert_eq!(stream(&engine, 0).debug_groups().collect::<Vec<_>>(), vec!["Probe Pass", "Probe Pass"]);
}

#[test]
fn recreation_repeats_only_backing_resources_and_wiring() {
    let log = Log::default();
    let settings = settings(2);
    let chain = RenderChain::new(2)
        .with_pass(ScenePass::new(&settings.renderer))
        .with_pass(ProbePass::new(2, &log));
    let mut engine = engine_with(settings, chain);
    tick(&mut engine);
    take(&log);

    engine.resize(640, 480);
    assert_eq!(tick(&mut engine).outcome, FrameOutcome::Skipped);
    assert_eq!(take(&log), vec!["cleanup backing", "backing 640x480", "input 0", "input 1"]);
}

#[test]
fn stale_bindings_are_rebuilt_only_when_their_slot_records() {
    let log = Log::default();
    let settings = settings(2);
    let chain = RenderChain::new(2)
        .with_pass(ScenePass::new(&settings.renderer))
        .with_pass(ProbePass::new(2, &log));
    let mut engine = engine_with(settings, chain);
    tick(&mut engine);
    tick(&mut engine);

    engine.resize(640, 480);
    tick(&mut engine); // slot 0 skipped, everything recreated
    let probe = engine.renderer().chain().find_pass::<ProbePass>().unwrap();
    assert_eq!(probe.resource_set().state(), ResourceSetState::Stale);
    take(&log);

    tick(&mut engine); // slot 1
    assert_eq!(take(&log), vec!["bindings 1 update", "update 1", "begin 1", "record 1"]);
    let probe = engine.renderer().chain().find_pass::<ProbePass>().unwrap();
    assert!(!probe.resource_set().is_stale(FrameSlot(1)));
    assert!(probe.resource_set().is_stale(FrameSlot(0)));

    tick(&mut engine); // slot 0
    assert_eq!(take(&log), vec!["bindings 0 update", "update 0", "begin 0", "record 0"]);
    let probe = engine.renderer().chain().find_pass::<ProbePass>().unwrap();
    assert_eq!(probe.resource_set().state(), ResourceSetState::BindingsPopulated);
}

// ============================================================================
// Chaining and the Surface Blit
// ============================================================================

#[test]
fn default_chain_tone_maps_and_blits_the_ldr_image() {
    let mut engine = engine_with(settings(2), kairos::render::default_chain(&settings(2).renderer));
    tick(&mut engine);

    let commands = stream(&engine, 0);
    assert_eq!(commands.debug_groups().collect::<Vec<_>>(), vec!["Scene Pass", "Tone Map Pass"]);

    let chain = engine.renderer().chain();
    let tone_map = chain.find_pass::<ToneMapPass>().unwrap();
    let scene = chain.find_pass::<ScenePass>().unwrap();
    assert_eq!(commands.blit_source(), tone_map.color_output(FrameSlot(0)));
    assert_eq!(tone_map.color_input(FrameSlot(0)), scene.color_output(FrameSlot(0)));

    let all = commands.commands();
    assert!(matches!(all[all.len() - 2], Command::BlitToSurface { .. }));
    assert_eq!(all[all.len() - 1], Command::PopDebugGroup);
    let blits = all.iter().filter(|c| matches!(c, Command::BlitToSurface { .. })).count();
    assert_eq!(blits, 1);
}

#[test]
fn last_pass_blits_regardless_of_its_type() {
    let settings = settings(2);
    let chain = RenderChain::new(2).with_pass(ScenePass::new(&settings.renderer));
    let mut engine = engine_with(settings, chain);
    tick(&mut engine);
    tick(&mut engine);

    let scene = engine.renderer().chain().find_pass::<ScenePass>().unwrap();
    for index in 0..2 {
        assert_eq!(stream(&engine, index).blit_source(), scene.color_output(FrameSlot(index)));
    }
}

#[test]
fn custom_last_pass_blits_its_own_output() {
    let log = Log::default();
    let settings = settings(2);
    let chain = RenderChain::new(2)
        .with_pass(ScenePass::new(&settings.renderer))
        .with_pass(ToneMapPass::new(&settings.renderer))
        .with_pass(ProbePass::new(2, &log));
    let mut engine = engine_with(settings, chain);
    tick(&mut engine);

    let chain = engine.renderer().chain();
    let tone_map = chain.find_pass::<ToneMapPass>().unwrap();
    let probe = chain.find_pass::<ProbePass>().unwrap();
    assert_eq!(probe.input(FrameSlot(0)), tone_map.color_output(FrameSlot(0)));
    assert_eq!(stream(&engine, 0).blit_source(), probe.color_output(FrameSlot(0)));
}

#[test]
fn stacked_tone_maps_chain_output_to_input() {
    let settings = settings(3);
    let chain = RenderChain::new(3)
        .with_pass(ScenePass::new(&settings.renderer))
        .with_pass(ToneMapPass::new(&settings.renderer))
        .with_pass(ToneMapPass::new(&settings.renderer));
    let engine = engine_with(settings, chain);

    let chain = engine.renderer().chain();
    let first = chain.pass(1).unwrap().as_any().downcast_ref::<ToneMapPass>().unwrap();
    let second = chain.pass(2).unwrap().as_any().downcast_ref::<ToneMapPass>().unwrap();
    for index in 0..3 {
        let slot = FrameSlot(index);
        assert_eq!(second.color_input(slot), first.color_output(slot));
        assert_ne!(first.color_output(slot), second.color_output(slot));
    }
}

// ============================================================================
// Clear Colour
// ============================================================================

fn scene_load(engine: &TestEngine, slot: usize) -> LoadOp {
    stream(engine, slot)
        .commands()
        .iter()
        .find_map(|c| match c {
            Command::BeginPass { label, load, .. } if label == "Scene Pass" => Some(*load),
            _ => None,
        })
        .unwrap()
}

#[test]
fn scene_pass_clears_to_the_settings_colour_without_an_environment() {
    let mut settings = settings(2);
    settings.renderer.clear_color = Vec4::new(0.1, 0.2, 0.3, 1.0);
    let chain = kairos::render::default_chain(&settings.renderer);
    let mut engine = engine_with(settings, chain);
    tick(&mut engine);
    assert_eq!(scene_load(&engine, 0), LoadOp::Clear(Vec4::new(0.1, 0.2, 0.3, 1.0)));
}

#[test]
fn scene_pass_clears_to_the_environment_colour() {
    let settings = settings(2);
    let chain = kairos::render::default_chain(&settings.renderer);
    let mut engine = engine_with(settings, chain);
    let root = engine.scene().root();
    let environment = Environment { clear_color: Vec4::new(0.5, 0.4, 0.3, 1.0), ..Default::default() };
    engine.scene_mut().spawn(root, Node::with_kind("Environment", NodeKind::Environment(environment))).unwrap();

    tick(&mut engine);
    assert_eq!(scene_load(&engine, 0), LoadOp::Clear(Vec4::new(0.5, 0.4, 0.3, 1.0)));
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn empty_chain_is_rejected() {
    let result = Engine::with_chain(HeadlessBackend::new(EXTENT), ManualClock::new(), settings(2), RenderChain::new(2));
    assert!(matches!(result, Err(KairosError::InvalidConfig(_))));
}

#[test]
fn passes_cannot_be_added_after_provisioning() {
    let settings = settings(2);
    let chain = kairos::render::default_chain(&settings.renderer);
    let mut engine = engine_with(settings.clone(), chain);

    let extra = Box::new(ToneMapPass::new(&settings.renderer));
    let err = engine.renderer_mut().chain_mut().add_pass(extra).unwrap_err();
    assert!(matches!(err, KairosError::FramePhase { .. }));
    assert_eq!(engine.renderer().chain().len(), 2);
}

#[test]
fn chain_passes_are_listed_in_order() {
    let settings = settings(2);
    let engine = engine_with(settings.clone(), kairos::render::default_chain(&settings.renderer));
    let names: Vec<&str> = engine.renderer().chain().pass_names().collect();
    assert_eq!(names, vec!["Scene Pass", "Tone Map Pass"]);
}
