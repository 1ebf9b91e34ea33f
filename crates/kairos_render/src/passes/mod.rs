//! Built-in render passes.
//!
//! The default chain is `ScenePass -> ToneMapPass`: the scene is shaded
//! into an HDR target, tone mapped to LDR, and the LDR image is blitted to
//! the surface.

pub mod scene;
pub mod tables;
pub mod tonemap;

pub use scene::{FrameGpu, LightGpu, MaterialGpu, ModelEntry, ModelGpu, SCENE_PASS, ScenePass, SlotScene};
pub use tables::{Acquired, RefCountedTable, Released, SharedImages};
pub use tonemap::{TONE_MAP_PASS, ToneMapPass, ToneMapUniforms};

use crate::chain::RenderChain;
use crate::settings::RendererSettings;

/// `ScenePass -> ToneMapPass`, sized for `settings`.
#[must_use]
pub fn default_chain(settings: &RendererSettings) -> RenderChain {
    RenderChain::new(settings.frames_in_flight)
        .with_pass(ScenePass::new(settings))
        .with_pass(ToneMapPass::new(settings))
}
