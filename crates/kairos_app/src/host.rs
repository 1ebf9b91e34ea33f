//! Host window collaborator.
//!
//! [`Engine::run`](crate::Engine::run) polls a [`HostWindow`] once per tick.
//! Real windowing lives outside the engine; [`HeadlessHost`] drives a fixed
//! number of frames, optionally resizing along the way.

use std::collections::VecDeque;

use kairos_render::Extent2d;

use crate::engine::TickReport;

pub trait HostWindow {
    fn should_close(&self) -> bool;

    /// A resize that happened since the last call, if any.
    fn take_resize(&mut self) -> Option<Extent2d>;

    /// Called after every successful tick.
    fn frame_finished(&mut self, _report: &TickReport) {}
}

/// Runs for a fixed number of ticks.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost {
    max_frames: u64,
    frames: u64,
    resizes: VecDeque<(u64, Extent2d)>,
    presented: u64,
    skipped: u64,
}

impl HeadlessHost {
    #[must_use]
    pub fn new(max_frames: u64) -> Self {
        Self { max_frames, ..Default::default() }
    }

    /// Reports a resize to `extent` before tick number `frame` (0-based).
    #[must_use]
    pub fn with_resize_at(mut self, frame: u64, extent: Extent2d) -> Self {
        self.resizes.push_back((frame, extent));
        self.resizes.make_contiguous().sort_by_key(|(f, _)| *f);
        self
    }

    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[must_use]
    pub fn presented(&self) -> u64 {
        self.presented
    }

    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl HostWindow for HeadlessHost {
    fn should_close(&self) -> bool {
        self.frames >= self.max_frames
    }

    fn take_resize(&mut self) -> Option<Extent2d> {
        let (frame, _) = self.resizes.front()?;
        if *frame > self.frames {
            return None;
        }
        self.resizes.pop_front().map(|(_, extent)| extent)
    }

    fn frame_finished(&mut self, report: &TickReport) {
        self.frames += 1;
        if report.outcome.is_presented() {
            self.presented += 1;
        } else {
            self.skipped += 1;
        }
    }
}
