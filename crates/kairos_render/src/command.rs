//! Command Streams
//!
//! Passes record backend-neutral [`Command`]s into a per-slot
//! [`CommandStream`]; the backend translates the finished stream at submit
//! time. Keeping the recording backend-neutral is what lets the whole frame
//! loop run against the headless backend in tests.

use std::ops::Range;

use glam::Vec4;

use crate::gpu::ResourceHandle;

/// What happens to a colour attachment at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp {
    Clear(Vec4),
    Load,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PushDebugGroup(String),
    PopDebugGroup,
    BeginPass {
        label: String,
        color: ResourceHandle,
        depth: Option<ResourceHandle>,
        load: LoadOp,
    },
    SetPipeline(ResourceHandle),
    SetBindings {
        index: u32,
        table: ResourceHandle,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    EndPass,
    /// Copies `source` into the acquired presentable image. Only valid outside
    /// a pass.
    BlitToSurface {
        source: ResourceHandle,
    },
}

/// The command buffer owned by one frame slot.
#[derive(Debug, Clone, Default)]
pub struct CommandStream {
    label: String,
    commands: Vec<Command>,
}

impl CommandStream {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::with_capacity(64),
        }
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Drops the previous frame's commands, keeping the allocation.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    #[inline]
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, Command::Draw { .. })).count()
    }

    /// Source of the surface blit, if one was recorded.
    #[must_use]
    pub fn blit_source(&self) -> Option<ResourceHandle> {
        self.commands.iter().find_map(|c| match c {
            Command::BlitToSurface { source } => Some(*source),
            _ => None,
        })
    }

    /// Labels of the debug groups in recording order.
    pub fn debug_groups(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            Command::PushDebugGroup(label) => Some(label.as_str()),
            _ => None,
        })
    }
}
