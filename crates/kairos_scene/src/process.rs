//! Pause filter.
//!
//! Whether a node's callbacks run depends on its own [`ProcessMode`], the
//! effective state of its ancestors and the engine-wide pause flag.

/// Per-node processing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessMode {
    /// Same effective state as the parent. At the root this means
    /// [`ProcessMode::Pausable`].
    #[default]
    Inherit,
    /// Runs only while the engine is not paused.
    Pausable,
    /// Runs only while the engine is paused.
    WhenPaused,
    /// Always runs.
    Always,
    /// Never runs.
    Disabled,
}

impl ProcessMode {
    /// Resolves a non-inherited mode against the pause flag.
    ///
    /// Returns `None` for [`ProcessMode::Inherit`], which the caller must
    /// resolve through the parent chain.
    #[must_use]
    pub fn resolve(self, paused: bool) -> Option<bool> {
        match self {
            Self::Inherit => None,
            Self::Pausable => Some(!paused),
            Self::WhenPaused => Some(paused),
            Self::Always => Some(true),
            Self::Disabled => Some(false),
        }
    }
}

/// Walks `modes` from a node up to its root and returns whether the node is
/// processed.
///
/// The iterator yields the node's own mode first, then each ancestor's.
/// Running out of ancestors while still inheriting means the root default,
/// [`ProcessMode::Pausable`].
pub fn effective_processing(modes: impl IntoIterator<Item = ProcessMode>, paused: bool) -> bool {
    for mode in modes {
        if let Some(processed) = mode.resolve(paused) {
            return processed;
        }
    }
    ProcessMode::Pausable.resolve(paused).unwrap_or(true)
}
