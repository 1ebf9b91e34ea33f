//! Error Types
//!
//! This module defines the error type shared by every Kairos crate.
//!
//! # Overview
//!
//! [`KairosError`] covers the failure modes of the runtime core:
//! - GPU initialization and synchronization-primitive failures
//! - Command stream submission and presentation failures
//! - Fixed-size resource table exhaustion
//! - Programming-contract violations (scene hierarchy, frame sequencing)
//! - Invalid configuration
//!
//! A stale presentable surface is *not* an error: it is absorbed inside the
//! frame synchronizer and never reaches callers.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, KairosError>`.
//!
//! ```rust,ignore
//! use kairos_core::errors::{KairosError, Result};
//!
//! fn provision() -> Result<()> {
//!     Err(KairosError::ResourceLimitExceeded { table: "materials", max: 256 })
//! }
//! ```

use std::fmt;

use thiserror::Error;

/// The main error type for the Kairos engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KairosError {
    // ========================================================================
    // GPU Initialization Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request GPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device or the presentable surface.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreateFailed(String),

    /// A frame slot's fence or semaphores could not be created.
    #[error("Failed to create synchronization primitives for frame slot {slot}: {reason}")]
    SyncPrimitiveCreation {
        /// Frame slot index
        slot: usize,
        /// Backend-provided reason
        reason: String,
    },

    /// A GPU resource could not be created.
    #[error("Failed to create GPU resource '{label}': {reason}")]
    ResourceCreation {
        /// Debug label of the resource
        label: String,
        /// Backend-provided reason
        reason: String,
    },

    // ========================================================================
    // Frame Submission Errors
    // ========================================================================
    /// Waiting on a frame slot's fence failed.
    #[error("Fence wait failed for frame slot {slot}: {reason}")]
    FenceWait {
        /// Frame slot index
        slot: usize,
        /// Backend-provided reason
        reason: String,
    },

    /// Command stream submission failed.
    #[error("Command stream submission failed for frame slot {slot}: {reason}")]
    SubmitFailed {
        /// Frame slot index
        slot: usize,
        /// Backend-provided reason
        reason: String,
    },

    /// Acquiring a presentable image failed for a reason other than staleness.
    #[error("Surface image acquisition failed: {0}")]
    AcquireFailed(String),

    /// Presentation failed for a reason other than staleness.
    #[error("Presentation failed: {0}")]
    PresentFailed(String),

    /// A resource handle did not refer to a live resource.
    #[error("Unknown GPU resource: {0}")]
    UnknownResource(String),

    // ========================================================================
    // Resource Limit Errors
    // ========================================================================
    /// A fixed-size table is full.
    #[error("{table} table is full (maximum {max} entries)")]
    ResourceLimitExceeded {
        /// Name of the table
        table: &'static str,
        /// Configured capacity
        max: usize,
    },

    // ========================================================================
    // Contract Violations
    // ========================================================================
    /// The node handle does not refer to a live node.
    #[error("Invalid node handle: {0}")]
    InvalidNode(String),

    /// The node already has a parent.
    #[error("Node '{0}' is already attached to a parent")]
    NodeAlreadyAttached(String),

    /// Attaching would make a node its own ancestor.
    #[error("Attaching '{child}' under '{parent}' would create a cycle")]
    HierarchyCycle {
        /// Name of the node being attached
        child: String,
        /// Name of the requested parent
        parent: String,
    },

    /// The node is not a child of the given parent.
    #[error("Node '{child}' is not a child of '{parent}'")]
    NotAChild {
        /// Name of the node being detached
        child: String,
        /// Name of the supposed parent
        parent: String,
    },

    /// The operation is not allowed on a node that is part of the scene.
    #[error("Node '{0}' cannot be modified while it is in the scene")]
    NodeInScene(String),

    /// A drawable node without any material.
    #[error("Mesh instance '{0}' has no materials")]
    MeshWithoutMaterials(String),

    /// A frame slot was drained out of its cycling order.
    #[error("Frame slot {got} drained out of order (expected slot {expected})")]
    SlotOutOfOrder {
        /// Slot the queues expected next
        expected: usize,
        /// Slot that was requested
        got: usize,
    },

    /// A frame slot index outside `0..frames_in_flight`.
    #[error("Frame slot {slot} is out of range (frames in flight: {frames_in_flight})")]
    SlotOutOfRange {
        /// Requested slot index
        slot: usize,
        /// Configured number of slots
        frames_in_flight: usize,
    },

    /// A frame slot operation was called in the wrong phase.
    #[error("Frame slot {slot}: cannot {operation} while {phase}")]
    FramePhase {
        /// Frame slot index
        slot: usize,
        /// Operation that was attempted
        operation: &'static str,
        /// Current phase of the slot
        phase: &'static str,
    },

    /// Illegal transition of a render pass resource set.
    #[error("Invalid resource set transition: {from} -> {to}")]
    InvalidResourceTransition {
        /// State before the transition
        from: &'static str,
        /// Requested state
        to: &'static str,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A settings value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// GPU or primitive creation failure; the device is unusable.
    Initialization,
    /// Submission, presentation or fence failure.
    Submission,
    /// A fixed-size table overflowed.
    ResourceLimit,
    /// A scheduler or scene invariant was broken by the caller.
    Contract,
    /// Settings rejected at startup.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialization => "initialization",
            Self::Submission => "submission",
            Self::ResourceLimit => "resource limit",
            Self::Contract => "contract violation",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

impl KairosError {
    /// Returns the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AdapterRequestFailed(_)
            | Self::DeviceCreateFailed(_)
            | Self::SyncPrimitiveCreation { .. }
            | Self::ResourceCreation { .. } => ErrorCategory::Initialization,

            Self::FenceWait { .. }
            | Self::SubmitFailed { .. }
            | Self::AcquireFailed(_)
            | Self::PresentFailed(_)
            | Self::UnknownResource(_) => ErrorCategory::Submission,

            Self::ResourceLimitExceeded { .. } => ErrorCategory::ResourceLimit,

            Self::InvalidNode(_)
            | Self::NodeAlreadyAttached(_)
            | Self::HierarchyCycle { .. }
            | Self::NotAChild { .. }
            | Self::NodeInScene(_)
            | Self::MeshWithoutMaterials(_)
            | Self::SlotOutOfOrder { .. }
            | Self::SlotOutOfRange { .. }
            | Self::FramePhase { .. }
            | Self::InvalidResourceTransition { .. } => ErrorCategory::Contract,

            Self::InvalidConfig(_) => ErrorCategory::Configuration,
        }
    }
}

/// Alias for `Result<T, KairosError>`.
pub type Result<T> = std::result::Result<T, KairosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_error_message_names_table() {
        let err = KairosError::ResourceLimitExceeded { table: "images", max: 64 };
        assert_eq!(err.to_string(), "images table is full (maximum 64 entries)");
        assert_eq!(err.category(), ErrorCategory::ResourceLimit);
    }

    #[test]
    fn contract_violations_are_classified() {
        let err = KairosError::SlotOutOfOrder { expected: 0, got: 1 };
        assert_eq!(err.category(), ErrorCategory::Contract);
        assert_eq!(err.category().to_string(), "contract violation");
    }
}
