//! # Kairos Core
//!
//! Foundational types shared by every Kairos crate: the error type, the
//! frame timer with injectable clocks, and fixed-step interpolation helpers.

pub mod errors;
pub mod lerp;
pub mod time;

pub use errors::{ErrorCategory, KairosError, Result};
pub use lerp::{Interpolated, Lerp};
pub use time::{Clock, ManualClock, SystemClock, Timer};
