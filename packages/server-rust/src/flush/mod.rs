//! Flushing pending view counts into a persistence sink.
//!
//! - [`trigger`]: one drain-and-persist cycle, serialized per store
//! - [`worker`]: background task running the trigger on a schedule

pub mod trigger;
pub mod worker;

pub use trigger::{FlushState, FlushStats, FlushTrigger};
pub use worker::{FlushWorker, MIN_FLUSH_INTERVAL};
