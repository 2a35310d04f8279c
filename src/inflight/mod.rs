//! In-flight Call Module
//!
//! Collapses concurrent identical calls into one underlying call.

mod registry;

pub use registry::PendingCalls;
