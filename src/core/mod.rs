//! Core primitives.
//!
//! Small value types shared by the network and registry layers.

pub mod pose;
pub mod rng;

// Re-export core types
pub use pose::Pose;
pub use rng::{DeterministicRng, FixedJitter, JitterSource, ReconnectWindow};
