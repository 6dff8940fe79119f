//! Testing utilities for camera-session
//!
//! Provides synthetic hardware (a capability source and a capture backend)
//! and reference devices, enabling offline testing without a camera stack.

pub mod fixtures;
pub mod synthetic;

pub use synthetic::{SyntheticCapabilitySource, SyntheticCaptureBackend};
