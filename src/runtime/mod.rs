//! ONNX Runtime plumbing shared by the interrogator and the upscaler.
//!
//! Provides execution provider selection, the host/device residency model and
//! a session wrapper that keeps the serialized graph in host memory while the
//! live session occupies the active device.

mod provider;
mod residency;
mod session;

pub use provider::{Provider, ProviderMetadata, available_providers, select_provider};
pub use residency::{Placeable, Placement, ResidencyPolicy};
pub use session::{OnnxModel, extract_f32, tensor_f32, tensor_i64};
