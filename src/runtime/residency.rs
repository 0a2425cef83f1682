//! Host/device residency of model weights.

use crate::config::MemoryMode;
use crate::error::Result;

/// Where a model's weights currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Serialized weights held in host RAM, no live session.
    Host,
    /// Live session on the active device.
    Device,
}

/// A model that can move between host memory and the active device.
pub trait Placeable {
    /// Current placement.
    fn placement(&self) -> Placement;

    /// Make the model runnable on the active device.
    fn move_to_device(&mut self) -> Result<()>;

    /// Release device memory, keeping the weights in host RAM.
    ///
    /// No-op when the active device is the CPU.
    fn move_to_host(&mut self);
}

/// Rules deciding when models are moved off the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidencyPolicy {
    /// Keep models on the device between calls.
    pub keep_resident: bool,
    /// Memory pressure mode.
    pub memory: MemoryMode,
}

impl ResidencyPolicy {
    /// Create a policy.
    pub fn new(keep_resident: bool, memory: MemoryMode) -> Self {
        Self {
            keep_resident,
            memory,
        }
    }

    /// Whether every other model must be moved to host before loading.
    pub fn offload_before_load(self) -> bool {
        self.memory.is_constrained()
    }

    /// Whether models are released once a call finishes.
    pub fn evict_after_use(self) -> bool {
        !self.keep_resident
    }
}

impl Default for ResidencyPolicy {
    fn default() -> Self {
        Self::new(false, MemoryMode::Normal)
    }
}
