//! Execution provider selection and metadata.

use crate::config::InferenceDevice;
use crate::error::{Error, Result};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    DirectMLExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
    OpenVINOExecutionProvider, ROCmExecutionProvider, TensorRTExecutionProvider,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// An ONNX Runtime execution provider vista knows how to configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Plain CPU execution.
    Cpu,
    /// NVIDIA CUDA.
    Cuda,
    /// NVIDIA `TensorRT`.
    TensorRt,
    /// Windows `DirectML`.
    DirectMl,
    /// Apple `CoreML`.
    CoreMl,
    /// AMD `ROCm`.
    Rocm,
    /// Intel `OpenVINO`.
    OpenVino,
}

/// Metadata for an execution provider.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProviderMetadata {
    /// CLI flag identifier (e.g., "cuda", "tensorrt").
    pub id: &'static str,
    /// Display name (e.g., "CUDA", "`TensorRT`").
    pub name: &'static str,
    /// Full description for human output (e.g., "CUDA (NVIDIA GPU acceleration)").
    pub description: &'static str,
}

/// GPU providers in the order auto mode tries them.
const GPU_PRIORITY: [Provider; 6] = [
    Provider::TensorRt,
    Provider::Cuda,
    Provider::DirectMl,
    Provider::CoreMl,
    Provider::Rocm,
    Provider::OpenVino,
];

impl Provider {
    /// Every provider, CPU first.
    pub const ALL: [Self; 7] = [
        Self::Cpu,
        Self::Cuda,
        Self::TensorRt,
        Self::DirectMl,
        Self::CoreMl,
        Self::Rocm,
        Self::OpenVino,
    ];

    /// Display metadata.
    #[must_use]
    pub fn metadata(self) -> ProviderMetadata {
        match self {
            Self::Cpu => ProviderMetadata {
                id: "cpu",
                name: "CPU",
                description: "CPU (always available)",
            },
            Self::Cuda => ProviderMetadata {
                id: "cuda",
                name: "CUDA",
                description: "CUDA (NVIDIA GPU acceleration)",
            },
            Self::TensorRt => ProviderMetadata {
                id: "tensorrt",
                name: "TensorRT",
                description: "TensorRT (NVIDIA optimized inference)",
            },
            Self::DirectMl => ProviderMetadata {
                id: "directml",
                name: "DirectML",
                description: "DirectML (Windows GPU acceleration)",
            },
            Self::CoreMl => ProviderMetadata {
                id: "coreml",
                name: "CoreML",
                description: "CoreML (Apple GPU/Neural Engine)",
            },
            Self::Rocm => ProviderMetadata {
                id: "rocm",
                name: "ROCm",
                description: "ROCm (AMD GPU acceleration)",
            },
            Self::OpenVino => ProviderMetadata {
                id: "openvino",
                name: "OpenVINO",
                description: "OpenVINO (Intel optimization)",
            },
        }
    }

    /// Whether the provider runs on accelerator memory rather than host RAM.
    pub fn is_accelerator(self) -> bool {
        !matches!(self, Self::Cpu)
    }

    /// Whether the loaded ONNX Runtime build supports this provider.
    pub fn is_available(self) -> bool {
        let available = match self {
            Self::Cpu => return true,
            Self::Cuda => CUDAExecutionProvider::default().is_available(),
            Self::TensorRt => TensorRTExecutionProvider::default().is_available(),
            Self::DirectMl => DirectMLExecutionProvider::default().is_available(),
            Self::CoreMl => CoreMLExecutionProvider::default().is_available(),
            Self::Rocm => ROCmExecutionProvider::default().is_available(),
            Self::OpenVino => OpenVINOExecutionProvider::default().is_available(),
        };
        available.unwrap_or(false)
    }

    /// Provider registration for a session builder.
    pub fn dispatch(self) -> ExecutionProviderDispatch {
        match self {
            Self::Cpu => CPUExecutionProvider::default().build(),
            Self::Cuda => CUDAExecutionProvider::default().build(),
            Self::TensorRt => TensorRTExecutionProvider::default()
                .with_fp16(true)
                .with_engine_cache(true)
                .build(),
            Self::DirectMl => DirectMLExecutionProvider::default().build(),
            Self::CoreMl => CoreMLExecutionProvider::default().build(),
            Self::Rocm => ROCmExecutionProvider::default().build(),
            Self::OpenVino => OpenVINOExecutionProvider::default().build(),
        }
    }

    fn explicit(device: InferenceDevice) -> Option<Self> {
        match device {
            InferenceDevice::Cuda => Some(Self::Cuda),
            InferenceDevice::TensorRt => Some(Self::TensorRt),
            InferenceDevice::DirectMl => Some(Self::DirectMl),
            InferenceDevice::CoreMl => Some(Self::CoreMl),
            InferenceDevice::Rocm => Some(Self::Rocm),
            InferenceDevice::OpenVino => Some(Self::OpenVino),
            InferenceDevice::Auto | InferenceDevice::Gpu | InferenceDevice::Cpu => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.metadata().name)
    }
}

/// Providers supported by the loaded runtime, CPU always included.
pub fn available_providers() -> Vec<Provider> {
    let providers: Vec<Provider> = Provider::ALL
        .into_iter()
        .filter(|p| p.is_available())
        .collect();
    debug!(
        "Available execution providers: {}",
        providers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    providers
}

/// Pick the provider for a device setting.
///
/// Auto and `gpu` walk the GPU priority list and fall back to CPU (`gpu` warns);
/// an explicit provider that is not available is an error.
pub fn select_provider(device: InferenceDevice, available: &[Provider]) -> Result<Provider> {
    let best_gpu = GPU_PRIORITY.into_iter().find(|p| available.contains(p));

    match device {
        InferenceDevice::Cpu => {
            info!("Requested device: CPU");
            Ok(Provider::Cpu)
        }
        InferenceDevice::Auto => {
            if let Some(provider) = best_gpu {
                info!("Auto mode: {provider} available, attempting GPU");
                Ok(provider)
            } else {
                info!("Auto mode: No GPU providers available, using CPU");
                Ok(Provider::Cpu)
            }
        }
        InferenceDevice::Gpu => {
            if let Some(provider) = best_gpu {
                info!("--gpu: Selected {provider} provider");
                Ok(provider)
            } else {
                warn!("--gpu requested but no GPU providers available, using CPU");
                Ok(Provider::Cpu)
            }
        }
        explicit => {
            let provider = Provider::explicit(explicit).ok_or_else(|| Error::Internal {
                message: format!("unhandled device {explicit:?}"),
            })?;
            if !available.contains(&provider) {
                return Err(Error::ProviderUnavailable {
                    provider: provider.to_string(),
                    available: available
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            info!("Requested device: {provider}");
            Ok(provider)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_metadata_returns_expected_values() {
        let test_cases = [
            (Provider::Cpu, "cpu", "CPU", "CPU"),
            (Provider::Cuda, "cuda", "CUDA", "NVIDIA"),
            (Provider::TensorRt, "tensorrt", "TensorRT", "NVIDIA"),
            (Provider::DirectMl, "directml", "DirectML", "Windows"),
            (Provider::CoreMl, "coreml", "CoreML", "Apple"),
            (Provider::Rocm, "rocm", "ROCm", "AMD"),
            (Provider::OpenVino, "openvino", "OpenVINO", "Intel"),
        ];

        for (provider, expected_id, expected_name, desc_keyword) in test_cases {
            let meta = provider.metadata();
            assert_eq!(meta.id, expected_id, "ID mismatch for {provider:?}");
            assert_eq!(meta.name, expected_name, "Name mismatch for {provider:?}");
            assert!(
                meta.description.contains(desc_keyword),
                "Description for {provider:?} should contain '{desc_keyword}'"
            );
        }
    }

    #[test]
    fn test_auto_prefers_gpu_priority_order() {
        let available = [Provider::Cpu, Provider::Cuda, Provider::TensorRt];
        let selected = select_provider(InferenceDevice::Auto, &available).unwrap();
        assert_eq!(selected, Provider::TensorRt);
    }

    #[test]
    fn test_auto_falls_back_to_cpu() {
        let selected = select_provider(InferenceDevice::Auto, &[Provider::Cpu]).unwrap();
        assert_eq!(selected, Provider::Cpu);
    }

    #[test]
    fn test_gpu_falls_back_to_cpu() {
        let selected = select_provider(InferenceDevice::Gpu, &[Provider::Cpu]).unwrap();
        assert_eq!(selected, Provider::Cpu);
    }

    #[test]
    fn test_cpu_ignores_available_gpu() {
        let selected =
            select_provider(InferenceDevice::Cpu, &[Provider::Cpu, Provider::Cuda]).unwrap();
        assert_eq!(selected, Provider::Cpu);
    }

    #[test]
    fn test_explicit_unavailable_provider_errors() {
        let result = select_provider(InferenceDevice::Rocm, &[Provider::Cpu, Provider::Cuda]);
        match result {
            Err(Error::ProviderUnavailable {
                provider,
                available,
            }) => {
                assert_eq!(provider, "ROCm");
                assert_eq!(available, "CPU, CUDA");
            }
            other => panic!("expected ProviderUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_available_provider_selected() {
        let selected =
            select_provider(InferenceDevice::Cuda, &[Provider::Cpu, Provider::Cuda]).unwrap();
        assert_eq!(selected, Provider::Cuda);
    }

    #[test]
    fn test_cpu_is_not_accelerator() {
        assert!(!Provider::Cpu.is_accelerator());
        assert!(Provider::Cuda.is_accelerator());
        assert!(Provider::Cpu.is_available());
    }
}
