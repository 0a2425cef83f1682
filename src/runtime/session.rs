//! ONNX Runtime session wrapper with host/device residency.

use super::provider::Provider;
use super::residency::{Placeable, Placement};
use crate::config::Precision;
use crate::error::{Error, Result};
use half::f16;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::{DynValue, Tensor, TensorElementType, ValueType};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single ONNX graph.
///
/// The serialized graph always stays in host memory. A session is built from
/// it on demand and dropped again when the model is moved to host.
pub struct OnnxModel {
    name: &'static str,
    path: PathBuf,
    provider: Provider,
    bytes: Vec<u8>,
    session: Option<Session>,
    precision: Precision,
}

impl OnnxModel {
    /// Read a model from disk into host memory.
    pub fn open(name: &'static str, path: &Path, provider: Provider) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ModelFileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        debug!(
            "Read {name} ({} bytes) from {}",
            bytes.len(),
            path.display()
        );
        Ok(Self {
            name,
            path: path.to_path_buf(),
            provider,
            bytes,
            session: None,
            precision: Precision::Full,
        })
    }

    /// Logical model name used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Source file of the graph.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Floating point precision of the graph's tensors.
    ///
    /// Only meaningful once the model has been placed on the device.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Live session, placing the model on the device first if needed.
    fn session(&mut self) -> Result<&mut Session> {
        self.move_to_device()?;
        let name = self.name;
        self.session.as_mut().ok_or_else(|| Error::Internal {
            message: format!("{name} has no session after placement"),
        })
    }

    /// Float tensor in this graph's precision, placing the model first so the
    /// precision is known.
    pub fn float_input(&mut self, shape: &[usize], data: Vec<f32>) -> Result<DynValue> {
        self.move_to_device()?;
        tensor_f32(self.name, shape, data, self.precision)
    }

    /// Run the graph and return its first output as f32.
    pub fn run(&mut self, inputs: Vec<(&'static str, DynValue)>) -> Result<(Vec<usize>, Vec<f32>)> {
        let name = self.name;
        let session = self.session()?;
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::inference(name, e))?;
        let (shape, data) = extract_f32(name, &outputs[0])?;
        debug!("{name} output shape: {shape:?}");
        Ok((shape, data))
    }

    fn build_session(&self) -> Result<Session> {
        let mut builder = Session::builder()
            .map_err(|e| Error::model_load(self.name, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::model_load(self.name, e))?;
        if self.provider.is_accelerator() {
            builder = builder
                .with_execution_providers([self.provider.dispatch()])
                .map_err(|e| Error::model_load(self.name, e))?;
        }
        builder
            .commit_from_memory(&self.bytes)
            .map_err(|e| Error::model_load(self.name, e))
    }
}

impl Placeable for OnnxModel {
    fn placement(&self) -> Placement {
        if self.session.is_some() {
            Placement::Device
        } else {
            Placement::Host
        }
    }

    fn move_to_device(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let session = self.build_session()?;
        self.precision = detect_precision(&session);
        debug!(
            "{} placed on {} ({})",
            self.name, self.provider, self.precision
        );
        self.session = Some(session);
        Ok(())
    }

    fn move_to_host(&mut self) {
        if !self.provider.is_accelerator() {
            return;
        }
        if self.session.take().is_some() {
            debug!("{} moved to host", self.name);
        }
    }
}

/// First float tensor type among the graph's inputs, then its outputs.
fn detect_precision(session: &Session) -> Precision {
    let classify = |ty: &ValueType| match ty {
        ValueType::Tensor { ty, .. } if *ty == TensorElementType::Float16 => Some(Precision::Half),
        ValueType::Tensor { ty, .. } if *ty == TensorElementType::Float32 => Some(Precision::Full),
        _ => None,
    };
    session
        .inputs()
        .iter()
        .find_map(|input| classify(input.dtype()))
        .or_else(|| {
            session
                .outputs()
                .iter()
                .find_map(|output| classify(output.dtype()))
        })
        .unwrap_or(Precision::Full)
}

fn ort_shape(shape: &[usize]) -> Vec<i64> {
    shape.iter().map(|&d| d as i64).collect()
}

/// Build a float tensor, converting to f16 for half precision graphs.
pub fn tensor_f32(
    name: &str,
    shape: &[usize],
    data: Vec<f32>,
    precision: Precision,
) -> Result<DynValue> {
    match precision {
        Precision::Full => Tensor::from_array((ort_shape(shape), data))
            .map(Tensor::into_dyn)
            .map_err(|e| Error::inference(name, e)),
        Precision::Half => {
            let data: Vec<f16> = data.into_iter().map(f16::from_f32).collect();
            Tensor::from_array((ort_shape(shape), data))
                .map(Tensor::into_dyn)
                .map_err(|e| Error::inference(name, e))
        }
    }
}

/// Build an i64 tensor.
pub fn tensor_i64(name: &str, shape: &[usize], data: Vec<i64>) -> Result<DynValue> {
    Tensor::from_array((ort_shape(shape), data))
        .map(Tensor::into_dyn)
        .map_err(|e| Error::inference(name, e))
}

/// Copy a float output (f32 or f16) into an owned f32 buffer with its shape.
pub fn extract_f32(name: &str, value: &DynValue) -> Result<(Vec<usize>, Vec<f32>)> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        let dims = shape.iter().map(|&d| d as usize).collect();
        return Ok((dims, data.to_vec()));
    }
    let (shape, data) = value
        .try_extract_tensor::<f16>()
        .map_err(|e| Error::inference(name, e))?;
    let dims = shape.iter().map(|&d| d as usize).collect();
    Ok((dims, data.iter().map(|v| v.to_f32()).collect()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_model_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.onnx");
        let result = OnnxModel::open("missing", &path, Provider::Cpu);
        assert!(matches!(result, Err(Error::ModelFileNotFound { .. })));
    }

    #[test]
    fn test_open_keeps_model_on_host() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("model.onnx");
        std::fs::write(&path, b"not really a graph").unwrap();

        let mut model = OnnxModel::open("model", &path, Provider::Cuda).unwrap();
        assert_eq!(model.placement(), Placement::Host);
        assert_eq!(model.name(), "model");
        assert_eq!(model.path(), path.as_path());

        model.move_to_host();
        assert_eq!(model.placement(), Placement::Host);
    }

    #[test]
    fn test_ort_shape_converts_dims() {
        assert_eq!(ort_shape(&[1, 3, 384, 384]), vec![1, 3, 384, 384]);
    }
}
