//! ONNX Runtime inference engine with a small session pool.
//!
//! Running an `ort` session needs exclusive access, so each session sits behind
//! a mutex and calls are spread round-robin over the pool. With the default pool
//! size of one, concurrent requests simply take turns.

use crate::core::{ClassifierError, SimpleError, Tensor4D};
use ndarray::{ArrayD, IxDyn};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::{TensorRef, ValueType};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct OrtInfer {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    model_name: String,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .field("model_name", &self.model_name)
            .finish()
    }
}

/// Opens one ONNX Runtime session with ORT logging limited to errors.
pub fn load_session(model_path: impl AsRef<Path>) -> Result<Session, ClassifierError> {
    let path = model_path.as_ref();
    if !path.is_file() {
        return Err(ClassifierError::model_load_error(
            path,
            "model file not found",
            None::<SimpleError>,
        ));
    }
    Session::builder()
        .and_then(|b| b.with_log_level(LogLevel::Error))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| {
            ClassifierError::model_load_error(path, "failed to create ONNX session", Some(e))
        })
}

impl OrtInfer {
    /// Creates an engine with a single session.
    ///
    /// Input and output names are discovered from the model when not given.
    pub fn new(model_path: impl AsRef<Path>, input_name: Option<&str>) -> Result<Self, ClassifierError> {
        Self::with_pool(model_path, input_name, None, 1)
    }

    /// Creates an engine with `pool_size` sessions.
    ///
    /// # Arguments
    ///
    /// * `model_path` - Path to the ONNX model file
    /// * `input_name` - Input tensor name, or `None` to use the model's first input
    /// * `output_name` - Output tensor name, or `None` to use the model's first output
    /// * `pool_size` - Number of sessions; values below one are treated as one
    pub fn with_pool(
        model_path: impl AsRef<Path>,
        input_name: Option<&str>,
        output_name: Option<&str>,
        pool_size: usize,
    ) -> Result<Self, ClassifierError> {
        let path = model_path.as_ref();
        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            sessions.push(Mutex::new(load_session(path)?));
        }

        let (discovered_input, discovered_output) = {
            let first = sessions[0].lock().map_err(|_| {
                ClassifierError::model_load_error(
                    path,
                    "session lock poisoned during setup",
                    None::<SimpleError>,
                )
            })?;
            (
                first.inputs.first().map(|i| i.name.clone()),
                first.outputs.first().map(|o| o.name.clone()),
            )
        };

        let input_name = input_name
            .map(str::to_string)
            .or(discovered_input)
            .ok_or_else(|| {
                ClassifierError::model_load_error(path, "model has no inputs", None::<SimpleError>)
            })?;
        let output_name = output_name
            .map(str::to_string)
            .or(discovered_output)
            .ok_or_else(|| {
                ClassifierError::model_load_error(path, "model has no outputs", None::<SimpleError>)
            })?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        Ok(OrtInfer {
            sessions,
            next_idx: AtomicUsize::new(0),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    /// Returns the model path associated with this inference engine.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Returns the model name associated with this inference engine.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Returns the input tensor name.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Attempts to retrieve the primary input tensor shape from the first session.
    ///
    /// Dynamic dimensions (e.g., -1) are returned as-is.
    pub fn primary_input_shape(&self) -> Option<Vec<i64>> {
        let session_guard = self.sessions.first()?.lock().ok()?;
        let input = session_guard.inputs.first()?;
        match &input.input_type {
            ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
            _ => None,
        }
    }

    /// Runs the model on a 4D batch and returns the output with its native rank.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::Inference` if the input cannot be handed to ONNX
    /// Runtime, the forward pass fails, or the output is not an f32 tensor.
    pub fn infer(&self, x: &Tensor4D) -> Result<ArrayD<f32>, ClassifierError> {
        let input_shape = x.shape().to_vec();

        let input_tensor = TensorRef::from_array_view(x.view()).map_err(|e| {
            ClassifierError::inference_error(
                &self.model_name,
                &format!("failed to convert input tensor with shape {input_shape:?}"),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session_guard = self.sessions[idx].lock().map_err(|_| {
            ClassifierError::inference_error(
                &self.model_name,
                &format!(
                    "failed to acquire session lock for session {}/{}",
                    idx,
                    self.sessions.len()
                ),
                SimpleError::new("session lock poisoned"),
            )
        })?;

        let outputs = session_guard.run(inputs).map_err(|e| {
            ClassifierError::inference_error(
                &self.model_name,
                &format!(
                    "forward pass failed with input '{}' -> output '{}'",
                    self.input_name, self.output_name
                ),
                e,
            )
        })?;

        let (output_shape, output_data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                ClassifierError::inference_error(
                    &self.model_name,
                    &format!("failed to extract output tensor '{}' as f32", self.output_name),
                    e,
                )
            })?;

        let dims: Vec<usize> = output_shape.iter().map(|&d| d.max(0) as usize).collect();
        let expected_len: usize = dims.iter().product();
        if output_data.len() != expected_len {
            return Err(ClassifierError::invalid_input(format!(
                "output data size mismatch for '{}': shape {:?} needs {} values, got {}",
                self.model_name,
                dims,
                expected_len,
                output_data.len()
            )));
        }

        Ok(ArrayD::from_shape_vec(IxDyn(&dims), output_data.to_vec())?)
    }
}
