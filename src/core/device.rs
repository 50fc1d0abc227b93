//! Candle device selection.

use crate::core::ClassifierError;
use candle_core::Device;

/// Parses a device string and creates the candle device for the head.
///
/// # Supported formats
///
/// - `"cpu"` -> CPU device
/// - `"cuda"` or `"gpu"` -> CUDA device 0
/// - `"cuda:N"` -> CUDA device N
///
/// CUDA devices need the `cuda` feature.
pub fn parse_candle_device(device_str: &str) -> Result<Device, ClassifierError> {
    let device_str = device_str.to_lowercase();
    match device_str.as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" | "gpu" => cuda_device(0),
        s if s.starts_with("cuda:") => {
            let ordinal = s["cuda:".len()..].parse::<usize>().map_err(|_| {
                ClassifierError::config_error(format!("invalid CUDA device ordinal in '{s}'"))
            })?;
            cuda_device(ordinal)
        }
        _ => Err(ClassifierError::config_error(format!(
            "unknown device: {device_str}. Use 'cpu', 'cuda', or 'cuda:N'"
        ))),
    }
}

#[cfg(feature = "cuda")]
fn cuda_device(ordinal: usize) -> Result<Device, ClassifierError> {
    Device::new_cuda(ordinal).map_err(|e| {
        ClassifierError::config_error(format!("cannot open CUDA device {ordinal}: {e}"))
    })
}

#[cfg(not(feature = "cuda"))]
fn cuda_device(_ordinal: usize) -> Result<Device, ClassifierError> {
    Err(ClassifierError::config_error(
        "CUDA support not enabled. Compile with --features cuda",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu() {
        assert!(matches!(parse_candle_device("CPU"), Ok(Device::Cpu)));
    }

    #[test]
    fn test_parse_unknown() {
        assert!(parse_candle_device("tpu").is_err());
        assert!(parse_candle_device("cuda:x").is_err());
    }
}
