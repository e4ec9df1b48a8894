mod backend;
mod backends;
mod result;

use anyhow::{anyhow, Result};

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, DetectionResult, MAX_CLASS_NAME_LEN, MAX_DETECTIONS};

/// Default model input edge length (square input).
pub const DEFAULT_MODEL_INPUT: u32 = 640;

/// Load the detector for `model_path`. Failure here is fatal at startup.
///
/// - `stub://...` selects the scripted [`StubBackend`].
/// - `*.onnx` selects the tract backend (feature `backend-tract`).
pub fn load_backend(model_path: &str, class_names: &[String]) -> Result<Box<dyn DetectorBackend>> {
    if model_path.starts_with("stub://") {
        log::info!("detector: using stub backend for {}", model_path);
        return Ok(Box::new(StubBackend::new()));
    }
    if !std::path::Path::new(model_path).is_file() {
        return Err(anyhow!("model file {} does not exist", model_path));
    }
    if model_path.ends_with(".onnx") {
        #[cfg(feature = "backend-tract")]
        {
            let backend = TractBackend::new(
                model_path,
                DEFAULT_MODEL_INPUT,
                DEFAULT_MODEL_INPUT,
                class_names.to_vec(),
            )?;
            log::info!("detector: loaded ONNX model {}", model_path);
            return Ok(Box::new(backend));
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            let _ = class_names;
            return Err(anyhow!(
                "ONNX models require the backend-tract feature ({})",
                model_path
            ));
        }
    }
    Err(anyhow!("unsupported model format: {}", model_path))
}
