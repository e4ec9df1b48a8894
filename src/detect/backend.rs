use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Inference engine boundary.
///
/// The pipeline depends only on this contract: a frame goes in, a bounded
/// list of detections in model output order comes out. Model loading happens
/// when the backend is constructed; a backend that exists is ready to run.
///
/// Backends are owned by the inference worker thread and never shared with
/// publishers.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// `confidence_threshold` is the score floor the engine applies while
    /// decoding. Returned detections may still contain sentinel slots
    /// (`class_id < 0` or `confidence <= 0`); consumers filter those out.
    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
