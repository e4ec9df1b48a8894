//! Inference producer.
//!
//! `InferenceWorker` owns the detector, the frame source and the frame
//! writer. It is the only writer to the result queue and never touches
//! structured-result I/O itself; that belongs to the publishers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::detect::{DetectionResult, DetectorBackend};
use crate::filter::{ClassNameMapping, ClassSelection};
use crate::frame::Frame;
use crate::frame_writer::FrameWriter;
use crate::ingest::FrameSource;
use crate::queue::ResultQueue;
use crate::shutdown::Shutdown;

/// Filtering metadata stamped on every result of a run.
#[derive(Clone, Debug, Default)]
pub struct ResultMetadata {
    pub selected_classes: ClassSelection,
    pub class_name_mapping: ClassNameMapping,
    pub confidence_threshold: f32,
}

impl ResultMetadata {
    pub fn attach(&self, result: DetectionResult) -> DetectionResult {
        result
            .with_selection(self.selected_classes.clone())
            .with_mapping(self.class_name_mapping.clone())
            .with_threshold(self.confidence_threshold)
    }
}

#[derive(Clone, Debug)]
pub struct InferenceSettings {
    pub target_fps: u32,
    /// Wait after a failed capture before trying again.
    pub retry_backoff: Duration,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            target_fps: 30,
            retry_backoff: Duration::from_millis(1000),
        }
    }
}

impl InferenceSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

pub struct InferenceWorker {
    backend: Box<dyn DetectorBackend>,
    source: Box<dyn FrameSource>,
    queue: Arc<ResultQueue<DetectionResult>>,
    frame_writer: Option<Box<dyn FrameWriter>>,
    metadata: ResultMetadata,
    settings: InferenceSettings,
    frames_processed: u64,
    capture_failures: u64,
}

impl InferenceWorker {
    /// `source` must already be connected.
    pub fn new(
        backend: Box<dyn DetectorBackend>,
        source: Box<dyn FrameSource>,
        queue: Arc<ResultQueue<DetectionResult>>,
        metadata: ResultMetadata,
        settings: InferenceSettings,
    ) -> Self {
        Self {
            backend,
            source,
            queue,
            frame_writer: None,
            metadata,
            settings,
            frames_processed: 0,
            capture_failures: 0,
        }
    }

    pub fn with_frame_writer(mut self, writer: Box<dyn FrameWriter>) -> Self {
        self.frame_writer = Some(writer);
        self
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn capture_failures(&self) -> u64 {
        self.capture_failures
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Run the detector on one frame. An empty frame or a detector error
    /// yields a zero-detection result instead of an error.
    pub fn infer(&mut self, frame: &Frame) -> DetectionResult {
        let raw = if frame.is_empty() {
            log::warn!("inference: empty frame, publishing empty result");
            DetectionResult::new(Vec::new(), frame.captured_at)
        } else {
            match self
                .backend
                .detect(frame, self.metadata.confidence_threshold)
            {
                Ok(detections) => DetectionResult::new(detections, frame.captured_at),
                Err(err) => {
                    log::warn!("inference: {} backend failed: {:#}", self.backend.name(), err);
                    DetectionResult::new(Vec::new(), frame.captured_at)
                }
            }
        };
        let result = self.metadata.attach(raw);
        log::debug!(
            "inference: {} detections in {}x{} frame",
            result.detections.len(),
            frame.width,
            frame.height
        );
        result
    }

    /// One cycle: infer, publish, then decorate.
    fn process(&mut self, frame: &Frame) {
        let result = self.infer(frame);
        self.queue.push(result.clone());
        if let Some(writer) = self.frame_writer.as_mut() {
            if let Err(err) = writer.write_frame(frame, &result) {
                log::warn!("inference: frame decoration failed: {:#}", err);
            }
        }
        self.frames_processed += 1;
    }

    /// Load one frame, push one result, return.
    pub fn run_single_shot(&mut self) {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.capture_failures += 1;
                log::warn!("inference: could not load frame: {:#}", err);
                Frame::empty()
            }
        };
        self.process(&frame);
        log::info!("inference: single-shot result published");
    }

    /// Capture and infer until `shutdown` fires or the queue is shut down.
    ///
    /// An in-flight inference always completes; the stop condition is
    /// checked between cycles and during every sleep.
    pub fn run_continuous(&mut self, shutdown: &Shutdown) {
        let interval = self.settings.frame_interval();
        log::info!(
            "inference: started ({} backend, target {} fps)",
            self.backend.name(),
            self.settings.target_fps
        );
        while shutdown.is_running() && !self.queue.is_shutdown() {
            let started = Instant::now();
            match self.source.next_frame() {
                Ok(frame) => self.process(&frame),
                Err(err) => {
                    self.capture_failures += 1;
                    log::warn!(
                        "inference: capture failed, retrying in {:?}: {:#}",
                        self.settings.retry_backoff,
                        err
                    );
                    shutdown.sleep(self.settings.retry_backoff);
                    continue;
                }
            }
            if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                shutdown.sleep(remaining);
            }
        }
        let stats = self.source.stats();
        log::info!(
            "inference: stopped after {} frames from {} ({} captured, {} capture failures)",
            self.frames_processed,
            stats.source,
            stats.frames_captured,
            self.capture_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection, StubBackend};
    use crate::ingest::{SyntheticConfig, SyntheticSource};

    fn small_source() -> Box<dyn FrameSource> {
        Box::new(SyntheticSource::new(SyntheticConfig {
            width: 32,
            height: 24,
            ..SyntheticConfig::default()
        }))
    }

    fn metadata() -> ResultMetadata {
        ResultMetadata {
            selected_classes: ClassSelection::only([0, 2]),
            class_name_mapping: ClassNameMapping::new().with("person", "faces"),
            confidence_threshold: 0.25,
        }
    }

    #[test]
    fn results_carry_run_metadata() {
        let queue = Arc::new(ResultQueue::new(1));
        let mut worker = InferenceWorker::new(
            Box::new(StubBackend::new()),
            small_source(),
            Arc::clone(&queue),
            metadata(),
            InferenceSettings::default(),
        );
        worker.run_single_shot();

        let result = queue.pop().unwrap();
        assert_eq!(result.detections.len(), 2);
        assert_eq!(result.selected_classes, ClassSelection::only([0, 2]));
        assert_eq!(result.class_name_mapping.map("person"), "faces");
        assert_eq!(result.confidence_threshold, 0.25);
        assert_eq!(worker.frames_processed(), 1);
    }

    #[test]
    fn empty_frame_gives_empty_result() {
        let queue = Arc::new(ResultQueue::new(1));
        let script = vec![vec![Detection::new(0, "person", 0.9, BoundingBox::default())]];
        let mut worker = InferenceWorker::new(
            Box::new(StubBackend::with_script(script)),
            small_source(),
            queue,
            metadata(),
            InferenceSettings::default(),
        );
        let result = worker.infer(&Frame::empty());
        assert!(result.detections.is_empty());
        assert_eq!(result.selected_classes, ClassSelection::only([0, 2]));
    }

    #[test]
    fn frame_interval_follows_target_fps() {
        let settings = InferenceSettings {
            target_fps: 4,
            ..InferenceSettings::default()
        };
        assert_eq!(settings.frame_interval(), Duration::from_millis(250));
    }
}
