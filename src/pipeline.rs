//! Startup and thread wiring.
//!
//! [`Pipeline::build`] performs every fallible startup step (labels, model,
//! source) before any thread exists, so a bad model or device ends the
//! process with nothing to clean up. [`Pipeline::start`] then spawns one
//! inference thread and one thread per publisher; [`PipelineHandle::join`]
//! waits for all of them.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::config::{FileFormat, RelayConfig};
use crate::detect::{load_backend, DetectionResult};
use crate::filter::ClassSelection;
use crate::format::{ClassNaming, CountFormatter, FullJsonFormatter, MessageFormatter};
use crate::frame_writer::DecoratedFrameWriter;
use crate::inference::{InferenceSettings, InferenceWorker, ResultMetadata};
use crate::ingest::{open_source, SourceKind};
use crate::labels::{resolve_class_selection, resolve_labels_path, LabelMap};
use crate::publisher::{Publisher, PublisherStats};
use crate::queue::ResultQueue;
use crate::shutdown::Shutdown;
use crate::transport::{FileTransport, Transport, UdpTransport};

/// Upper bound on how long single-shot mode waits for the file publisher to
/// pick up its one result.
pub const SINGLE_SHOT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the daemon needs to start a run.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub model: String,
    pub source: String,
    /// Explicit label file; otherwise searched next to the model.
    pub labels: Option<PathBuf>,
    /// Comma-separated class names to surface.
    pub classes: Option<String>,
    pub suppress_empty: bool,
    pub config: RelayConfig,
}

/// Stops every thread of a running pipeline. Safe to call from a signal
/// handler and more than once.
#[derive(Clone)]
pub struct StopSignal {
    shutdown: Shutdown,
    queue: Arc<ResultQueue<DetectionResult>>,
}

impl StopSignal {
    pub fn trigger(&self) {
        self.shutdown.trigger();
        self.queue.signal_shutdown();
    }

    pub fn is_triggered(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

pub struct Pipeline {
    kind: SourceKind,
    worker: InferenceWorker,
    publishers: Vec<Publisher>,
    queue: Arc<ResultQueue<DetectionResult>>,
    shutdown: Shutdown,
}

impl Pipeline {
    /// Resolve labels and classes, load the model, open the source and
    /// build the publishers for the source's mode.
    pub fn build(options: &PipelineOptions, shutdown: Shutdown) -> Result<Self> {
        let config = &options.config;
        config.validate()?;
        let kind = SourceKind::detect(&options.source)?;
        log::info!(
            "source {} ({} mode)",
            kind.descriptor(),
            if kind.is_continuous() { "continuous" } else { "single-shot" }
        );

        let labels = load_labels(options)?;
        let selection = resolve_class_selection(options.classes.as_deref(), labels.as_ref())?;
        log_selection(&selection, labels.as_ref());

        let class_names = labels
            .as_ref()
            .map(|l| l.names().to_vec())
            .unwrap_or_default();
        let mut backend = load_backend(&options.model, &class_names)
            .with_context(|| format!("load model {}", options.model))?;
        backend.warm_up().context("warm up detector")?;

        let mut source = open_source(&kind, config.target_fps)?;
        source
            .connect()
            .with_context(|| format!("open source {}", kind.descriptor()))?;

        let queue = Arc::new(ResultQueue::new(config.queue_capacity));
        let metadata = ResultMetadata {
            selected_classes: selection,
            class_name_mapping: config.class_name_mapping.clone(),
            confidence_threshold: config.confidence_threshold,
        };
        let settings = InferenceSettings {
            target_fps: config.target_fps,
            retry_backoff: config.capture_retry,
        };
        let worker = InferenceWorker::new(backend, source, Arc::clone(&queue), metadata, settings)
            .with_frame_writer(Box::new(DecoratedFrameWriter::new(
                &config.decorated_path,
                options.suppress_empty,
            )));
        let publishers = build_publishers(
            &kind,
            config,
            options.suppress_empty,
            &queue,
            &shutdown,
        );

        Ok(Self::from_parts(kind, worker, publishers, queue, shutdown))
    }

    /// Assemble a pipeline from prepared parts.
    pub fn from_parts(
        kind: SourceKind,
        worker: InferenceWorker,
        publishers: Vec<Publisher>,
        queue: Arc<ResultQueue<DetectionResult>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            kind,
            worker,
            publishers,
            queue,
            shutdown,
        }
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    pub fn publisher_names(&self) -> Vec<String> {
        self.publishers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            shutdown: self.shutdown.clone(),
            queue: Arc::clone(&self.queue),
        }
    }

    /// Spawn every thread. In single-shot mode the pipeline stops itself
    /// once its one result has been picked up.
    pub fn start(self) -> Result<PipelineHandle> {
        let stop = self.stop_signal();
        let Self {
            kind,
            mut worker,
            publishers,
            queue,
            shutdown,
        } = self;

        let mut publisher_threads = Vec::with_capacity(publishers.len());
        for publisher in publishers {
            let name = publisher.name().to_string();
            let join = std::thread::Builder::new()
                .name(format!("publish-{}", name))
                .spawn(move || publisher.run())
                .with_context(|| format!("spawn publisher {}", name));
            match join {
                Ok(join) => publisher_threads.push((name, join)),
                Err(err) => {
                    stop.trigger();
                    for (_, join) in publisher_threads {
                        let _ = join.join();
                    }
                    return Err(err);
                }
            }
        }

        let inference_stop = stop.clone();
        let spawned = std::thread::Builder::new()
            .name("inference".to_string())
            .spawn(move || {
                if kind.is_continuous() {
                    worker.run_continuous(&shutdown);
                } else {
                    worker.run_single_shot();
                    if !queue.wait_until_drained(SINGLE_SHOT_DRAIN_TIMEOUT) {
                        log::warn!(
                            "single-shot result not consumed within {:?}",
                            SINGLE_SHOT_DRAIN_TIMEOUT
                        );
                    }
                    inference_stop.trigger();
                }
                worker.frames_processed()
            })
            .context("spawn inference thread");
        let inference = match spawned {
            Ok(join) => join,
            Err(err) => {
                stop.trigger();
                for (_, join) in publisher_threads {
                    let _ = join.join();
                }
                return Err(err);
            }
        };

        Ok(PipelineHandle {
            stop,
            inference: Some(inference),
            publishers: publisher_threads,
        })
    }
}

/// What a finished run did.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub frames_processed: u64,
    pub publishers: Vec<(String, PublisherStats)>,
}

pub struct PipelineHandle {
    stop: StopSignal,
    inference: Option<JoinHandle<u64>>,
    publishers: Vec<(String, JoinHandle<PublisherStats>)>,
}

impl PipelineHandle {
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Request shutdown and wait for every thread.
    pub fn stop(self) -> Result<PipelineReport> {
        self.stop.trigger();
        self.join()
    }

    /// Wait for every thread. Returns once shutdown has been requested (or
    /// single-shot mode finished) and all threads exited.
    pub fn join(mut self) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        let mut panicked = Vec::new();
        if let Some(join) = self.inference.take() {
            match join.join() {
                Ok(frames) => report.frames_processed = frames,
                Err(_) => panicked.push("inference".to_string()),
            }
        }
        // The producer is gone; nothing more will be published.
        self.stop.trigger();
        for (name, join) in self.publishers.drain(..) {
            match join.join() {
                Ok(stats) => report.publishers.push((name, stats)),
                Err(_) => panicked.push(format!("publisher {}", name)),
            }
        }
        if !panicked.is_empty() {
            return Err(anyhow!("threads panicked: {}", panicked.join(", ")));
        }
        log::info!("pipeline stopped after {} frames", report.frames_processed);
        Ok(report)
    }
}

fn load_labels(options: &PipelineOptions) -> Result<Option<LabelMap>> {
    let filtering = options
        .classes
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    let path = options
        .labels
        .clone()
        .or_else(|| resolve_labels_path(std::path::Path::new(&options.model)));
    match path {
        Some(path) => match LabelMap::load(&path) {
            Ok(labels) => Ok(Some(labels)),
            Err(err) if filtering => Err(err.context("class filter requires a labels file")),
            Err(err) => {
                log::warn!("continuing without class labels: {:#}", err);
                Ok(None)
            }
        },
        None if filtering => Err(anyhow!(
            "class filter requested but no labels file was found for model {}",
            options.model
        )),
        None => {
            log::warn!("no labels file found for model {}", options.model);
            Ok(None)
        }
    }
}

fn log_selection(selection: &ClassSelection, labels: Option<&LabelMap>) {
    if selection.is_all() {
        log::info!("class filter: all classes");
        return;
    }
    let names: Vec<String> = selection
        .ids()
        .map(|id| {
            labels
                .and_then(|l| l.name_of(id))
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string())
        })
        .collect();
    log::info!("class filter: {}", names.join(", "));
}

/// Publishers for a source kind. Single-shot runs only write the results
/// file; continuous runs also feed both UDP ports.
pub fn build_publishers(
    kind: &SourceKind,
    config: &RelayConfig,
    suppress_empty: bool,
    queue: &Arc<ResultQueue<DetectionResult>>,
    shutdown: &Shutdown,
) -> Vec<Publisher> {
    let publisher = |name: &str, transport: Box<dyn Transport>, formatter: Box<dyn MessageFormatter>| {
        Publisher::new(
            name,
            Arc::clone(queue),
            transport,
            formatter,
            config.publish_rate,
            shutdown.clone(),
        )
    };

    let file_formatter: Box<dyn MessageFormatter> = match config.file_format {
        FileFormat::Full => Box::new(FullJsonFormatter::new(suppress_empty)),
        FileFormat::Count => Box::new(CountFormatter::json()),
    };
    let mut publishers = vec![publisher(
        "file",
        Box::new(FileTransport::new(&config.results_path)),
        file_formatter,
    )];

    if kind.is_continuous() {
        publishers.push(publisher(
            "udp-json",
            Box::new(UdpTransport::new(&config.udp.host, config.udp.json_port)),
            Box::new(CountFormatter::json().with_naming(ClassNaming::FromResult)),
        ));
        publishers.push(publisher(
            "udp-flat",
            Box::new(UdpTransport::new(&config.udp.host, config.udp.flat_port)),
            Box::new(CountFormatter::flat()),
        ));
    }
    publishers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_shot_runs_only_the_file_publisher() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig {
            results_path: dir.path().join("results.json"),
            ..RelayConfig::default()
        };
        let queue = Arc::new(ResultQueue::new(1));
        let shutdown = Shutdown::new();

        let file = SourceKind::ImageFile("in.jpg".into());
        let names: Vec<_> = build_publishers(&file, &config, false, &queue, &shutdown)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["file"]);

        let camera = SourceKind::Synthetic("stub://cam".into());
        let names: Vec<_> = build_publishers(&camera, &config, false, &queue, &shutdown)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["file", "udp-json", "udp-flat"]);
    }

    #[test]
    fn class_filter_without_labels_fails_startup() {
        let options = PipelineOptions {
            model: "stub://model".to_string(),
            source: "stub://camera".to_string(),
            labels: Some(PathBuf::from("/nonexistent/labels.txt")),
            classes: Some("car".to_string()),
            suppress_empty: false,
            config: RelayConfig::default(),
        };
        assert!(Pipeline::build(&options, Shutdown::new()).is_err());
    }
}
