//! Vision relay
//!
//! On-device object detection with fan-out of the results.
//!
//! # Architecture
//!
//! One inference thread produces a `DetectionResult` per frame and pushes it
//! into a lossy latest-value queue. Publisher threads pop from that queue,
//! format the result and hand it to a transport (results file, UDP). The
//! inference thread also writes a decorated copy of every frame.
//!
//! Every consumer applies the same selection rule from [`filter`]:
//!
//! 1. **Validity**: detections with `confidence <= 0` or `class_id < 0` are
//!    engine sentinels and are never surfaced.
//! 2. **Selection**: an empty class selection means all classes pass.
//! 3. **Person**: an explicit class filter always includes person (ID 0).
//!
//! # Module Structure
//!
//! - `detect`: detection types and detector backends
//! - `ingest`: frame sources (image files, V4L2, synthetic)
//! - `queue`, `shutdown`: the only state shared between threads
//! - `inference`, `publisher`, `frame_writer`: the pipeline stages
//! - `format`, `transport`: what a publisher sends and where
//! - `pipeline`: startup and thread wiring

pub mod config;
pub mod detect;
pub mod filter;
pub mod format;
pub mod frame;
pub mod frame_writer;
pub mod inference;
pub mod ingest;
pub mod labels;
pub mod pipeline;
pub mod publisher;
pub mod queue;
pub mod shutdown;
pub mod transport;

pub use detect::{BoundingBox, Detection, DetectionResult, DetectorBackend};
pub use filter::{ClassNameMapping, ClassSelection};
pub use format::{Encoding, MessageFormatter};
pub use frame::Frame;
pub use frame_writer::{DecoratedFrameWriter, FrameWriter};
pub use publisher::Publisher;
pub use queue::ResultQueue;
pub use shutdown::Shutdown;
pub use transport::Transport;
