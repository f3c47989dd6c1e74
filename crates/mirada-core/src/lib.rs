//! mirada-core — face detection, embedding and gallery matching.
//!
//! Uses YuNet for face detection and SFace for 128-dimensional face
//! embeddings, both running via ONNX Runtime for CPU inference. The
//! matcher is a Euclidean nearest-neighbor scan over a small in-memory
//! gallery of labeled profiles.

pub mod alignment;
pub mod detector;
pub mod embedder;
pub mod matcher;
pub mod pipeline;
pub mod quality;
pub mod types;

pub use matcher::{EuclideanMatcher, MatchOutcome, Matcher};
pub use pipeline::{FacePipeline, ScanError, ScanLimits};
pub use quality::Rejection;
pub use types::{Embedding, FaceBox, Profile};
