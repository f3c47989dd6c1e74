//! Scan pipeline: validation, alignment and embedding composed.
//!
//! Two entry points mirror the two ways images reach the system: `scan`
//! runs the full quality gauntlet for query frames, `embed_reference`
//! only needs a detectable face and is used to build the gallery from
//! profile images.

use crate::detector::{DetectorError, FaceDetector, DEFAULT_SCORE_THRESHOLD};
use crate::embedder::{EmbedderError, FaceEmbedder};
use crate::quality::{self, Rejection};
use crate::types::{Embedding, FaceBox};
use thiserror::Error;

/// Tunable gates for the query path.
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    pub min_dimension: u32,
    pub max_dimension: u32,
    pub blur_variance_min: f32,
    pub face_score_min: f32,
    /// Candidate threshold handed to the detector.
    pub detect_threshold: f32,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            min_dimension: quality::MIN_DIMENSION,
            max_dimension: quality::MAX_DIMENSION,
            blur_variance_min: quality::BLUR_VARIANCE_MIN,
            face_score_min: quality::FACE_SCORE_MIN,
            detect_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    /// The frame failed a quality gate; carries the screen message.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder: {0}")]
    Embedder(#[from] EmbedderError),
}

/// Detector and embedder composed behind the validation gates.
pub struct FacePipeline {
    detector: FaceDetector,
    embedder: FaceEmbedder,
    limits: ScanLimits,
}

impl FacePipeline {
    pub fn new(detector: FaceDetector, embedder: FaceEmbedder, limits: ScanLimits) -> Self {
        Self { detector, embedder, limits }
    }

    /// Validate a query frame and extract its embedding.
    ///
    /// Gates run in order: resolution, face count, eye landmarks, blur,
    /// detection confidence. The first failure wins.
    pub fn scan(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Embedding, ScanError> {
        quality::check_resolution(
            width,
            height,
            self.limits.min_dimension,
            self.limits.max_dimension,
        )?;

        let faces = self.detector.detect(rgb, width, height, self.limits.detect_threshold)?;
        let face = single_face(&faces)?;

        if face.eye_points().is_none() {
            return Err(Rejection::EyesNotDetected.into());
        }

        let luma = quality::luma_plane(rgb, width, height);
        let blur = quality::laplacian_variance(&luma, width, height);
        if blur < self.limits.blur_variance_min {
            tracing::debug!(blur, "query frame rejected as blurry");
            return Err(Rejection::TooBlurry.into());
        }

        if face.score < self.limits.face_score_min {
            tracing::debug!(score = face.score, "query face rejected as low confidence");
            return Err(Rejection::LowConfidence.into());
        }

        Ok(self.embedder.extract(rgb, width, height, face)?)
    }

    /// Extract an embedding from a reference image, skipping the quality
    /// gates. Picks the highest-scoring face when several are present.
    pub fn embed_reference(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Embedding, ScanError> {
        let faces = self.detector.detect(rgb, width, height, self.limits.detect_threshold)?;
        let face = faces.first().ok_or(Rejection::NoFace)?;
        Ok(self.embedder.extract(rgb, width, height, face)?)
    }
}

/// Exactly-one-face rule for the query path.
fn single_face(faces: &[FaceBox]) -> Result<&FaceBox, Rejection> {
    match faces {
        [] => Err(Rejection::NoFace),
        [only] => Ok(only),
        _ => Err(Rejection::MultipleFaces),
    }
}
