//! Inference engine.
//!
//! Models load and the gallery is built once at spawn (fail-fast), then a
//! dedicated OS thread serves scan requests over an mpsc channel with
//! oneshot replies. The camera opens lazily on the first camera scan so
//! file-only invocations never touch a video device.

use crate::config::Config;
use crate::profiles;
use chrono::NaiveDate;
use mirada_capture::{Camera, CameraError, RgbFrame};
use mirada_core::detector::FaceDetector;
use mirada_core::embedder::FaceEmbedder;
use mirada_core::matcher::confidence_percent;
use mirada_core::{EuclideanMatcher, FacePipeline, Matcher, Profile, ScanError};
use mirada_models::ModelStore;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("scan failed: {0}")]
    Scan(ScanError),
    #[error("no usable frame captured")]
    NoFrames,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Profile metadata as shown on the results screen (no embeddings).
#[derive(Debug, Clone, Serialize)]
pub struct ProfileCard {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub occupation: String,
    pub location: String,
    pub last_seen: NaiveDate,
    pub verified: bool,
}

impl From<&Profile> for ProfileCard {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            age: profile.age,
            occupation: profile.occupation.clone(),
            location: profile.location.clone(),
            last_seen: profile.last_seen,
            verified: profile.verified,
        }
    }
}

impl From<&profiles::ProfileSpec> for ProfileCard {
    fn from(spec: &profiles::ProfileSpec) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            age: spec.age,
            occupation: spec.occupation.clone(),
            location: spec.location.clone(),
            last_seen: spec.last_seen,
            verified: spec.verified,
        }
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// The frame failed a quality gate; `message` is the screen text.
    Rejected { message: String },
    /// A face was read but nothing in the gallery is close enough.
    NoMatch { confidence: f32, distance: Option<f32> },
    /// Positive identification.
    Match {
        profile: ProfileCard,
        confidence: f32,
        confidence_percent: u8,
        distance: f32,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub session: Uuid,
    #[serde(flatten)]
    pub outcome: ScanOutcome,
}

/// Messages sent from command handlers to the engine thread.
enum EngineRequest {
    ScanFrame {
        frame: RgbFrame,
        reply: oneshot::Sender<Result<ScanReport, EngineError>>,
    },
    ScanCamera {
        reply: oneshot::Sender<Result<ScanReport, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Scan a decoded frame (the upload path).
    pub async fn scan_frame(&self, frame: RgbFrame) -> Result<ScanReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::ScanFrame { frame, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Capture from the camera and scan (the camera path).
    pub async fn scan_camera(&self) -> Result<ScanReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::ScanCamera { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Resolve models, build the pipeline and gallery, then start the engine
/// thread. Returns the handle plus gallery cards for display.
pub async fn spawn_engine(config: &Config) -> anyhow::Result<(EngineHandle, Vec<ProfileCard>)> {
    let store = ModelStore::new(config.model_dir.clone(), config.model_base_url.clone());
    let resolved = store.ensure_all().await?;

    let detector = FaceDetector::load(&resolved.detector.to_string_lossy())?;
    tracing::info!(path = %resolved.detector.display(), "YuNet detector loaded");

    let embedder = FaceEmbedder::load(&resolved.embedder.to_string_lossy())?;
    tracing::info!(path = %resolved.embedder.display(), "SFace embedder loaded");

    let mut pipeline = FacePipeline::new(detector, embedder, config.limits);

    let manifest = profiles::load_manifest(config.profiles_path.as_deref())?;
    let gallery = profiles::build_gallery(&mut pipeline, &manifest);
    tracing::info!(profiles = gallery.len(), "gallery ready");

    let cards: Vec<ProfileCard> = gallery.iter().map(ProfileCard::from).collect();

    let mut worker = EngineWorker {
        pipeline,
        gallery,
        matcher: EuclideanMatcher,
        threshold: config.match_threshold,
        camera_device: config.camera_device.clone(),
        frames_per_scan: config.frames_per_scan,
        warmup_frames: config.warmup_frames,
        camera: None,
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("mirada-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::ScanFrame { frame, reply } => {
                        let _ = reply.send(worker.scan_frame(&frame));
                    }
                    EngineRequest::ScanCamera { reply } => {
                        let _ = reply.send(worker.scan_camera());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok((EngineHandle { tx }, cards))
}

struct EngineWorker {
    pipeline: FacePipeline,
    gallery: Vec<Profile>,
    matcher: EuclideanMatcher,
    threshold: f32,
    camera_device: String,
    frames_per_scan: usize,
    warmup_frames: usize,
    camera: Option<Camera>,
}

impl EngineWorker {
    fn scan_frame(&mut self, frame: &RgbFrame) -> Result<ScanReport, EngineError> {
        let session = Uuid::new_v4();
        tracing::info!(%session, width = frame.width, height = frame.height, "scan started");

        let embedding = match self.pipeline.scan(&frame.data, frame.width, frame.height) {
            Ok(embedding) => embedding,
            Err(ScanError::Rejected(rejection)) => {
                tracing::info!(%session, reason = %rejection, "scan rejected");
                return Ok(ScanReport {
                    session,
                    outcome: ScanOutcome::Rejected { message: rejection.to_string() },
                });
            }
            Err(other) => return Err(EngineError::Scan(other)),
        };

        let result = self.matcher.best_match(&embedding, &self.gallery, self.threshold);

        let outcome = match result.profile_id.as_deref().filter(|_| result.matched) {
            Some(id) => match self.gallery.iter().find(|p| p.id == id) {
                Some(profile) => {
                    tracing::info!(
                        %session,
                        profile = %profile.name,
                        confidence = result.confidence,
                        "match found"
                    );
                    ScanOutcome::Match {
                        profile: ProfileCard::from(profile),
                        confidence: result.confidence,
                        confidence_percent: confidence_percent(result.confidence),
                        distance: result.distance.unwrap_or(0.0),
                    }
                }
                None => ScanOutcome::NoMatch {
                    confidence: result.confidence,
                    distance: result.distance,
                },
            },
            None => {
                tracing::info!(%session, confidence = result.confidence, "no match");
                ScanOutcome::NoMatch {
                    confidence: result.confidence,
                    distance: result.distance,
                }
            }
        };

        Ok(ScanReport { session, outcome })
    }

    fn scan_camera(&mut self) -> Result<ScanReport, EngineError> {
        if self.camera.is_none() {
            let camera = Camera::open(&self.camera_device)?;
            if self.warmup_frames > 0 {
                tracing::info!(count = self.warmup_frames, "discarding warmup frames");
                for _ in 0..self.warmup_frames {
                    let _ = camera.capture_frame();
                }
            }
            self.camera = Some(camera);
        }

        let (frames, dark_skipped) = {
            let Some(camera) = &self.camera else {
                return Err(EngineError::NoFrames);
            };
            camera.capture_frames(self.frames_per_scan)?
        };
        tracing::debug!(captured = frames.len(), dark_skipped, "camera frames captured");

        if frames.is_empty() {
            return Err(EngineError::NoFrames);
        }

        // Report the first frame that clears validation; if none does,
        // surface the last rejection.
        let mut last_rejection = None;
        for frame in &frames {
            let report = self.scan_frame(frame)?;
            match report.outcome {
                ScanOutcome::Rejected { .. } => last_rejection = Some(report),
                _ => return Ok(report),
            }
        }

        last_rejection.ok_or(EngineError::NoFrames)
    }
}
