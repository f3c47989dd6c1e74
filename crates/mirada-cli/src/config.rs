use mirada_core::ScanLimits;
use std::path::PathBuf;

/// Application configuration, loaded from `MIRADA_*` environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory holding the ONNX model files, if set; otherwise the
    /// per-user cache (with remote fetch) is used.
    pub model_dir: Option<PathBuf>,
    /// Base URL of the remote model store.
    pub model_base_url: String,
    /// Minimum confidence for a positive identification.
    pub match_threshold: f32,
    /// Number of frames to capture per camera scan.
    pub frames_per_scan: usize,
    /// Number of warmup frames to discard when the camera is opened.
    pub warmup_frames: usize,
    /// Path to a profile manifest overriding the built-in gallery.
    pub profiles_path: Option<PathBuf>,
    /// Quality gates for the query path.
    pub limits: ScanLimits,
}

impl Config {
    /// Load configuration from `MIRADA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = ScanLimits::default();
        let limits = ScanLimits {
            min_dimension: env_u32("MIRADA_MIN_DIMENSION", defaults.min_dimension),
            max_dimension: env_u32("MIRADA_MAX_DIMENSION", defaults.max_dimension),
            blur_variance_min: env_f32("MIRADA_BLUR_MIN", defaults.blur_variance_min),
            face_score_min: env_f32("MIRADA_FACE_SCORE_MIN", defaults.face_score_min),
            detect_threshold: env_f32("MIRADA_DETECT_THRESHOLD", defaults.detect_threshold),
        };

        Self {
            camera_device: std::env::var("MIRADA_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir: std::env::var("MIRADA_MODEL_DIR").map(PathBuf::from).ok(),
            model_base_url: std::env::var("MIRADA_MODEL_BASE_URL")
                .unwrap_or_else(|_| mirada_models::DEFAULT_BASE_URL.to_string()),
            match_threshold: env_f32("MIRADA_MATCH_THRESHOLD", 0.5),
            frames_per_scan: env_usize("MIRADA_FRAMES_PER_SCAN", 3),
            warmup_frames: env_usize("MIRADA_WARMUP_FRAMES", 4),
            profiles_path: std::env::var("MIRADA_PROFILES_PATH").map(PathBuf::from).ok(),
            limits,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
