//! mirada-models — pretrained weight store.
//!
//! Resolves the detector and embedder ONNX artifacts: an explicit model
//! directory wins, then the per-user cache, then a download from the
//! remote model store. Downloaded files get a `.sha256` sidecar that is
//! re-verified on reuse; a mismatch forces a fresh download. Resolution
//! runs once per process lifetime.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::OnceCell;

/// Default remote store: the OpenCV model zoo.
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv_zoo/main/models";

/// The pretrained artifacts the pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// YuNet face detector.
    Detector,
    /// SFace face embedder (128-d descriptors).
    Embedder,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Detector, ModelKind::Embedder];

    pub fn file_name(self) -> &'static str {
        match self {
            ModelKind::Detector => "face_detection_yunet_2023mar.onnx",
            ModelKind::Embedder => "face_recognition_sface_2021dec.onnx",
        }
    }

    fn remote_dir(self) -> &'static str {
        match self {
            ModelKind::Detector => "face_detection_yunet",
            ModelKind::Embedder => "face_recognition_sface",
        }
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("download failed for {name}: {source}")]
    Download {
        name: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cached model {0} does not match its integrity sidecar")]
    IntegrityMismatch(String),
    #[error("no per-user cache directory available on this system")]
    NoCacheDir,
}

/// Absolute paths of the resolved artifacts.
#[derive(Debug, Clone)]
pub struct ResolvedModels {
    pub detector: PathBuf,
    pub embedder: PathBuf,
}

static RESOLVED: OnceCell<ResolvedModels> = OnceCell::const_new();

/// Local-first model resolution with remote fallback.
pub struct ModelStore {
    model_dir: Option<PathBuf>,
    base_url: String,
    client: reqwest::Client,
}

impl ModelStore {
    pub fn new(model_dir: Option<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            model_dir,
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Resolve both artifacts, fetching any that are missing.
    ///
    /// Memoized: the first successful resolution is reused for the rest of
    /// the process, so the store can be consulted from anywhere without
    /// re-checking disk or network.
    pub async fn ensure_all(&self) -> Result<ResolvedModels, ModelError> {
        RESOLVED
            .get_or_try_init(|| async {
                let detector = self.resolve(ModelKind::Detector).await?;
                let embedder = self.resolve(ModelKind::Embedder).await?;
                Ok(ResolvedModels { detector, embedder })
            })
            .await
            .cloned()
    }

    /// Resolve a single artifact without touching the process-wide cache.
    pub async fn resolve(&self, kind: ModelKind) -> Result<PathBuf, ModelError> {
        if let Some(dir) = &self.model_dir {
            let candidate = dir.join(kind.file_name());
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "using model from model dir");
                return Ok(candidate);
            }
            tracing::debug!(
                path = %candidate.display(),
                "model not in model dir, falling back to cache"
            );
        }

        let cached = cache_dir()?.join(kind.file_name());
        if cached.exists() {
            if sidecar_matches(&cached)? {
                tracing::info!(path = %cached.display(), "using cached model");
                return Ok(cached);
            }
            tracing::warn!(
                path = %cached.display(),
                "cached model fails integrity check, re-downloading"
            );
            std::fs::remove_file(&cached)?;
        }

        self.download(kind, &cached).await?;
        Ok(cached)
    }

    /// Where each artifact currently resolves, without downloading.
    pub fn local_status(&self) -> Vec<(ModelKind, Option<PathBuf>)> {
        ModelKind::ALL
            .iter()
            .map(|&kind| {
                let from_dir = self
                    .model_dir
                    .as_ref()
                    .map(|d| d.join(kind.file_name()))
                    .filter(|p| p.exists());
                let found = from_dir.or_else(|| {
                    cache_dir()
                        .ok()
                        .map(|d| d.join(kind.file_name()))
                        .filter(|p| p.exists())
                });
                (kind, found)
            })
            .collect()
    }

    async fn download(&self, kind: ModelKind, dest: &Path) -> Result<(), ModelError> {
        let url = format!("{}/{}/{}", self.base_url, kind.remote_dir(), kind.file_name());
        tracing::info!(url, "downloading model");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| ModelError::Download { name: kind.file_name(), source })?;

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ModelError::Download { name: kind.file_name(), source })?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write to a .part file and rename so a torn download never
        // masquerades as a complete model.
        let part = dest.with_extension("onnx.part");
        std::fs::write(&part, &bytes)?;
        write_sidecar(dest, &sha256_hex(&bytes))?;
        std::fs::rename(&part, dest)?;

        tracing::info!(
            path = %dest.display(),
            size = bytes.len(),
            "model downloaded"
        );
        Ok(())
    }
}

fn cache_dir() -> Result<PathBuf, ModelError> {
    directories::ProjectDirs::from("", "", "mirada")
        .map(|dirs| dirs.data_dir().join("models"))
        .ok_or(ModelError::NoCacheDir)
}

fn sidecar_path(model: &Path) -> PathBuf {
    model.with_extension("onnx.sha256")
}

fn write_sidecar(model: &Path, digest_hex: &str) -> std::io::Result<()> {
    std::fs::write(sidecar_path(model), digest_hex)
}

/// Check a cached model against its sidecar. A model without a sidecar
/// passes (it was placed there by hand).
fn sidecar_matches(model: &Path) -> Result<bool, ModelError> {
    let sidecar = sidecar_path(model);
    if !sidecar.exists() {
        return Ok(true);
    }
    let expected = std::fs::read_to_string(&sidecar)?;
    let actual = sha256_hex(&std::fs::read(model)?);
    Ok(expected.trim() == actual)
}

fn sha256_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mirada-models-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        // SHA-256 of the empty input.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_model_file_names() {
        assert_eq!(ModelKind::Detector.file_name(), "face_detection_yunet_2023mar.onnx");
        assert_eq!(ModelKind::Embedder.file_name(), "face_recognition_sface_2021dec.onnx");
    }

    #[test]
    fn test_sidecar_roundtrip() {
        let dir = scratch_dir("sidecar");
        let model = dir.join("model.onnx");
        let payload = b"weights";
        std::fs::write(&model, payload).unwrap();

        // No sidecar: hand-placed models pass.
        assert!(sidecar_matches(&model).unwrap());

        write_sidecar(&model, &sha256_hex(payload)).unwrap();
        assert!(sidecar_matches(&model).unwrap());

        // Tampering breaks the match.
        std::fs::write(&model, b"tampered").unwrap();
        assert!(!sidecar_matches(&model).unwrap());
    }

    #[tokio::test]
    async fn test_resolve_prefers_model_dir() {
        let dir = scratch_dir("resolve");
        let local = dir.join(ModelKind::Detector.file_name());
        std::fs::write(&local, b"local weights").unwrap();

        let store = ModelStore::new(Some(dir.clone()), "http://unreachable.invalid");
        let resolved = store.resolve(ModelKind::Detector).await.unwrap();
        assert_eq!(resolved, local);
    }
}
