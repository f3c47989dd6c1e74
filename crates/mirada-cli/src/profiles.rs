//! Mock-profile manifest and gallery building.
//!
//! The gallery ships as an embedded TOML manifest; `MIRADA_PROFILES_PATH`
//! points at a replacement. Reference embeddings are generated at startup
//! by running each profile's images through the detect-align-embed path.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use mirada_core::{FacePipeline, Profile};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

static DEFAULT_MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    toml::from_str(include_str!("../profiles.toml")).expect("built-in profile manifest is valid")
});

/// One gallery entry: identity metadata plus its reference image paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub occupation: String,
    pub location: String,
    pub profile_image: PathBuf,
    pub eye_image: Option<PathBuf>,
    pub last_seen: NaiveDate,
    #[serde(default)]
    pub verified: bool,
}

impl ProfileSpec {
    /// Reference image paths in embedding order.
    pub fn image_paths(&self) -> Vec<&Path> {
        let mut paths = vec![self.profile_image.as_path()];
        if let Some(eye) = &self.eye_image {
            paths.push(eye.as_path());
        }
        paths
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub profiles: Vec<ProfileSpec>,
}

/// Load the profile manifest: the file at `path` if given, otherwise the
/// built-in gallery.
pub fn load_manifest(path: Option<&Path>) -> Result<Manifest> {
    let Some(path) = path else {
        return Ok(DEFAULT_MANIFEST.clone());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading profile manifest {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing profile manifest {}", path.display()))
}

/// Build the in-memory gallery from a manifest.
///
/// Each image that yields no embedding logs a warning and is skipped; a
/// profile with zero surviving descriptors is excluded entirely.
pub fn build_gallery(pipeline: &mut FacePipeline, manifest: &Manifest) -> Vec<Profile> {
    let mut gallery = Vec::new();

    for spec in &manifest.profiles {
        let mut embeddings = Vec::new();

        for path in spec.image_paths() {
            let frame = match mirada_capture::upload::load_image_file(path) {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(
                        profile = %spec.name,
                        path = %path.display(),
                        error = %err,
                        "could not load reference image"
                    );
                    continue;
                }
            };

            match pipeline.embed_reference(&frame.data, frame.width, frame.height) {
                Ok(embedding) => embeddings.push(embedding),
                Err(err) => {
                    tracing::warn!(
                        profile = %spec.name,
                        path = %path.display(),
                        error = %err,
                        "could not extract reference embedding"
                    );
                }
            }
        }

        if embeddings.is_empty() {
            tracing::warn!(profile = %spec.name, "no usable reference images, skipping profile");
            continue;
        }

        tracing::info!(
            profile = %spec.name,
            descriptors = embeddings.len(),
            "profile enrolled in gallery"
        );

        gallery.push(Profile {
            id: spec.id.clone(),
            name: spec.name.clone(),
            age: spec.age,
            occupation: spec.occupation.clone(),
            location: spec.location.clone(),
            last_seen: spec.last_seen,
            verified: spec.verified,
            embeddings,
        });
    }

    gallery
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_manifest_parses() {
        let manifest = load_manifest(None).unwrap();
        assert!((2..=3).contains(&manifest.profiles.len()));
        assert_eq!(manifest.profiles[0].id, "001");
    }

    #[test]
    fn test_image_paths_order() {
        let manifest = load_manifest(None).unwrap();
        let with_eye = &manifest.profiles[0];
        assert_eq!(with_eye.image_paths().len(), 2);
        assert_eq!(with_eye.image_paths()[0], with_eye.profile_image.as_path());
    }

    #[test]
    fn test_manifest_without_eye_image() {
        let manifest: Manifest = toml::from_str(
            r#"
            [[profiles]]
            id = "x1"
            name = "Test Person"
            age = 20
            occupation = "none"
            location = "nowhere"
            profile_image = "face.jpg"
            last_seen = "2024-03-01"
            "#,
        )
        .unwrap();
        let spec = &manifest.profiles[0];
        assert!(spec.eye_image.is_none());
        assert!(!spec.verified); // defaults to false
        assert_eq!(spec.image_paths().len(), 1);
        assert_eq!(spec.last_seen, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_missing_manifest_file_errors() {
        assert!(load_manifest(Some(Path::new("/nonexistent/profiles.toml"))).is_err());
    }
}
