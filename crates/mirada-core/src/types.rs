use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A detected face: bounding box, detector score, optional landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    /// Both eye landmarks, if present and finite.
    pub fn eye_points(&self) -> Option<((f32, f32), (f32, f32))> {
        let lm = self.landmarks.as_ref()?;
        let (le, re) = (lm[0], lm[1]);
        let finite =
            le.0.is_finite() && le.1.is_finite() && re.0.is_finite() && re.1.is_finite();
        finite.then_some((le, re))
    }
}

/// Face embedding vector (128-dimensional for SFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "sface_2021dec").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

/// A gallery profile: identity metadata plus one or more reference embeddings.
///
/// Embeddings are built at startup from the profile's static images and held
/// in memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub occupation: String,
    pub location: String,
    pub last_seen: NaiveDate,
    pub verified: bool,
    pub embeddings: Vec<Embedding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    #[test]
    fn test_euclidean_distance_identical() {
        let a = emb(vec![1.0, 2.0, 3.0]);
        assert!(a.euclidean_distance(&a) < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_unit_axes() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![0.0, 1.0]);
        assert!((a.euclidean_distance(&b) - 2.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_symmetric() {
        let a = emb(vec![0.3, -0.7, 0.1]);
        let b = emb(vec![-0.2, 0.4, 0.9]);
        assert!((a.euclidean_distance(&b) - b.euclidean_distance(&a)).abs() < 1e-6);
    }

    #[test]
    fn test_eye_points_present() {
        let face = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            score: 0.9,
            landmarks: Some([(30.0, 40.0), (70.0, 40.0), (50.0, 60.0), (35.0, 80.0), (65.0, 80.0)]),
        };
        let (le, re) = face.eye_points().unwrap();
        assert_eq!(le, (30.0, 40.0));
        assert_eq!(re, (70.0, 40.0));
    }

    #[test]
    fn test_eye_points_missing_landmarks() {
        let face = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            score: 0.9,
            landmarks: None,
        };
        assert!(face.eye_points().is_none());
    }

    #[test]
    fn test_eye_points_non_finite() {
        let face = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            score: 0.9,
            landmarks: Some([
                (f32::NAN, 40.0),
                (70.0, 40.0),
                (50.0, 60.0),
                (35.0, 80.0),
                (65.0, 80.0),
            ]),
        };
        assert!(face.eye_points().is_none());
    }
}
