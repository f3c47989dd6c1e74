//! Gallery matching.
//!
//! A linear Euclidean nearest-neighbor scan over every reference embedding
//! of every profile. Distances map to a confidence in [0, 1]; below the
//! match threshold the scan reports "not found" rather than a
//! low-confidence identity.

use crate::types::{Embedding, Profile};
use serde::Serialize;

/// Result of matching a query embedding against the gallery.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub matched: bool,
    /// Confidence of the best candidate in [0, 1] (0.0 for an empty gallery).
    pub confidence: f32,
    /// Euclidean distance of the best candidate.
    pub distance: Option<f32>,
    /// ID of the matched profile (only set when `matched`).
    pub profile_id: Option<String>,
}

impl MatchOutcome {
    fn not_found() -> Self {
        Self { matched: false, confidence: 0.0, distance: None, profile_id: None }
    }
}

/// Strategy for comparing a query embedding against the gallery.
pub trait Matcher {
    fn best_match(&self, query: &Embedding, gallery: &[Profile], threshold: f32) -> MatchOutcome;
}

/// Euclidean nearest-neighbor matcher.
///
/// Scans all descriptors of all profiles in order; ties keep the
/// first-encountered candidate (strict `<` improvement only).
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn best_match(&self, query: &Embedding, gallery: &[Profile], threshold: f32) -> MatchOutcome {
        let mut best: Option<(usize, f32)> = None;

        for (idx, profile) in gallery.iter().enumerate() {
            for reference in &profile.embeddings {
                let dist = query.euclidean_distance(reference);
                let improves = match best {
                    None => true,
                    Some((_, best_dist)) => dist < best_dist,
                };
                if improves {
                    best = Some((idx, dist));
                }
            }
        }

        let Some((idx, dist)) = best else {
            return MatchOutcome::not_found();
        };

        let confidence = (1.0 - dist).clamp(0.0, 1.0);
        if confidence < threshold {
            return MatchOutcome {
                matched: false,
                confidence,
                distance: Some(dist),
                profile_id: None,
            };
        }

        MatchOutcome {
            matched: true,
            confidence,
            distance: Some(dist),
            profile_id: Some(gallery[idx].id.clone()),
        }
    }
}

/// Confidence expressed as a whole percentage, as shown on the results screen.
pub fn confidence_percent(confidence: f32) -> u8 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    fn profile(id: &str, embeddings: Vec<Embedding>) -> Profile {
        Profile {
            id: id.into(),
            name: format!("profile {id}"),
            age: 30,
            occupation: "tester".into(),
            location: "nowhere".into(),
            last_seen: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            verified: true,
            embeddings,
        }
    }

    #[test]
    fn test_empty_gallery_is_not_found() {
        let outcome = EuclideanMatcher.best_match(&emb(vec![1.0, 0.0]), &[], 0.5);
        assert!(!outcome.matched);
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.distance.is_none());
        assert!(outcome.profile_id.is_none());
    }

    #[test]
    fn test_exact_match_full_confidence() {
        let gallery = vec![profile("001", vec![emb(vec![0.6, 0.8])])];
        let outcome = EuclideanMatcher.best_match(&emb(vec![0.6, 0.8]), &gallery, 0.5);
        assert!(outcome.matched);
        assert_eq!(outcome.profile_id.as_deref(), Some("001"));
        assert!((outcome.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_profile_wins() {
        let gallery = vec![
            profile("001", vec![emb(vec![1.0, 0.0])]),
            profile("002", vec![emb(vec![0.9, 0.1])]),
        ];
        let outcome = EuclideanMatcher.best_match(&emb(vec![0.89, 0.11]), &gallery, 0.5);
        assert!(outcome.matched);
        assert_eq!(outcome.profile_id.as_deref(), Some("002"));
    }

    #[test]
    fn test_tie_keeps_first_encountered() {
        // Two profiles at identical distance from the query; the scan must
        // keep the first one.
        let gallery = vec![
            profile("001", vec![emb(vec![0.1, 0.0])]),
            profile("002", vec![emb(vec![-0.1, 0.0])]),
        ];
        let outcome = EuclideanMatcher.best_match(&emb(vec![0.0, 0.0]), &gallery, 0.5);
        assert!(outcome.matched);
        assert_eq!(outcome.profile_id.as_deref(), Some("001"));
    }

    #[test]
    fn test_scans_every_descriptor_of_a_profile() {
        let gallery = vec![profile(
            "001",
            vec![emb(vec![5.0, 5.0]), emb(vec![0.05, 0.0])],
        )];
        let outcome = EuclideanMatcher.best_match(&emb(vec![0.0, 0.0]), &gallery, 0.5);
        assert!(outcome.matched);
        assert!((outcome.distance.unwrap() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_below_threshold_is_not_found() {
        // Distance 0.6 -> confidence 0.4 < 0.5: report not found, keep the
        // nearest distance for diagnostics, clear the identity.
        let gallery = vec![profile("001", vec![emb(vec![0.6, 0.0])])];
        let outcome = EuclideanMatcher.best_match(&emb(vec![0.0, 0.0]), &gallery, 0.5);
        assert!(!outcome.matched);
        assert!(outcome.profile_id.is_none());
        assert!((outcome.confidence - 0.4).abs() < 1e-6);
        assert!((outcome.distance.unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_exactly_at_threshold_matches() {
        // Rejection is strict: confidence == threshold still matches.
        let gallery = vec![profile("001", vec![emb(vec![0.5, 0.0])])];
        let outcome = EuclideanMatcher.best_match(&emb(vec![0.0, 0.0]), &gallery, 0.5);
        assert!(outcome.matched);
        assert!((outcome.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_clamped_for_far_candidates() {
        // Distance > 1 would give negative confidence; it clamps to zero.
        let gallery = vec![profile("001", vec![emb(vec![3.0, 4.0])])];
        let outcome = EuclideanMatcher.best_match(&emb(vec![0.0, 0.0]), &gallery, 0.5);
        assert!(!outcome.matched);
        assert_eq!(outcome.confidence, 0.0);
        assert!((outcome.distance.unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_percent_rounding() {
        assert_eq!(confidence_percent(0.0), 0);
        assert_eq!(confidence_percent(0.444), 44);
        assert_eq!(confidence_percent(0.445), 45);
        assert_eq!(confidence_percent(1.0), 100);
        assert_eq!(confidence_percent(1.7), 100);
    }
}
