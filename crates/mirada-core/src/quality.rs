//! Query-image quality gates.
//!
//! A query frame must hold exactly one sharp, confidently-detected face
//! within resolution bounds before it is allowed to reach the embedder.
//! Rejection messages double as the user-facing screen text.

use thiserror::Error;

/// Smallest accepted frame dimension, in pixels.
pub const MIN_DIMENSION: u32 = 100;
/// Largest accepted frame dimension, in pixels.
pub const MAX_DIMENSION: u32 = 2000;
/// Minimum variance of the Laplacian for a frame to count as sharp.
pub const BLUR_VARIANCE_MIN: f32 = 100.0;
/// Minimum detector score for the single accepted face.
pub const FACE_SCORE_MIN: f32 = 0.7;

/// Why a query frame was rejected before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("image resolution too low")]
    ResolutionTooLow,
    #[error("image resolution too high")]
    ResolutionTooHigh,
    #[error("no face detected")]
    NoFace,
    #[error("multiple faces detected")]
    MultipleFaces,
    #[error("eyes not detected")]
    EyesNotDetected,
    #[error("image too blurry")]
    TooBlurry,
    #[error("face detection confidence too low")]
    LowConfidence,
}

/// Check frame dimensions against the accepted bounds (inclusive).
pub fn check_resolution(width: u32, height: u32, min: u32, max: u32) -> Result<(), Rejection> {
    if width < min || height < min {
        return Err(Rejection::ResolutionTooLow);
    }
    if width > max || height > max {
        return Err(Rejection::ResolutionTooHigh);
    }
    Ok(())
}

/// Convert an RGB24 buffer to a BT.601 luma plane.
pub fn luma_plane(rgb: &[u8], width: u32, height: u32) -> Vec<f32> {
    let pixels = (width * height) as usize;
    let mut luma = Vec::with_capacity(pixels);
    for i in 0..pixels {
        let r = rgb[i * 3] as f32;
        let g = rgb[i * 3 + 1] as f32;
        let b = rgb[i * 3 + 2] as f32;
        luma.push(0.299 * r + 0.587 * g + 0.114 * b);
    }
    luma
}

/// Variance of the Laplacian over a luma plane.
///
/// Applies the 3x3 kernel [0,1,0; 1,-4,1; 0,1,0] to interior pixels and
/// takes the variance over the whole response plane, border included.
pub fn laplacian_variance(luma: &[f32], width: u32, height: u32) -> f32 {
    let w = width as usize;
    let h = height as usize;
    if w < 3 || h < 3 || luma.len() < w * h {
        return 0.0;
    }

    let mut response = vec![0.0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = luma[y * w + x];
            let sum = luma[(y - 1) * w + x]
                + luma[(y + 1) * w + x]
                + luma[y * w + x - 1]
                + luma[y * w + x + 1]
                - 4.0 * center;
            response[y * w + x] = sum;
        }
    }

    let n = response.len() as f64;
    let mean: f64 = response.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance: f64 = response
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    variance as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_in_bounds() {
        assert!(check_resolution(640, 480, MIN_DIMENSION, MAX_DIMENSION).is_ok());
        // Bounds are inclusive
        assert!(check_resolution(100, 100, MIN_DIMENSION, MAX_DIMENSION).is_ok());
        assert!(check_resolution(2000, 2000, MIN_DIMENSION, MAX_DIMENSION).is_ok());
    }

    #[test]
    fn test_resolution_too_low() {
        assert_eq!(
            check_resolution(99, 480, MIN_DIMENSION, MAX_DIMENSION),
            Err(Rejection::ResolutionTooLow)
        );
        assert_eq!(
            check_resolution(640, 50, MIN_DIMENSION, MAX_DIMENSION),
            Err(Rejection::ResolutionTooLow)
        );
    }

    #[test]
    fn test_resolution_too_high() {
        assert_eq!(
            check_resolution(2001, 480, MIN_DIMENSION, MAX_DIMENSION),
            Err(Rejection::ResolutionTooHigh)
        );
    }

    #[test]
    fn test_luma_plane_weights() {
        // Pure red, green, blue pixels
        let rgb = vec![255, 0, 0, 0, 255, 0, 0, 0, 255];
        let luma = luma_plane(&rgb, 3, 1);
        assert!((luma[0] - 0.299 * 255.0).abs() < 1e-3);
        assert!((luma[1] - 0.587 * 255.0).abs() < 1e-3);
        assert!((luma[2] - 0.114 * 255.0).abs() < 1e-3);
    }

    #[test]
    fn test_laplacian_variance_uniform_is_zero() {
        let luma = vec![128.0f32; 32 * 32];
        assert!(laplacian_variance(&luma, 32, 32) < 1e-6);
    }

    #[test]
    fn test_laplacian_variance_checkerboard_is_sharp() {
        // Alternating 0/255 pixels produce a strong Laplacian response.
        let w = 32u32;
        let h = 32u32;
        let luma: Vec<f32> = (0..(w * h) as usize)
            .map(|i| {
                let x = i % w as usize;
                let y = i / w as usize;
                if (x + y) % 2 == 0 {
                    255.0
                } else {
                    0.0
                }
            })
            .collect();
        assert!(laplacian_variance(&luma, w, h) > BLUR_VARIANCE_MIN);
    }

    #[test]
    fn test_laplacian_variance_gradient_is_blurry() {
        // A smooth horizontal ramp has a flat Laplacian: near-zero variance.
        let w = 64u32;
        let h = 64u32;
        let luma: Vec<f32> = (0..(w * h) as usize)
            .map(|i| (i % w as usize) as f32 * (255.0 / 63.0))
            .collect();
        assert!(laplacian_variance(&luma, w, h) < BLUR_VARIANCE_MIN);
    }

    #[test]
    fn test_laplacian_variance_degenerate_sizes() {
        assert_eq!(laplacian_variance(&[1.0, 2.0], 2, 1), 0.0);
        assert_eq!(laplacian_variance(&[], 0, 0), 0.0);
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(Rejection::NoFace.to_string(), "no face detected");
        assert_eq!(Rejection::MultipleFaces.to_string(), "multiple faces detected");
        assert_eq!(Rejection::TooBlurry.to_string(), "image too blurry");
    }
}
