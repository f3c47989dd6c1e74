//! File ("upload") source: decode an image into an `RgbFrame`.

use crate::frame::RgbFrame;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to open image {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decode an image file into an RGB frame.
pub fn load_image_file(path: &Path) -> Result<RgbFrame, UploadError> {
    let decoded = image::open(path).map_err(|source| UploadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(to_frame(decoded))
}

/// Decode an in-memory image (e.g. received bytes) into an RGB frame.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbFrame, UploadError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(to_frame(decoded))
}

fn to_frame(decoded: image::DynamicImage) -> RgbFrame {
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    RgbFrame {
        data: rgb.into_raw(),
        width,
        height,
        timestamp: std::time::Instant::now(),
        sequence: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png_bytes() {
        // Encode a tiny image in memory and decode it back.
        let img = image::RgbImage::from_pixel(4, 2, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let frame = decode_image_bytes(&bytes).unwrap();
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 2);
        assert_eq!(&frame.data[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_image_bytes(b"not an image").is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = load_image_file(Path::new("/nonexistent/query.jpg")).unwrap_err();
        assert!(matches!(err, UploadError::Open { .. }));
    }
}
