//! YuNet face detector via ONNX Runtime.
//!
//! YuNet is an anchor-free detector: for each stride (8, 16, 32) it emits
//! classification, objectness, bbox-delta and landmark-delta tensors over
//! the stride's grid. Decoding maps grid cells straight to frame
//! coordinates, followed by NMS.

use crate::types::FaceBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const YUNET_INPUT_SIZE: usize = 640;
const YUNET_STRIDES: [usize; 3] = [8, 16, 32];
const YUNET_NMS_THRESHOLD: f32 = 0.3;
/// Candidate score gate applied during decoding.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — fetch it with `mirada models fetch`")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (cls, obj, bbox, kps).
type StrideOutputs = (usize, usize, usize, usize);

/// YuNet-based face detector.
pub struct FaceDetector {
    session: Session,
    input_size: usize,
    /// Per-stride output indices [(cls, obj, bbox, kps)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_outputs: [StrideOutputs; 3],
}

impl FaceDetector {
    /// Load the YuNet ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded YuNet model"
        );

        if output_names.len() < 12 {
            return Err(DetectorError::InferenceFailed(format!(
                "YuNet model requires 12 outputs (3 strides x cls/obj/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_outputs = discover_output_indices(&output_names);
        tracing::debug!(?stride_outputs, "YuNet output tensor mapping");

        Ok(Self {
            session,
            input_size: YUNET_INPUT_SIZE,
            stride_outputs,
        })
    }

    /// Detect faces in an RGB24 frame, returning boxes sorted by score.
    pub fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        score_threshold: f32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let (input, letterbox) = self.preprocess(rgb, width as usize, height as usize);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();

        for (stride_pos, &stride) in YUNET_STRIDES.iter().enumerate() {
            let (cls_idx, obj_idx, bbox_idx, kps_idx) = self.stride_outputs[stride_pos];

            let (_, cls) = outputs[cls_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("cls stride {stride}: {e}")))?;
            let (_, obj) = outputs[obj_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("obj stride {stride}: {e}")))?;
            let (_, bbox) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bbox stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            candidates.extend(decode_stride(
                cls,
                obj,
                bbox,
                kps,
                stride,
                self.input_size,
                &letterbox,
                score_threshold,
            ));
        }

        let mut result = nms(candidates, YUNET_NMS_THRESHOLD);
        result.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        Ok(result)
    }

    /// Letterbox an RGB24 frame into the BGR NCHW float tensor YuNet expects.
    ///
    /// The frame is resized with bilinear interpolation to fit the square
    /// input, centered, and padded with black. YuNet takes raw [0, 255]
    /// values, no normalization.
    fn preprocess(&self, rgb: &[u8], width: usize, height: usize) -> (Array4<f32>, Letterbox) {
        let side = self.input_size;
        let scale = (side as f32 / width as f32).min(side as f32 / height as f32);

        let new_w = (width as f32 * scale).round() as usize;
        let new_h = (height as f32 * scale).round() as usize;
        let pad_x = (side - new_w) as f32 / 2.0;
        let pad_y = (side - new_h) as f32 / 2.0;

        let x_start = pad_x.floor() as usize;
        let y_start = pad_y.floor() as usize;
        let inv_scale = 1.0 / scale;

        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        for y in 0..new_h {
            let src_y = (y as f32 + 0.5) * inv_scale - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
            let y1 = (y0 + 1).min(height - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..new_w {
                let src_x = (x as f32 + 0.5) * inv_scale - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
                let x1 = (x0 + 1).min(width - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                let (ty, tx) = (y_start + y, x_start + x);

                // RGB source channel ch lands in BGR tensor channel 2-ch.
                for ch in 0..3 {
                    let tl = rgb[(y0 * width + x0) * 3 + ch] as f32;
                    let tr = rgb[(y0 * width + x1) * 3 + ch] as f32;
                    let bl = rgb[(y1 * width + x0) * 3 + ch] as f32;
                    let br = rgb[(y1 * width + x1) * 3 + ch] as f32;

                    let val = tl * (1.0 - fx) * (1.0 - fy)
                        + tr * fx * (1.0 - fy)
                        + bl * (1.0 - fx) * fy
                        + br * fx * fy;

                    tensor[[0, 2 - ch, ty, tx]] = val;
                }
            }
        }

        (tensor, Letterbox { scale, pad_x, pad_y })
    }
}

/// Discover output tensor ordering by name.
///
/// YuNet exports may name tensors "cls_8", "obj_16", "bbox_32", "kps_8", …
/// or use generic numeric names. When the full named set is present it is
/// mapped to stride slots; otherwise the standard positional ordering
/// applies:
///   [0-2] = cls  (strides 8, 16, 32)
///   [3-5] = obj  (strides 8, 16, 32)
///   [6-8] = bbox (strides 8, 16, 32)
///   [9-11] = kps (strides 8, 16, 32)
fn discover_output_indices(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = YUNET_STRIDES.iter().all(|&stride| {
        ["cls", "obj", "bbox", "kps"]
            .iter()
            .all(|prefix| find(prefix, stride).is_some())
    });

    if named {
        tracing::info!("YuNet: using name-based output tensor mapping");
        std::array::from_fn(|i| {
            let stride = YUNET_STRIDES[i];
            (
                find("cls", stride).unwrap(),
                find("obj", stride).unwrap(),
                find("bbox", stride).unwrap(),
                find("kps", stride).unwrap(),
            )
        })
    } else {
        tracing::info!(
            ?names,
            "YuNet: output names not recognized, using positional mapping \
             [0-2]=cls, [3-5]=obj, [6-8]=bbox, [9-11]=kps"
        );
        [(0, 3, 6, 9), (1, 4, 7, 10), (2, 5, 8, 11)]
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Decode detections for a single stride level.
#[allow(clippy::too_many_arguments)]
fn decode_stride(
    cls: &[f32],
    obj: &[f32],
    bbox: &[f32],
    kps: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<FaceBox> {
    let grid = input_size / stride;
    let cells = grid * grid;

    let mut detections = Vec::new();

    for idx in 0..cells {
        let cls_logit = cls.get(idx).copied().unwrap_or(f32::NEG_INFINITY);
        let obj_logit = obj.get(idx).copied().unwrap_or(f32::NEG_INFINITY);
        let score = sigmoid(cls_logit) * sigmoid(obj_logit);
        if score <= threshold {
            continue;
        }

        let row = (idx / grid) as f32;
        let col = (idx % grid) as f32;

        let bbox_off = idx * 4;
        if bbox_off + 3 >= bbox.len() {
            continue;
        }

        // Anchor-free decode: center = (cell + delta) * stride, size = delta * stride.
        let cx = (col + bbox[bbox_off]) * stride as f32;
        let cy = (row + bbox[bbox_off + 1]) * stride as f32;
        let w = bbox[bbox_off + 2] * stride as f32;
        let h = bbox[bbox_off + 3] * stride as f32;

        let x = (cx - w / 2.0 - letterbox.pad_x) / letterbox.scale;
        let y = (cy - h / 2.0 - letterbox.pad_y) / letterbox.scale;

        let kps_off = idx * 10;
        let landmarks = if kps_off + 9 < kps.len() {
            let mut lms = [(0.0f32, 0.0f32); 5];
            for (i, lm) in lms.iter_mut().enumerate() {
                let lx = (col + kps[kps_off + i * 2]) * stride as f32;
                let ly = (row + kps[kps_off + i * 2 + 1]) * stride as f32;
                *lm = (
                    (lx - letterbox.pad_x) / letterbox.scale,
                    (ly - letterbox.pad_y) / letterbox.scale,
                );
            }
            Some(lms)
        } else {
            None
        };

        detections.push(FaceBox {
            x,
            y,
            width: w / letterbox.scale,
            height: h / letterbox.scale,
            score,
            landmarks,
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection-over-Union between two boxes.
fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
