//! Face alignment.
//!
//! Maps the five detected landmarks onto the canonical 112x112 reference
//! positions with a 4-DOF similarity transform (scale, rotation,
//! translation) estimated by least squares, then warps the face region
//! into the aligned crop the embedder expects.

/// Canonical landmark positions for a 112x112 aligned crop.
const CANONICAL_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Side length of the aligned output crop.
pub const ALIGNED_SIZE: usize = 112;

/// A 2x3 row-major affine matrix [a, b, tx; c, d, ty].
type Affine = [f32; 6];

/// Estimate the similarity transform taking `src` landmarks onto the
/// canonical positions.
///
/// The 4 unknowns (a, b, tx, ty) parameterize
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
/// and each landmark pair contributes two rows to an overdetermined
/// system solved via its normal equations.
fn estimate_transform(src: &[(f32, f32); 5]) -> Affine {
    let mut normal = [[0.0f32; 4]; 4];
    let mut rhs = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(CANONICAL_LANDMARKS.iter()) {
        let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
        for (row, target) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    normal[j][k] += row[j] * row[k];
                }
                rhs[j] += row[j] * target;
            }
        }
    }

    let [a, b, tx, ty] = solve4(normal, rhs);
    [a, -b, tx, b, a, ty]
}

/// Solve a 4x4 linear system with Gaussian elimination and partial pivoting.
/// A singular system falls back to the identity solution.
fn solve4(mut m: [[f32; 4]; 4], mut rhs: [f32; 4]) -> [f32; 4] {
    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        if m[col][col].abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0];
        }

        for row in col + 1..4 {
            let factor = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let mut acc = rhs[i];
        for j in i + 1..4 {
            acc -= m[i][j] * x[j];
        }
        x[i] = acc / m[i][i];
    }
    x
}

/// Inverse-map an RGB frame through `matrix` into a square output crop.
///
/// Samples with bilinear interpolation; out-of-bounds pixels stay black.
fn warp_rgb(
    rgb: &[u8],
    src_width: usize,
    src_height: usize,
    matrix: &Affine,
    out_size: usize,
) -> Vec<u8> {
    let (a, tx, b, ty) = (matrix[0], matrix[2], matrix[3], matrix[5]);

    // Similarity matrix [[a, -b], [b, a]] inverts analytically.
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return vec![0u8; out_size * out_size * 3];
    }
    let ia = a / det;
    let ib = b / det;

    let mut out = vec![0u8; out_size * out_size * 3];

    for oy in 0..out_size {
        for ox in 0..out_size {
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = -ib * dx + ia * dy;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let sample = |x: i32, y: i32, ch: usize| -> f32 {
                if x >= 0 && x < src_width as i32 && y >= 0 && y < src_height as i32 {
                    rgb[(y as usize * src_width + x as usize) * 3 + ch] as f32
                } else {
                    0.0
                }
            };

            let base = (oy * out_size + ox) * 3;
            for ch in 0..3 {
                let val = sample(x0, y0, ch) * (1.0 - fx) * (1.0 - fy)
                    + sample(x0 + 1, y0, ch) * fx * (1.0 - fy)
                    + sample(x0, y0 + 1, ch) * (1.0 - fx) * fy
                    + sample(x0 + 1, y0 + 1, ch) * fx * fy;
                out[base + ch] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// Align a detected face to the canonical 112x112 RGB crop.
pub fn align_face(
    rgb: &[u8],
    width: u32,
    height: u32,
    landmarks: &[(f32, f32); 5],
) -> Vec<u8> {
    let matrix = estimate_transform(landmarks);
    warp_rgb(rgb, width as usize, height as usize, &matrix, ALIGNED_SIZE)
}
