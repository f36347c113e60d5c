//! Random affine augmentation of training tensors.
//!
//! Rotation, shift, shear and zoom are folded into one affine map that is
//! applied to the HWC feature tensor directly. Output pixels are sampled
//! from the input with nearest-neighbour lookup; coordinates falling outside
//! the image are clamped to the closest edge pixel. A horizontal flip, when
//! drawn, happens after the affine map.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vision_core::{AugmentationConfig, TensorShape};

/// Concrete parameters of one random draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    /// Degrees, counter-clockwise
    pub rotation: f32,
    /// Pixels along the row axis
    pub shift_rows: f32,
    /// Pixels along the column axis
    pub shift_cols: f32,
    /// Degrees
    pub shear: f32,
    pub zoom_rows: f32,
    pub zoom_cols: f32,
    pub flip: bool,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            shift_rows: 0.0,
            shift_cols: 0.0,
            shear: 0.0,
            zoom_rows: 1.0,
            zoom_cols: 1.0,
            flip: false,
        }
    }
}

/// Maps output `(row, col)` coordinates to input coordinates
#[derive(Debug, Clone, Copy)]
pub struct AffineTransform {
    matrix: [[f32; 2]; 2],
    offset: [f32; 2],
    flip: bool,
    identity: bool,
}

impl AffineTransform {
    /// Builds `rotation * (shear * zoom * p + shift)` around the image center
    pub fn from_params(params: &TransformParams, shape: TensorShape) -> Self {
        let identity = params.rotation == 0.0
            && params.shift_rows == 0.0
            && params.shift_cols == 0.0
            && params.shear == 0.0
            && params.zoom_rows == 1.0
            && params.zoom_cols == 1.0;

        let (sin_t, cos_t) = params.rotation.to_radians().sin_cos();
        let (sin_s, cos_s) = params.shear.to_radians().sin_cos();
        let (zr, zc) = (params.zoom_rows, params.zoom_cols);

        // shear * zoom
        let sz = [[zr, -sin_s * zc], [0.0, cos_s * zc]];
        let rot = [[cos_t, -sin_t], [sin_t, cos_t]];

        let mut matrix = [[0.0; 2]; 2];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = rot[i][0] * sz[0][j] + rot[i][1] * sz[1][j];
            }
        }

        let center = [
            (shape.height as f32 - 1.0) / 2.0,
            (shape.width as f32 - 1.0) / 2.0,
        ];
        let shift = [params.shift_rows, params.shift_cols];
        let offset = [
            rot[0][0] * shift[0] + rot[0][1] * shift[1] + center[0],
            rot[1][0] * shift[0] + rot[1][1] * shift[1] + center[1],
        ];

        Self {
            matrix,
            offset,
            flip: params.flip,
            identity,
        }
    }

    /// Whether applying the transform changes anything
    pub fn is_identity(&self) -> bool {
        self.identity && !self.flip
    }

    /// Resamples an HWC tensor of `shape`
    pub fn apply(&self, features: &[f32], shape: TensorShape) -> Vec<f32> {
        if self.is_identity() {
            return features.to_vec();
        }

        let (h, w, c) = (shape.height, shape.width, shape.channels);
        let center = [(h as f32 - 1.0) / 2.0, (w as f32 - 1.0) / 2.0];
        let max_row = h.saturating_sub(1) as f32;
        let max_col = w.saturating_sub(1) as f32;

        let mut output = vec![0.0; features.len()];
        for y in 0..h {
            let oy = y as f32 - center[0];
            for x in 0..w {
                let (sy, sx) = if self.identity {
                    (y, x)
                } else {
                    let ox = x as f32 - center[1];
                    let row = self.matrix[0][0] * oy + self.matrix[0][1] * ox + self.offset[0];
                    let col = self.matrix[1][0] * oy + self.matrix[1][1] * ox + self.offset[1];
                    (
                        row.round().clamp(0.0, max_row) as usize,
                        col.round().clamp(0.0, max_col) as usize,
                    )
                };

                let dst_x = if self.flip { w - 1 - x } else { x };
                let src = shape.index(sy, sx, 0);
                let dst = shape.index(y, dst_x, 0);
                output[dst..dst + c].copy_from_slice(&features[src..src + c]);
            }
        }

        output
    }
}

/// Seeded source of random augmentations
pub struct AugmentationPipeline {
    config: AugmentationConfig,
    rng: ChaCha8Rng,
}

impl AugmentationPipeline {
    /// Creates a new augmentation pipeline with the given configuration
    pub fn new(config: AugmentationConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn symmetric(&mut self, range: f32) -> f32 {
        if range > 0.0 {
            self.rng.gen_range(-range..=range)
        } else {
            0.0
        }
    }

    /// Draws one set of transform parameters for an image of `shape`
    pub fn sample_params(&mut self, shape: TensorShape) -> TransformParams {
        let rotation = self.symmetric(self.config.rotation_range);
        let shift_rows = self.symmetric(self.config.height_shift_range) * shape.height as f32;
        let shift_cols = self.symmetric(self.config.width_shift_range) * shape.width as f32;
        let shear = self.symmetric(self.config.shear_range);
        let (zoom_rows, zoom_cols) = if self.config.zoom_range > 0.0 {
            let (lo, hi) = (1.0 - self.config.zoom_range, 1.0 + self.config.zoom_range);
            (self.rng.gen_range(lo..=hi), self.rng.gen_range(lo..=hi))
        } else {
            (1.0, 1.0)
        };
        let flip = self.config.horizontal_flip && self.rng.gen_bool(0.5);

        TransformParams {
            rotation,
            shift_rows,
            shift_cols,
            shear,
            zoom_rows,
            zoom_cols,
            flip,
        }
    }

    /// Applies a freshly drawn transform to one HWC tensor
    pub fn augment(&mut self, features: &[f32], shape: TensorShape) -> Vec<f32> {
        let params = self.sample_params(shape);
        AffineTransform::from_params(&params, shape).apply(features, shape)
    }
}
