//! Overlapping patch inference with border-weighted blending.

use crate::constants::ldsr::{CLIP_MAX_WEIGHT, CLIP_MIN_WEIGHT};
use crate::error::{Error, Result};
use ndarray::{Array2, Array4, Axis, s};

/// Patch layout over an `H x W` plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    /// Patch height.
    pub kernel_h: usize,
    /// Patch width.
    pub kernel_w: usize,
    /// Top offsets of patch rows.
    pub ys: Vec<usize>,
    /// Left offsets of patch columns.
    pub xs: Vec<usize>,
}

/// Offsets every `stride` pixels plus a final patch flush with the far edge.
fn positions(size: usize, kernel: usize, stride: usize) -> Vec<usize> {
    if size <= kernel {
        return vec![0];
    }
    let last = size - kernel;
    let mut offsets: Vec<usize> = (0..=last).step_by(stride.clamp(1, kernel)).collect();
    if offsets.last() != Some(&last) {
        offsets.push(last);
    }
    offsets
}

impl TileGrid {
    /// Grid of `kernel`-sized patches every `stride` pixels. The kernel shrinks to
    /// fit planes smaller than it.
    pub fn new(height: usize, width: usize, kernel: usize, stride: usize) -> Self {
        let kernel_h = kernel.min(height);
        let kernel_w = kernel.min(width);
        Self {
            kernel_h,
            kernel_w,
            ys: positions(height, kernel_h, stride),
            xs: positions(width, kernel_w, stride),
        }
    }

    /// Whether a plane is too large for a single patch.
    pub fn needs_tiling(height: usize, width: usize, kernel: usize) -> bool {
        height > kernel || width > kernel
    }

    /// Number of patches.
    pub fn len(&self) -> usize {
        self.ys.len() * self.xs.len()
    }

    /// Whether the grid has no patches.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(top, left)` of every patch, row-major.
    pub fn tiles(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.ys
            .iter()
            .flat_map(move |&y| self.xs.iter().map(move |&x| (y, x)))
    }
}

/// Distance to the nearest patch border on a `[0, 1]` grid, clipped.
pub fn border_weights(height: usize, width: usize) -> Array2<f32> {
    let dy = height.saturating_sub(1).max(1) as f32;
    let dx = width.saturating_sub(1).max(1) as f32;
    Array2::from_shape_fn((height, width), |(y, x)| {
        let (ny, nx) = (y as f32 / dy, x as f32 / dx);
        let edge = ny.min(nx).min(1.0 - ny).min(1.0 - nx);
        edge.clamp(CLIP_MIN_WEIGHT, CLIP_MAX_WEIGHT)
    })
}

/// Run `f` over every patch of `input` and blend the results.
///
/// `f` maps a `[1, C, kh, kw]` patch to `[1, C', kh * scale, kw * scale]`.
/// Patches are folded back at `scale` times their input offsets, weighted by
/// [`border_weights`] and normalized by the summed weights.
pub fn apply_tiled<F>(input: &Array4<f32>, grid: &TileGrid, scale: usize, mut f: F) -> Result<Array4<f32>>
where
    F: FnMut(Array4<f32>) -> Result<Array4<f32>>,
{
    let (_, _, height, width) = input.dim();
    let (out_kh, out_kw) = (grid.kernel_h * scale, grid.kernel_w * scale);
    let weights = border_weights(out_kh, out_kw);

    let mut output: Option<Array4<f32>> = None;
    let mut weight_sum = Array2::<f32>::zeros((height * scale, width * scale));

    for (y, x) in grid.tiles() {
        let patch = input
            .slice(s![.., .., y..y + grid.kernel_h, x..x + grid.kernel_w])
            .to_owned();
        let result = f(patch)?;
        let (batch, channels, rh, rw) = result.dim();
        if batch != 1 || rh != out_kh || rw != out_kw {
            return Err(Error::UnexpectedShape {
                name: "patch".to_string(),
                shape: result.shape().to_vec(),
            });
        }

        let acc = output.get_or_insert_with(|| {
            Array4::zeros((1, channels, height * scale, width * scale))
        });
        if acc.dim().1 != channels {
            return Err(Error::UnexpectedShape {
                name: "patch".to_string(),
                shape: result.shape().to_vec(),
            });
        }

        let (oy, ox) = (y * scale, x * scale);
        let mut region = acc.slice_mut(s![0, .., oy..oy + out_kh, ox..ox + out_kw]);
        for (mut plane, patch_plane) in region
            .axis_iter_mut(Axis(0))
            .zip(result.index_axis(Axis(0), 0).axis_iter(Axis(0)))
        {
            plane.zip_mut_with(&(&patch_plane * &weights), |a, b| *a += b);
        }
        let mut sum_region = weight_sum.slice_mut(s![oy..oy + out_kh, ox..ox + out_kw]);
        sum_region += &weights;
    }

    let mut output = output.ok_or_else(|| Error::Internal {
        message: "tile grid is empty".to_string(),
    })?;
    for mut plane in output.index_axis_mut(Axis(0), 0).axis_iter_mut(Axis(0)) {
        plane /= &weight_sum;
    }
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ramp(h: usize, w: usize) -> Array4<f32> {
        Array4::from_shape_fn((1, 2, h, w), |(_, c, y, x)| (c * 1000 + y * w + x) as f32)
    }

    #[test]
    fn test_positions_cover_edge() {
        assert_eq!(positions(300, 128, 64), vec![0, 64, 128, 172]);
        assert_eq!(positions(256, 128, 64), vec![0, 64, 128]);
        assert_eq!(positions(100, 128, 64), vec![0]);
    }

    #[test]
    fn test_grid_shrinks_kernel() {
        let grid = TileGrid::new(100, 300, 128, 64);
        assert_eq!(grid.kernel_h, 100);
        assert_eq!(grid.kernel_w, 128);
        assert_eq!(grid.ys, vec![0]);
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn test_needs_tiling() {
        assert!(!TileGrid::needs_tiling(128, 128, 128));
        assert!(TileGrid::needs_tiling(129, 64, 128));
        assert!(TileGrid::needs_tiling(64, 200, 128));
    }

    #[test]
    fn test_border_weights_clipped() {
        let w = border_weights(9, 9);
        assert!((w[[0, 0]] - CLIP_MIN_WEIGHT).abs() < f32::EPSILON);
        assert!((w[[4, 4]] - CLIP_MAX_WEIGHT).abs() < f32::EPSILON);
        assert!((w[[2, 4]] - 0.25).abs() < 1e-6);
        assert!(w.iter().all(|v| *v >= CLIP_MIN_WEIGHT && *v <= CLIP_MAX_WEIGHT));
    }

    #[test]
    fn test_identity_fold_reconstructs_input() {
        let input = ramp(40, 70);
        let grid = TileGrid::new(40, 70, 16, 8);
        let output = apply_tiled(&input, &grid, 1, Ok).unwrap();
        assert_eq!(output.dim(), input.dim());
        for (a, b) in output.iter().zip(input.iter()) {
            assert!((a - b).abs() < 1e-2, "{a} vs {b}");
        }
    }

    #[test]
    fn test_scaled_fold_matches_nearest_upsample() {
        let input = ramp(20, 30);
        let grid = TileGrid::new(20, 30, 8, 4);
        let upsample = |patch: Array4<f32>| -> Result<Array4<f32>> {
            let (b, c, h, w) = patch.dim();
            Ok(Array4::from_shape_fn((b, c, h * 2, w * 2), |(b, c, y, x)| {
                patch[[b, c, y / 2, x / 2]]
            }))
        };
        let output = apply_tiled(&input, &grid, 2, upsample).unwrap();
        assert_eq!(output.dim(), (1, 2, 40, 60));
        for ((_, c, y, x), v) in output.indexed_iter() {
            let expected = input[[0, c, y / 2, x / 2]];
            assert!((v - expected).abs() < 1e-2);
        }
    }

    #[test]
    fn test_wrong_patch_shape_errors() {
        let input = ramp(20, 20);
        let grid = TileGrid::new(20, 20, 8, 4);
        let result = apply_tiled(&input, &grid, 2, Ok);
        assert!(matches!(result, Err(Error::UnexpectedShape { .. })));
    }
}
