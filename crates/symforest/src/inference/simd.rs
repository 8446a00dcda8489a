//! SIMD-accelerated border counting and tree traversal.
//!
//! [`SimdBorderCount`] compares a value against 8 borders per instruction.
//! [`SimdTraversal`] evaluates one tree level for 8 rows at once.
//!
//! # Performance Note
//!
//! Binarized vectors are stored row-major, so every level gathers 8 bytes
//! with scalar loads before the vector compare. The gather dominates for
//! shallow trees; the compare-and-pack pays off for depths around 6 and up.
//!
//! Requires the `simd` feature and works on stable Rust via the `wide` crate.

use wide::{CmpGt, CmpLt, f32x8, i32x8};

use crate::repr::borders::{BORDER_LANES, Borders};
use crate::repr::TreeView;

use super::binarize::BorderCount;
use super::traversal::{TreeTraversal, UnrolledTraversal};

/// SIMD lane width - process 8 rows at a time.
pub const SIMD_WIDTH: usize = 8;

// =============================================================================
// SimdBorderCount
// =============================================================================

/// Lane-vectorized `count(border < x)` over the `+inf`-padded border array.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimdBorderCount;

impl BorderCount for SimdBorderCount {
    #[inline]
    fn count_below(borders: &Borders, x: f32) -> u8 {
        let x = f32x8::splat(x);
        let mut count = 0u32;
        for chunk in borders.padded().chunks_exact(BORDER_LANES) {
            let mut lanes = [0.0f32; BORDER_LANES];
            lanes.copy_from_slice(chunk);
            let below = f32x8::from(lanes).cmp_lt(x);
            count += below.move_mask().count_ones();
        }
        count as u8
    }
}

// =============================================================================
// SimdTraversal
// =============================================================================

/// Row-parallel traversal: one level, 8 rows, one vector compare.
///
/// Single-row lookups use [`UnrolledTraversal`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SimdTraversal;

impl TreeTraversal for SimdTraversal {
    type Borders = SimdBorderCount;

    const NAME: &'static str = "simd";

    const USES_BLOCK_OPTIMIZATION: bool = true;

    #[inline]
    fn leaf_index(tree: &TreeView<'_>, bins: &[u8]) -> usize {
        UnrolledTraversal::leaf_index(tree, bins)
    }

    #[inline]
    fn accumulate_block(tree: &TreeView<'_>, bins_block: &[u8], stride: usize, sums: &mut [f64]) {
        let n_rows = sums.len();
        let simd_groups = n_rows / SIMD_WIDTH;

        for group_idx in 0..simd_groups {
            let row_start = group_idx * SIMD_WIDTH;
            let indices = leaf_indices_simd(tree, bins_block, stride, row_start);
            for (lane, &index) in indices.iter().enumerate() {
                sums[row_start + lane] += tree.leaf_values[index as usize] as f64;
            }
        }

        // Remainder rows (< 8) take the scalar path
        for row in simd_groups * SIMD_WIDTH..n_rows {
            let bins = &bins_block[row * stride..][..stride];
            sums[row] += tree.leaf_values[UnrolledTraversal::leaf_index(tree, bins)] as f64;
        }
    }
}

/// Leaf indexes of rows `row_start..row_start + 8`.
#[inline]
fn leaf_indices_simd(
    tree: &TreeView<'_>,
    bins_block: &[u8],
    stride: usize,
    row_start: usize,
) -> [i32; SIMD_WIDTH] {
    let mut index = i32x8::splat(0);
    let levels = tree
        .features
        .iter()
        .zip(tree.borders)
        .zip(tree.xor_masks)
        .enumerate();

    for (level, ((&feature, &border), &mask)) in levels {
        let feature = feature as usize;

        // wide has no gather; load the 8 bytes by hand
        let mut lanes = [0i32; SIMD_WIDTH];
        for (lane, value) in lanes.iter_mut().enumerate() {
            *value = (bins_block[(row_start + lane) * stride + feature] ^ mask) as i32;
        }

        // bin >= border  <=>  bin > border - 1 (true lanes are all ones)
        let set = i32x8::from(lanes).cmp_gt(i32x8::splat(border as i32 - 1));
        index = index | (set & i32x8::splat(1 << level));
    }

    index.to_array()
}
