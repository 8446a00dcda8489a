//! Oblivious tree traversal strategies.
//!
//! This module provides the [`TreeTraversal`] trait and its implementations.
//! Every level of an oblivious tree applies the same split, so the leaf
//! index is just the bits `(bins[feature_d] ^ xor_mask_d) >= border_d`
//! packed level by level; there is no node walk.
//!
//! # Available Strategies
//!
//! - [`ScalarTraversal`]: plain per-level loop
//! - [`UnrolledTraversal`]: depth-specialized index computation, and
//!   level-by-level processing of whole blocks
//! - [`SimdTraversal`](super::simd::SimdTraversal): 8 rows per step with
//!   `wide` vectors (feature `simd`)

use crate::repr::TreeView;

use super::binarize::{BorderCount, ScalarBorderCount, UnrolledBorderCount};
use super::scorer::MAX_BLOCK_SIZE;

// =============================================================================
// TreeTraversal Trait
// =============================================================================

/// Strategy for computing leaf indexes during scoring.
///
/// Each strategy also fixes the [`BorderCount`] used to binarize numeric and
/// CTR values, so one type parameter selects the whole inner loop.
pub trait TreeTraversal: Clone + Copy + Default + Send + Sync + 'static {
    /// Border counting paired with this traversal.
    type Borders: BorderCount;

    /// Name used in logs.
    const NAME: &'static str;

    /// Whether this traversal benefits from block-level optimization.
    ///
    /// When true, batch scoring binarizes a whole block first and then calls
    /// [`accumulate_block`](Self::accumulate_block) per tree. When false it
    /// scores record by record.
    const USES_BLOCK_OPTIMIZATION: bool = false;

    /// Leaf index of `tree` for one binarized feature vector.
    fn leaf_index(tree: &TreeView<'_>, bins: &[u8]) -> usize;

    /// Add `tree`'s leaf value to `sums[row]` for every row of a block.
    ///
    /// `bins_block` holds `sums.len()` binarized vectors of `stride` bytes,
    /// back to back. The default implementation calls
    /// [`leaf_index`](Self::leaf_index) per row.
    #[inline]
    fn accumulate_block(tree: &TreeView<'_>, bins_block: &[u8], stride: usize, sums: &mut [f64]) {
        for (row, sum) in sums.iter_mut().enumerate() {
            let bins = &bins_block[row * stride..][..stride];
            *sum += tree.leaf_values[Self::leaf_index(tree, bins)] as f64;
        }
    }
}

// =============================================================================
// ScalarTraversal
// =============================================================================

/// Per-level loop over the tree's splits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarTraversal;

impl TreeTraversal for ScalarTraversal {
    type Borders = ScalarBorderCount;

    const NAME: &'static str = "scalar";

    #[inline]
    fn leaf_index(tree: &TreeView<'_>, bins: &[u8]) -> usize {
        let mut index = 0usize;
        let levels = tree
            .features
            .iter()
            .zip(tree.borders)
            .zip(tree.xor_masks)
            .enumerate();
        for (level, ((&feature, &border), &mask)) in levels {
            let bin = bins[feature as usize] ^ mask;
            index |= ((bin >= border) as usize) << level;
        }
        index
    }
}

// =============================================================================
// UnrolledTraversal
// =============================================================================

/// Deepest tree with a dedicated unrolled index computation.
pub const MAX_UNROLLED_DEPTH: usize = 8;

/// Depth-specialized traversal.
///
/// Trees up to [`MAX_UNROLLED_DEPTH`] get a fixed-trip-count index loop the
/// compiler fully unrolls. In batch scoring all rows of a block go through
/// the same level together, so the level's split stays in registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnrolledTraversal;

/// Leaf index of a tree known to have exactly `D` levels.
#[inline(always)]
fn leaf_index_fixed<const D: usize>(tree: &TreeView<'_>, bins: &[u8]) -> usize {
    let features = &tree.features[..D];
    let borders = &tree.borders[..D];
    let masks = &tree.xor_masks[..D];
    let mut index = 0usize;
    for level in 0..D {
        let bin = bins[features[level] as usize] ^ masks[level];
        index |= ((bin >= borders[level]) as usize) << level;
    }
    index
}

impl TreeTraversal for UnrolledTraversal {
    type Borders = UnrolledBorderCount;

    const NAME: &'static str = "unrolled";

    const USES_BLOCK_OPTIMIZATION: bool = true;

    #[inline]
    fn leaf_index(tree: &TreeView<'_>, bins: &[u8]) -> usize {
        match tree.depth() {
            0 => 0,
            1 => leaf_index_fixed::<1>(tree, bins),
            2 => leaf_index_fixed::<2>(tree, bins),
            3 => leaf_index_fixed::<3>(tree, bins),
            4 => leaf_index_fixed::<4>(tree, bins),
            5 => leaf_index_fixed::<5>(tree, bins),
            6 => leaf_index_fixed::<6>(tree, bins),
            7 => leaf_index_fixed::<7>(tree, bins),
            8 => leaf_index_fixed::<8>(tree, bins),
            _ => ScalarTraversal::leaf_index(tree, bins),
        }
    }

    /// Level-by-level block processing.
    ///
    /// Indexes for up to [`MAX_BLOCK_SIZE`] rows live in a stack array; larger
    /// blocks are processed in chunks of that size.
    #[inline]
    fn accumulate_block(tree: &TreeView<'_>, bins_block: &[u8], stride: usize, sums: &mut [f64]) {
        for (chunk_idx, sums_chunk) in sums.chunks_mut(MAX_BLOCK_SIZE).enumerate() {
            let chunk_bins = &bins_block[chunk_idx * MAX_BLOCK_SIZE * stride..];
            let mut indices = [0u32; MAX_BLOCK_SIZE];
            let indices = &mut indices[..sums_chunk.len()];

            let levels = tree
                .features
                .iter()
                .zip(tree.borders)
                .zip(tree.xor_masks)
                .enumerate();
            for (level, ((&feature, &border), &mask)) in levels {
                let feature = feature as usize;
                for (row, index) in indices.iter_mut().enumerate() {
                    let bin = chunk_bins[row * stride + feature] ^ mask;
                    *index |= ((bin >= border) as u32) << level;
                }
            }

            for (sum, &index) in sums_chunk.iter_mut().zip(indices.iter()) {
                *sum += tree.leaf_values[index as usize] as f64;
            }
        }
    }
}
