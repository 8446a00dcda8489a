//! Structure-of-Arrays storage for an ensemble of oblivious trees.
//!
//! An oblivious tree applies the same `(feature, border, xor_mask)` split to
//! every node of a level, so a tree of depth `d` is fully described by `d`
//! splits and `2^d` leaf values. The forest stores the splits of all trees
//! back to back in parallel arrays, with per-tree offsets.

/// Deepest tree accepted at load time.
pub const MAX_TREE_DEPTH: usize = 16;

/// The split shared by every node of one tree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObliviousSplit {
    /// Slot in the binarized feature vector.
    pub feature: u32,
    /// The level's bit is set when `(bins[feature] ^ xor_mask) >= border`.
    pub border: u8,
    pub xor_mask: u8,
}

/// Structural problems with a forest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("tree {tree} has depth {depth}, maximum is {max}", max = MAX_TREE_DEPTH)]
    DepthTooLarge { tree: usize, depth: usize },
    #[error("tree {tree} has {got} leaf values, expected {expected} (2^depth)")]
    LeafCountMismatch {
        tree: usize,
        expected: usize,
        got: usize,
    },
    #[error(
        "tree {tree} level {level} splits on binary feature {feature}, \
         but the model has only {binary_feature_count}"
    )]
    SplitFeatureOutOfRange {
        tree: usize,
        level: usize,
        feature: u32,
        binary_feature_count: usize,
    },
    #[error("tree {tree} has non-finite leaf value at {leaf}")]
    NonFiniteLeaf { tree: usize, leaf: usize },
}

/// Borrowed view of one tree's splits and leaves.
#[derive(Debug, Clone, Copy)]
pub struct TreeView<'a> {
    pub features: &'a [u32],
    pub borders: &'a [u8],
    pub xor_masks: &'a [u8],
    pub leaf_values: &'a [f32],
}

impl<'a> TreeView<'a> {
    #[inline]
    pub fn depth(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn split(&self, level: usize) -> ObliviousSplit {
        ObliviousSplit {
            feature: self.features[level],
            border: self.borders[level],
            xor_mask: self.xor_masks[level],
        }
    }

    #[inline]
    pub fn leaf_value(&self, index: usize) -> f32 {
        self.leaf_values[index]
    }
}

/// Ensemble of oblivious trees in SoA layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObliviousForest {
    split_features: Vec<u32>,
    split_borders: Vec<u8>,
    split_xor_masks: Vec<u8>,
    /// `split_offsets[t]..split_offsets[t + 1]` are tree `t`'s levels.
    split_offsets: Vec<usize>,
    /// `leaf_offsets[t]..leaf_offsets[t + 1]` are tree `t`'s leaves.
    leaf_offsets: Vec<usize>,
    leaf_values: Vec<f32>,
}

impl ObliviousForest {
    pub fn new() -> Self {
        Self {
            split_offsets: vec![0],
            leaf_offsets: vec![0],
            ..Default::default()
        }
    }

    /// Append a tree.
    ///
    /// Only checks what can be checked without the model: depth and leaf
    /// count. Feature ranges are checked by [`validate`](Self::validate).
    pub fn push_tree(
        &mut self,
        splits: &[ObliviousSplit],
        leaf_values: &[f32],
    ) -> Result<(), ForestValidationError> {
        if self.split_offsets.is_empty() {
            self.split_offsets.push(0);
            self.leaf_offsets.push(0);
        }
        let tree = self.n_trees();
        let depth = splits.len();
        if depth > MAX_TREE_DEPTH {
            return Err(ForestValidationError::DepthTooLarge { tree, depth });
        }
        let expected = 1usize << depth;
        if leaf_values.len() != expected {
            return Err(ForestValidationError::LeafCountMismatch {
                tree,
                expected,
                got: leaf_values.len(),
            });
        }
        if let Some(leaf) = leaf_values.iter().position(|v| !v.is_finite()) {
            return Err(ForestValidationError::NonFiniteLeaf { tree, leaf });
        }

        for split in splits {
            self.split_features.push(split.feature);
            self.split_borders.push(split.border);
            self.split_xor_masks.push(split.xor_mask);
        }
        self.leaf_values.extend_from_slice(leaf_values);
        self.split_offsets.push(self.split_features.len());
        self.leaf_offsets.push(self.leaf_values.len());
        Ok(())
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.split_offsets.len().saturating_sub(1)
    }

    /// Get a view of tree `idx`.
    #[inline]
    pub fn tree(&self, idx: usize) -> TreeView<'_> {
        let splits = self.split_offsets[idx]..self.split_offsets[idx + 1];
        let leaves = self.leaf_offsets[idx]..self.leaf_offsets[idx + 1];
        TreeView {
            features: &self.split_features[splits.clone()],
            borders: &self.split_borders[splits.clone()],
            xor_masks: &self.split_xor_masks[splits],
            leaf_values: &self.leaf_values[leaves],
        }
    }

    /// Iterate over trees in evaluation order.
    pub fn trees(&self) -> impl ExactSizeIterator<Item = TreeView<'_>> + '_ {
        (0..self.n_trees()).map(move |idx| self.tree(idx))
    }

    /// Depth of the deepest tree (0 for an empty forest).
    pub fn max_depth(&self) -> usize {
        self.split_offsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Number of trees of each depth, indexed by depth.
    pub fn depth_histogram(&self) -> Vec<usize> {
        let mut histogram = vec![0usize; self.max_depth() + 1];
        for tree in self.trees() {
            histogram[tree.depth()] += 1;
        }
        histogram
    }

    /// A forest with the same trees evaluated in `order`.
    ///
    /// # Panics
    ///
    /// Panics if `order` contains an index out of range.
    pub fn reordered(&self, order: &[usize]) -> Self {
        let mut forest = Self::new();
        for &idx in order {
            let tree = self.tree(idx);
            let splits: Vec<_> = (0..tree.depth()).map(|level| tree.split(level)).collect();
            forest
                .push_tree(&splits, tree.leaf_values)
                .expect("trees of a valid forest stay valid");
        }
        forest
    }

    /// Check that every split reads a slot below `binary_feature_count`.
    pub fn validate(&self, binary_feature_count: usize) -> Result<(), ForestValidationError> {
        for (tree_idx, tree) in self.trees().enumerate() {
            for (level, &feature) in tree.features.iter().enumerate() {
                if feature as usize >= binary_feature_count {
                    return Err(ForestValidationError::SplitFeatureOutOfRange {
                        tree: tree_idx,
                        level,
                        feature,
                        binary_feature_count,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(feature: u32, border: u8) -> ObliviousSplit {
        ObliviousSplit {
            feature,
            border,
            xor_mask: 0,
        }
    }

    #[test]
    fn push_and_view() {
        let mut forest = ObliviousForest::new();
        forest.push_tree(&[split(0, 1)], &[1.0, 2.0]).unwrap();
        forest
            .push_tree(&[split(1, 2), split(0, 1)], &[1.0, 2.0, 3.0, 4.0])
            .unwrap();

        assert_eq!(forest.n_trees(), 2);
        assert_eq!(forest.max_depth(), 2);
        let tree = forest.tree(1);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.split(0), split(1, 2));
        assert_eq!(tree.leaf_values, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(forest.depth_histogram(), vec![0, 1, 1]);
    }

    #[test]
    fn depth_zero_tree_is_a_constant() {
        let mut forest = ObliviousForest::new();
        forest.push_tree(&[], &[0.25]).unwrap();
        assert_eq!(forest.tree(0).depth(), 0);
    }

    #[test]
    fn rejects_wrong_leaf_count() {
        let mut forest = ObliviousForest::new();
        let err = forest.push_tree(&[split(0, 1)], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            ForestValidationError::LeafCountMismatch {
                tree: 0,
                expected: 2,
                got: 1
            }
        );
        assert_eq!(forest.n_trees(), 0);
    }

    #[test]
    fn rejects_too_deep() {
        let mut forest = ObliviousForest::new();
        let splits = vec![split(0, 1); MAX_TREE_DEPTH + 1];
        let err = forest.push_tree(&splits, &[]).unwrap_err();
        assert!(matches!(err, ForestValidationError::DepthTooLarge { .. }));
    }

    #[test]
    fn validate_checks_feature_range() {
        let mut forest = ObliviousForest::new();
        forest.push_tree(&[split(3, 1)], &[1.0, 2.0]).unwrap();
        assert!(forest.validate(4).is_ok());
        assert!(matches!(
            forest.validate(3),
            Err(ForestValidationError::SplitFeatureOutOfRange { feature: 3, .. })
        ));
    }

    #[test]
    fn reordered_keeps_trees() {
        let mut forest = ObliviousForest::new();
        forest.push_tree(&[split(0, 1)], &[1.0, 2.0]).unwrap();
        forest.push_tree(&[], &[5.0]).unwrap();
        let reversed = forest.reordered(&[1, 0]);
        assert_eq!(reversed.tree(0).leaf_values, &[5.0]);
        assert_eq!(reversed.tree(1).leaf_values, &[1.0, 2.0]);
    }
}
