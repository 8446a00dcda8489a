//! Ascending threshold lists used to binarize continuous values.

/// Maximum number of borders in one slot (the binarized value must fit a byte).
pub const MAX_BORDERS: usize = u8::MAX as usize;

/// Padding granularity of the stored border array.
///
/// Vectorized border counting reads borders in chunks of this many lanes;
/// padding with `+inf` lets it skip remainder handling, since `+inf < x` is
/// false for every `x`.
pub const BORDER_LANES: usize = 8;

/// Problems with a single border list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BordersError {
    TooMany { len: usize },
    NotSorted { position: usize },
    NaN { position: usize },
}

/// Ascending thresholds for one numeric or CTR slot.
///
/// The binarized value of `x` is the number of borders strictly less than `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Borders {
    /// Borders followed by `+inf` padding up to a multiple of [`BORDER_LANES`].
    values: Box<[f32]>,
    len: usize,
}

impl Borders {
    /// Validate and store a border list.
    pub fn new(borders: Vec<f32>) -> Result<Self, BordersError> {
        let len = borders.len();
        if len > MAX_BORDERS {
            return Err(BordersError::TooMany { len });
        }
        if let Some(position) = borders.iter().position(|b| b.is_nan()) {
            return Err(BordersError::NaN { position });
        }
        if let Some(position) = borders.windows(2).position(|w| w[1] < w[0]) {
            return Err(BordersError::NotSorted {
                position: position + 1,
            });
        }

        let padded_len = len.div_ceil(BORDER_LANES) * BORDER_LANES;
        let mut values = borders;
        values.resize(padded_len, f32::INFINITY);

        Ok(Self {
            values: values.into_boxed_slice(),
            len,
        })
    }

    /// An empty border list (slot is unused by the model).
    pub fn empty() -> Self {
        Self {
            values: Box::new([]),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The borders, without padding.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.values[..self.len]
    }

    /// The borders padded with `+inf` to a multiple of [`BORDER_LANES`].
    #[inline]
    pub fn padded(&self) -> &[f32] {
        &self.values
    }
}

impl Default for Borders {
    fn default() -> Self {
        Self::empty()
    }
}
