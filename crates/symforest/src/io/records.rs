//! Raw-record binary files.
//!
//! Layout (all little-endian):
//!
//! ```text
//! u32 magic      = 0xCAFEBABE
//! u32 version    = 1
//! u32 n_samples
//! u32 n_features
//! f32 values[n_samples * n_features]     row-major
//! f32 expected[n_samples]                optional reference scores
//! ```

use std::io::{self, Read, Write};

use ndarray::ArrayView2;

/// File magic.
pub const RECORDS_MAGIC: u32 = 0xCAFE_BABE;

/// Supported layout version.
pub const RECORDS_VERSION: u32 = 1;

const HEADER_LEN: usize = 16;

/// Errors while reading a record file.
#[derive(Debug, thiserror::Error)]
pub enum RecordReadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad magic {0:#010x}, expected {RECORDS_MAGIC:#010x}")]
    BadMagic(u32),

    #[error("unsupported record file version {0}")]
    UnsupportedVersion(u32),

    #[error("record file truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("{n_samples} x {n_features} values do not fit in memory")]
    TooLarge { n_samples: usize, n_features: usize },

    #[error("{0} trailing bytes after the record values")]
    TrailingBytes(usize),
}

/// Records in row-major order, with optional reference scores.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFile {
    n_samples: usize,
    n_features: usize,
    values: Vec<f32>,
    expected: Option<Vec<f32>>,
}

impl RecordFile {
    /// Wrap `values` (`n_samples * n_features`, row-major).
    ///
    /// Returns `None` if the lengths are inconsistent.
    pub fn new(
        n_samples: usize,
        n_features: usize,
        values: Vec<f32>,
        expected: Option<Vec<f32>>,
    ) -> Option<Self> {
        let values_ok = n_samples.checked_mul(n_features) == Some(values.len());
        let expected_ok = expected.as_ref().is_none_or(|e| e.len() == n_samples);
        (values_ok && expected_ok).then_some(Self {
            n_samples,
            n_features,
            values,
            expected,
        })
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// All values, row-major.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Reference scores, if the file carries them.
    #[inline]
    pub fn expected(&self) -> Option<&[f32]> {
        self.expected.as_deref()
    }

    /// Record `i`.
    #[inline]
    pub fn record(&self, i: usize) -> &[f32] {
        &self.values[i * self.n_features..][..self.n_features]
    }

    /// View as an `(n_samples, n_features)` array.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        ArrayView2::from_shape((self.n_samples, self.n_features), &self.values)
            .expect("record file length matches its shape")
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn decode_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Read exactly `len` bytes, reporting short reads as [`RecordReadError::Truncated`].
fn read_section<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, RecordReadError> {
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(RecordReadError::Truncated {
            expected: len,
            got: buf.len(),
        });
    }
    Ok(buf)
}

/// Read a record file.
///
/// Wrap files in a [`BufReader`](std::io::BufReader).
pub fn read_records<R: Read>(mut reader: R) -> Result<RecordFile, RecordReadError> {
    let header = read_section(&mut reader, HEADER_LEN)?;
    let magic = read_u32(&header[0..4]);
    if magic != RECORDS_MAGIC {
        return Err(RecordReadError::BadMagic(magic));
    }
    let version = read_u32(&header[4..8]);
    if version != RECORDS_VERSION {
        return Err(RecordReadError::UnsupportedVersion(version));
    }
    let n_samples = read_u32(&header[8..12]) as usize;
    let n_features = read_u32(&header[12..16]) as usize;

    let values_len = n_samples
        .checked_mul(n_features)
        .and_then(|n| n.checked_mul(4))
        .ok_or(RecordReadError::TooLarge {
            n_samples,
            n_features,
        })?;
    let values = decode_f32s(&read_section(&mut reader, values_len)?);

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    let expected = match rest.len() {
        0 => None,
        len if len == n_samples * 4 => Some(decode_f32s(&rest)),
        len => return Err(RecordReadError::TrailingBytes(len)),
    };

    tracing::debug!(
        n_samples,
        n_features,
        has_expected = expected.is_some(),
        "record file loaded"
    );
    Ok(RecordFile {
        n_samples,
        n_features,
        values,
        expected,
    })
}

fn header_field(value: usize, name: &str) -> io::Result<[u8; 4]> {
    u32::try_from(value)
        .map(u32::to_le_bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("{name} {value} exceeds u32")))
}

/// Write a record file.
pub fn write_records<W: Write>(file: &RecordFile, mut writer: W) -> io::Result<()> {
    writer.write_all(&RECORDS_MAGIC.to_le_bytes())?;
    writer.write_all(&RECORDS_VERSION.to_le_bytes())?;
    writer.write_all(&header_field(file.n_samples, "n_samples")?)?;
    writer.write_all(&header_field(file.n_features, "n_features")?)?;
    for value in &file.values {
        writer.write_all(&value.to_le_bytes())?;
    }
    if let Some(expected) = &file.expected {
        for value in expected {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()
}
