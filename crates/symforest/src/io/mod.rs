//! File formats consumed and produced next to models.
//!
//! - [`records`]: raw-record binary files (`0xCAFEBABE` header, row-major `f32`)

pub mod records;

pub use records::{
    RECORDS_MAGIC, RECORDS_VERSION, RecordFile, RecordReadError, read_records, write_records,
};
