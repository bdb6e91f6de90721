//! Core functionality
//!
//! Error types, the genomic coordinate encoder and compressed input handling.

mod error;
pub mod io;
mod xpos;

pub use error::{
    BrowserError, CoordinateError, CoordinateResult, LoadError, LoadResult, ParseError,
    RecordError, Result, StoreError, StoreResult,
};
pub use io::{open_compressed, ByteCounter, CompressedInput, CompressionFormat, LineIterator};
pub(crate) use xpos::strip_chr_prefix;
pub use xpos::{
    chrom_rank, decode_xpos, get_xpos, normalize_chrom, CHROM_MULTIPLIER, MAX_POSITION,
};
