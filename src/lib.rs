//! ExAC browser core - variant and gene ingestion and lookup
//!
//! Loads a sites-only VCF and a GENCODE GTF into a document store and
//! answers point queries for the browser's request layer.
//!
//! # Features
//!
//! - Streaming VCF/GTF readers over gzip, bgzip, bzip2 or plain text
//! - Sortable `xpos` encoding of chromosome + position
//! - All-or-nothing bulk reload with advisory progress reporting
//! - In-memory and SQLite stores
//!
//! # Example
//!
//! ```ignore
//! use exac_browser::{BulkLoader, LoadConfig, Lookup, SqliteStore};
//!
//! let mut store = SqliteStore::open("exac.db")?;
//! BulkLoader::new(&mut store, LoadConfig {
//!     sites_vcf: "exac_chr20.vcf.gz".into(),
//!     gencode_gtf: "gencode.v19.annotation.gtf.gz".into(),
//!     threads: 1,
//! })
//! .reset_and_load()?;
//!
//! let lookup = Lookup::new(&store);
//! let resolution = lookup.resolve_identifier("TP53")?;
//! ```

pub mod config;
pub mod core;
pub mod formats;
pub mod loader;
pub mod lookup;
pub mod store;

// Re-export commonly used types
pub use config::BrowserConfig;
pub use crate::core::{
    decode_xpos, get_xpos, BrowserError, CoordinateError, LoadError, ParseError, RecordError,
    Result, StoreError,
};
pub use formats::{Gene, Strand, Variant};
pub use loader::{BulkLoader, LoadConfig, LoadPhase, LoadStats, NoProgress, ProgressObserver};
pub use lookup::{Lookup, Resolution, VariantKey};
pub use store::{MemoryStore, SqliteStore, Store};
