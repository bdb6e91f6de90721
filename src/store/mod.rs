//! Document store backing the browser
//!
//! Two collections, `variants` and `genes`, each holding whole records as
//! documents. Uniqueness is enforced on `(xpos, ref, alt)` for variants and
//! on `gene_id` for genes: a second insert with the same key fails with
//! [`StoreError::Duplicate`]. Secondary indexes (`xpos`, `gene_id`,
//! `gene_name`) are created by [`Store::ensure_indexes`], which may be
//! called any number of times.
//!
//! [`StoreError::Duplicate`]: crate::core::StoreError::Duplicate

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::core::StoreResult;
use crate::formats::{Gene, Variant};

/// Name of the variant collection
pub const VARIANTS: &str = "variants";

/// Name of the gene collection
pub const GENES: &str = "genes";

/// Persistent collection of variants and genes
///
/// Writes made between [`begin`](Store::begin) and [`commit`](Store::commit)
/// become visible to other store handles only on commit, and are discarded
/// entirely by [`rollback`](Store::rollback).
pub trait Store {
    /// Remove every document from both collections
    fn reset(&mut self) -> StoreResult<()>;

    /// Start a transaction
    fn begin(&mut self) -> StoreResult<()>;

    /// Make the current transaction permanent
    fn commit(&mut self) -> StoreResult<()>;

    /// Discard the current transaction
    fn rollback(&mut self) -> StoreResult<()>;

    fn insert_variant(&mut self, variant: &Variant) -> StoreResult<()>;

    fn insert_gene(&mut self, gene: &Gene) -> StoreResult<()>;

    /// Create the secondary indexes if they do not exist yet
    fn ensure_indexes(&mut self) -> StoreResult<()>;

    /// Exact match on encoded position and both alleles
    fn find_variant(&self, xpos: u64, ref_allele: &str, alt: &str) -> StoreResult<Option<Variant>>;

    /// Exact match on gene_id
    fn find_gene(&self, gene_id: &str) -> StoreResult<Option<Gene>>;

    /// All genes carrying this symbol, ordered by gene_id
    fn find_genes_by_name(&self, gene_name: &str) -> StoreResult<Vec<Gene>>;

    /// Variants with `xstart <= xpos <= xstop`, ordered by xpos then insertion
    fn find_variants_in_range(&self, xstart: u64, xstop: u64) -> StoreResult<Vec<Variant>>;

    fn count_variants(&self) -> StoreResult<usize>;

    fn count_genes(&self) -> StoreResult<usize>;
}

/// Render a variant's unique key for error messages
pub(crate) fn variant_key_string(xpos: u64, ref_allele: &str, alt: &str) -> String {
    format!("{}:{}>{}", xpos, ref_allele, alt)
}
