//! File format readers
//!
//! Streaming readers for sites-only VCF and GENCODE GTF files.

pub mod gtf;
pub mod vcf;

pub use gtf::{get_genes_from_gencode_gtf, Gene, GeneReader, GtfRecordView, Strand};
pub use vcf::{get_variants_from_sites_vcf, Variant, VariantReader, VcfRecordView};
