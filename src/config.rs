//! Browser configuration

use crate::loader::LoadConfig;
use std::path::PathBuf;

/// Default database file
pub const DEFAULT_DATABASE: &str = "exac.db";

/// Default sites VCF
pub const DEFAULT_SITES_VCF: &str = "../exac_chr20.vcf.gz";

/// Default GENCODE annotation
pub const DEFAULT_GENCODE_GTF: &str = "../gencode.v19.annotation.gtf.gz";

/// Where the store lives and where it is loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    pub database: PathBuf,
    pub sites_vcf: PathBuf,
    pub gencode_gtf: PathBuf,
    /// Parsing threads used by `load`
    pub threads: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            sites_vcf: PathBuf::from(DEFAULT_SITES_VCF),
            gencode_gtf: PathBuf::from(DEFAULT_GENCODE_GTF),
            threads: 1,
        }
    }
}

impl BrowserConfig {
    /// Loader settings derived from this configuration
    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            sites_vcf: self.sites_vcf.clone(),
            gencode_gtf: self.gencode_gtf.clone(),
            threads: self.threads.max(1),
        }
    }
}
