//! Point queries against a loaded store
//!
//! Misses are `Ok(None)` or [`Resolution::NotFound`]; only store failures
//! are errors, so callers can tell "not found" from "store unreachable".

use crate::core::{get_xpos, CoordinateError, StoreResult};
use crate::formats::gtf::strip_version;
use crate::formats::{Gene, Variant};
use crate::store::Store;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing a variant descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantKeyError {
    #[error("Expected chrom-pos-ref-alt, got {0:?}")]
    Malformed(String),

    #[error("Invalid position in {0:?}")]
    InvalidPosition(String),

    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
}

/// A variant descriptor such as `20-76962-T-C` (`:` also separates)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantKey {
    pub chrom: String,
    pub pos: u64,
    pub ref_allele: String,
    pub alt: String,
    pub xpos: u64,
}

impl FromStr for VariantKey {
    type Err = VariantKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(|c| c == '-' || c == ':').collect();
        let [chrom, pos, ref_allele, alt] = parts[..] else {
            return Err(VariantKeyError::Malformed(s.to_string()));
        };
        if chrom.is_empty() || ref_allele.is_empty() || alt.is_empty() {
            return Err(VariantKeyError::Malformed(s.to_string()));
        }
        let pos: u64 = pos
            .parse()
            .map_err(|_| VariantKeyError::InvalidPosition(s.to_string()))?;
        let xpos = get_xpos(chrom, pos)?;
        Ok(Self {
            chrom: chrom.to_string(),
            pos,
            ref_allele: ref_allele.to_string(),
            alt: alt.to_string(),
            xpos,
        })
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.chrom, self.pos, self.ref_allele, self.alt)
    }
}

/// Classification of a free-text query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A gene, by canonical gene_id
    Gene(String),
    /// A variant, by canonical `chrom-pos-ref-alt`
    Variant(String),
    NotFound,
}

impl Resolution {
    pub fn kind(&self) -> &'static str {
        match self {
            Resolution::Gene(_) => "gene",
            Resolution::Variant(_) => "variant",
            Resolution::NotFound => "not_found",
        }
    }

    /// Canonical key, if the query resolved
    pub fn key(&self) -> Option<&str> {
        match self {
            Resolution::Gene(key) | Resolution::Variant(key) => Some(key.as_str()),
            Resolution::NotFound => None,
        }
    }
}

/// Read-only view over a store
pub struct Lookup<'s, S: Store + ?Sized> {
    store: &'s S,
}

impl<'s, S: Store + ?Sized> Lookup<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Exact match on encoded position and both alleles
    pub fn get_variant(&self, xpos: u64, ref_allele: &str, alt: &str) -> StoreResult<Option<Variant>> {
        self.store.find_variant(xpos, ref_allele, alt)
    }

    /// Variant named by a parsed descriptor
    pub fn get_variant_by_key(&self, key: &VariantKey) -> StoreResult<Option<Variant>> {
        self.get_variant(key.xpos, &key.ref_allele, &key.alt)
    }

    /// Exact match on gene_id; a version suffix on the query is ignored
    pub fn get_gene(&self, gene_id: &str) -> StoreResult<Option<Gene>> {
        self.store.find_gene(strip_version(gene_id))
    }

    /// First gene (lowest gene_id) carrying this symbol
    pub fn get_gene_by_name(&self, gene_name: &str) -> StoreResult<Option<Gene>> {
        Ok(self.store.find_genes_by_name(gene_name)?.into_iter().next())
    }

    /// Variants lying inside a gene's interval; `None` if the gene is unknown
    pub fn get_variants_in_gene(&self, gene_id: &str) -> StoreResult<Option<Vec<Variant>>> {
        match self.get_gene(gene_id)? {
            Some(gene) => Ok(Some(self.store.find_variants_in_range(gene.xstart, gene.xstop)?)),
            None => Ok(None),
        }
    }

    /// Classify a free-text query as a gene or variant and find its key
    pub fn resolve_identifier(&self, query: &str) -> StoreResult<Resolution> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Resolution::NotFound);
        }

        if let Ok(key) = query.parse::<VariantKey>() {
            return Ok(match self.get_variant_by_key(&key)? {
                Some(variant) => Resolution::Variant(variant.variant_id),
                None => Resolution::NotFound,
            });
        }

        let upper = query.to_ascii_uppercase();
        if upper.starts_with("ENSG") {
            return Ok(match self.get_gene(&upper)? {
                Some(gene) => Resolution::Gene(gene.gene_id),
                None => Resolution::NotFound,
            });
        }

        let gene = match self.get_gene_by_name(query)? {
            Some(gene) => Some(gene),
            None if upper != query => self.get_gene_by_name(&upper)?,
            None => None,
        };
        Ok(gene.map_or(Resolution::NotFound, |gene| Resolution::Gene(gene.gene_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::gtf::parse_gene_line;
    use crate::formats::vcf::parse_variant_line;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        for line in [
            "20\t76962\trs141175086\tT\tC\t100\tPASS\tAC=3;AN=6500",
            "17\t7577120\t.\tC\tT\t.\tPASS\tAC=1;AN=100",
            "17\t9000000\t.\tA\tG\t.\tPASS\t.",
        ] {
            for variant in parse_variant_line(1, line).unwrap() {
                store.insert_variant(&variant).unwrap();
            }
        }
        for line in [
            "chr17\tHAVANA\tgene\t7565097\t7590856\t.\t-\t.\tgene_id \"ENSG00000141510.11\"; gene_name \"TP53\";",
            "chr6\tHAVANA\tgene\t29910247\t29913661\t.\t+\t.\tgene_id \"ENSG00000206503.7\"; gene_name \"HLA-A\";",
        ] {
            store.insert_gene(&parse_gene_line(1, line).unwrap().unwrap()).unwrap();
        }
        store.ensure_indexes().unwrap();
        store
    }

    #[test]
    fn test_variant_key_parse() {
        let key: VariantKey = "20-76962-T-C".parse().unwrap();
        assert_eq!(key.xpos, 20_000_076_962);
        assert_eq!(key.to_string(), "20-76962-T-C");
        let colon: VariantKey = "20:76962:T:C".parse().unwrap();
        assert_eq!(colon, key);
        assert!(matches!("20-76962-T".parse::<VariantKey>(), Err(VariantKeyError::Malformed(_))));
        assert!(matches!("20-x-T-C".parse::<VariantKey>(), Err(VariantKeyError::InvalidPosition(_))));
        assert!(matches!("Q-1-T-C".parse::<VariantKey>(), Err(VariantKeyError::Coordinate(_))));
    }

    #[test]
    fn test_get_variant_scenario() {
        let store = store();
        let lookup = Lookup::new(&store);
        let variant = lookup.get_variant(20_000_076_962, "T", "C").unwrap().unwrap();
        assert_eq!(variant.info["AC"], "3");
        assert_eq!(variant.info["AN"], "6500");
        assert!(lookup.get_variant(20_000_076_962, "T", "G").unwrap().is_none());
    }

    #[test]
    fn test_get_gene() {
        let store = store();
        let lookup = Lookup::new(&store);
        assert_eq!(
            lookup.get_gene("ENSG00000141510").unwrap().unwrap().gene_name.as_deref(),
            Some("TP53")
        );
        assert!(lookup.get_gene("ENSG00000141510.11").unwrap().is_some());
        assert!(lookup.get_gene("ENSG99999999999").unwrap().is_none());
    }

    #[test]
    fn test_variants_in_gene() {
        let store = store();
        let lookup = Lookup::new(&store);
        let variants = lookup.get_variants_in_gene("ENSG00000141510").unwrap().unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].pos, 7577120);
        assert!(lookup.get_variants_in_gene("ENSG0").unwrap().is_none());
    }

    #[test]
    fn test_resolve_gene_symbol() {
        let store = store();
        let lookup = Lookup::new(&store);
        assert_eq!(
            lookup.resolve_identifier("TP53").unwrap(),
            Resolution::Gene("ENSG00000141510".to_string())
        );
        assert_eq!(
            lookup.resolve_identifier(" tp53 ").unwrap(),
            Resolution::Gene("ENSG00000141510".to_string())
        );
        assert_eq!(
            lookup.resolve_identifier("HLA-A").unwrap(),
            Resolution::Gene("ENSG00000206503".to_string())
        );
    }

    #[test]
    fn test_resolve_gene_id_and_variant() {
        let store = store();
        let lookup = Lookup::new(&store);
        let gene = lookup.resolve_identifier("ensg00000141510").unwrap();
        assert_eq!(gene.kind(), "gene");
        assert_eq!(gene.key(), Some("ENSG00000141510"));

        let variant = lookup.resolve_identifier("20-76962-T-C").unwrap();
        assert_eq!(variant, Resolution::Variant("20-76962-T-C".to_string()));
    }

    #[test]
    fn test_resolve_unknown() {
        let store = store();
        let lookup = Lookup::new(&store);
        for query in ["", "   ", "NOTAGENE", "20-1-A-G", "ENSG000", "chr99-5-A-C"] {
            assert_eq!(lookup.resolve_identifier(query).unwrap(), Resolution::NotFound, "{query}");
        }
    }

    #[test]
    fn test_resolve_non_ascii() {
        let store = store();
        let lookup = Lookup::new(&store);
        for query in ["ééé-1-A-T", "ché20-76962-T-C", "ééé", "ENSGé", "20-76962-T-ç", "\u{1F9EC}"] {
            assert_eq!(lookup.resolve_identifier(query).unwrap(), Resolution::NotFound, "{query}");
        }
        assert!(matches!(
            "ééé-1-A-T".parse::<VariantKey>(),
            Err(VariantKeyError::Coordinate(CoordinateError::InvalidChromosome(_)))
        ));
    }
}
