//! In-process store
//!
//! Documents live in insertion-ordered vectors; the synthetic document id is
//! the vector slot. Unique keys are tracked on every insert. The `xpos` and
//! `gene_name` indexes only exist after `ensure_indexes`; before that,
//! queries scan.

use super::{variant_key_string, Store, GENES, VARIANTS};
use crate::core::{StoreError, StoreResult};
use crate::formats::{Gene, Variant};
use std::collections::{BTreeMap, HashMap};

type VariantKey = (u64, String, String);

#[derive(Debug, Clone, Default)]
struct Collections {
    variants: Vec<Variant>,
    genes: Vec<Gene>,
    variant_keys: HashMap<VariantKey, usize>,
    gene_ids: HashMap<String, usize>,
    xpos_index: Option<BTreeMap<u64, Vec<usize>>>,
    gene_name_index: Option<HashMap<String, Vec<usize>>>,
}

impl Collections {
    fn build_xpos_index(&self) -> BTreeMap<u64, Vec<usize>> {
        let mut index: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (id, variant) in self.variants.iter().enumerate() {
            index.entry(variant.xpos).or_default().push(id);
        }
        index
    }

    fn build_gene_name_index(&self) -> HashMap<String, Vec<usize>> {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (id, gene) in self.genes.iter().enumerate() {
            if let Some(name) = &gene.gene_name {
                index.entry(name.clone()).or_default().push(id);
            }
        }
        index
    }
}

/// Store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Collections,
    snapshot: Option<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ensure_indexes` has built the secondary indexes
    pub fn is_indexed(&self) -> bool {
        self.data.xpos_index.is_some() && self.data.gene_name_index.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl Store for MemoryStore {
    fn reset(&mut self) -> StoreResult<()> {
        let data = &mut self.data;
        data.variants.clear();
        data.genes.clear();
        data.variant_keys.clear();
        data.gene_ids.clear();
        // indexes survive a reset, emptied
        if let Some(index) = data.xpos_index.as_mut() {
            index.clear();
        }
        if let Some(index) = data.gene_name_index.as_mut() {
            index.clear();
        }
        Ok(())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::Transaction("transaction already open".to_string()));
        }
        self.snapshot = Some(self.data.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| StoreError::Transaction("commit without transaction".to_string()))
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| StoreError::Transaction("rollback without transaction".to_string()))?;
        self.data = snapshot;
        Ok(())
    }

    fn insert_variant(&mut self, variant: &Variant) -> StoreResult<()> {
        let data = &mut self.data;
        let key = (variant.xpos, variant.ref_allele.clone(), variant.alt.clone());
        if data.variant_keys.contains_key(&key) {
            return Err(StoreError::Duplicate {
                collection: VARIANTS,
                key: variant_key_string(variant.xpos, &variant.ref_allele, &variant.alt),
            });
        }
        let id = data.variants.len();
        data.variant_keys.insert(key, id);
        if let Some(index) = data.xpos_index.as_mut() {
            index.entry(variant.xpos).or_default().push(id);
        }
        data.variants.push(variant.clone());
        Ok(())
    }

    fn insert_gene(&mut self, gene: &Gene) -> StoreResult<()> {
        let data = &mut self.data;
        if data.gene_ids.contains_key(&gene.gene_id) {
            return Err(StoreError::Duplicate {
                collection: GENES,
                key: gene.gene_id.clone(),
            });
        }
        let id = data.genes.len();
        data.gene_ids.insert(gene.gene_id.clone(), id);
        if let (Some(index), Some(name)) = (data.gene_name_index.as_mut(), &gene.gene_name) {
            index.entry(name.clone()).or_default().push(id);
        }
        data.genes.push(gene.clone());
        Ok(())
    }

    fn ensure_indexes(&mut self) -> StoreResult<()> {
        if self.data.xpos_index.is_none() {
            self.data.xpos_index = Some(self.data.build_xpos_index());
        }
        if self.data.gene_name_index.is_none() {
            self.data.gene_name_index = Some(self.data.build_gene_name_index());
        }
        Ok(())
    }

    fn find_variant(&self, xpos: u64, ref_allele: &str, alt: &str) -> StoreResult<Option<Variant>> {
        let key = (xpos, ref_allele.to_string(), alt.to_string());
        Ok(self
            .data
            .variant_keys
            .get(&key)
            .map(|&id| self.data.variants[id].clone()))
    }

    fn find_gene(&self, gene_id: &str) -> StoreResult<Option<Gene>> {
        Ok(self
            .data
            .gene_ids
            .get(gene_id)
            .map(|&id| self.data.genes[id].clone()))
    }

    fn find_genes_by_name(&self, gene_name: &str) -> StoreResult<Vec<Gene>> {
        let mut genes: Vec<Gene> = match &self.data.gene_name_index {
            Some(index) => index
                .get(gene_name)
                .map(|ids| ids.iter().map(|&id| self.data.genes[id].clone()).collect())
                .unwrap_or_default(),
            None => self
                .data
                .genes
                .iter()
                .filter(|gene| gene.gene_name.as_deref() == Some(gene_name))
                .cloned()
                .collect(),
        };
        genes.sort_by(|a, b| a.gene_id.cmp(&b.gene_id));
        Ok(genes)
    }

    fn find_variants_in_range(&self, xstart: u64, xstop: u64) -> StoreResult<Vec<Variant>> {
        if xstart > xstop {
            return Ok(Vec::new());
        }
        let variants = match &self.data.xpos_index {
            Some(index) => index
                .range(xstart..=xstop)
                .flat_map(|(_, ids)| ids.iter().map(|&id| self.data.variants[id].clone()))
                .collect(),
            None => {
                let mut hits: Vec<(u64, usize)> = self
                    .data
                    .variants
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.xpos >= xstart && v.xpos <= xstop)
                    .map(|(id, v)| (v.xpos, id))
                    .collect();
                hits.sort_unstable();
                hits.into_iter().map(|(_, id)| self.data.variants[id].clone()).collect()
            }
        };
        Ok(variants)
    }

    fn count_variants(&self) -> StoreResult<usize> {
        Ok(self.data.variants.len())
    }

    fn count_genes(&self) -> StoreResult<usize> {
        Ok(self.data.genes.len())
    }
}
