//! Bulk loader
//!
//! Rebuilds the store from a sites VCF and a GENCODE GTF:
//!
//! ```text
//! Idle -> Resetting -> LoadingVariants -> LoadingGenes -> Indexing -> Idle
//!                 \___________________\______________\________-> Failed
//! ```
//!
//! The whole reload runs inside one store transaction. The first malformed
//! line, duplicate key or store failure aborts the run and rolls the
//! transaction back, so a failed load commits nothing.
//!
//! Progress is advisory: observers receive the number of compressed bytes
//! consumed so far and cannot interrupt the load.

use crate::core::io::LineIterator;
use crate::core::{open_compressed, LoadError, LoadResult, ParseError};
use crate::formats::gtf::parse_gene_line;
use crate::formats::vcf::parse_variant_line;
use crate::formats::{GeneReader, VariantReader};
use crate::store::Store;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fmt;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Lines handed to the worker pool at once
const CHUNK_SIZE: usize = 10000;

/// State of a bulk load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Resetting,
    LoadingVariants,
    LoadingGenes,
    Indexing,
    Failed,
}

impl LoadPhase {
    pub fn name(self) -> &'static str {
        match self {
            LoadPhase::Idle => "idle",
            LoadPhase::Resetting => "resetting",
            LoadPhase::LoadingVariants => "loading variants",
            LoadPhase::LoadingGenes => "loading genes",
            LoadPhase::Indexing => "indexing",
            LoadPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives advisory progress during a load
pub trait ProgressObserver {
    /// A file-reading phase begins; `total_bytes` is the compressed file size
    fn start(&mut self, _phase: LoadPhase, _total_bytes: u64) {}

    /// Compressed bytes consumed so far; never decreases within a phase
    fn advance(&mut self, _bytes_read: u64) {}

    /// The current phase has finished reading
    fn finish(&mut self) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Source files and parsing parallelism for a load
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub sites_vcf: PathBuf,
    pub gencode_gtf: PathBuf,
    /// Parsing threads; 1 parses on the loading thread
    pub threads: usize,
}

/// Summary of a completed load
#[derive(Debug, Default, Clone)]
pub struct LoadStats {
    pub variants: usize,
    pub genes: usize,
    /// Header and comment lines skipped in both files
    pub header_lines: usize,
    pub elapsed: Duration,
}

/// Drives a full reset-and-load of a store
pub struct BulkLoader<'a, S: Store> {
    store: &'a mut S,
    config: LoadConfig,
    progress: Box<dyn ProgressObserver + 'a>,
    phase: LoadPhase,
}

impl<'a, S: Store> BulkLoader<'a, S> {
    pub fn new(store: &'a mut S, config: LoadConfig) -> Self {
        Self {
            store,
            config,
            progress: Box::new(NoProgress),
            phase: LoadPhase::Idle,
        }
    }

    /// Report progress to `observer`
    pub fn with_progress<P: ProgressObserver + 'a>(mut self, observer: P) -> Self {
        self.progress = Box::new(observer);
        self
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Clear both collections, load variants then genes, and create indexes
    pub fn reset_and_load(&mut self) -> LoadResult<LoadStats> {
        let started = Instant::now();
        self.store.begin().map_err(|source| LoadError::Store {
            phase: LoadPhase::Idle.name(),
            source,
        })?;

        match self.run() {
            Ok(mut stats) => {
                if let Err(source) = self.store.commit() {
                    return Err(self.fail(LoadError::Store {
                        phase: self.phase.name(),
                        source,
                    }));
                }
                self.phase = LoadPhase::Idle;
                stats.elapsed = started.elapsed();
                info!(
                    "Loaded {} variants and {} genes in {:.2}s",
                    stats.variants,
                    stats.genes,
                    stats.elapsed.as_secs_f64()
                );
                Ok(stats)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, error: LoadError) -> LoadError {
        warn!("Load failed while {}: {}", self.phase, error);
        self.phase = LoadPhase::Failed;
        if let Err(e) = self.store.rollback() {
            warn!("Rollback failed: {}", e);
        }
        error
    }

    fn enter(&mut self, phase: LoadPhase) {
        info!("Bulk load: {}", phase);
        self.phase = phase;
    }

    fn run(&mut self) -> LoadResult<LoadStats> {
        let mut stats = LoadStats::default();

        self.enter(LoadPhase::Resetting);
        let phase = self.phase.name();
        self.store
            .reset()
            .map_err(|source| LoadError::Store { phase, source })?;

        let pool = if self.config.threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.threads)
                    .build()?,
            )
        } else {
            None
        };

        self.enter(LoadPhase::LoadingVariants);
        self.load_variants(pool.as_ref(), &mut stats)?;

        self.enter(LoadPhase::LoadingGenes);
        self.load_genes(pool.as_ref(), &mut stats)?;

        self.enter(LoadPhase::Indexing);
        let phase = self.phase.name();
        self.store
            .ensure_indexes()
            .map_err(|source| LoadError::Store { phase, source })?;

        Ok(stats)
    }

    fn load_variants(&mut self, pool: Option<&rayon::ThreadPool>, stats: &mut LoadStats) -> LoadResult<()> {
        let phase = self.phase.name();
        let path = &self.config.sites_vcf;
        let input = open_compressed(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Reading {} ({:?}, {} bytes)", path.display(), input.format, input.size);
        self.progress.start(LoadPhase::LoadingVariants, input.size);

        let counter = input.counter.clone();
        let store = &mut *self.store;
        let progress = &mut self.progress;
        let mut inserted = 0;

        let header_lines = match pool {
            Some(pool) => parse_in_chunks(input.reader, pool, phase, parse_variant_line, |variant| {
                store
                    .insert_variant(&variant)
                    .map_err(|source| LoadError::Store { phase, source })?;
                inserted += 1;
                progress.advance(counter.get());
                Ok(())
            })?,
            None => {
                let mut reader = VariantReader::new(input.reader);
                for result in reader.by_ref() {
                    let variant = result.map_err(|source| LoadError::Parse { phase, source })?;
                    store
                        .insert_variant(&variant)
                        .map_err(|source| LoadError::Store { phase, source })?;
                    inserted += 1;
                    progress.advance(counter.get());
                }
                reader.header_lines()
            }
        };

        progress.finish();
        stats.variants = inserted;
        stats.header_lines += header_lines;
        Ok(())
    }

    fn load_genes(&mut self, pool: Option<&rayon::ThreadPool>, stats: &mut LoadStats) -> LoadResult<()> {
        let phase = self.phase.name();
        let path = &self.config.gencode_gtf;
        let input = open_compressed(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Reading {} ({:?}, {} bytes)", path.display(), input.format, input.size);
        self.progress.start(LoadPhase::LoadingGenes, input.size);

        let counter = input.counter.clone();
        let store = &mut *self.store;
        let progress = &mut self.progress;
        let mut inserted = 0;

        let parse = |line_number: usize, line: &str| {
            parse_gene_line(line_number, line).map(|gene| gene.into_iter().collect::<Vec<_>>())
        };

        let header_lines = match pool {
            Some(pool) => parse_in_chunks(input.reader, pool, phase, parse, |gene| {
                store
                    .insert_gene(&gene)
                    .map_err(|source| LoadError::Store { phase, source })?;
                inserted += 1;
                progress.advance(counter.get());
                Ok(())
            })?,
            None => {
                let mut reader = GeneReader::new(input.reader);
                for result in reader.by_ref() {
                    let gene = result.map_err(|source| LoadError::Parse { phase, source })?;
                    store
                        .insert_gene(&gene)
                        .map_err(|source| LoadError::Store { phase, source })?;
                    inserted += 1;
                    progress.advance(counter.get());
                }
                debug!("Skipped {} non-gene features", reader.skipped_features());
                reader.header_lines()
            }
        };

        progress.finish();
        stats.genes = inserted;
        stats.header_lines += header_lines;
        Ok(())
    }
}

/// Read data lines in chunks, parse each chunk on the pool, and hand the
/// records to `sink` in file order. Returns the number of header lines.
fn parse_in_chunks<R, T, P, S>(
    reader: R,
    pool: &rayon::ThreadPool,
    phase: &'static str,
    parse: P,
    mut sink: S,
) -> LoadResult<usize>
where
    R: BufRead,
    T: Send,
    P: Fn(usize, &str) -> Result<Vec<T>, ParseError> + Sync,
    S: FnMut(T) -> LoadResult<()>,
{
    let mut lines = LineIterator::new(reader);
    let mut header_lines = 0;
    let mut chunk: Vec<(usize, String)> = Vec::with_capacity(CHUNK_SIZE);
    let mut eof = false;
    // A line that fails to read is reported after the lines before it
    let mut read_error = None;

    while !eof {
        chunk.clear();
        while chunk.len() < CHUNK_SIZE {
            let line_number = lines.line_number() + 1;
            match lines.next_line() {
                None => {
                    eof = true;
                    break;
                }
                Some(Err(e)) => {
                    read_error = Some(e);
                    eof = true;
                    break;
                }
                Some(Ok(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    if line.starts_with('#') {
                        header_lines += 1;
                        continue;
                    }
                    chunk.push((line_number, line.to_string()));
                }
            }
        }

        let parsed: Vec<Result<Vec<T>, ParseError>> = pool.install(|| {
            chunk
                .par_iter()
                .map(|(line_number, line)| parse(*line_number, line))
                .collect()
        });

        for result in parsed {
            for record in result.map_err(|source| LoadError::Parse { phase, source })? {
                sink(record)?;
            }
        }
        debug!("Parsed chunk of {} lines", chunk.len());
    }

    if let Some(source) = read_error {
        return Err(LoadError::Parse { phase, source });
    }

    Ok(header_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordError;
    use crate::store::MemoryStore;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    const VCF: &str = "##fileformat=VCFv4.1\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
        20\t76962\trs141175086\tT\tC\t100\tPASS\tAC=3;AN=6500\n\
        20\t77000\t.\tG\tA,T\t50\tPASS\tAC=1,2;AN=6500\n";

    const GTF: &str = "##provider: GENCODE\n\
        chr20\tHAVANA\tgene\t70000\t80000\t.\t+\t.\tgene_id \"ENSG00000000001.1\"; gene_name \"GENE1\";\n\
        chr20\tHAVANA\texon\t70000\t70500\t.\t+\t.\tgene_id \"ENSG00000000001.1\"; transcript_id \"ENST1\";\n";

    fn write_gz(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = dir.join(name);
        let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
        encoder.write_all(content.as_ref()).unwrap();
        encoder.finish().unwrap();
        path
    }

    fn config(dir: &Path, vcf: &str, gtf: &str, threads: usize) -> LoadConfig {
        LoadConfig {
            sites_vcf: write_gz(dir, "sites.vcf.gz", vcf),
            gencode_gtf: write_gz(dir, "genes.gtf.gz", gtf),
            threads,
        }
    }

    #[derive(Default)]
    struct Recorder {
        phases: Vec<LoadPhase>,
        offsets: Vec<u64>,
    }

    impl ProgressObserver for &mut Recorder {
        fn start(&mut self, phase: LoadPhase, _total_bytes: u64) {
            self.phases.push(phase);
        }

        fn advance(&mut self, bytes_read: u64) {
            self.offsets.push(bytes_read);
        }
    }

    #[test]
    fn test_load_counts() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let stats = BulkLoader::new(&mut store, config(dir.path(), VCF, GTF, 1))
            .reset_and_load()
            .unwrap();
        assert_eq!(stats.variants, 3);
        assert_eq!(stats.genes, 1);
        assert_eq!(stats.header_lines, 3);
        assert!(store.is_indexed());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let mut sequential = MemoryStore::new();
        let mut parallel = MemoryStore::new();
        BulkLoader::new(&mut sequential, config(dir.path(), VCF, GTF, 1))
            .reset_and_load()
            .unwrap();
        let stats = BulkLoader::new(&mut parallel, config(dir.path(), VCF, GTF, 4))
            .reset_and_load()
            .unwrap();
        assert_eq!(stats.variants, 3);
        assert_eq!(stats.header_lines, 3);
        assert_eq!(
            sequential.find_variants_in_range(0, u64::MAX).unwrap(),
            parallel.find_variants_in_range(0, u64::MAX).unwrap()
        );
    }

    #[test]
    fn test_progress_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let mut recorder = Recorder::default();
        BulkLoader::new(&mut store, config(dir.path(), VCF, GTF, 1))
            .with_progress(&mut recorder)
            .reset_and_load()
            .unwrap();
        assert_eq!(recorder.phases, vec![LoadPhase::LoadingVariants, LoadPhase::LoadingGenes]);
        // 3 variants + 1 gene
        assert_eq!(recorder.offsets.len(), 4);
        assert!(recorder.offsets[..3].windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_malformed_line_aborts_and_rolls_back() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        BulkLoader::new(&mut store, config(dir.path(), VCF, GTF, 1))
            .reset_and_load()
            .unwrap();

        let broken = format!("{}20\t80000\trs1\tT\n", VCF);
        let mut loader = BulkLoader::new(&mut store, config(dir.path(), &broken, GTF, 1));
        let err = loader.reset_and_load().unwrap_err();
        assert_eq!(loader.phase(), LoadPhase::Failed);
        assert_eq!(err.as_parse_error().and_then(|e| e.line()), Some(5));
        drop(loader);

        // previous contents survive the failed run
        assert_eq!(store.count_variants().unwrap(), 3);
        assert_eq!(store.count_genes().unwrap(), 1);
    }

    #[test]
    fn test_invalid_utf8_line_aborts_with_line_number() {
        let dir = TempDir::new().unwrap();
        let mut bytes = VCF.as_bytes().to_vec();
        bytes.extend_from_slice(b"20\t80000\t.\tA\tG\t.\tPASS\tX=\xff\xfe\n");
        for threads in [1, 3] {
            let mut store = MemoryStore::new();
            let mut config = config(dir.path(), VCF, GTF, threads);
            config.sites_vcf = write_gz(dir.path(), "bad_utf8.vcf.gz", &bytes);
            let err = BulkLoader::new(&mut store, config).reset_and_load().unwrap_err();
            match err.as_parse_error() {
                Some(ParseError::Malformed { line, kind, .. }) => {
                    assert_eq!(*line, 5, "threads = {}", threads);
                    assert_eq!(*kind, RecordError::InvalidUtf8(8));
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(store.count_variants().unwrap(), 0);
        }
    }

    #[test]
    fn test_earlier_malformed_line_reported_before_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let mut bytes = VCF.as_bytes().to_vec();
        bytes.extend_from_slice(b"20\t80000\trs1\tT\n");
        bytes.extend_from_slice(b"\xff\t1\t.\tA\tG\t.\tPASS\t.\n");
        for threads in [1, 3] {
            let mut store = MemoryStore::new();
            let mut config = config(dir.path(), VCF, GTF, threads);
            config.sites_vcf = write_gz(dir.path(), "mixed.vcf.gz", &bytes);
            let err = BulkLoader::new(&mut store, config).reset_and_load().unwrap_err();
            assert_eq!(err.as_parse_error().and_then(|e| e.line()), Some(5), "threads = {}", threads);
        }
    }

    #[test]
    fn test_non_ascii_chromosome_aborts_parallel_load() {
        let dir = TempDir::new().unwrap();
        let broken = format!("{}ééé\t1\t.\tA\tG\t.\tPASS\t.\n", VCF);
        let mut store = MemoryStore::new();
        let err = BulkLoader::new(&mut store, config(dir.path(), &broken, GTF, 3))
            .reset_and_load()
            .unwrap_err();
        match err.as_parse_error() {
            Some(ParseError::Malformed { line, kind, .. }) => {
                assert_eq!(*line, 5);
                assert!(matches!(kind, RecordError::Coordinate(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_variant_aborts() {
        let dir = TempDir::new().unwrap();
        let duplicated = format!("{}20\t76962\trs2\tT\tC\t.\tPASS\t.\n", VCF);
        let mut store = MemoryStore::new();
        let err = BulkLoader::new(&mut store, config(dir.path(), &duplicated, GTF, 1))
            .reset_and_load()
            .unwrap_err();
        assert!(err.as_store_error().is_some());
        assert_eq!(store.count_variants().unwrap(), 0);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path(), VCF, GTF, 1);
        config.gencode_gtf = dir.path().join("absent.gtf.gz");
        let mut store = MemoryStore::new();
        let err = BulkLoader::new(&mut store, config).reset_and_load().unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert_eq!(store.count_variants().unwrap(), 0);
    }
}
