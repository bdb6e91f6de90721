//! ExAC browser CLI entry point
//!
//! Loads the variant store and answers lookups from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand};
use exac_browser::config::{DEFAULT_DATABASE, DEFAULT_GENCODE_GTF, DEFAULT_SITES_VCF};
use exac_browser::{
    BrowserConfig, BulkLoader, LoadPhase, Lookup, ProgressObserver, SqliteStore, VariantKey,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "exac-browser")]
#[command(about = "Variant and gene store for the ExAC browser")]
#[command(version)]
struct Cli {
    /// SQLite database holding the variant and gene collections
    #[arg(long, global = true, env = "EXAC_DATABASE", default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wipe the store and reload it from the sites VCF and GENCODE GTF
    Load {
        /// Sites-only VCF (gzip, bgzip, bzip2 or plain)
        #[arg(long, env = "EXAC_SITES_VCF", default_value = DEFAULT_SITES_VCF)]
        sites_vcf: PathBuf,
        /// GENCODE gene annotation GTF
        #[arg(long, env = "EXAC_GENCODE_GTF", default_value = DEFAULT_GENCODE_GTF)]
        gencode_gtf: PathBuf,
        /// Number of parsing threads
        #[arg(short = 't', long, env = "EXAC_THREADS", default_value = "1")]
        threads: usize,
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Show a variant given as chrom-pos-ref-alt
    Variant {
        variant: String,
    },
    /// Show a gene and the number of variants inside it
    Gene {
        gene_id: String,
    },
    /// Classify a free-text query as a gene or variant
    Search {
        query: String,
    },
}

/// Progress bar over the compressed bytes of the file being loaded
#[derive(Default)]
struct BarProgress {
    bar: Option<ProgressBar>,
}

impl ProgressObserver for BarProgress {
    fn start(&mut self, phase: LoadPhase, total_bytes: u64) {
        let bar = ProgressBar::new(total_bytes);
        let style = ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {msg}",
        )
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(phase.name());
        self.bar = Some(bar);
    }

    fn advance(&mut self, bytes_read: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(bytes_read);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

fn open_store(config: &BrowserConfig) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(&config.database)
        .with_context(|| format!("Failed to open database {:?}", config.database))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut config = BrowserConfig {
        database: cli.database,
        ..BrowserConfig::default()
    };

    match cli.command {
        Commands::Load { sites_vcf, gencode_gtf, threads, quiet } => {
            config.sites_vcf = sites_vcf;
            config.gencode_gtf = gencode_gtf;
            config.threads = threads;

            let start = Instant::now();
            let mut store = open_store(&config)?;
            let mut loader = BulkLoader::new(&mut store, config.load_config());
            if !quiet {
                loader = loader.with_progress(BarProgress::default());
            }
            let stats = loader.reset_and_load().context("Load failed")?;

            eprintln!("\n=== Load Statistics ===");
            eprintln!("Variants:        {}", stats.variants);
            eprintln!("Genes:           {}", stats.genes);
            eprintln!("Header lines:    {}", stats.header_lines);
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Variant { variant } => {
            let key: VariantKey = variant
                .parse()
                .with_context(|| format!("Invalid variant {:?}", variant))?;
            let store = open_store(&config)?;
            match Lookup::new(&store).get_variant_by_key(&key)? {
                Some(variant) => println!("{}", serde_json::to_string_pretty(&variant)?),
                None => eprintln!("Variant not found: {}", key),
            }
        }

        Commands::Gene { gene_id } => {
            let store = open_store(&config)?;
            let lookup = Lookup::new(&store);
            match lookup.get_gene(&gene_id)? {
                Some(gene) => {
                    let variants = lookup.get_variants_in_gene(&gene.gene_id)?.unwrap_or_default();
                    println!("{}", serde_json::to_string_pretty(&gene)?);
                    eprintln!("Variants in gene: {}", variants.len());
                }
                None => eprintln!("Gene not found: {}", gene_id),
            }
        }

        Commands::Search { query } => {
            let store = open_store(&config)?;
            let resolution = Lookup::new(&store).resolve_identifier(&query)?;
            println!("{}\t{}", resolution.kind(), resolution.key().unwrap_or("-"));
        }
    }

    Ok(())
}
