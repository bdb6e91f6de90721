//! Performance benchmarks for the record readers
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use exac_browser::core::get_xpos;
use exac_browser::formats::gtf::get_genes_from_gencode_gtf;
use exac_browser::formats::vcf::get_variants_from_sites_vcf;
use exac_browser::{MemoryStore, Store};

/// Build a synthetic sites VCF with `n` data lines
fn synthetic_vcf(n: usize) -> String {
    let mut data = String::from("##fileformat=VCFv4.1\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
    for i in 0..n {
        data.push_str(&format!(
            "20\t{}\trs{}\tA\tG,T\t{}\tPASS\tAC={},{};AN=120000;DP=5000;MQ=60\n",
            60000 + i * 7,
            i,
            i % 1000,
            i % 50,
            i % 3
        ));
    }
    data
}

/// Build a synthetic GTF with one gene and four sub-features per gene
fn synthetic_gtf(genes: usize) -> String {
    let mut data = String::from("##provider: GENCODE\n");
    for i in 0..genes {
        let start = 100_000 + i * 10_000;
        for feature in ["gene", "transcript", "exon", "exon", "CDS"] {
            data.push_str(&format!(
                "chr20\tHAVANA\t{}\t{}\t{}\t.\t+\t.\tgene_id \"ENSG{:011}.1\"; gene_type \"protein_coding\"; gene_name \"G{}\"; level 2;\n",
                feature,
                start,
                start + 5000,
                i,
                i
            ));
        }
    }
    data
}

/// Benchmark xpos encoding
fn bench_xpos(c: &mut Criterion) {
    c.bench_function("get_xpos", |b| {
        b.iter(|| {
            let xpos = get_xpos(black_box("chr20"), black_box(76962));
            black_box(xpos)
        })
    });
}

/// Benchmark VCF parsing throughput
fn bench_vcf_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("vcf_parsing");
    for lines in [1_000usize, 10_000] {
        let data = synthetic_vcf(lines);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &data, |b, data| {
            b.iter(|| {
                let count = get_variants_from_sites_vcf(data.as_bytes())
                    .filter(|r| r.is_ok())
                    .count();
                black_box(count)
            })
        });
    }
    group.finish();
}

/// Benchmark GTF gene extraction
fn bench_gtf_parsing(c: &mut Criterion) {
    let data = synthetic_gtf(2_000);
    let mut group = c.benchmark_group("gtf_parsing");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("genes", |b| {
        b.iter(|| {
            let count = get_genes_from_gencode_gtf(data.as_bytes())
                .filter(|r| r.is_ok())
                .count();
            black_box(count)
        })
    });
    group.finish();
}

/// Benchmark inserting parsed variants into the memory store
fn bench_memory_insert(c: &mut Criterion) {
    let variants: Vec<_> = get_variants_from_sites_vcf(synthetic_vcf(5_000).as_bytes())
        .filter_map(|r| r.ok())
        .collect();
    c.bench_function("memory_store_insert", |b| {
        b.iter(|| {
            let mut store = MemoryStore::new();
            for variant in &variants {
                let _ = store.insert_variant(variant);
            }
            store.ensure_indexes().ok();
            black_box(store.count_variants().ok())
        })
    });
}

criterion_group!(benches, bench_xpos, bench_vcf_parsing, bench_gtf_parsing, bench_memory_insert);
criterion_main!(benches);
