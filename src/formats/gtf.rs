//! GENCODE GTF gene reader
//!
//! GTF columns: seqname, source, feature, start, end, score, strand, frame,
//! attributes. Coordinates are 1-based, closed `[start, end]`. The
//! attributes column holds `key "value";` pairs.
//!
//! Only rows whose feature is `gene` become [`Gene`] records. Every data line
//! is still checked for the nine columns and numeric coordinates.

use crate::core::io::{split_tabs, LineIterator};
use crate::core::{get_xpos, strip_chr_prefix, ParseError, RecordError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;

/// Number of GTF columns
pub const GTF_FIELDS: usize = 9;

/// Feature type kept by the gene reader
pub const GENE_FEATURE: &str = "gene";

/// Strand of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = ".")]
    Unknown,
}

impl Strand {
    /// Parse the GTF strand column
    pub fn parse(s: &str) -> Result<Self, RecordError> {
        match s {
            "+" => Ok(Strand::Plus),
            "-" => Ok(Strand::Minus),
            "." => Ok(Strand::Unknown),
            _ => Err(RecordError::InvalidStrand(s.to_string())),
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
            Strand::Unknown => '.',
        }
    }
}

/// One gene annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    /// Stable identifier without version suffix (`ENSG00000141510`)
    pub gene_id: String,
    /// Human symbol (`TP53`)
    pub gene_name: Option<String>,
    /// Chromosome without `chr` prefix
    pub chrom: String,
    pub start: u64,
    pub stop: u64,
    pub xstart: u64,
    pub xstop: u64,
    pub strand: Strand,
    pub source: String,
    pub gene_type: Option<String>,
    /// Attribute column, verbatim. Repeated keys are joined with ','.
    pub attributes: BTreeMap<String, String>,
}

/// Zero-copy view of a GTF data line
#[derive(Debug)]
pub struct GtfRecordView<'a> {
    pub seqname: &'a str,
    pub source: &'a str,
    pub feature: &'a str,
    /// Start position (1-based)
    pub start: u64,
    /// End position (1-based, inclusive)
    pub end: u64,
    pub score: &'a str,
    pub strand: Strand,
    pub frame: &'a str,
    pub attributes: &'a str,
}

impl<'a> GtfRecordView<'a> {
    /// Parse a GTF line; GTF has exactly 9 tab-separated fields
    pub fn parse(line: &'a str) -> Result<Self, RecordError> {
        let fields = split_tabs(line);
        if fields.len() < GTF_FIELDS {
            return Err(RecordError::TooFewFields {
                expected: GTF_FIELDS,
                found: fields.len(),
            });
        }

        let start: u64 = fields[3]
            .parse()
            .map_err(|_| RecordError::InvalidNumber("start", fields[3].to_string()))?;
        let end: u64 = fields[4]
            .parse()
            .map_err(|_| RecordError::InvalidNumber("end", fields[4].to_string()))?;
        if end < start {
            return Err(RecordError::InvalidNumber("end", fields[4].to_string()));
        }

        Ok(Self {
            seqname: fields[0],
            source: fields[1],
            feature: fields[2],
            start,
            end,
            score: fields[5],
            strand: Strand::parse(fields[6])?,
            frame: fields[7],
            attributes: fields[8],
        })
    }

    pub fn is_gene(&self) -> bool {
        self.feature == GENE_FEATURE
    }

    /// Build a `Gene` from this row
    pub fn to_gene(&self) -> Result<Gene, RecordError> {
        let mut attributes = parse_gtf_attributes(self.attributes)?;
        let raw_id = attributes
            .get("gene_id")
            .ok_or(RecordError::MissingAttribute("gene_id"))?;
        let gene_id = strip_version(raw_id).to_string();

        let chrom = strip_chr_prefix(self.seqname).to_string();
        let xstart = get_xpos(&chrom, self.start)?;
        let xstop = get_xpos(&chrom, self.end)?;

        let gene_name = attributes.get("gene_name").cloned();
        let gene_type = attributes
            .get("gene_type")
            .or_else(|| attributes.get("gene_biotype"))
            .cloned();
        // keep the raw versioned id alongside the stripped one
        if raw_id.as_str() != gene_id {
            let raw = raw_id.clone();
            attributes.insert("gene_id_version".to_string(), raw);
        }

        Ok(Gene {
            gene_id,
            gene_name,
            chrom,
            start: self.start,
            stop: self.end,
            xstart,
            xstop,
            strand: self.strand,
            source: self.source.to_string(),
            gene_type,
            attributes,
        })
    }
}

/// Drop a trailing `.N` version from an Ensembl identifier
///
/// # Examples
/// ```
/// use exac_browser::formats::gtf::strip_version;
///
/// assert_eq!(strip_version("ENSG00000141510.11"), "ENSG00000141510");
/// assert_eq!(strip_version("ENSG00000141510"), "ENSG00000141510");
/// ```
pub fn strip_version(id: &str) -> &str {
    match id.rsplit_once('.') {
        Some((base, version)) if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => id,
    }
}

/// Split the attribute column on `;` outside double quotes
fn split_attributes(attributes: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for i in memchr::memchr2_iter(b'"', b';', attributes.as_bytes()) {
        if attributes.as_bytes()[i] == b'"' {
            quoted = !quoted;
        } else if !quoted {
            items.push(&attributes[start..i]);
            start = i + 1;
        }
    }
    items.push(&attributes[start..]);
    items
}

/// Parse a GTF attribute column (`key "value"; key "value";`)
///
/// A `;` inside a quoted value does not end the pair.
pub fn parse_gtf_attributes(attributes: &str) -> Result<BTreeMap<String, String>, RecordError> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    if attributes == "." {
        return Ok(map);
    }
    for item in split_attributes(attributes)
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
    {
        let (key, value) = item
            .split_once(char::is_whitespace)
            .ok_or_else(|| RecordError::MalformedAttribute(item.to_string()))?;
        let value = value.trim().trim_matches('"');
        map.entry(key.to_string())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    Ok(map)
}

/// Parse one data line into a gene, or `None` for non-gene features
pub fn parse_gene_line(line_number: usize, line: &str) -> Result<Option<Gene>, ParseError> {
    let result = GtfRecordView::parse(line).and_then(|view| {
        if view.is_gene() {
            view.to_gene().map(Some)
        } else {
            Ok(None)
        }
    });
    result.map_err(|kind| ParseError::Malformed {
        line: line_number,
        content: line.to_string(),
        kind,
    })
}

/// Lazy, single-pass reader of genes from a GTF stream
pub struct GeneReader<R: BufRead> {
    lines: LineIterator<R>,
    header_lines: usize,
    skipped_features: usize,
    finished: bool,
}

impl<R: BufRead> GeneReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineIterator::new(reader),
            header_lines: 0,
            skipped_features: 0,
            finished: false,
        }
    }

    /// Comment lines skipped so far
    pub fn header_lines(&self) -> usize {
        self.header_lines
    }

    /// Non-gene rows skipped so far
    pub fn skipped_features(&self) -> usize {
        self.skipped_features
    }
}

impl<R: BufRead> Iterator for GeneReader<R> {
    type Item = Result<Gene, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line_number = self.lines.line_number() + 1;
            let line = match self.lines.next_line() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Some(Ok(line)) => line,
            };

            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                self.header_lines += 1;
                continue;
            }

            match parse_gene_line(line_number, line) {
                Ok(Some(gene)) => return Some(Ok(gene)),
                Ok(None) => self.skipped_features += 1,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Stream genes out of a decompressed GENCODE GTF
pub fn get_genes_from_gencode_gtf<R: BufRead>(reader: R) -> GeneReader<R> {
    GeneReader::new(reader)
}
