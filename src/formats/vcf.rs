//! Sites-only VCF reader
//!
//! Streams `Variant` records out of a decompressed VCF. Header lines (`#`)
//! are skipped; every data line yields one record per ALT allele, all of
//! them sharing the line's position, QUAL, FILTER and INFO annotations.
//!
//! Malformed data lines are reported as [`ParseError::Malformed`] with the
//! 1-based line number and raw content. The reader itself keeps going after
//! an error; the bulk loader aborts on the first one.

use crate::core::io::{split_tabs, LineIterator};
use crate::core::{get_xpos, ParseError, RecordError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::io::BufRead;

/// Number of mandatory VCF columns (CHROM..INFO)
pub const VCF_MIN_FIELDS: usize = 8;

/// One variant call: a single REF/ALT pair at a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// `chrom-pos-ref-alt`
    pub variant_id: String,
    pub chrom: String,
    /// 1-based position
    pub pos: u64,
    pub xpos: u64,
    /// xpos of the first reference base (same as `xpos`)
    pub xstart: u64,
    /// xpos of the last reference base
    pub xstop: u64,
    pub rsid: String,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    pub alt: String,
    /// QUAL column, verbatim
    pub site_quality: String,
    pub filter: String,
    /// AC entry for this ALT allele
    pub allele_count: Option<u64>,
    /// AN
    pub allele_num: Option<u64>,
    /// AC / AN
    pub allele_freq: Option<f64>,
    /// INFO key/value pairs, verbatim. Flags map to an empty string.
    pub info: BTreeMap<String, String>,
}

impl Variant {
    /// Unique key of this variant in the store
    pub fn key(&self) -> (u64, &str, &str) {
        (self.xpos, &self.ref_allele, &self.alt)
    }
}

/// Zero-copy view of a VCF data line
#[derive(Debug)]
pub struct VcfRecordView<'a> {
    pub chrom: &'a str,
    /// Position (1-based)
    pub pos: u64,
    pub id: &'a str,
    pub ref_allele: &'a str,
    /// Comma-separated ALT alleles
    pub alt: &'a str,
    pub qual: &'a str,
    pub filter: &'a str,
    pub info: &'a str,
}

impl<'a> VcfRecordView<'a> {
    /// Parse a data line; genotype columns past INFO are ignored
    pub fn parse(line: &'a str) -> Result<Self, RecordError> {
        let fields = split_tabs(line);
        if fields.len() < VCF_MIN_FIELDS {
            return Err(RecordError::TooFewFields {
                expected: VCF_MIN_FIELDS,
                found: fields.len(),
            });
        }

        let pos: u64 = fields[1]
            .parse()
            .map_err(|_| RecordError::InvalidNumber("POS", fields[1].to_string()))?;

        Ok(Self {
            chrom: fields[0],
            pos,
            id: fields[2],
            ref_allele: fields[3],
            alt: fields[4],
            qual: fields[5],
            filter: fields[6],
            info: fields[7],
        })
    }

    /// Iterate over the individual ALT alleles
    pub fn alt_alleles(&self) -> impl Iterator<Item = &'a str> {
        self.alt.split(',')
    }

    /// Expand the line into one `Variant` per ALT allele
    pub fn to_variants(&self) -> Result<Vec<Variant>, RecordError> {
        let xpos = get_xpos(self.chrom, self.pos)?;
        let ref_len = self.ref_allele.len().max(1) as u64;
        let info = parse_info(self.info);
        let alts: Vec<&str> = self.alt_alleles().collect();

        let allele_num = info.get("AN").and_then(|an| an.parse::<u64>().ok());
        let allele_counts: Vec<Option<u64>> = match info.get("AC") {
            Some(ac) => {
                let values: Vec<&str> = ac.split(',').collect();
                if values.len() == alts.len() {
                    values.iter().map(|v| v.parse().ok()).collect()
                } else {
                    vec![None; alts.len()]
                }
            }
            None => vec![None; alts.len()],
        };

        let variants = alts
            .iter()
            .zip(allele_counts)
            .map(|(alt, allele_count)| {
                let allele_freq = match (allele_count, allele_num) {
                    (Some(ac), Some(an)) if an > 0 => Some(ac as f64 / an as f64),
                    _ => None,
                };
                Variant {
                    variant_id: format!("{}-{}-{}-{}", self.chrom, self.pos, self.ref_allele, alt),
                    chrom: self.chrom.to_string(),
                    pos: self.pos,
                    xpos,
                    xstart: xpos,
                    xstop: xpos + ref_len - 1,
                    rsid: self.id.to_string(),
                    ref_allele: self.ref_allele.to_string(),
                    alt: alt.to_string(),
                    site_quality: self.qual.to_string(),
                    filter: self.filter.to_string(),
                    allele_count,
                    allele_num,
                    allele_freq,
                    info: info.clone(),
                }
            })
            .collect();

        Ok(variants)
    }
}

/// Parse an INFO column into key/value pairs
///
/// # Examples
/// ```
/// use exac_browser::formats::vcf::parse_info;
///
/// let info = parse_info("AC=3;AN=6500;DB");
/// assert_eq!(info["AC"], "3");
/// assert_eq!(info["DB"], "");
/// assert!(parse_info(".").is_empty());
/// ```
pub fn parse_info(info: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if info == "." || info.is_empty() {
        return map;
    }
    for item in info.split(';').filter(|item| !item.is_empty()) {
        match item.split_once('=') {
            Some((key, value)) => map.insert(key.to_string(), value.to_string()),
            None => map.insert(item.to_string(), String::new()),
        };
    }
    map
}

/// Parse one data line into its variants, attaching line context on failure
pub fn parse_variant_line(line_number: usize, line: &str) -> Result<Vec<Variant>, ParseError> {
    VcfRecordView::parse(line)
        .and_then(|view| view.to_variants())
        .map_err(|kind| ParseError::Malformed {
            line: line_number,
            content: line.to_string(),
            kind,
        })
}

/// Lazy, single-pass reader of variants from a sites VCF stream
pub struct VariantReader<R: BufRead> {
    lines: LineIterator<R>,
    pending: VecDeque<Variant>,
    header_lines: usize,
    finished: bool,
}

impl<R: BufRead> VariantReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineIterator::new(reader),
            pending: VecDeque::new(),
            header_lines: 0,
            finished: false,
        }
    }

    /// Header and comment lines skipped so far
    pub fn header_lines(&self) -> usize {
        self.header_lines
    }
}

impl<R: BufRead> Iterator for VariantReader<R> {
    type Item = Result<Variant, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(variant) = self.pending.pop_front() {
                return Some(Ok(variant));
            }
            if self.finished {
                return None;
            }

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

            match parse_variant_line(line_number, line) {
                Ok(variants) => self.pending.extend(variants),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Stream variants out of a decompressed sites VCF
pub fn get_variants_from_sites_vcf<R: BufRead>(reader: R) -> VariantReader<R> {
    VariantReader::new(reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "##fileformat=VCFv4.1\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    #[test]
    fn test_record_view_basic() {
        let line = "20\t76962\trs141175086\tT\tC\t100\tPASS\tAC=3;AN=6500";
        let view = VcfRecordView::parse(line).unwrap();
        assert_eq!(view.chrom, "20");
        assert_eq!(view.pos, 76962);
        assert_eq!(view.id, "rs141175086");
        assert_eq!(view.ref_allele, "T");
        assert_eq!(view.alt, "C");
        assert_eq!(view.qual, "100");
        assert_eq!(view.filter, "PASS");
        assert_eq!(view.info, "AC=3;AN=6500");
    }

    #[test]
    fn test_scenario_variant() {
        let line = "20\t76962\trs141175086\tT\tC\t100\tPASS\tAC=3;AN=6500";
        let variants = parse_variant_line(1, line).unwrap();
        assert_eq!(variants.len(), 1);
        let v = &variants[0];
        assert_eq!(v.xpos, 20 * 1_000_000_000 + 76962);
        assert_eq!(v.xstop, v.xpos);
        assert_eq!(v.variant_id, "20-76962-T-C");
        assert_eq!(v.allele_count, Some(3));
        assert_eq!(v.allele_num, Some(6500));
        assert!((v.allele_freq.unwrap() - 3.0 / 6500.0).abs() < 1e-12);
    }

    #[test]
    fn test_multi_allelic_split() {
        let line = "1\t1000\t.\tAT\tA,ATT\t50\tPASS\tAC=4,1;AN=100;DP=20";
        let variants = parse_variant_line(7, line).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].alt, "A");
        assert_eq!(variants[0].allele_count, Some(4));
        assert_eq!(variants[1].alt, "ATT");
        assert_eq!(variants[1].allele_count, Some(1));
        for v in &variants {
            assert_eq!(v.pos, 1000);
            assert_eq!(v.xstop, v.xpos + 1);
            assert_eq!(v.info["DP"], "20");
        }
    }

    #[test]
    fn test_mismatched_ac_is_dropped() {
        let line = "1\t1000\t.\tA\tG,T\t50\tPASS\tAC=4;AN=100";
        let variants = parse_variant_line(1, line).unwrap();
        assert!(variants.iter().all(|v| v.allele_count.is_none()));
        assert!(variants.iter().all(|v| v.allele_freq.is_none()));
    }

    #[test]
    fn test_too_few_fields() {
        let err = parse_variant_line(12, "20\t76962\trs1\tT").unwrap_err();
        match err {
            ParseError::Malformed { line, content, kind } => {
                assert_eq!(line, 12);
                assert_eq!(content, "20\t76962\trs1\tT");
                assert_eq!(kind, RecordError::TooFewFields { expected: 8, found: 4 });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_position() {
        let err = parse_variant_line(3, "20\tabc\t.\tT\tC\t.\t.\t.").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Malformed { kind: RecordError::InvalidNumber("POS", _), .. }
        ));
    }

    #[test]
    fn test_invalid_chromosome() {
        let err = parse_variant_line(3, "GL000192.1\t10\t.\tT\tC\t.\t.\t.").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Malformed { kind: RecordError::Coordinate(_), .. }
        ));
    }

    #[test]
    fn test_reader_skips_headers() {
        let data = format!(
            "{}20\t100\t.\tA\tG\t.\tPASS\tAC=1;AN=2\n\n20\t200\t.\tC\tT,G\t.\tPASS\t.\n",
            HEADER
        );
        let mut reader = get_variants_from_sites_vcf(data.as_bytes());
        let variants: Vec<Variant> = reader.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(variants.len(), 3);
        assert_eq!(reader.header_lines(), 2);
        assert_eq!(variants[0].pos, 100);
        assert_eq!(variants[2].alt, "G");
        assert!(variants[2].info.is_empty());
    }

    #[test]
    fn test_reader_reports_line_number() {
        let data = format!("{}20\t100\t.\tA\tG\t.\tPASS\t.\n20\t200\t.\tC\n", HEADER);
        let results: Vec<_> = VariantReader::new(data.as_bytes()).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().line(), Some(4));
    }

    #[test]
    fn test_non_ascii_chrom_is_parse_error() {
        let data = format!("{}ééé\t1\t.\tA\tG\t.\tPASS\t.\n", HEADER);
        let results: Vec<_> = get_variants_from_sites_vcf(data.as_bytes()).collect();
        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(ParseError::Malformed { line, kind, content }) => {
                assert_eq!(*line, 3);
                assert_eq!(content, "ééé\t1\t.\tA\tG\t.\tPASS\t.");
                assert_eq!(
                    *kind,
                    RecordError::Coordinate(crate::core::CoordinateError::InvalidChromosome("ééé".to_string()))
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_ascii_info_is_kept() {
        let line = "20\t100\t.\tA\tG\t.\tPASS\tNOTE=café;AC=1;AN=2";
        let variants = parse_variant_line(1, line).unwrap();
        assert_eq!(variants[0].info["NOTE"], "café");
        assert_eq!(variants[0].allele_count, Some(1));
    }

    #[test]
    fn test_reader_invalid_utf8_line() {
        let mut data = format!("{}20\t100\t.\tA\tG\t.\tPASS\tAC=1\n", HEADER).into_bytes();
        data.extend_from_slice(b"20\t200\t.\tC\tT\t.\tPASS\tX=\xff\xfe\n");
        let results: Vec<_> = get_variants_from_sites_vcf(&data[..]).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.line(), Some(4));
        match err {
            ParseError::Malformed { kind, content, .. } => {
                assert_eq!(*kind, RecordError::InvalidUtf8(8));
                assert!(content.starts_with("20\t200\t.\tC\tT"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_info_flags_and_equals_in_value() {
        let info = parse_info("CSQ=A|B=C;DB;;AF=0.5");
        assert_eq!(info["CSQ"], "A|B=C");
        assert_eq!(info["DB"], "");
        assert_eq!(info["AF"], "0.5");
        assert_eq!(info.len(), 3);
    }
}
