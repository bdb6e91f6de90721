//! Genomic coordinate encoding
//!
//! Packs a `(chromosome, position)` pair into a single integer, the `xpos`,
//! so that integer order equals chromosome-then-position order:
//!
//! ```text
//! xpos = rank(chrom) * 1_000_000_000 + pos
//! ```
//!
//! Ranks are 1-22 for the autosomes, then X = 23, Y = 24, M/MT = 25.
//! An optional `chr` prefix is accepted in any case.

use super::error::{CoordinateError, CoordinateResult};

/// Multiplier separating chromosomes; strictly greater than any position
pub const CHROM_MULTIPLIER: u64 = 1_000_000_000;

/// Largest supported 1-based position
pub const MAX_POSITION: u64 = CHROM_MULTIPLIER - 1;

const RANK_X: u64 = 23;
const RANK_Y: u64 = 24;
const RANK_M: u64 = 25;

/// Strip an optional `chr` prefix (case-insensitive)
pub(crate) fn strip_chr_prefix(chrom: &str) -> &str {
    // byte 3 is a char boundary only when the prefix matched
    if chrom.len() > 3 && chrom.as_bytes()[..3].eq_ignore_ascii_case(b"chr") {
        &chrom[3..]
    } else {
        chrom
    }
}

/// Normalize a chromosome label to its canonical short form
///
/// # Examples
/// ```
/// use exac_browser::core::normalize_chrom;
///
/// assert_eq!(normalize_chrom("chr1"), "1");
/// assert_eq!(normalize_chrom("chrx"), "X");
/// assert_eq!(normalize_chrom("chrM"), "MT");
/// assert_eq!(normalize_chrom("GL000192.1"), "GL000192.1");
/// ```
pub fn normalize_chrom(chrom: &str) -> String {
    let upper = strip_chr_prefix(chrom).to_ascii_uppercase();
    if upper == "M" {
        "MT".to_string()
    } else {
        upper
    }
}

/// Rank of a chromosome label in the fixed chromosome order
///
/// # Examples
/// ```
/// use exac_browser::core::chrom_rank;
///
/// assert_eq!(chrom_rank("1").unwrap(), 1);
/// assert_eq!(chrom_rank("chr22").unwrap(), 22);
/// assert_eq!(chrom_rank("X").unwrap(), 23);
/// assert_eq!(chrom_rank("MT").unwrap(), 25);
/// assert!(chrom_rank("23").is_err());
/// ```
pub fn chrom_rank(chrom: &str) -> CoordinateResult<u64> {
    let label = strip_chr_prefix(chrom);
    match label {
        "X" | "x" => return Ok(RANK_X),
        "Y" | "y" => return Ok(RANK_Y),
        _ => {}
    }
    if label.eq_ignore_ascii_case("M") || label.eq_ignore_ascii_case("MT") {
        return Ok(RANK_M);
    }
    // "01" or "+1" are not chromosome names
    if label.is_empty() || !label.bytes().all(|b| b.is_ascii_digit()) || label.starts_with('0') {
        return Err(CoordinateError::InvalidChromosome(chrom.to_string()));
    }
    match label.parse::<u64>() {
        Ok(n) if (1..=22).contains(&n) => Ok(n),
        _ => Err(CoordinateError::InvalidChromosome(chrom.to_string())),
    }
}

/// Canonical label for a chromosome rank
fn rank_label(rank: u64) -> Option<String> {
    match rank {
        1..=22 => Some(rank.to_string()),
        RANK_X => Some("X".to_string()),
        RANK_Y => Some("Y".to_string()),
        RANK_M => Some("MT".to_string()),
        _ => None,
    }
}

/// Encode a chromosome and 1-based position into an xpos
///
/// # Examples
/// ```
/// use exac_browser::core::get_xpos;
///
/// assert_eq!(get_xpos("20", 76962).unwrap(), 20_000_076_962);
/// assert_eq!(get_xpos("chrX", 1).unwrap(), 23_000_000_001);
/// ```
pub fn get_xpos(chrom: &str, pos: u64) -> CoordinateResult<u64> {
    let rank = chrom_rank(chrom)?;
    if pos == 0 || pos > MAX_POSITION {
        return Err(CoordinateError::InvalidPosition(pos));
    }
    Ok(rank * CHROM_MULTIPLIER + pos)
}

/// Decode an xpos back into its canonical chromosome label and position
///
/// # Examples
/// ```
/// use exac_browser::core::decode_xpos;
///
/// assert_eq!(decode_xpos(20_000_076_962).unwrap(), ("20".to_string(), 76962));
/// ```
pub fn decode_xpos(xpos: u64) -> CoordinateResult<(String, u64)> {
    let rank = xpos / CHROM_MULTIPLIER;
    let pos = xpos % CHROM_MULTIPLIER;
    let label = rank_label(rank).ok_or_else(|| CoordinateError::InvalidChromosome(rank.to_string()))?;
    if pos == 0 {
        return Err(CoordinateError::InvalidPosition(pos));
    }
    Ok((label, pos))
}
