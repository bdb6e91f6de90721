//! Compressed input handling
//!
//! Opens gzip (including multi-member bgzip), bzip2 or plain text files
//! behind a single `BufRead`, and counts the raw bytes pulled from disk so
//! loaders can report progress against the compressed file size.

use super::error::{ParseError, RecordError};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default buffer size for BufReader (128KB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Compression format of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Plain,
    Gzip,
    Bzip2,
}

/// Detect the compression format by extension, then by magic bytes
pub fn detect_compression(path: &Path) -> io::Result<CompressionFormat> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    if extension == "gz" || extension == "bgz" {
        return Ok(CompressionFormat::Gzip);
    }
    if extension == "bz2" {
        return Ok(CompressionFormat::Bzip2);
    }

    let mut file = File::open(path)?;
    let mut magic = [0u8; 3];
    let bytes_read = file.read(&mut magic)?;

    if bytes_read >= 2 && magic[0] == 0x1f && magic[1] == 0x8b {
        return Ok(CompressionFormat::Gzip);
    }
    // BZ2 magic: "BZh"
    if bytes_read >= 3 && &magic == b"BZh" {
        return Ok(CompressionFormat::Bzip2);
    }

    Ok(CompressionFormat::Plain)
}

/// Shared count of raw bytes read from the underlying file
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes consumed so far; never decreases
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: usize) {
        self.0.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Reader wrapper that records every byte it hands out
pub struct CountingReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R, counter: ByteCounter) -> Self {
        Self { inner, counter }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.add(n);
        Ok(n)
    }
}

/// A decompressed input stream together with its size on disk
pub struct CompressedInput {
    /// Decompressed text
    pub reader: Box<dyn BufRead + Send>,
    /// Raw bytes consumed from the file
    pub counter: ByteCounter,
    /// File size in bytes
    pub size: u64,
    pub format: CompressionFormat,
}

/// Open a possibly compressed text file
pub fn open_compressed<P: AsRef<Path>>(path: P) -> io::Result<CompressedInput> {
    let path = path.as_ref();
    let format = detect_compression(path)?;
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let counter = ByteCounter::new();
    let raw = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, CountingReader::new(file, counter.clone()));

    let reader: Box<dyn BufRead + Send> = match format {
        // bgzip files are a series of gzip members
        CompressionFormat::Gzip => Box::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            flate2::bufread::MultiGzDecoder::new(raw),
        )),
        CompressionFormat::Bzip2 => Box::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            bzip2::bufread::BzDecoder::new(raw),
        )),
        CompressionFormat::Plain => Box::new(raw),
    };

    Ok(CompressedInput {
        reader,
        counter,
        size,
        format,
    })
}

/// Line iterator that reuses a buffer and tracks 1-based line numbers
///
/// Lines are read as bytes and checked for UTF-8 one at a time, so an
/// undecodable line is reported with its number and content.
pub struct LineIterator<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> LineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(1024),
            line_number: 0,
        }
    }

    /// Number of the line most recently returned
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read the next line into the internal buffer
    /// Returns None at EOF, Some(Ok(&str)) on success, Some(Err) on error
    pub fn next_line(&mut self) -> Option<Result<&str, ParseError>> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None, // EOF
            Ok(_) => {
                self.line_number += 1;
                if self.buffer.last() == Some(&b'\n') {
                    self.buffer.pop();
                    if self.buffer.last() == Some(&b'\r') {
                        self.buffer.pop();
                    }
                }
                match std::str::from_utf8(&self.buffer) {
                    Ok(line) => Some(Ok(line)),
                    Err(e) => {
                        let valid = &self.buffer[..e.valid_up_to()];
                        let column = memchr::memchr_iter(b'\t', valid).count() + 1;
                        Some(Err(ParseError::Malformed {
                            line: self.line_number,
                            content: String::from_utf8_lossy(&self.buffer).into_owned(),
                            kind: RecordError::InvalidUtf8(column),
                        }))
                    }
                }
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Split a line on tabs using memchr
pub(crate) fn split_tabs(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut fields = Vec::with_capacity(10);
    let mut start = 0;
    for tab in memchr::memchr_iter(b'\t', bytes) {
        fields.push(&line[start..tab]);
        start = tab + 1;
    }
    fields.push(&line[start..]);
    fields
}
