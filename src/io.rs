// File-level entry points for deltify / undeltify.
//
// Wraps the streaming driver with buffered file I/O. The source file is
// read at window offsets through a `SeekSource`, never loaded whole.
// Streaming SHA-256 digests are feature-gated behind `file-io`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::{Digest, Sha256};
#[cfg(feature = "file-io")]
use std::io::{self, Read};

use crate::engine::{self, DeltaOptions};
use crate::error::Result;
use crate::source::{SeekSource, SourceReader};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `deltify_file()`.
#[derive(Debug, Clone)]
pub struct DeltifyStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Target file size in bytes.
    pub target_size: u64,
    /// Delta output size in bytes.
    pub delta_size: u64,
    /// Number of windows written.
    pub windows: u64,
    /// SHA-256 of the source file (if `file-io` feature is enabled).
    pub source_sha256: Option<[u8; 32]>,
    /// SHA-256 of the target file (if `file-io` feature is enabled).
    pub target_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `undeltify_file()`.
#[derive(Debug, Clone)]
pub struct UndeltifyStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Delta file size in bytes.
    pub delta_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Number of windows decoded.
    pub windows: u64,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

const BUF_SIZE: usize = 64 * 1024;

fn open_source(path: &Path) -> Result<SeekSource<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(SeekSource::new(BufReader::with_capacity(BUF_SIZE, file))?)
}

// ---------------------------------------------------------------------------
// deltify_file
// ---------------------------------------------------------------------------

/// Encode `target_path` against `source_path`, writing the delta to `delta_path`.
pub fn deltify_file(
    source_path: &Path,
    target_path: &Path,
    delta_path: &Path,
    opts: &DeltaOptions,
) -> Result<DeltifyStats> {
    let mut source = open_source(source_path)?;
    let source_size = source.source_len();

    let target_file = File::open(target_path)?;
    let target_size = target_file.metadata()?.len();
    let target_reader = BufReader::with_capacity(BUF_SIZE, target_file);

    let delta_file = File::create(delta_path)?;
    let mut delta_writer = BufWriter::with_capacity(BUF_SIZE, delta_file);

    #[cfg(feature = "file-io")]
    let (totals, target_sha256) = {
        let mut hashing = HashingReader {
            inner: target_reader,
            hasher: Sha256::new(),
        };
        let totals = engine::deltify(&mut source, &mut hashing, &mut delta_writer, opts)?;
        (totals, Some(hashing.hasher.finalize().into()))
    };
    #[cfg(not(feature = "file-io"))]
    let (totals, target_sha256) = {
        let mut target_reader = target_reader;
        let totals = engine::deltify(&mut source, &mut target_reader, &mut delta_writer, opts)?;
        (totals, None)
    };

    let delta_size = delta_writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .metadata()?
        .len();

    #[cfg(feature = "file-io")]
    let source_sha256 = Some(sha256_file(source_path)?);
    #[cfg(not(feature = "file-io"))]
    let source_sha256: Option<[u8; 32]> = None;

    log::debug!(
        "deltify {} -> {}: {} windows, {} -> {} bytes",
        target_path.display(),
        delta_path.display(),
        totals.windows,
        target_size,
        delta_size
    );

    Ok(DeltifyStats {
        source_size,
        target_size,
        delta_size,
        windows: totals.windows,
        source_sha256,
        target_sha256,
    })
}

// ---------------------------------------------------------------------------
// undeltify_file
// ---------------------------------------------------------------------------

/// Decode `delta_path` against `source_path`, writing the target to `output_path`.
pub fn undeltify_file(
    source_path: &Path,
    delta_path: &Path,
    output_path: &Path,
    opts: &DeltaOptions,
) -> Result<UndeltifyStats> {
    let mut source = open_source(source_path)?;
    let source_size = source.source_len();

    let delta_file = File::open(delta_path)?;
    let delta_size = delta_file.metadata()?.len();
    let mut delta_reader = BufReader::with_capacity(BUF_SIZE, delta_file);

    let output_file = File::create(output_path)?;
    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, output_file);

    #[cfg(feature = "file-io")]
    let (totals, output_sha256) = {
        let mut hashing = HashingWriter {
            inner: &mut output_writer,
            hasher: Sha256::new(),
        };
        let totals = engine::undeltify(&mut source, &mut delta_reader, &mut hashing, opts)?;
        (totals, Some(hashing.hasher.finalize().into()))
    };
    #[cfg(not(feature = "file-io"))]
    let (totals, output_sha256) = (
        engine::undeltify(&mut source, &mut delta_reader, &mut output_writer, opts)?,
        None,
    );

    output_writer.flush()?;

    Ok(UndeltifyStats {
        source_size,
        delta_size,
        output_size: totals.target_bytes,
        windows: totals.windows,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Hashing adapters (file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
fn sha256_file(path: &Path) -> Result<[u8; 32]> {
    let mut reader = BufReader::with_capacity(BUF_SIZE, File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}

#[cfg(feature = "file-io")]
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

#[cfg(feature = "file-io")]
impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
