// Random-access source capability.
//
// The encoder and decoder read the source stream by offset: each window
// loads the sub-range it copies from. Sequential target and delta streams
// are plain `std::io::Read` / `std::io::Write`.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{DeltaError, Result};

/// A source stream that can be read at arbitrary offsets.
pub trait SourceReader {
    /// Read bytes at `offset` into `buf`, returning how many were read.
    /// Fewer than `buf.len()` only at the end of the source.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total source length in bytes.
    fn source_len(&self) -> u64;
}

fn read_slice_at(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let Ok(offset) = usize::try_from(offset) else {
        return 0;
    };
    let Some(available) = data.get(offset..) else {
        return 0;
    };
    let n = buf.len().min(available.len());
    buf[..n].copy_from_slice(&available[..n]);
    n
}

impl SourceReader for &[u8] {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_slice_at(self, offset, buf))
    }

    fn source_len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }
}

impl SourceReader for Vec<u8> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_slice_at(self, offset, buf))
    }

    fn source_len(&self) -> u64 {
        self.as_slice().len() as u64
    }
}

impl<S: SourceReader + ?Sized> SourceReader for &mut S {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn source_len(&self) -> u64 {
        (**self).source_len()
    }
}

/// Source backed by any seekable reader, such as a `File`.
pub struct SeekSource<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> SeekSource<R> {
    /// Wrap `inner`, measuring its length by seeking to the end.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }
}

impl<R: Read + Seek> SourceReader for SeekSource<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(read_up_to(&mut self.inner, buf)?)
    }

    fn source_len(&self) -> u64 {
        self.len
    }
}

/// Fill `buf[..len]` from `src` at `offset`; a short source is `IncompleteRead`.
pub fn read_exact_at<S: SourceReader + ?Sized>(
    src: &mut S,
    mut offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read_at(offset, &mut buf[filled..])?;
        if n == 0 {
            return Err(DeltaError::IncompleteRead);
        }
        filled += n;
        offset += n as u64;
    }
    Ok(())
}

/// Read until `buf` is full or the stream ends, returning the byte count.
pub fn read_up_to<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
