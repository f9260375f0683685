// Delta driver: windowed deltify / undeltify over streams and buffers.
//
// Provides the session-level entry points that orchestrate:
//   - the encoder, one window of target bytes at a time
//   - the decoder, one window record at a time, either pushed to a writer
//     or pulled by the caller chunk by chunk

use std::io::{Read, Write};

use crate::error::{DeltaError, Result};
use crate::source::SourceReader;
use crate::vcdiff::decoder::Decoder;
use crate::vcdiff::encoder::{self, Encoder};
use crate::vcdiff::header::FileHeader;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Default target bytes per window.
pub const DEFAULT_WINDOW_SIZE: usize = 1 << 20;

/// Configuration for a deltify or undeltify session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaOptions {
    /// Target bytes per encoded window; also the largest source sub-window.
    pub window_size: usize,
    /// Largest source+target window the decoder will allocate.
    pub max_window_size: usize,
    /// Application header written into the delta file header.
    pub app_header: Option<Vec<u8>>,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_window_size: 2 * DEFAULT_WINDOW_SIZE,
            app_header: None,
        }
    }
}

impl DeltaOptions {
    /// Options for `window_size`-byte windows, with a decoder bound of twice that.
    pub fn with_window_size(window_size: usize) -> Result<Self> {
        encoder::check_window_size(window_size)?;
        Ok(Self {
            window_size,
            max_window_size: 2 * window_size,
            app_header: None,
        })
    }

    /// Attach an application header to encoded deltas.
    pub fn app_header(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.app_header = Some(data.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        encoder::check_window_size(self.window_size)?;
        if self.max_window_size == 0 {
            return Err(DeltaError::unsupported("maximum window size must be non-zero"));
        }
        Ok(())
    }

    fn file_header(&self) -> FileHeader {
        match &self.app_header {
            Some(data) => FileHeader::with_app_header(data.clone()),
            None => FileHeader::default(),
        }
    }
}

/// Window and byte counts of a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub windows: u64,
    pub target_bytes: u64,
}

// ---------------------------------------------------------------------------
// Deltify
// ---------------------------------------------------------------------------

/// Encode `target` as a delta against `source`, writing it to `delta`.
///
/// The source must be non-empty; an empty target produces a delta with a
/// file header and no windows.
pub fn deltify<S, R, W>(
    source: &mut S,
    target: &mut R,
    delta: &mut W,
    opts: &DeltaOptions,
) -> Result<Totals>
where
    S: SourceReader + ?Sized,
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    opts.validate()?;
    if source.source_len() == 0 {
        return Err(DeltaError::unsupported("source stream is empty"));
    }

    let mut encoder = Encoder::new(opts.window_size)?;
    opts.file_header().write(delta)?;

    let mut totals = Totals::default();
    loop {
        encoder.create(source, target, totals.target_bytes)?;
        let target_window_size = encoder.window().target_window_size;
        if target_window_size == 0 {
            break;
        }
        encoder.process_window_buffer();

        let w = encoder.window();
        log::debug!(
            "encode window {}: source {}@{} target {} sections {}/{}/{}",
            totals.windows,
            w.source_size,
            w.source_position,
            target_window_size,
            w.add_run_data.len(),
            w.instr_data.len(),
            w.copy_addr_data.len()
        );
        encoder.write_window(delta)?;

        totals.windows += 1;
        totals.target_bytes += target_window_size as u64;
    }

    delta.flush()?;
    Ok(totals)
}

/// In-memory `deltify`.
pub fn deltify_buffers(source: &[u8], target: &[u8], opts: &DeltaOptions) -> Result<Vec<u8>> {
    let mut delta = Vec::new();
    let mut source = source;
    let mut target = target;
    deltify(&mut source, &mut target, &mut delta, opts)?;
    Ok(delta)
}

// ---------------------------------------------------------------------------
// Undeltify
// ---------------------------------------------------------------------------

/// Decode `delta` against `source`, writing the reconstructed target.
pub fn undeltify<S, R, W>(
    source: &mut S,
    delta: &mut R,
    target: &mut W,
    opts: &DeltaOptions,
) -> Result<Totals>
where
    S: SourceReader,
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    opts.validate()?;
    let header = FileHeader::read(delta)?;
    log::debug!("delta header: {:?}", header.indicator);

    let mut decoder = Decoder::new(opts.max_window_size);
    let mut totals = Totals::default();
    while decoder.read_window(delta)?.is_some() {
        let src: &mut dyn SourceReader = &mut *source;
        decoder.apply(Some(src))?;
        let out = decoder.target();
        target.write_all(out)?;
        totals.windows += 1;
        totals.target_bytes += out.len() as u64;
    }

    target.flush()?;
    Ok(totals)
}

/// In-memory `undeltify`.
pub fn undeltify_buffers(source: &[u8], delta: &[u8], opts: &DeltaOptions) -> Result<Vec<u8>> {
    let mut target = Vec::new();
    let mut source = source;
    let mut delta = delta;
    undeltify(&mut source, &mut delta, &mut target, opts)?;
    Ok(target)
}

/// Pull-style decoder handing out one window of target bytes at a time.
///
/// ```no_run
/// use vcdelta::engine::{DeltaOptions, Undeltifier};
///
/// # fn main() -> vcdelta::Result<()> {
/// let mut source: &[u8] = b"old contents";
/// let delta: &[u8] = &[];
/// let mut out = Vec::new();
/// let mut undeltifier = Undeltifier::begin(Some(&mut source), delta, &DeltaOptions::default())?;
/// while let Some(chunk) = undeltifier.chunk()? {
///     out.extend_from_slice(chunk);
/// }
/// undeltifier.end();
/// # Ok(())
/// # }
/// ```
pub struct Undeltifier<'s, R> {
    source: Option<&'s mut dyn SourceReader>,
    delta: R,
    decoder: Decoder,
    header: FileHeader,
    finished: bool,
}

impl<'s, R: Read> Undeltifier<'s, R> {
    /// Read the file header and prepare to decode windows from `delta`.
    pub fn begin(
        source: Option<&'s mut dyn SourceReader>,
        mut delta: R,
        opts: &DeltaOptions,
    ) -> Result<Self> {
        opts.validate()?;
        let header = FileHeader::read(&mut delta)?;
        Ok(Self {
            source,
            delta,
            decoder: Decoder::new(opts.max_window_size),
            header,
            finished: false,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Decode the next window and return its target bytes.
    ///
    /// Returns `None` once the delta is exhausted or a window with no
    /// target bytes is met; later calls keep returning `None`.
    pub fn chunk(&mut self) -> Result<Option<&[u8]>> {
        if self.finished {
            return Ok(None);
        }
        let hdr = match self.decoder.read_window(&mut self.delta) {
            Ok(Some(hdr)) => hdr,
            Ok(None) => {
                self.finished = true;
                return Ok(None);
            }
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };
        if hdr.target_window_size == 0 {
            self.finished = true;
            return Ok(None);
        }
        if let Err(e) = self.decoder.apply(self.source.as_deref_mut()) {
            self.finished = true;
            return Err(e);
        }
        Ok(Some(self.decoder.target()))
    }

    /// Release the decoder state and hand back the delta reader.
    pub fn end(self) -> R {
        self.delta
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcdiff::header::{HeaderIndicator, WindowHeader};
    use std::io::Cursor;

    fn roundtrip_with(source: &[u8], target: &[u8], opts: &DeltaOptions) -> Vec<u8> {
        let delta = deltify_buffers(source, target, opts).expect("deltify failed");
        let reconstructed = undeltify_buffers(source, &delta, opts).expect("undeltify failed");
        assert_eq!(
            reconstructed,
            target,
            "roundtrip mismatch (source={}, target={}, delta={})",
            source.len(),
            target.len(),
            delta.len()
        );
        delta
    }

    fn roundtrip(source: &[u8], target: &[u8]) -> Vec<u8> {
        roundtrip_with(source, target, &DeltaOptions::default())
    }

    fn window_count(delta: &[u8]) -> usize {
        let mut cursor = Cursor::new(delta);
        FileHeader::read(&mut cursor).unwrap();
        let mut count = 0;
        while let Some(hdr) = WindowHeader::read(&mut cursor, u64::MAX).unwrap() {
            let skip = hdr.add_run_length + hdr.instr_length + hdr.copy_addr_length;
            cursor.set_position(cursor.position() + skip);
            count += 1;
        }
        count
    }

    #[test]
    fn roundtrip_identical() {
        let data = b"The quick brown fox jumps over the lazy dog.";
        let delta = roundtrip(data, data);
        assert_eq!(window_count(&delta), 1);
    }

    #[test]
    fn roundtrip_small_edit() {
        let source = b"Hello, world! This is a test of the delta engine.";
        let target = b"Hello, earth! This is a test of the delta engine.";
        roundtrip(source, target);
    }

    #[test]
    fn roundtrip_empty_target() {
        let delta = roundtrip(b"some source", b"");
        assert_eq!(delta, [0xD6, 0xC3, 0xC4, 0x00, 0x00]);
    }

    #[test]
    fn roundtrip_disjoint() {
        roundtrip(b"aaaaaaaaaaaaaaaa", b"0123456789abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn roundtrip_repeating_data() {
        let source = b"AAAA BBBB CCCC DDDD EEEE FFFF GGGG HHHH";
        let target = b"AAAA CCCC DDDD EEEE xxxx GGGG HHHH IIII";
        roundtrip(source, target);
    }

    #[test]
    fn roundtrip_binary_data() {
        let source: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let mut target = source.clone();
        target[100] = 0xFF;
        target[200] = 0x00;
        target[1000] = 0x42;
        roundtrip(&source, &target);
    }

    #[test]
    fn multi_window_target() {
        let source: Vec<u8> = (0..3000u32).map(|i| (i % 253) as u8).collect();
        let mut target = source.clone();
        target.extend_from_slice(b"appended tail that is not in the source");
        let opts = DeltaOptions::with_window_size(512).unwrap();
        let delta = roundtrip_with(&source, &target, &opts);
        assert_eq!(window_count(&delta), target.len().div_ceil(512));
    }

    #[test]
    fn delta_is_smaller_for_similar_data() {
        let source: Vec<u8> = (0..=255).cycle().take(8192).collect();
        let mut target = source.clone();
        target[4096] ^= 0xFF;
        let delta = roundtrip(&source, &target);
        assert!(
            delta.len() < target.len() / 2,
            "delta ({}) should be much smaller than target ({})",
            delta.len(),
            target.len()
        );
    }

    #[test]
    fn empty_source_is_unsupported() {
        let err = deltify_buffers(b"", b"target", &DeltaOptions::default()).unwrap_err();
        assert!(matches!(err, DeltaError::Unsupported(_)));
    }

    #[test]
    fn invalid_window_sizes_are_rejected() {
        assert!(matches!(
            DeltaOptions::with_window_size(0),
            Err(DeltaError::Unsupported(_))
        ));
        let opts = DeltaOptions {
            window_size: usize::MAX,
            ..DeltaOptions::default()
        };
        assert!(matches!(
            deltify_buffers(b"s", b"t", &opts),
            Err(DeltaError::Unsupported(_))
        ));
    }

    #[test]
    fn oversized_window_is_unsupported_on_decode() {
        let source = vec![1u8; 2048];
        let target: Vec<u8> = (0..2048u32).map(|i| (i % 7) as u8).collect();
        let delta = deltify_buffers(&source, &target, &DeltaOptions::default()).unwrap();
        let tight = DeltaOptions {
            max_window_size: 1024,
            ..DeltaOptions::default()
        };
        let err = undeltify_buffers(&source, &delta, &tight).unwrap_err();
        assert!(matches!(err, DeltaError::Unsupported(_)));
    }

    #[test]
    fn app_header_roundtrip() {
        let opts = DeltaOptions::default().app_header("name=target.bin");
        let delta = roundtrip_with(b"source bytes", b"target bytes", &opts);
        let header = FileHeader::read(&mut Cursor::new(&delta)).unwrap();
        assert_eq!(header.indicator, HeaderIndicator::APPHEADER);
        assert_eq!(header.app_header.as_deref(), Some(b"name=target.bin".as_slice()));
    }

    #[test]
    fn totals_count_windows_and_bytes() {
        let source = vec![9u8; 100];
        let target = vec![3u8; 250];
        let opts = DeltaOptions::with_window_size(100).unwrap();
        let mut delta = Vec::new();
        let totals =
            deltify(&mut source.as_slice(), &mut target.as_slice(), &mut delta, &opts).unwrap();
        assert_eq!(
            totals,
            Totals {
                windows: 3,
                target_bytes: 250
            }
        );

        let mut out = Vec::new();
        let totals =
            undeltify(&mut source.as_slice(), &mut delta.as_slice(), &mut out, &opts).unwrap();
        assert_eq!(totals.windows, 3);
        assert_eq!(out, target);
    }

    #[test]
    fn chunked_decode_yields_each_window() {
        let source: Vec<u8> = (0..1000u32).map(|i| (i * 13 % 256) as u8).collect();
        let target: Vec<u8> = source.iter().rev().copied().collect();
        let opts = DeltaOptions::with_window_size(256).unwrap();
        let delta = deltify_buffers(&source, &target, &opts).unwrap();

        let mut src = source.as_slice();
        let mut undeltifier = Undeltifier::begin(Some(&mut src), delta.as_slice(), &opts).unwrap();
        assert_eq!(undeltifier.header(), &FileHeader::default());

        let mut sizes = Vec::new();
        let mut out = Vec::new();
        while let Some(chunk) = undeltifier.chunk().unwrap() {
            sizes.push(chunk.len());
            out.extend_from_slice(chunk);
        }
        assert!(undeltifier.chunk().unwrap().is_none());
        let rest = undeltifier.end();
        assert!(rest.is_empty());

        assert_eq!(sizes, [256, 256, 256, 232]);
        assert_eq!(out, target);
    }

    #[test]
    fn chunked_decode_without_source_fails() {
        let delta = deltify_buffers(b"source", b"target", &DeltaOptions::default()).unwrap();
        let mut undeltifier =
            Undeltifier::begin(None, delta.as_slice(), &DeltaOptions::default()).unwrap();
        let err = undeltifier.chunk().unwrap_err();
        assert!(matches!(err, DeltaError::InvalidFormat(_)));
        assert!(undeltifier.chunk().unwrap().is_none());
    }

    #[test]
    fn zero_size_window_ends_chunked_decode() {
        let mut delta = Vec::new();
        FileHeader::default().write(&mut delta).unwrap();
        let mut empty = crate::vcdiff::window::Window::new(16);
        empty.set_geometry(4, 0).unwrap();
        empty.write_record(&mut delta).unwrap();
        // A real window after the empty one is never reached.
        let mut w = crate::vcdiff::window::Window::new(16);
        w.set_geometry(0, 1).unwrap();
        w.add_run_data.push(b'x');
        w.instr_data.push(2);
        w.write_record(&mut delta).unwrap();

        let mut undeltifier =
            Undeltifier::begin(None, delta.as_slice(), &DeltaOptions::default()).unwrap();
        assert!(undeltifier.chunk().unwrap().is_none());
    }

    #[test]
    fn bad_magic_is_invalid() {
        let err = undeltify_buffers(b"src", b"GIF89a", &DeltaOptions::default()).unwrap_err();
        assert!(matches!(err, DeltaError::InvalidFormat(_)));
    }
}
