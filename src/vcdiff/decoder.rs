// VCDIFF decoder: instruction decoding and window reconstruction.
//
// A window's source range is loaded into the front of the window buffer,
// then the instructions are replayed to fill the target range behind it.
// COPY addresses index the whole buffer, so a copy may start in the source
// and run into target bytes produced earlier in the same window.

use std::io::Read;

use super::address_cache::AddressCache;
use super::code_table::{DEFAULT_CODE_TABLE, InstType, Instruction};
use super::header::WindowHeader;
use super::varint;
use super::window::Window;
use crate::error::{DeltaError, Result};
use crate::source::{self, SourceReader};

// ---------------------------------------------------------------------------
// Window decoder
// ---------------------------------------------------------------------------

/// Window-at-a-time delta decoder.
pub struct Decoder {
    window: Window,
    cache: AddressCache,
    max_window_size: usize,
}

impl Decoder {
    /// Create a decoder accepting windows of up to `max_window_size`
    /// source+target bytes.
    pub fn new(max_window_size: usize) -> Self {
        Self {
            window: Window::new(max_window_size),
            cache: AddressCache::new(),
            max_window_size,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Read the next window record from `delta`.
    ///
    /// Returns the header, or `None` at the clean end of the delta.
    pub fn read_window<R: Read + ?Sized>(&mut self, delta: &mut R) -> Result<Option<WindowHeader>> {
        let Some(hdr) = WindowHeader::read(delta, self.max_window_size as u64)? else {
            return Ok(None);
        };
        self.window.read_sections(&hdr, delta)?;
        log::debug!(
            "decode window: source {}@{} target {} sections {}/{}/{}",
            hdr.source_size,
            hdr.source_position,
            hdr.target_window_size,
            hdr.add_run_length,
            hdr.instr_length,
            hdr.copy_addr_length
        );
        Ok(Some(hdr))
    }

    /// Reconstruct the target bytes of the loaded window.
    ///
    /// The source range is read through `source`; a window that needs source
    /// bytes when none is given is malformed for this decoder.
    pub fn apply(&mut self, source: Option<&mut (dyn SourceReader + '_)>) -> Result<()> {
        let source_size = self.window.source_size;
        let source_position = self.window.source_position;
        let (buffer, sections) = self.window.split_buffer_mut();

        if source_size > 0 {
            let src = source.ok_or_else(|| {
                DeltaError::invalid("window copies from a source but none was given")
            })?;
            source::read_exact_at(src, source_position, &mut buffer[..source_size])?;
        }

        self.cache.reset();
        let end = buffer.len();
        let mut here = source_size;
        let mut add_run_pos = 0usize;
        let iter = InstructionIterator::with_cache(
            sections.instr,
            sections.copy_addr,
            source_size as u64,
            &mut self.cache,
        );

        for inst in iter {
            let inst = inst?;
            let len = inst.len();
            if len > (end - here) as u64 {
                return Err(DeltaError::invalid(format!(
                    "{inst:?} at {here} overruns the {end}-byte window"
                )));
            }
            let len = len as usize;
            match inst {
                Instruction::Add { .. } => {
                    let bytes = sections
                        .add_run
                        .get(add_run_pos..add_run_pos + len)
                        .ok_or_else(|| DeltaError::invalid("add/run section overrun"))?;
                    buffer[here..here + len].copy_from_slice(bytes);
                    add_run_pos += len;
                }
                Instruction::Run { .. } => {
                    let &byte = sections
                        .add_run
                        .get(add_run_pos)
                        .ok_or_else(|| DeltaError::invalid("add/run section overrun"))?;
                    buffer[here..here + len].fill(byte);
                    add_run_pos += 1;
                }
                Instruction::Copy { addr, .. } => {
                    // addr < here is guaranteed by the address cache.
                    let from = addr as usize;
                    if from + len <= here {
                        buffer.copy_within(from..from + len, here);
                    } else {
                        // Overlapping copy: later bytes repeat the ones just written.
                        for i in 0..len {
                            buffer[here + i] = buffer[from + i];
                        }
                    }
                }
            }
            here += len;
        }

        if here != end {
            return Err(DeltaError::invalid(format!(
                "window produced {} of {} target bytes",
                here - source_size,
                end - source_size
            )));
        }
        Ok(())
    }

    /// Target bytes of the last applied window.
    pub fn target(&self) -> &[u8] {
        self.window.target()
    }
}

// ---------------------------------------------------------------------------
// Instruction iterator
// ---------------------------------------------------------------------------

enum CacheRef<'c> {
    Owned(Box<AddressCache>),
    Borrowed(&'c mut AddressCache),
}

impl CacheRef<'_> {
    fn get(&mut self) -> &mut AddressCache {
        match self {
            Self::Owned(c) => c,
            Self::Borrowed(c) => c,
        }
    }
}

/// Walks a window's instruction and copy-address sections, yielding each
/// instruction with its COPY address resolved.
///
/// Sizes are not checked against the window; `Decoder::apply` does that.
/// The iterator stops after the first error.
pub struct InstructionIterator<'a> {
    instr: &'a [u8],
    copy_addr: &'a [u8],
    instr_pos: usize,
    addr_pos: usize,
    cache: CacheRef<'a>,
    here: u64,
    /// Second half of a paired code, still to be yielded.
    pending_second: Option<(InstType, u8, u8)>,
}

impl<'a> InstructionIterator<'a> {
    /// Iterate a window whose target starts at buffer address `source_size`.
    pub fn new(instr: &'a [u8], copy_addr: &'a [u8], source_size: u64) -> Self {
        Self::build(instr, copy_addr, source_size, CacheRef::Owned(Box::default()))
    }

    fn with_cache(
        instr: &'a [u8],
        copy_addr: &'a [u8],
        source_size: u64,
        cache: &'a mut AddressCache,
    ) -> Self {
        Self::build(instr, copy_addr, source_size, CacheRef::Borrowed(cache))
    }

    fn build(instr: &'a [u8], copy_addr: &'a [u8], source_size: u64, cache: CacheRef<'a>) -> Self {
        Self {
            instr,
            copy_addr,
            instr_pos: 0,
            addr_pos: 0,
            cache,
            here: source_size,
            pending_second: None,
        }
    }

    fn resolve(&mut self, ty: InstType, table_size: u8, mode: u8) -> Result<Instruction> {
        let len = if table_size == 0 {
            let start = self.instr_pos;
            varint::decode(self.instr, &mut self.instr_pos).map_err(|e| match e {
                DeltaError::NumberEncoding if varint::is_truncated(&self.instr[start..]) => {
                    DeltaError::invalid("instruction section overrun")
                }
                other => other,
            })?
        } else {
            u64::from(table_size)
        };

        let inst = match ty {
            InstType::Add => Instruction::Add { len },
            InstType::Run => Instruction::Run { len },
            InstType::Copy => {
                let addr = self
                    .cache
                    .get()
                    .decode(mode, self.copy_addr, &mut self.addr_pos, self.here)?;
                Instruction::Copy { len, addr, mode }
            }
            InstType::Noop => return Err(DeltaError::invalid("NOOP instruction half")),
        };
        self.here = self.here.saturating_add(len);
        Ok(inst)
    }

    fn fuse(&mut self) {
        self.instr_pos = self.instr.len();
        self.pending_second = None;
    }
}

impl Iterator for InstructionIterator<'_> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        let (ty, size, mode) = match self.pending_second.take() {
            Some(half) => half,
            None => loop {
                let &code = self.instr.get(self.instr_pos)?;
                self.instr_pos += 1;
                let e = &DEFAULT_CODE_TABLE[usize::from(code)];
                if e.type2 != InstType::Noop {
                    self.pending_second = Some((e.type2, e.size2, e.mode2));
                }
                if e.type1 != InstType::Noop {
                    break (e.type1, e.size1, e.mode1);
                }
                if let Some(half) = self.pending_second.take() {
                    break half;
                }
            },
        };

        let res = self.resolve(ty, size, mode);
        if res.is_err() {
            self.fuse();
        }
        Some(res)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
