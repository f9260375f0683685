// VCDIFF encoder: greedy match finding and instruction encoding.
//
// Each window is built in three steps: `create` loads the next target
// chunk and the source sub-window it is matched against, then
// `process_window_buffer` scans the target and emits ADD/RUN/COPY
// instructions into the window sections, and finally the driver writes
// the window record.

use std::io::{Read, Write};

use super::address_cache::AddressCache;
use super::code_table::{
    DEFAULT_CODE_TABLE, InstType, generic_code, max_table_size, pair_range, single_range,
};
use super::varint;
use super::window::{SectionsMut, Window};
use crate::error::{DeltaError, Result};
use crate::hash::config::{SOURCE_HASH, TARGET_HASH};
use crate::hash::table::{HashTable, is_run};
use crate::source::{self, SourceReader};

/// Largest accepted window size. Window buffers hold a source and a target
/// chunk, and positions in them must fit in 32 bits.
pub const MAX_WINDOW_SIZE: usize = (u32::MAX / 2) as usize;

/// Reject window sizes the encoder cannot work with.
pub fn check_window_size(window_size: usize) -> Result<()> {
    if window_size == 0 {
        return Err(DeltaError::unsupported("window size must be non-zero"));
    }
    if window_size > MAX_WINDOW_SIZE {
        return Err(DeltaError::unsupported(format!(
            "window size {window_size} exceeds the maximum of {MAX_WINDOW_SIZE}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction writer
// ---------------------------------------------------------------------------

/// Last instruction written as a single code with an implicit size; the
/// next instruction may be folded into its code byte.
#[derive(Clone, Copy)]
struct LastSingle {
    offset: usize,
    ty: InstType,
    size: u8,
    mode: u8,
}

/// Appends instructions to the sections of one window.
pub struct InstructionWriter<'a> {
    sections: SectionsMut<'a>,
    cache: &'a mut AddressCache,
    last: Option<LastSingle>,
}

impl<'a> InstructionWriter<'a> {
    /// Start writing into `sections`. `cache` must be in its start-of-window state.
    pub fn new(sections: SectionsMut<'a>, cache: &'a mut AddressCache) -> Self {
        Self {
            sections,
            cache,
            last: None,
        }
    }

    /// ADD `bytes` literally.
    pub fn add(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.sections.add_run.extend_from_slice(bytes);
        self.write_instruction(InstType::Add, bytes.len() as u64, 0);
    }

    /// RUN `byte` repeated `len` times.
    pub fn run(&mut self, byte: u8, len: u64) {
        if len == 0 {
            return;
        }
        self.sections.add_run.push(byte);
        self.write_instruction(InstType::Run, len, 0);
    }

    /// COPY `len` bytes from window address `addr`.
    pub fn copy(&mut self, addr: u64, len: u64) {
        if len == 0 {
            return;
        }
        let (mode, encoded) = self.cache.encode(addr);
        encoded.write_to(self.sections.copy_addr);
        log::trace!("COPY len={len} addr={addr} mode={mode}");
        self.write_instruction(InstType::Copy, len, mode);
    }

    /// Append one instruction code to the instruction section.
    ///
    /// In order of preference: fold into the previous single code when the
    /// pair has a code of its own, use the exact single code for this
    /// type/size/mode, or fall back to the size-0 code followed by the size.
    pub fn write_instruction(&mut self, ty: InstType, size: u64, mode: u8) {
        if let Some(last) = self.last.take()
            && let Some(code) = pair_code(last, ty, size, mode)
        {
            log::trace!(
                "pair {:?}({}) + {ty:?}({size}) -> code {code}",
                last.ty,
                last.size
            );
            self.sections.instr[last.offset] = code;
            return;
        }

        let offset = self.sections.instr.len();
        if let Some(size) = u8::try_from(size).ok().filter(|&s| s <= max_table_size(ty))
            && let Some(code) = single_range(ty, mode)
                .find(|&c| DEFAULT_CODE_TABLE[c].is_single(ty, size, mode))
        {
            self.sections.instr.push(code as u8);
            self.last = Some(LastSingle {
                offset,
                ty,
                size,
                mode,
            });
            return;
        }

        self.sections.instr.push(generic_code(ty, mode));
        varint::encode(size, self.sections.instr);
    }
}

/// Code packing `last` followed by `ty(size, mode)`, if the table has one.
fn pair_code(last: LastSingle, ty: InstType, size: u64, mode: u8) -> Option<u8> {
    let range = pair_range(last.ty, last.mode, ty, mode)?;
    let size = u8::try_from(size).ok()?;
    if last.size > range.max_size1 || size > range.max_size2 {
        return None;
    }
    range
        .codes()
        .find(|&c| {
            let e = &DEFAULT_CODE_TABLE[c];
            e.size1 == last.size && e.mode1 == last.mode && e.size2 == size && e.mode2 == mode
        })
        .map(|c| c as u8)
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Window-at-a-time delta encoder.
pub struct Encoder {
    window: Window,
    cache: AddressCache,
    source_hash: HashTable,
    target_hash: HashTable,
    window_size: usize,
}

impl Encoder {
    /// Create an encoder producing windows of up to `window_size` target bytes.
    pub fn new(window_size: usize) -> Result<Self> {
        check_window_size(window_size)?;
        Ok(Self {
            window: Window::new(2 * window_size),
            cache: AddressCache::new(),
            source_hash: HashTable::new(SOURCE_HASH, window_size),
            target_hash: HashTable::new(TARGET_HASH, window_size),
            window_size,
        })
    }

    /// The window built by the last `create`/`process_window_buffer`.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Load the next window: up to `window_size` target bytes and the source
    /// range they will be matched against.
    ///
    /// The source sub-window starts at `target_position` when the source
    /// still holds at least as many bytes from there as were just read,
    /// otherwise at 0. A `target_window_size` of 0 afterwards means the
    /// target is exhausted.
    pub fn create<S, R>(
        &mut self,
        source: &mut S,
        target: &mut R,
        target_position: u64,
    ) -> Result<()>
    where
        S: SourceReader + ?Sized,
        R: Read + ?Sized,
    {
        let source_length = source.source_len();
        if source_length == 0 {
            return Err(DeltaError::unsupported("source stream is empty"));
        }

        self.window.reset();
        let window_size = self.window_size;

        // Read the target past the largest possible source region first,
        // then slide it down once the source size is known.
        let target_len = source::read_up_to(target, &mut self.window.scratch_mut()[window_size..])?;
        if target_len == 0 {
            return Ok(());
        }

        let source_position = match source_length.checked_sub(target_position) {
            Some(rest) if rest >= target_len as u64 => target_position,
            _ => 0,
        };
        let source_size = (source_length - source_position).min(window_size as u64) as usize;

        self.window.set_geometry(source_size, target_len)?;
        self.window.source_position = source_position;

        let buffer = self.window.scratch_mut();
        buffer.copy_within(window_size..window_size + target_len, source_size);
        source::read_exact_at(source, source_position, &mut buffer[..source_size])?;
        Ok(())
    }

    /// Scan the loaded target and fill the window sections.
    pub fn process_window_buffer(&mut self) {
        let source_size = self.window.source_size;
        let (buffer, sections) = self.window.split_sections_mut();
        let total = buffer.len();
        let target_size = total - source_size;

        self.cache.reset();
        let mut writer = InstructionWriter::new(sections, &mut self.cache);

        if target_size == 0 {
            return;
        }
        if source_size == target_size && buffer[..source_size] == buffer[source_size..] {
            log::trace!("window identical to its source range");
            writer.copy(0, target_size as u64);
            return;
        }

        self.source_hash.reset(source_size);
        self.source_hash.populate(buffer, source_size);
        self.target_hash.reset(total);

        let key_size = self.target_hash.key_size();
        let source_key = self.source_hash.key_size();
        let mut pos = source_size;
        let mut add_start: Option<usize> = None;

        while total - pos >= key_size {
            if is_run(&buffer[pos..pos + key_size]) {
                flush_add(&mut writer, buffer, &mut add_start, pos);
                let byte = buffer[pos];
                let len = buffer[pos..].iter().take_while(|&&b| b == byte).count();
                writer.run(byte, len as u64);
                pos += len;
                continue;
            }

            let source_match = if total - pos >= source_key {
                let bucket = self.source_hash.bucket_at(buffer, pos);
                self.source_hash.find_match(buffer, bucket, pos, source_key)
            } else {
                None
            };

            let target_bucket = self.target_hash.bucket_at(buffer, pos);
            let found = source_match
                .or_else(|| self.target_hash.find_match(buffer, target_bucket, pos, key_size));

            match found {
                Some((addr, len)) => {
                    flush_add(&mut writer, buffer, &mut add_start, pos);
                    writer.copy(addr as u64, len as u64);
                    pos += len;
                }
                None => {
                    self.target_hash.add(target_bucket, pos);
                    add_start.get_or_insert(pos);
                    pos += 1;
                }
            }
        }

        add_start.get_or_insert(pos);
        flush_add(&mut writer, buffer, &mut add_start, total);
    }

    /// Write the current window record to `out`.
    pub fn write_window<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        self.window.write_record(out)
    }
}

fn flush_add(
    writer: &mut InstructionWriter<'_>,
    buffer: &[u8],
    add_start: &mut Option<usize>,
    pos: usize,
) {
    if let Some(start) = add_start.take() {
        writer.add(&buffer[start..pos]);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
