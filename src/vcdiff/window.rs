// One VCDIFF window: the source+target buffer and the three delta sections.
//
// A window is allocated once per session and reset before every window it
// carries, so the buffers grow to the largest window seen and are reused.

use std::io::{Read, Write};

use super::header::{DeltaIndicator, WindowHeader};
use super::varint;
use crate::error::{DeltaError, Result};

/// Buffer and sections for the window currently being encoded or decoded.
///
/// The buffer holds `source_size` source bytes followed by
/// `target_window_size` target bytes; COPY addresses index into it.
pub struct Window {
    pub source_size: usize,
    pub source_position: u64,
    pub target_window_size: usize,
    max_size: usize,
    buffer: Vec<u8>,
    pub add_run_data: Vec<u8>,
    pub instr_data: Vec<u8>,
    pub copy_addr_data: Vec<u8>,
}

/// Borrowed delta sections of a window.
#[derive(Clone, Copy)]
pub struct Sections<'a> {
    pub add_run: &'a [u8],
    pub instr: &'a [u8],
    pub copy_addr: &'a [u8],
}

/// Mutably borrowed delta sections of a window.
pub struct SectionsMut<'a> {
    pub add_run: &'a mut Vec<u8>,
    pub instr: &'a mut Vec<u8>,
    pub copy_addr: &'a mut Vec<u8>,
}

impl Window {
    /// Create a window that can hold up to `max_size` source+target bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            source_size: 0,
            source_position: 0,
            target_window_size: 0,
            max_size,
            buffer: Vec::new(),
            add_run_data: Vec::new(),
            instr_data: Vec::new(),
            copy_addr_data: Vec::new(),
        }
    }

    /// Clear geometry and sections, keeping allocations.
    pub fn reset(&mut self) {
        self.source_size = 0;
        self.source_position = 0;
        self.target_window_size = 0;
        self.add_run_data.clear();
        self.instr_data.clear();
        self.copy_addr_data.clear();
    }

    /// `source_size + target_window_size`.
    #[inline]
    pub fn len(&self) -> usize {
        self.source_size + self.target_window_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set the window geometry and make the buffer large enough for it.
    pub fn set_geometry(&mut self, source_size: usize, target_window_size: usize) -> Result<()> {
        let total = source_size
            .checked_add(target_window_size)
            .ok_or(DeltaError::IntegerOverflow)?;
        if total > self.max_size {
            return Err(DeltaError::unsupported(format!(
                "window of {total} bytes exceeds the maximum of {}",
                self.max_size
            )));
        }
        if self.buffer.len() < total {
            self.buffer.resize(total, 0);
        }
        self.source_size = source_size;
        self.target_window_size = target_window_size;
        Ok(())
    }

    /// The loaded source+target bytes.
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer[..self.len()]
    }

    /// The whole buffer at its maximum size, regardless of the geometry.
    pub fn scratch_mut(&mut self) -> &mut [u8] {
        if self.buffer.len() < self.max_size {
            self.buffer.resize(self.max_size, 0);
        }
        &mut self.buffer[..self.max_size]
    }

    pub fn source(&self) -> &[u8] {
        &self.buffer[..self.source_size]
    }

    pub fn target(&self) -> &[u8] {
        &self.buffer[self.source_size..self.len()]
    }

    /// Loaded bytes alongside writable sections, for the encoder.
    pub fn split_sections_mut(&mut self) -> (&[u8], SectionsMut<'_>) {
        let len = self.len();
        (
            &self.buffer[..len],
            SectionsMut {
                add_run: &mut self.add_run_data,
                instr: &mut self.instr_data,
                copy_addr: &mut self.copy_addr_data,
            },
        )
    }

    /// Writable buffer alongside the sections, for the decoder.
    pub fn split_buffer_mut(&mut self) -> (&mut [u8], Sections<'_>) {
        let len = self.len();
        (
            &mut self.buffer[..len],
            Sections {
                add_run: &self.add_run_data,
                instr: &self.instr_data,
                copy_addr: &self.copy_addr_data,
            },
        )
    }

    /// Presence flags for the three sections.
    pub fn delta_indicator(&self) -> DeltaIndicator {
        let mut ind = DeltaIndicator::empty();
        ind.set(DeltaIndicator::ADD_RUN, !self.add_run_data.is_empty());
        ind.set(DeltaIndicator::INSTR, !self.instr_data.is_empty());
        ind.set(DeltaIndicator::COPY_ADDR, !self.copy_addr_data.is_empty());
        ind
    }

    /// Record header describing the current window.
    pub fn header(&self) -> WindowHeader {
        let mut hdr = WindowHeader {
            source_size: self.source_size as u64,
            source_position: self.source_position,
            delta_length: 0,
            target_window_size: self.target_window_size as u64,
            delta_indicator: self.delta_indicator(),
            add_run_length: self.add_run_data.len() as u64,
            instr_length: self.instr_data.len() as u64,
            copy_addr_length: self.copy_addr_data.len() as u64,
        };
        hdr.delta_length = hdr.compute_delta_length();
        hdr
    }

    /// Write the window record: header, then the three sections.
    pub fn write_record<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        self.header().write(w)?;
        w.write_all(&self.add_run_data)?;
        w.write_all(&self.instr_data)?;
        w.write_all(&self.copy_addr_data)?;
        Ok(())
    }

    /// Adopt the geometry of `hdr` and read its three sections from `r`.
    pub fn read_sections<R: Read + ?Sized>(&mut self, hdr: &WindowHeader, r: &mut R) -> Result<()> {
        self.reset();
        self.set_geometry(
            varint::to_usize(hdr.source_size)?,
            varint::to_usize(hdr.target_window_size)?,
        )?;
        self.source_position = hdr.source_position;
        read_section(r, hdr.add_run_length, &mut self.add_run_data)?;
        read_section(r, hdr.instr_length, &mut self.instr_data)?;
        read_section(r, hdr.copy_addr_length, &mut self.copy_addr_data)?;
        Ok(())
    }
}

/// Read exactly `len` bytes; lengths come from untrusted input, so the
/// buffer only grows as bytes actually arrive.
pub fn read_section<R: Read + ?Sized>(r: &mut R, len: u64, out: &mut Vec<u8>) -> Result<()> {
    out.clear();
    let got = r.take(len).read_to_end(out)?;
    if got as u64 != len {
        return Err(DeltaError::IncompleteRead);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
