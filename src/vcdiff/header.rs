// VCDIFF file header and per-window record (RFC 3284, Section 4).

use std::io::{self, Read, Write};

use bitflags::bitflags;

use super::varint;
use crate::error::{DeltaError, Result};

/// Magic bytes followed by the version byte (0).
pub const VCDIFF_MAGIC: [u8; 4] = [0xD6, 0xC3, 0xC4, 0x00];

bitflags! {
    /// Header indicator byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderIndicator: u8 {
        const SECONDARY = 1 << 0;
        const CODETABLE = 1 << 1;
        const APPHEADER = 1 << 2;
    }
}

bitflags! {
    /// Window indicator byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowIndicator: u8 {
        const SOURCE = 1 << 0;
        const TARGET = 1 << 1;
    }
}

bitflags! {
    /// Delta indicator byte: which sections carry data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeltaIndicator: u8 {
        const ADD_RUN = 1 << 0;
        const INSTR = 1 << 1;
        const COPY_ADDR = 1 << 2;
    }
}

// ---------------------------------------------------------------------------
// File header
// ---------------------------------------------------------------------------

/// Parsed VCDIFF file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub indicator: HeaderIndicator,
    /// Application-defined header data.
    pub app_header: Option<Vec<u8>>,
}

impl FileHeader {
    /// Header carrying an application-defined payload.
    pub fn with_app_header(data: Vec<u8>) -> Self {
        Self {
            indicator: HeaderIndicator::APPHEADER,
            app_header: Some(data),
        }
    }

    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_all(&VCDIFF_MAGIC)?;
        w.write_all(&[self.indicator.bits()])?;
        if self.indicator.contains(HeaderIndicator::APPHEADER) {
            let data = self.app_header.as_deref().unwrap_or_default();
            varint::write_varint(w, data.len() as u64)?;
            w.write_all(data)?;
        }
        Ok(())
    }

    pub fn read<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic[..3] != VCDIFF_MAGIC[..3] {
            return Err(DeltaError::invalid(format!(
                "bad magic {:02X} {:02X} {:02X}",
                magic[0], magic[1], magic[2]
            )));
        }
        if magic[3] != 0 {
            return Err(DeltaError::unsupported(format!(
                "VCDIFF version {:#04X}",
                magic[3]
            )));
        }

        let bits = read_byte(r)?;
        let indicator = HeaderIndicator::from_bits(bits).ok_or_else(|| {
            DeltaError::invalid(format!("unknown header indicator bits {bits:#04X}"))
        })?;
        if indicator.contains(HeaderIndicator::SECONDARY) {
            return Err(DeltaError::unsupported("secondary compression"));
        }
        if indicator.contains(HeaderIndicator::CODETABLE) {
            return Err(DeltaError::unsupported("application-defined code table"));
        }

        let app_header = if indicator.contains(HeaderIndicator::APPHEADER) {
            let len = varint::to_usize(varint::read_varint(r)?)?;
            let mut data = Vec::new();
            r.take(len as u64).read_to_end(&mut data)?;
            if data.len() != len {
                return Err(DeltaError::IncompleteRead);
            }
            Some(data)
        } else {
            None
        };

        Ok(Self {
            indicator,
            app_header,
        })
    }
}

// ---------------------------------------------------------------------------
// Window record header
// ---------------------------------------------------------------------------

/// Fixed fields of one window record, everything before the three sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowHeader {
    pub source_size: u64,
    pub source_position: u64,
    pub delta_length: u64,
    pub target_window_size: u64,
    pub delta_indicator: DeltaIndicator,
    pub add_run_length: u64,
    pub instr_length: u64,
    pub copy_addr_length: u64,
}

impl WindowHeader {
    /// Length of everything following the `delta_length` field.
    pub fn compute_delta_length(&self) -> u64 {
        varint::encoded_len(self.target_window_size) as u64
            + 1
            + varint::encoded_len(self.add_run_length) as u64
            + varint::encoded_len(self.instr_length) as u64
            + varint::encoded_len(self.copy_addr_length) as u64
            + self.add_run_length
            + self.instr_length
            + self.copy_addr_length
    }

    /// Write the record header. Always a source-window record.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_all(&[WindowIndicator::SOURCE.bits()])?;
        varint::write_varint(w, self.source_size)?;
        varint::write_varint(w, self.source_position)?;
        varint::write_varint(w, self.compute_delta_length())?;
        varint::write_varint(w, self.target_window_size)?;
        w.write_all(&[self.delta_indicator.bits()])?;
        varint::write_varint(w, self.add_run_length)?;
        varint::write_varint(w, self.instr_length)?;
        varint::write_varint(w, self.copy_addr_length)?;
        Ok(())
    }

    /// Read the next record header.
    ///
    /// Returns `None` when the stream ends cleanly before a record starts.
    /// `max_window_size` bounds `source_size + target_window_size`.
    pub fn read<R: Read + ?Sized>(r: &mut R, max_window_size: u64) -> Result<Option<Self>> {
        let mut first = [0u8; 1];
        loop {
            match r.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let bits = first[0];
        let indicator = WindowIndicator::from_bits(bits).ok_or_else(|| {
            DeltaError::invalid(format!("unknown window indicator bits {bits:#04X}"))
        })?;
        if indicator.contains(WindowIndicator::TARGET) {
            return Err(DeltaError::unsupported("target-window copies"));
        }
        if !indicator.contains(WindowIndicator::SOURCE) {
            return Err(DeltaError::unsupported("window without a source segment"));
        }

        let source_size = varint::read_varint(r)?;
        let source_position = varint::read_varint(r)?;
        let delta_length = varint::read_varint(r)?;
        let target_window_size = varint::read_varint(r)?;

        let total = source_size
            .checked_add(target_window_size)
            .ok_or(DeltaError::IntegerOverflow)?;
        if total > max_window_size {
            return Err(DeltaError::unsupported(format!(
                "window of {total} bytes exceeds the maximum of {max_window_size}"
            )));
        }

        let bits = read_byte(r)?;
        let delta_indicator = DeltaIndicator::from_bits(bits).ok_or_else(|| {
            DeltaError::invalid(format!("unknown delta indicator bits {bits:#04X}"))
        })?;

        let hdr = Self {
            source_size,
            source_position,
            delta_length,
            target_window_size,
            delta_indicator,
            add_run_length: varint::read_varint(r)?,
            instr_length: varint::read_varint(r)?,
            copy_addr_length: varint::read_varint(r)?,
        };

        let expected = hdr.compute_delta_length();
        if expected != delta_length {
            log::warn!("window delta_length is {delta_length}, sections add up to {expected}");
        }

        Ok(Some(hdr))
    }
}

fn read_byte<R: Read + ?Sized>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
