// VCDIFF address cache (RFC 3284, Section 5.3).
//
// The NEAR ring and the SAME table predict COPY addresses. The encoder
// updates the cache as it emits each COPY and the decoder as it applies
// each COPY, in the same order, so both sides always hold the same state.

use super::varint;
use crate::error::{DeltaError, Result};

/// Absolute address.
pub const VCD_SELF: u8 = 0;
/// Address relative to the current position.
pub const VCD_HERE: u8 = 1;

/// Number of NEAR slots.
pub const NEAR_SIZE: usize = 4;
/// Number of 256-entry SAME groups.
pub const SAME_SIZE: usize = 3;

const SAME_ENTRIES: usize = SAME_SIZE * 256;
const NEAR_RANGE: u64 = 128;

/// First SAME mode.
pub const SAME_START: u8 = 2 + NEAR_SIZE as u8;
/// Total number of address modes.
pub const MODE_COUNT: u8 = SAME_START + SAME_SIZE as u8;

/// How a COPY address is carried in the copy-address section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedAddr {
    /// Varint (SELF, HERE and NEAR modes).
    VarInt(u64),
    /// One raw byte (SAME modes).
    Byte(u8),
}

impl EncodedAddr {
    pub fn write_to(self, out: &mut Vec<u8>) {
        match self {
            Self::VarInt(v) => varint::encode(v, out),
            Self::Byte(b) => out.push(b),
        }
    }
}

/// NEAR/SAME address cache with the default sizes (4 and 3).
#[derive(Clone)]
pub struct AddressCache {
    near: [u64; NEAR_SIZE],
    same: [u64; SAME_ENTRIES],
    next_slot: usize,
}

impl AddressCache {
    pub fn new() -> Self {
        Self {
            near: [0; NEAR_SIZE],
            same: [0; SAME_ENTRIES],
            next_slot: 0,
        }
    }

    /// Reset to the all-zero state every window starts from.
    pub fn reset(&mut self) {
        self.near = [0; NEAR_SIZE];
        self.same.fill(0);
        self.next_slot = 0;
    }

    /// Record `addr` as the most recent COPY address.
    #[inline]
    pub fn update(&mut self, addr: u64) {
        self.near[self.next_slot] = addr;
        self.next_slot = (self.next_slot + 1) % NEAR_SIZE;
        self.same[(addr % SAME_ENTRIES as u64) as usize] = addr;
    }

    /// Find a cache mode that can express `addr`.
    ///
    /// SAME is tried first, then the NEAR slots in order. `None` means the
    /// address must be written absolutely with mode `VCD_SELF`.
    pub fn check(&self, addr: u64) -> Option<(u8, EncodedAddr)> {
        let idx = (addr % SAME_ENTRIES as u64) as usize;
        if self.same[idx] == addr {
            let mode = SAME_START + (idx / 256) as u8;
            return Some((mode, EncodedAddr::Byte((addr % 256) as u8)));
        }
        self.near.iter().enumerate().find_map(|(i, &near)| {
            addr.checked_sub(near)
                .filter(|&d| d < NEAR_RANGE)
                .map(|d| (2 + i as u8, EncodedAddr::VarInt(d)))
        })
    }

    /// Choose the encoding for `addr` and update the cache.
    pub fn encode(&mut self, addr: u64) -> (u8, EncodedAddr) {
        let chosen = self
            .check(addr)
            .unwrap_or((VCD_SELF, EncodedAddr::VarInt(addr)));
        self.update(addr);
        chosen
    }

    /// Resolve a COPY address for `mode` from the copy-address section.
    ///
    /// `pos` is advanced past the consumed bytes and `here` is the current
    /// buffer position. The resolved address must lie before `here`.
    pub fn decode(
        &mut self,
        mode: u8,
        addr_data: &[u8],
        pos: &mut usize,
        here: u64,
    ) -> Result<u64> {
        let addr = if mode < SAME_START {
            let start = *pos;
            let raw = varint::decode(addr_data, pos).map_err(|e| match e {
                DeltaError::NumberEncoding if varint::is_truncated(&addr_data[start..]) => {
                    DeltaError::invalid("copy-address section overrun")
                }
                other => other,
            })?;
            match mode {
                VCD_SELF => raw,
                VCD_HERE => here
                    .checked_sub(raw)
                    .ok_or_else(|| DeltaError::invalid("HERE address before buffer start"))?,
                _ => self.near[usize::from(mode - 2)]
                    .checked_add(raw)
                    .ok_or(DeltaError::IntegerOverflow)?,
            }
        } else if mode < MODE_COUNT {
            let &byte = addr_data
                .get(*pos)
                .ok_or_else(|| DeltaError::invalid("copy-address section overrun"))?;
            *pos += 1;
            self.same[usize::from(mode - SAME_START) * 256 + usize::from(byte)]
        } else {
            return Err(DeltaError::invalid(format!("unknown address mode {mode}")));
        };

        if addr >= here {
            return Err(DeltaError::invalid(format!(
                "COPY address {addr} is not before position {here}"
            )));
        }
        self.update(addr);
        Ok(addr)
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
