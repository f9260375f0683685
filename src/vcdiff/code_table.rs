// VCDIFF default code table (RFC 3284, Section 5.6).
//
// The table maps every instruction byte to one or two packed instructions.
// It is built at compile time and must match the published default table
// exactly. The lookup tables below it only steer how the encoder picks
// codes; a decoder depends on nothing but the table itself.

use std::ops::Range;

use super::address_cache::{MODE_COUNT, SAME_START};

/// Instruction types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstType {
    #[default]
    Noop,
    Add,
    Run,
    Copy,
}

/// Smallest COPY the table can express with an implicit size.
pub const MIN_COPY: u8 = 4;
/// Largest ADD with an implicit size.
pub const MAX_ADD_SIZE: u8 = 17;
/// Largest COPY with an implicit size.
pub const MAX_COPY_SIZE: u8 = 18;

const COPY_MODES: u8 = MODE_COUNT;
/// Codes per COPY mode in the single-instruction block (size 0, 4..=18).
const COPY_CODES_PER_MODE: u8 = 16;
const FIRST_COPY_CODE: u8 = 19;
const FIRST_ADD_COPY_CODE: u8 = 163;
const FIRST_COPY_ADD_CODE: u8 = 247;

/// ADD+COPY pairs: ADD sizes 1..=4, COPY sizes 4..=6 (NEAR/SELF/HERE) or 4 (SAME).
const ADD_COPY_MAX_ADD: u8 = 4;
const ADD_COPY_MAX_COPY_NEAR: u8 = 6;
const ADD_COPY_MAX_COPY_SAME: u8 = 4;
/// COPY+ADD pairs: COPY size 4, ADD size 1.
const COPY_ADD_MAX_COPY: u8 = 4;
const COPY_ADD_MAX_ADD: u8 = 1;

/// One entry of the code table: up to two `(type, size, mode)` triples.
/// A size of 0 means the size follows as a varint in the instruction section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeTableEntry {
    pub type1: InstType,
    pub size1: u8,
    pub mode1: u8,
    pub type2: InstType,
    pub size2: u8,
    pub mode2: u8,
}

impl CodeTableEntry {
    const NOOP: Self = Self {
        type1: InstType::Noop,
        size1: 0,
        mode1: 0,
        type2: InstType::Noop,
        size2: 0,
        mode2: 0,
    };

    const fn single(ty: InstType, size: u8, mode: u8) -> Self {
        Self {
            type1: ty,
            size1: size,
            mode1: mode,
            ..Self::NOOP
        }
    }

    const fn double(first: (InstType, u8, u8), second: (InstType, u8, u8)) -> Self {
        Self {
            type1: first.0,
            size1: first.1,
            mode1: first.2,
            type2: second.0,
            size2: second.1,
            mode2: second.2,
        }
    }

    /// Whether this entry packs a single instruction matching the triple.
    #[inline]
    pub fn is_single(&self, ty: InstType, size: u8, mode: u8) -> bool {
        self.type2 == InstType::Noop && self.type1 == ty && self.size1 == size && self.mode1 == mode
    }
}

/// The complete 256-entry code table.
pub type CodeTable = [CodeTableEntry; 256];

/// The RFC 3284 default code table.
pub static DEFAULT_CODE_TABLE: CodeTable = build_default_code_table();

const fn build_default_code_table() -> CodeTable {
    use InstType::{Add, Copy, Run};

    let mut tbl = [CodeTableEntry::NOOP; 256];
    let mut idx = 0usize;

    tbl[idx] = CodeTableEntry::single(Run, 0, 0);
    idx += 1;

    // ADD size 0, then 1..=17.
    let mut size = 0u8;
    while size <= MAX_ADD_SIZE {
        tbl[idx] = CodeTableEntry::single(Add, size, 0);
        idx += 1;
        size += 1;
    }

    // COPY per mode: size 0, then 4..=18.
    let mut mode = 0u8;
    while mode < COPY_MODES {
        tbl[idx] = CodeTableEntry::single(Copy, 0, mode);
        idx += 1;
        let mut size = MIN_COPY;
        while size <= MAX_COPY_SIZE {
            tbl[idx] = CodeTableEntry::single(Copy, size, mode);
            idx += 1;
            size += 1;
        }
        mode += 1;
    }

    // ADD+COPY.
    let mut mode = 0u8;
    while mode < COPY_MODES {
        let max_copy = add_copy_max_copy(mode);
        let mut add = 1u8;
        while add <= ADD_COPY_MAX_ADD {
            let mut copy = MIN_COPY;
            while copy <= max_copy {
                tbl[idx] = CodeTableEntry::double((Add, add, 0), (Copy, copy, mode));
                idx += 1;
                copy += 1;
            }
            add += 1;
        }
        mode += 1;
    }

    // COPY+ADD.
    let mut mode = 0u8;
    while mode < COPY_MODES {
        let mut copy = MIN_COPY;
        while copy <= COPY_ADD_MAX_COPY {
            let mut add = 1u8;
            while add <= COPY_ADD_MAX_ADD {
                tbl[idx] = CodeTableEntry::double((Copy, copy, mode), (Add, add, 0));
                idx += 1;
                add += 1;
            }
            copy += 1;
        }
        mode += 1;
    }

    assert!(idx == 256);
    tbl
}

const fn add_copy_max_copy(mode: u8) -> u8 {
    if mode < SAME_START {
        ADD_COPY_MAX_COPY_NEAR
    } else {
        ADD_COPY_MAX_COPY_SAME
    }
}

// ---------------------------------------------------------------------------
// Encoder lookup tables
// ---------------------------------------------------------------------------

/// Codes under which an instruction pair may share one byte, with the size
/// limits each half must respect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairRange {
    pub start: u8,
    pub len: u8,
    pub max_size1: u8,
    pub max_size2: u8,
}

impl PairRange {
    pub fn codes(&self) -> Range<usize> {
        let start = usize::from(self.start);
        start..start + usize::from(self.len)
    }
}

/// ADD followed by a COPY of mode `m`: `ADD_COPY_PAIRS[m]`.
pub static ADD_COPY_PAIRS: [PairRange; COPY_MODES as usize] = build_add_copy_pairs();
/// COPY of mode `m` followed by an ADD: `COPY_ADD_PAIRS[m]`.
pub static COPY_ADD_PAIRS: [PairRange; COPY_MODES as usize] = build_copy_add_pairs();

const fn build_add_copy_pairs() -> [PairRange; COPY_MODES as usize] {
    let empty = PairRange {
        start: 0,
        len: 0,
        max_size1: 0,
        max_size2: 0,
    };
    let mut out = [empty; COPY_MODES as usize];
    let mut start = FIRST_ADD_COPY_CODE;
    let mut mode = 0u8;
    while mode < COPY_MODES {
        let max_copy = add_copy_max_copy(mode);
        let len = ADD_COPY_MAX_ADD * (max_copy - MIN_COPY + 1);
        out[mode as usize] = PairRange {
            start,
            len,
            max_size1: ADD_COPY_MAX_ADD,
            max_size2: max_copy,
        };
        start += len;
        mode += 1;
    }
    out
}

const fn build_copy_add_pairs() -> [PairRange; COPY_MODES as usize] {
    let empty = PairRange {
        start: 0,
        len: 0,
        max_size1: 0,
        max_size2: 0,
    };
    let mut out = [empty; COPY_MODES as usize];
    let len = (COPY_ADD_MAX_COPY - MIN_COPY + 1) * COPY_ADD_MAX_ADD;
    let mut mode = 0u8;
    while mode < COPY_MODES {
        out[mode as usize] = PairRange {
            start: FIRST_COPY_ADD_CODE + mode * len,
            len,
            max_size1: COPY_ADD_MAX_COPY,
            max_size2: COPY_ADD_MAX_ADD,
        };
        mode += 1;
    }
    out
}

/// Largest size `ty` can carry implicitly in a single-instruction code.
pub const fn max_table_size(ty: InstType) -> u8 {
    match ty {
        InstType::Add => MAX_ADD_SIZE,
        InstType::Copy => MAX_COPY_SIZE,
        InstType::Run | InstType::Noop => 0,
    }
}

/// Codes holding single instructions of `ty`/`mode` with an implicit size.
pub fn single_range(ty: InstType, mode: u8) -> Range<usize> {
    match ty {
        InstType::Add => 2..2 + usize::from(MAX_ADD_SIZE),
        InstType::Copy => {
            let base = usize::from(FIRST_COPY_CODE + COPY_CODES_PER_MODE * mode) + 1;
            base..base + usize::from(COPY_CODES_PER_MODE - 1)
        }
        InstType::Run | InstType::Noop => 0..0,
    }
}

/// The size-0 code for `ty`/`mode`; the real size follows as a varint.
pub const fn generic_code(ty: InstType, mode: u8) -> u8 {
    match ty {
        InstType::Run | InstType::Noop => 0,
        InstType::Add => 1,
        InstType::Copy => FIRST_COPY_CODE + COPY_CODES_PER_MODE * mode,
    }
}

/// Code range and limits for pairing `first` with a following `second`.
pub fn pair_range(
    first: InstType,
    first_mode: u8,
    second: InstType,
    second_mode: u8,
) -> Option<PairRange> {
    let range = match (first, second) {
        (InstType::Add, InstType::Copy) => ADD_COPY_PAIRS[usize::from(second_mode)],
        (InstType::Copy, InstType::Add) => COPY_ADD_PAIRS[usize::from(first_mode)],
        _ => return None,
    };
    Some(range)
}

// ---------------------------------------------------------------------------
// Decoded instruction (inspection API)
// ---------------------------------------------------------------------------

/// A resolved instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Append `len` literal bytes from the add/run section.
    Add { len: u64 },
    /// Copy `len` bytes from `addr` in the window buffer.
    Copy { len: u64, addr: u64, mode: u8 },
    /// Repeat one add/run byte `len` times.
    Run { len: u64 },
}

impl Instruction {
    /// Number of target bytes the instruction produces.
    pub fn len(&self) -> u64 {
        match *self {
            Self::Add { len } | Self::Copy { len, .. } | Self::Run { len } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use InstType::{Add, Copy, Noop, Run};

    fn t() -> &'static CodeTable {
        &DEFAULT_CODE_TABLE
    }

    #[test]
    fn index_0_is_run() {
        assert!(t()[0].is_single(Run, 0, 0));
    }

    #[test]
    fn indices_1_to_18_are_add() {
        for (i, size) in (1..=18).zip(0..=17u8) {
            assert!(t()[i].is_single(Add, size, 0), "index {i}");
        }
    }

    #[test]
    fn copy_blocks_are_sixteen_wide() {
        assert!(t()[19].is_single(Copy, 0, 0));
        assert!(t()[20].is_single(Copy, 4, 0));
        assert!(t()[34].is_single(Copy, 18, 0));
        assert!(t()[35].is_single(Copy, 0, 1));
        assert!(t()[147].is_single(Copy, 0, 8));
        assert!(t()[162].is_single(Copy, 18, 8));
    }

    #[test]
    fn add_copy_doubles() {
        let e = t()[163];
        assert_eq!((e.type1, e.size1, e.type2, e.size2, e.mode2), (Add, 1, Copy, 4, 0));
        let e = t()[166];
        assert_eq!((e.size1, e.size2), (2, 4));
        let e = t()[234];
        assert_eq!((e.type1, e.size1, e.type2, e.size2, e.mode2), (Add, 4, Copy, 6, 5));
        let e = t()[235];
        assert_eq!((e.type1, e.size1, e.type2, e.size2, e.mode2), (Add, 1, Copy, 4, 6));
        let e = t()[246];
        assert_eq!((e.type1, e.size1, e.type2, e.size2, e.mode2), (Add, 4, Copy, 4, 8));
    }

    #[test]
    fn copy_add_doubles() {
        let e = t()[247];
        assert_eq!((e.type1, e.size1, e.mode1, e.type2, e.size2), (Copy, 4, 0, Add, 1));
        let e = t()[255];
        assert_eq!((e.type1, e.size1, e.mode1, e.type2, e.size2), (Copy, 4, 8, Add, 1));
    }

    #[test]
    fn doubles_never_carry_size_zero() {
        for (i, e) in t().iter().enumerate() {
            if e.type2 != Noop {
                assert_ne!(e.size1, 0, "code {i}");
                assert_ne!(e.size2, 0, "code {i}");
            }
        }
    }

    #[test]
    fn single_ranges_match_the_table() {
        for size in 1..=MAX_ADD_SIZE {
            let hit = single_range(Add, 0).find(|&c| t()[c].is_single(Add, size, 0));
            assert_eq!(hit, Some(1 + usize::from(size)));
        }
        for mode in 0..COPY_MODES {
            for size in MIN_COPY..=MAX_COPY_SIZE {
                let hit = single_range(Copy, mode).find(|&c| t()[c].is_single(Copy, size, mode));
                assert!(hit.is_some(), "mode {mode} size {size}");
            }
        }
        assert!(single_range(Run, 0).is_empty());
    }

    #[test]
    fn generic_codes_have_size_zero() {
        assert!(t()[usize::from(generic_code(Run, 0))].is_single(Run, 0, 0));
        assert!(t()[usize::from(generic_code(Add, 0))].is_single(Add, 0, 0));
        for mode in 0..COPY_MODES {
            assert!(t()[usize::from(generic_code(Copy, mode))].is_single(Copy, 0, mode));
        }
    }

    #[test]
    fn pair_ranges_cover_exactly_their_doubles() {
        for mode in 0..COPY_MODES {
            let r = ADD_COPY_PAIRS[usize::from(mode)];
            for code in r.codes() {
                let e = t()[code];
                assert_eq!((e.type1, e.type2, e.mode2), (Add, Copy, mode), "code {code}");
                assert!(e.size1 <= r.max_size1 && e.size2 <= r.max_size2);
            }
            let r = COPY_ADD_PAIRS[usize::from(mode)];
            assert_eq!(r.codes().len(), 1);
            let e = t()[r.codes().start];
            assert_eq!((e.type1, e.mode1, e.type2), (Copy, mode, Add));
        }
        assert_eq!(ADD_COPY_PAIRS[0].codes(), 163..175);
        assert_eq!(ADD_COPY_PAIRS[6].codes(), 235..239);
    }
}
