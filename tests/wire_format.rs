//! Byte-level checks of the delta format: exact encoder output, hand-built
//! deltas, and the error each kind of malformed input must produce.

use vcdelta::vcdiff::header::WindowHeader;
use vcdelta::{DeltaError, DeltaOptions, deltify_buffers, undeltify_buffers};

const HEADER: [u8; 5] = [0xD6, 0xC3, 0xC4, 0x00, 0x00];

/// A delta made of the plain file header followed by `records`.
fn delta(records: &[&[u8]]) -> Vec<u8> {
    let mut out = HEADER.to_vec();
    for r in records {
        out.extend_from_slice(r);
    }
    out
}

fn decode(source: &[u8], delta: &[u8]) -> vcdelta::Result<Vec<u8>> {
    undeltify_buffers(source, delta, &DeltaOptions::default())
}

// ADD "XY", then COPY 4 bytes from source address 2 (mode 0).
const ADD_COPY_WINDOW: &[u8] = &[
    0x01, 0x08, 0x00, 0x0A, 0x06, 0x07, 0x02, 0x02, 0x01, b'X', b'Y', 0x03, 0x14, 0x02,
];

// ---------------------------------------------------------------------------
// Encoder output
// ---------------------------------------------------------------------------

#[test]
fn identical_window_encodes_as_one_copy() {
    let data = b"abcdefgh";
    let out = deltify_buffers(data, data, &DeltaOptions::default()).unwrap();
    // COPY size 8 in SAME mode 6 (code 120), address byte 0.
    let expected = delta(&[&[0x01, 0x08, 0x00, 0x07, 0x08, 0x06, 0x00, 0x01, 0x01, 0x78, 0x00]]);
    assert_eq!(out, expected);
    assert_eq!(decode(data, &out).unwrap(), data);
}

#[test]
fn empty_target_is_header_only() {
    let out = deltify_buffers(b"source", b"", &DeltaOptions::default()).unwrap();
    assert_eq!(out, HEADER);
}

#[test]
fn app_header_is_written_after_indicator() {
    let opts = DeltaOptions::default().app_header(&b"rev"[..]);
    let out = deltify_buffers(b"source", b"", &opts).unwrap();
    assert_eq!(out, [0xD6, 0xC3, 0xC4, 0x00, 0x04, 0x03, b'r', b'e', b'v']);
    assert!(undeltify_buffers(b"source", &out, &opts).unwrap().is_empty());
}

#[test]
fn encoder_output_is_deterministic() {
    let source: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 253) as u8).collect();
    let mut target = source.clone();
    target.splice(1000..1010, b"inserted!!!".iter().copied());
    let opts = DeltaOptions::with_window_size(2048).unwrap();
    let a = deltify_buffers(&source, &target, &opts).unwrap();
    let b = deltify_buffers(&source, &target, &opts).unwrap();
    assert_eq!(a, b);
}

// ---------------------------------------------------------------------------
// Hand-built deltas
// ---------------------------------------------------------------------------

#[test]
fn add_then_copy_from_source() {
    let out = decode(b"abcdefgh", &delta(&[ADD_COPY_WINDOW])).unwrap();
    assert_eq!(out, b"XYcdef");
}

#[test]
fn here_mode_address_counts_back_from_position() {
    // COPY size 4 in HERE mode (code 36): address = 10 - 8 = 2.
    let window = [
        0x01, 0x08, 0x00, 0x0A, 0x06, 0x07, 0x02, 0x02, 0x01, b'X', b'Y', 0x03, 0x24, 0x08,
    ];
    assert_eq!(decode(b"abcdefgh", &delta(&[&window])).unwrap(), b"XYcdef");
}

#[test]
fn copy_may_overlap_its_own_output() {
    // No source; ADD "ab", then COPY 6 from target address 0 (mode 0, code 22).
    let window = [
        0x01, 0x00, 0x00, 0x0A, 0x08, 0x07, 0x02, 0x02, 0x01, b'a', b'b', 0x03, 0x16, 0x00,
    ];
    assert_eq!(decode(b"", &delta(&[&window])).unwrap(), b"abababab");
}

#[test]
fn windows_are_concatenated_in_order() {
    let run = [0x01, 0x00, 0x00, 0x08, 0x03, 0x03, 0x01, 0x02, 0x00, b'z', 0x00, 0x03];
    let out = decode(b"abcdefgh", &delta(&[ADD_COPY_WINDOW, &run])).unwrap();
    assert_eq!(out, b"XYcdefzzz");
}

#[test]
fn delta_length_mismatch_is_tolerated() {
    let mut window = ADD_COPY_WINDOW.to_vec();
    window[3] = 0x7F;
    assert_eq!(decode(b"abcdefgh", &delta(&[&window])).unwrap(), b"XYcdef");
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

#[test]
fn bad_magic_is_invalid() {
    let mut d = delta(&[ADD_COPY_WINDOW]);
    d[1] = 0x00;
    assert!(matches!(decode(b"abcdefgh", &d), Err(DeltaError::InvalidFormat(_))));
}

#[test]
fn nonzero_version_is_unsupported() {
    let mut d = delta(&[]);
    d[3] = 0x01;
    assert!(matches!(decode(b"", &d), Err(DeltaError::Unsupported(_))));
}

#[test]
fn header_indicator_bits() {
    for (bits, unsupported) in [(0x01u8, true), (0x02, true), (0x08, false)] {
        let mut d = delta(&[]);
        d[4] = bits;
        match decode(b"", &d) {
            Err(DeltaError::Unsupported(_)) => assert!(unsupported, "bits {bits:#04X}"),
            Err(DeltaError::InvalidFormat(_)) => assert!(!unsupported, "bits {bits:#04X}"),
            other => panic!("bits {bits:#04X}: unexpected {other:?}"),
        }
    }
}

#[test]
fn window_indicator_bits() {
    for (bits, unsupported) in [(0x00u8, true), (0x02, true), (0x03, true), (0x05, false)] {
        let mut window = ADD_COPY_WINDOW.to_vec();
        window[0] = bits;
        match decode(b"abcdefgh", &delta(&[&window])) {
            Err(DeltaError::Unsupported(_)) => assert!(unsupported, "bits {bits:#04X}"),
            Err(DeltaError::InvalidFormat(_)) => assert!(!unsupported, "bits {bits:#04X}"),
            other => panic!("bits {bits:#04X}: unexpected {other:?}"),
        }
    }
}

#[test]
fn unknown_delta_indicator_bits_are_invalid() {
    let mut window = ADD_COPY_WINDOW.to_vec();
    window[5] = 0x0F;
    let err = decode(b"abcdefgh", &delta(&[&window])).unwrap_err();
    assert!(matches!(err, DeltaError::InvalidFormat(_)));
}

#[test]
fn truncation_is_incomplete_read() {
    let full = delta(&[ADD_COPY_WINDOW]);
    // Cuts inside the record header and inside the sections.
    for cut in [HEADER.len() + 1, HEADER.len() + 4, full.len() - 1] {
        let err = decode(b"abcdefgh", &full[..cut]).unwrap_err();
        assert!(matches!(err, DeltaError::IncompleteRead), "cut at {cut}: {err:?}");
    }
    let err = decode(b"", &full[..3]).unwrap_err();
    assert!(matches!(err, DeltaError::IncompleteRead));
}

#[test]
fn truncated_instruction_section_is_invalid() {
    // Generic ADD code whose varint size stops mid-number.
    let window = [0x01, 0x00, 0x00, 0x09, 0x02, 0x03, 0x02, 0x02, 0x00, b'X', b'Y', 0x01, 0x81];
    let err = decode(b"", &delta(&[&window])).unwrap_err();
    assert!(matches!(err, DeltaError::InvalidFormat(_)));
}

#[test]
fn missing_copy_address_is_invalid() {
    let window = [0x01, 0x08, 0x00, 0x06, 0x04, 0x02, 0x00, 0x01, 0x00, 0x14];
    let err = decode(b"abcdefgh", &delta(&[&window])).unwrap_err();
    assert!(matches!(err, DeltaError::InvalidFormat(_)));
}

#[test]
fn copy_address_at_or_past_position_is_invalid() {
    let window = [0x01, 0x08, 0x00, 0x07, 0x04, 0x06, 0x00, 0x01, 0x01, 0x14, 0x08];
    let err = decode(b"abcdefgh", &delta(&[&window])).unwrap_err();
    assert!(matches!(err, DeltaError::InvalidFormat(_)));
}

#[test]
fn short_window_output_is_invalid() {
    // Declares 5 target bytes but only adds 2.
    let window = [0x01, 0x08, 0x00, 0x08, 0x05, 0x03, 0x02, 0x01, 0x00, b'X', b'Y', 0x03];
    let err = decode(b"abcdefgh", &delta(&[&window])).unwrap_err();
    assert!(matches!(err, DeltaError::InvalidFormat(_)));
}

#[test]
fn window_above_the_limit_is_unsupported() {
    let opts = DeltaOptions {
        max_window_size: 16,
        ..DeltaOptions::default()
    };
    let run = [0x01, 0x00, 0x00, 0x08, 0x40, 0x03, 0x01, 0x02, 0x00, b'z', 0x00, 0x40];
    let err = undeltify_buffers(b"", &delta(&[&run]), &opts).unwrap_err();
    assert!(matches!(err, DeltaError::Unsupported(_)));
}

#[test]
fn source_shorter_than_declared_is_incomplete() {
    let err = decode(b"abc", &delta(&[ADD_COPY_WINDOW])).unwrap_err();
    assert!(matches!(err, DeltaError::IncompleteRead));
}

// ---------------------------------------------------------------------------
// Shortened sections of encoder output
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum Section {
    Instr,
    CopyAddr,
}

fn lcg_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    (0..len)
        .map(|_| {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (s >> 33) as u8
        })
        .collect()
}

/// Rewrite the single window of `delta` with the last byte of one section
/// dropped and its length field adjusted to match.
fn shorten(delta: &[u8], section: Section) -> Vec<u8> {
    let mut r = &delta[HEADER.len()..];
    let mut hdr = WindowHeader::read(&mut r, u64::MAX).unwrap().unwrap();
    let (add_run, rest) = r.split_at(hdr.add_run_length as usize);
    let (instr, rest) = rest.split_at(hdr.instr_length as usize);
    let (copy_addr, rest) = rest.split_at(hdr.copy_addr_length as usize);
    assert!(rest.is_empty(), "expected a single window");

    let (instr, copy_addr) = match section {
        Section::Instr => (&instr[..instr.len() - 1], copy_addr),
        Section::CopyAddr => (instr, &copy_addr[..copy_addr.len() - 1]),
    };
    hdr.instr_length = instr.len() as u64;
    hdr.copy_addr_length = copy_addr.len() as u64;
    hdr.delta_length = hdr.compute_delta_length();

    let mut out = HEADER.to_vec();
    hdr.write(&mut out).unwrap();
    out.extend_from_slice(add_run);
    out.extend_from_slice(instr);
    out.extend_from_slice(copy_addr);
    out
}

#[test]
fn shortened_sections_of_a_real_delta_are_invalid() {
    let source = lcg_bytes(4000, 1);
    let mut target = source.clone();
    target[100] ^= 0xFF;
    target.splice(2000..2000, lcg_bytes(37, 2));
    target.truncate(3500);

    let opts = DeltaOptions::default();
    let delta = deltify_buffers(&source, &target, &opts).unwrap();
    assert_eq!(undeltify_buffers(&source, &delta, &opts).unwrap(), target);

    for section in [Section::Instr, Section::CopyAddr] {
        let broken = shorten(&delta, section);
        let err = undeltify_buffers(&source, &broken, &opts).unwrap_err();
        assert!(matches!(err, DeltaError::InvalidFormat(_)), "{section:?}: {err:?}");
    }
}
