//! Bit-exact packing of unsigned values into arbitrary bit ranges of a byte buffer
//!
//! Bits are numbered big-endian across the whole buffer: bit 0 is the least significant bit of
//! the last byte. The [`Quirks`] set rearranges which physical byte (and which bit inside it)
//! a logical bit lands on, which is how the same field description serves buffers laid out by
//! different pieces of hardware.

use bitflags::bitflags;
use thiserror::Error;
use tracing::error;

bitflags! {
    /// Independent byte/bit reordering transformations applied while addressing a buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Quirks: u8 {
        /// Logical bit 7 of a byte is stored in physical bit 0
        const MSB_ON_THE_RIGHT = 1 << 0;
        /// Bytes are mirrored within every 4-byte word
        const LITTLE_ENDIAN = 1 << 1;
        /// The 4-byte word holding the least significant bits comes first
        const LSW32_IS_FIRST = 1 << 2;
    }
}

/// The layout used by every SJA1105 table, header and register buffer
pub const SJA1105_QUIRKS: Quirks = Quirks::LSW32_IS_FIRST;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackingOp {
    Pack,
    Unpack,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackingError {
    #[error("start bit {start} is below end bit {end}")]
    InvalidRange { start: usize, end: usize },
    #[error("bits {start}-{end} cannot hold the value (fields are at most 64 bits wide)")]
    RangeExceeded { start: usize, end: usize },
    #[error("bit {start} lies outside a buffer of {len} bytes")]
    BufferTooSmall { start: usize, len: usize },
    #[error("word-swapping quirks need a buffer length multiple of 4, got {len}")]
    UnalignedBuffer { len: usize },
}

fn check_range(start: usize, end: usize, len: usize, quirks: Quirks) -> Result<(), PackingError> {
    if start < end {
        return Err(PackingError::InvalidRange { start, end });
    }
    if start - end + 1 > 64 {
        return Err(PackingError::RangeExceeded { start, end });
    }
    if start / 8 >= len {
        return Err(PackingError::BufferTooSmall { start, len });
    }
    if quirks.intersects(Quirks::LITTLE_ENDIAN | Quirks::LSW32_IS_FIRST) && len % 4 != 0 {
        return Err(PackingError::UnalignedBuffer { len });
    }
    Ok(())
}

/// Physical offset of logical byte `box_idx` (0 is the least significant byte)
fn box_address(box_idx: usize, len: usize, quirks: Quirks) -> usize {
    let mut addr = len - box_idx - 1;
    if quirks.contains(Quirks::LITTLE_ENDIAN) {
        addr = (addr / 4) * 4 + (3 - addr % 4);
    }
    if quirks.contains(Quirks::LSW32_IS_FIRST) {
        let word = addr / 4;
        addr = (len / 4 - word - 1) * 4 + addr % 4;
    }
    addr
}

/// Mask of bits `end..=start` inside a single byte
fn byte_mask(start: usize, end: usize) -> u8 {
    (0xFFu8 >> (7 - start)) & (0xFFu8 << end)
}

/// Walks the bytes spanned by `start..=end`, most significant first, handing the closure the
/// physical address, the intra-byte bit range and where that range lands in the value.
fn for_each_box(
    start: usize,
    end: usize,
    len: usize,
    quirks: Quirks,
    mut f: impl FnMut(usize, usize, usize, usize),
) {
    let first = start / 8;
    let last = end / 8;
    for box_idx in (last..=first).rev() {
        let box_start = if box_idx == first { start % 8 } else { 7 };
        let box_end = if box_idx == last { end % 8 } else { 0 };
        let proj_end = box_idx * 8 + box_end - end;
        f(box_address(box_idx, len, quirks), box_start, box_end, proj_end);
    }
}

/// Writes the low `start - end + 1` bits of `value` into bits `start..=end` of `buf`
///
/// Bits of `buf` outside the range are preserved. A value wider than the field is rejected
/// before anything is written.
pub fn pack(
    buf: &mut [u8],
    value: u64,
    start: usize,
    end: usize,
    quirks: Quirks,
) -> Result<(), PackingError> {
    check_range(start, end, buf.len(), quirks)?;
    let width = start - end + 1;
    if width < 64 && value >> width != 0 {
        return Err(PackingError::RangeExceeded { start, end });
    }
    let len = buf.len();
    for_each_box(start, end, len, quirks, |addr, box_start, box_end, proj_end| {
        let bits = box_start - box_end + 1;
        let mut mask = byte_mask(box_start, box_end);
        let mut byte = (((value >> proj_end) & ((1u64 << bits) - 1)) as u8) << box_end;
        if quirks.contains(Quirks::MSB_ON_THE_RIGHT) {
            mask = mask.reverse_bits();
            byte = byte.reverse_bits();
        }
        buf[addr] = (buf[addr] & !mask) | byte;
    });
    Ok(())
}

/// Reads bits `start..=end` of `buf` as an unsigned integer
pub fn unpack(buf: &[u8], start: usize, end: usize, quirks: Quirks) -> Result<u64, PackingError> {
    check_range(start, end, buf.len(), quirks)?;
    let mut value = 0u64;
    for_each_box(start, end, buf.len(), quirks, |addr, box_start, box_end, proj_end| {
        let mut byte = buf[addr];
        if quirks.contains(Quirks::MSB_ON_THE_RIGHT) {
            byte = byte.reverse_bits();
        }
        let bits = (byte & byte_mask(box_start, box_end)) >> box_end;
        value |= u64::from(bits) << proj_end;
    });
    Ok(value)
}

/// Direction-agnostic form of [`pack`] and [`unpack`]
pub fn packing(
    buf: &mut [u8],
    value: &mut u64,
    start: usize,
    end: usize,
    op: PackingOp,
    quirks: Quirks,
) -> Result<(), PackingError> {
    match op {
        PackingOp::Pack => pack(buf, *value, start, end, quirks),
        PackingOp::Unpack => {
            *value = unpack(buf, start, end, quirks)?;
            Ok(())
        }
    }
}

/// Packs or unpacks one table field in the SJA1105 layout
///
/// Entry codecs describe fixed register maps, so a failure here means an out-of-range value
/// was stored in an entry. It gets logged and the field is left alone.
pub(crate) fn field(buf: &mut [u8], value: &mut u64, start: usize, end: usize, op: PackingOp) {
    if let Err(e) = packing(buf, value, start, end, op, SJA1105_QUIRKS) {
        error!(?e, value = *value, start, end, ?op, "Field packing failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn lsb_of_plain_buffer_is_last_byte() {
        let mut buf = [0u8; 4];
        pack(&mut buf, 1, 0, 0, Quirks::empty()).unwrap();
        assert_eq!(buf, [0, 0, 0, 1]);
    }

    #[test]
    fn plain_layout_is_big_endian() {
        let mut buf = [0u8; 8];
        pack(&mut buf, 0xCAFE_BABE, 47, 16, Quirks::empty()).unwrap();
        assert_eq!(buf, [0, 0, 0xCA, 0xFE, 0xBA, 0xBE, 0, 0]);
    }

    #[test]
    fn lsw32_swaps_words() {
        let mut buf = [0u8; 8];
        pack(&mut buf, 0x0102_0304_0506_0708, 63, 0, Quirks::LSW32_IS_FIRST).unwrap();
        assert_eq!(buf, [5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn little_endian_mirrors_within_word() {
        let mut buf = [0u8; 8];
        pack(&mut buf, 0x0102_0304_0506_0708, 63, 0, Quirks::LITTLE_ENDIAN).unwrap();
        assert_eq!(buf, [4, 3, 2, 1, 8, 7, 6, 5]);
        let both = Quirks::LITTLE_ENDIAN | Quirks::LSW32_IS_FIRST;
        let mut buf = [0u8; 8];
        pack(&mut buf, 0x0102_0304_0506_0708, 63, 0, both).unwrap();
        assert_eq!(buf, [8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn msb_on_the_right_reverses_bits() {
        let mut buf = [0u8; 4];
        pack(&mut buf, 1, 0, 0, Quirks::MSB_ON_THE_RIGHT).unwrap();
        assert_eq!(buf, [0, 0, 0, 0x80]);
        let mut buf = [0u8; 4];
        pack(&mut buf, 0b011, 10, 8, Quirks::MSB_ON_THE_RIGHT).unwrap();
        assert_eq!(buf, [0, 0, 0b1100_0000, 0]);
    }

    #[test_case(Quirks::empty() ; "no quirks")]
    #[test_case(Quirks::MSB_ON_THE_RIGHT ; "msb right")]
    #[test_case(Quirks::LITTLE_ENDIAN ; "little endian")]
    #[test_case(Quirks::LSW32_IS_FIRST ; "lsw32 first")]
    #[test_case(Quirks::all() ; "all quirks")]
    fn unaligned_fields_roundtrip(quirks: Quirks) {
        let fields: [(u64, usize, usize); 4] = [
            (0x3_BEEF_1234_5678, 127, 78),
            (0x1FFF, 77, 65),
            (0x2A, 13, 7),
            (1, 31, 31),
        ];
        let mut buf = [0u8; 16];
        for (value, start, end) in fields {
            pack(&mut buf, value, start, end, quirks).unwrap();
        }
        for (value, start, end) in fields {
            assert_eq!(unpack(&buf, start, end, quirks).unwrap(), value);
        }
    }

    #[test_case(Quirks::empty() ; "no quirks")]
    #[test_case(Quirks::all() ; "all quirks")]
    fn neighbouring_bits_untouched(quirks: Quirks) {
        let mut buf = [0xFFu8; 12];
        pack(&mut buf, 0, 50, 21, quirks).unwrap();
        assert_eq!(unpack(&buf, 50, 21, quirks).unwrap(), 0);
        assert_eq!(unpack(&buf, 20, 0, quirks).unwrap(), 0x1F_FFFF);
        assert_eq!(unpack(&buf, 95, 51, quirks).unwrap(), (1 << 45) - 1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut buf = [0xA5u8; 4];
        assert_eq!(
            pack(&mut buf, 1, 3, 4, Quirks::empty()),
            Err(PackingError::InvalidRange { start: 3, end: 4 })
        );
        assert_eq!(buf, [0xA5; 4]);
        let mut value = 7;
        assert!(matches!(
            packing(&mut buf, &mut value, 0, 1, PackingOp::Unpack, Quirks::empty()),
            Err(PackingError::InvalidRange { .. })
        ));
        assert_eq!(value, 7);
    }

    #[test]
    fn sixty_five_bits_is_too_wide() {
        let buf = [0u8; 16];
        assert_eq!(
            unpack(&buf, 64, 0, Quirks::empty()),
            Err(PackingError::RangeExceeded { start: 64, end: 0 })
        );
    }

    #[test]
    fn truncating_pack_leaves_buffer_alone() {
        let mut buf = [0x11u8; 4];
        assert_eq!(
            pack(&mut buf, 256, 7, 0, Quirks::empty()),
            Err(PackingError::RangeExceeded { start: 7, end: 0 })
        );
        assert_eq!(buf, [0x11; 4]);
    }

    #[test]
    fn out_of_buffer_access_is_rejected() {
        let mut buf = [0u8; 4];
        assert!(matches!(
            pack(&mut buf, 1, 32, 32, Quirks::empty()),
            Err(PackingError::BufferTooSmall { .. })
        ));
        let mut odd = [0u8; 6];
        assert!(matches!(
            pack(&mut odd, 1, 0, 0, Quirks::LSW32_IS_FIRST),
            Err(PackingError::UnalignedBuffer { len: 6 })
        ));
    }

    #[test]
    fn full_width_field() {
        let mut buf = [0u8; 8];
        pack(&mut buf, u64::MAX, 63, 0, SJA1105_QUIRKS).unwrap();
        assert_eq!(buf, [0xFF; 8]);
        assert_eq!(unpack(&buf, 63, 0, SJA1105_QUIRKS).unwrap(), u64::MAX);
    }
}
