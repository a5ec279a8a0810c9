use crate::crc::sja1105_crc32;
use crate::packing::{field, PackingOp};

use super::SIZE_TABLE_HEADER;

/// Precedes every table in a packed configuration
///
/// `len` counts 32-bit words of entry data. A header with `len == 0` ends the stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub block_id: u64,
    pub len: u64,
    pub crc: u64,
}

impl TableHeader {
    pub fn packing(buf: &mut [u8], hdr: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_TABLE_HEADER];
        field(buf, &mut hdr.block_id, 31, 24, op);
        field(buf, &mut hdr.len, 55, 32, op);
        field(buf, &mut hdr.crc, 95, 64, op);
        SIZE_TABLE_HEADER
    }

    pub fn unpack(buf: &[u8; SIZE_TABLE_HEADER]) -> Self {
        let mut scratch = *buf;
        let mut hdr = Self::default();
        Self::packing(&mut scratch, &mut hdr, PackingOp::Unpack);
        hdr
    }

    /// CRC the header is expected to carry, computed over its first two words
    pub fn expected_crc(buf: &[u8]) -> u64 {
        u64::from(sja1105_crc32(&buf[..SIZE_TABLE_HEADER - 4]))
    }

    /// Packs the header into a zeroed area and fills in its CRC
    pub fn pack_with_crc(&mut self, buf: &mut [u8]) {
        let buf = &mut buf[..SIZE_TABLE_HEADER];
        buf.fill(0);
        Self::packing(buf, self, PackingOp::Pack);
        self.crc = Self::expected_crc(buf);
        field(buf, &mut self.crc, 95, 64, PackingOp::Pack);
    }
}
