//! Checksums used by the SJA1105 configuration stream and the FDB hash

use crc_all::CrcAlgo;

/// Calculates the IEEE 802.3 CRC-32 (reflected, all-ones seed, complemented result)
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = CRC32_INIT;
    CRC32.update_crc(&mut crc, data);
    CRC32.finish_crc(&crc)
}

/// CRC-32 as computed by the switch over a configuration buffer
///
/// The hardware hashes each 32-bit word least significant byte first, while the buffer
/// stores every word big-endian, so each word is flipped before hashing. A trailing partial
/// word is not covered.
pub fn sja1105_crc32(buf: &[u8]) -> u32 {
    let normalized: Vec<u8> = buf
        .chunks_exact(4)
        .flat_map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]).to_le_bytes())
        .collect();
    crc32(&normalized)
}

/// MSB-first CRC-8 with a zero seed and no output XOR, over an arbitrary polynomial
pub fn crc8(poly: u8, data: &[u8]) -> u8 {
    let algo = CrcAlgo::<u8>::new(poly, 8, 0, 0, false);
    let mut crc = 0;
    algo.update_crc(&mut crc, data);
    algo.finish_crc(&crc)
}

const CRC32_INIT: u32 = 0xFFFF_FFFF;

const CRC32: CrcAlgo<u32> = CrcAlgo::<u32>::new(
    0x04C1_1DB7, // polynomial
    32,          // width
    CRC32_INIT,  // init
    0xFFFF_FFFF, // xorout
    true,        // reflect
);

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn words_are_hashed_lsb_first() {
        let buf = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        let swapped = [0x78, 0x56, 0x34, 0x12, 0xF0, 0xDE, 0xBC, 0x9A];
        assert_eq!(sja1105_crc32(&buf), crc32(&swapped));
    }

    #[test]
    fn partial_word_is_ignored() {
        let buf = [1, 2, 3, 4, 5];
        assert_eq!(sja1105_crc32(&buf), sja1105_crc32(&buf[..4]));
    }

    // CRC-8/SMBUS check value, and a bare zero input
    #[test_case(0x07, b"123456789", 0xF4 ; "smbus")]
    #[test_case(0x07, &[0u8; 8], 0x00 ; "zeros")]
    fn crc8_known_values(poly: u8, data: &[u8], expected: u8) {
        assert_eq!(crc8(poly, data), expected);
    }
}
