//! 64-bit ROM identifiers
//!
//! Every device on a 1-Wire bus carries a factory-burned identifier made of a
//! family code, a 48-bit serial number and a CRC-8 over the first seven bytes.
//! The identifier travels on the wire least significant bit first, family
//! byte first.

use crc::{Crc, CRC_8_MAXIM_DOW};

/// Dallas/Maxim CRC-8 (x^8 + x^5 + x^4 + 1, reflected, init 0)
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);

/// Compute the 1-Wire CRC-8 over `data`
///
/// Running it over a complete identifier (checksum byte included) yields zero
/// when the identifier is intact.
pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

/// Device identifier as read from the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rom {
    /// Family code, identifies the device type
    pub family: u8,
    /// Serial number, unique within a family
    pub serial: [u8; 6],
    /// CRC-8 over family and serial
    pub crc: u8,
}

impl Rom {
    /// Size of an identifier on the wire
    pub const SIZE: usize = 8;

    /// Build an identifier from family and serial, computing its checksum
    pub fn new(family: u8, serial: [u8; 6]) -> Self {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = family;
        bytes[1..7].copy_from_slice(&serial);
        bytes[7] = crc8(&bytes[..7]);
        Self::from_bytes(bytes)
    }

    /// Build an identifier from its wire bytes (family first, checksum last)
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&bytes[1..7]);
        Self {
            family: bytes[0],
            serial,
            crc: bytes[7],
        }
    }

    /// Wire bytes of the identifier (family first, checksum last)
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.family;
        bytes[1..7].copy_from_slice(&self.serial);
        bytes[7] = self.crc;
        bytes
    }

    /// Identifier as a big-endian integer, family code in the top byte
    pub fn to_u64(&self) -> u64 {
        u64::from_be_bytes(self.to_bytes())
    }

    /// Inverse of [`Rom::to_u64`]
    pub fn from_u64(value: u64) -> Self {
        Self::from_bytes(value.to_be_bytes())
    }

    /// Finalize a search accumulator into an identifier
    ///
    /// Bit `i` of `bits` holds ROM bit `i + 1` in arrival order, so byte `n`
    /// of the identifier is byte `n` of the little-endian layout of `bits`.
    /// The conversion is explicit and does not depend on host byte order.
    pub fn from_search_bits(bits: u64) -> Self {
        Self::from_bytes(bits.to_le_bytes())
    }

    /// Search accumulator layout of the identifier, inverse of
    /// [`Rom::from_search_bits`]
    pub fn to_search_bits(&self) -> u64 {
        u64::from_le_bytes(self.to_bytes())
    }

    /// Check the embedded CRC-8
    pub fn is_valid(&self) -> bool {
        crc8(&self.to_bytes()) == 0
    }
}

impl From<[u8; 8]> for Rom {
    fn from(bytes: [u8; 8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Rom> for [u8; 8] {
    fn from(rom: Rom) -> Self {
        rom.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // DS18B20 identifier taken from a real probe
    const PROBE: [u8; 8] = [0x28, 0xff, 0x4c, 0x3b, 0x72, 0x16, 0x04, 0x9f];

    #[test]
    fn test_crc8_check_value() {
        assert_eq!(crc8(b"123456789"), 0xa1);
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_new_computes_valid_checksum() {
        let rom = Rom::new(0x19, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert!(rom.is_valid());
        assert_eq!(rom.crc, crc8(&rom.to_bytes()[..7]));

        let mut broken = rom;
        broken.serial[3] ^= 0x10;
        assert!(!broken.is_valid());
    }

    #[test]
    fn test_u64_is_big_endian() {
        let rom = Rom::from_bytes(PROBE);
        assert_eq!(rom.family, 0x28);
        assert_eq!(rom.crc, 0x9f);
        assert_eq!(rom.to_u64(), 0x28ff_4c3b_7216_049f);
        assert_eq!(Rom::from_u64(0x28ff_4c3b_7216_049f), rom);
    }

    #[test]
    fn test_search_bits_match_wire_order() {
        // Assemble the accumulator bit by bit the way the search produces it
        let mut bits = 0u64;
        for position in 0..64 {
            let byte = PROBE[position / 8];
            if (byte >> (position % 8)) & 1 == 1 {
                bits |= 1 << position;
            }
        }

        let rom = Rom::from_search_bits(bits);
        assert_eq!(rom.to_bytes(), PROBE);
        assert_eq!(rom.to_search_bits(), bits);
    }

    #[test]
    fn test_search_bits_round_trip() {
        // xorshift walk over the identifier space
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        for _ in 0..256 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;

            let rom = Rom::from_u64(state);
            let bits = rom.to_search_bits();
            assert_eq!(Rom::from_search_bits(bits), rom);
            assert_eq!(bits.swap_bytes(), rom.to_u64());
        }
    }
}
