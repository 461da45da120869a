//! Key-to-slot hashing (spec.md §4.3 "Hash function").
//!
//! Each key is hashed to an integer in `[0, 65536)` by a stable CRC-16
//! function, the same family Redis Cluster uses for slot hashing and the
//! family the original Jiffy source uses as well.

use jiffy_types::SLOT_UNIVERSE;

const CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);

/// Hashes `key` to a slot in `[0, SLOT_UNIVERSE)`.
pub fn hash_slot(key: &[u8]) -> u32 {
    u32::from(CRC16.checksum(key)) % SLOT_UNIVERSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash_slot(b"42"), hash_slot(b"42"));
    }

    #[test]
    fn hash_is_within_universe() {
        for key in [b"".as_slice(), b"a", b"hello world", b"0123456789"] {
            assert!(hash_slot(key) < SLOT_UNIVERSE);
        }
    }

    #[test]
    fn different_keys_usually_hash_differently() {
        assert_ne!(hash_slot(b"alpha"), hash_slot(b"beta"));
    }
}
