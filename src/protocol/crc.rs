//! CRC-32 (IEEE 802.3) used for frame trailers.

use crc32fast::Hasher;

/// Compute the CRC-32 of `data`, continuing from `seed`.
///
/// Pass `0` to start a new checksum. Feeding the result of one call as the
/// seed of the next yields the checksum of the concatenated input.
#[must_use]
pub fn crc32(seed: u32, data: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(crc32(0, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn empty_input_keeps_seed() {
        assert_eq!(crc32(0, &[]), 0);
        assert_eq!(crc32(0xDEAD_BEEF, &[]), 0xDEAD_BEEF);
    }

    #[test]
    fn chaining_matches_single_pass() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let (head, tail) = data.split_at(17);
        assert_eq!(crc32(crc32(0, head), tail), crc32(0, data));
    }
}
