//! Frame checksum
//!
//! The receiver protects each frame payload with a single XOR byte.

/// XOR checksum - XOR of all bytes
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Verify a received checksum byte against the payload
pub fn verify(payload: &[u8], checksum: u8) -> bool {
    xor_checksum(payload) == checksum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_checksum() {
        assert_eq!(xor_checksum(&[]), 0x00);
        assert_eq!(xor_checksum(&[0x02, 0x00]), 0x02);
        assert_eq!(xor_checksum(&[0x01, 0x02, 0x04]), 0x07);
        assert_eq!(xor_checksum(&[0xFF, 0xFF]), 0x00);
    }

    #[test]
    fn test_xor_checksum_matches_fold_for_every_length() {
        for len in 0..=256usize {
            let payload: Vec<u8> = (0..len).map(|i| (i * 37 % 251) as u8).collect();
            let mut expected = 0u8;
            for b in &payload {
                expected ^= b;
            }
            assert_eq!(xor_checksum(&payload), expected);
            assert!(verify(&payload, expected));
            assert!(!verify(&payload, expected ^ 0x01));
        }
    }
}
