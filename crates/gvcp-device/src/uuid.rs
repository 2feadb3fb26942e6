//! Deterministic device UUID derivation (`spec.md` §4.5).

/// Seeds for the four rolling-hash words that make up the UUID.
const SEEDS: [u32; 4] = [0x12345678, 0x9ABCDEF0, 0xFEDCBA98, 0x76543210];

fn rolling_hash(seed: u32, bytes: &[u8]) -> u32 {
    let mut h = seed;
    for &b in bytes {
        h = h.wrapping_mul(31).wrapping_add(b as u32);
        h ^= h >> 16;
    }
    h
}

/// Derive a 128-bit device UUID from `(MAC, model, version, serial)`.
///
/// Each of the four seeds produces one 32-bit word, written big-endian, so
/// the result is stable across reboots for a fixed identity tuple.
pub fn derive_uuid(mac: [u8; 6], model: &str, version: &str, serial: &str) -> [u8; 16] {
    let mut input = Vec::with_capacity(6 + model.len() + version.len() + serial.len());
    input.extend_from_slice(&mac);
    input.extend_from_slice(model.as_bytes());
    input.extend_from_slice(version.as_bytes());
    input.extend_from_slice(serial.as_bytes());

    let mut uuid = [0u8; 16];
    for (word_idx, seed) in SEEDS.iter().enumerate() {
        let word = rolling_hash(*seed, &input);
        uuid[word_idx * 4..word_idx * 4 + 4].copy_from_slice(&word.to_be_bytes());
    }
    uuid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_fixed_identity() {
        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        let a = derive_uuid(mac, "ModelX", "1.0", "SN001");
        let b = derive_uuid(mac, "ModelX", "1.0", "SN001");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_for_different_identity() {
        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        let a = derive_uuid(mac, "ModelX", "1.0", "SN001");
        let b = derive_uuid(mac, "ModelX", "1.0", "SN002");
        assert_ne!(a, b);
    }

    #[test]
    fn uses_all_four_seeds() {
        let mac = [1, 2, 3, 4, 5, 6];
        let uuid = derive_uuid(mac, "M", "V", "S");
        // Each 32-bit word must equal the rolling hash from its own seed.
        let mut input = Vec::new();
        input.extend_from_slice(&mac);
        input.extend_from_slice(b"MVS");
        for (idx, seed) in SEEDS.iter().enumerate() {
            let expected = rolling_hash(*seed, &input).to_be_bytes();
            assert_eq!(&uuid[idx * 4..idx * 4 + 4], &expected);
        }
    }
}
