//! Cache key derivation

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Computes the 64-bit FNV-1a hash of the input
pub fn fnv1a_64(input: &[u8]) -> u64 {
    input.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Renders a number in lowercase base-36
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(13);

    while value > 0 {
        digits.push(char::from(BASE36_DIGITS[(value % 36) as usize]));
        value /= 36;
    }

    digits.iter().rev().collect()
}

/// Derives the cache key for a query fingerprint
///
/// The fingerprint is hashed so that keys stay short regardless of the query
/// size; the prefix namespaces independent caches sharing one store.
pub fn derive_key(prefix: &str, fingerprint: &str) -> String {
    format!("{}{}", prefix, to_base36(fnv1a_64(fingerprint.as_bytes())))
}
