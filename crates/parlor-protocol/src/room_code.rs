//! Room join codes.
//!
//! Four characters drawn uniformly from a 23-letter alphabet that leaves
//! out O, I, and L — the letters people misread when relaying a code off
//! a screen. Codes are not guaranteed globally unique; collision handling
//! is the caller's concern.

use rand::Rng;

/// The 23-letter code alphabet (A–Z minus O, I, L).
pub const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ";

/// Length of a room code, in characters.
pub const CODE_LEN: usize = 4;

/// Generates a fresh room code.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Returns `true` if `code` is a well-formed room code (already
/// uppercased by the caller).
pub fn is_valid(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}
