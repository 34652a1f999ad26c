/// Opaque token generation and one-way hashing
///
/// Session tokens and the random part of API keys both come from here.
/// Only the SHA-256 digest of a token is ever handed to the credential store.
///
/// # Token Format
///
/// - 20 bytes from the operating system CSPRNG (160 bits)
/// - Encoded as lowercase, unpadded RFC 4648 base-32: exactly 32 chars of `[a-z2-7]`
///
/// # Hashing
///
/// Hashing is plain unsalted SHA-256 rendered as lowercase hex, so the store can
/// index on the digest directly.
///
/// # Example
///
/// ```
/// use lrnr_shared::auth::token::{generate_token, hash_token, TOKEN_LENGTH};
///
/// let token = generate_token();
/// assert_eq!(token.len(), TOKEN_LENGTH);
///
/// let digest = hash_token(&token);
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, hash_token(&token));
/// ```

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Number of random bytes in a token
pub const TOKEN_BYTES: usize = 20;

/// Length of an encoded token (160 bits / 5 bits per char)
pub const TOKEN_LENGTH: usize = 32;

/// RFC 4648 base-32 alphabet, lowercase
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Generates a new random token
///
/// # Panics
///
/// Panics if the operating system cannot supply randomness. There is no safe
/// fallback for a missing CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    encode_base32_lower(&bytes)
}

/// Computes the SHA-256 digest of `value` as lowercase hex (64 chars)
///
/// # Example
///
/// ```
/// use lrnr_shared::auth::token::hash_token;
///
/// assert_eq!(
///     hash_token("abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn hash_token(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Checks that `value` looks like a token produced by [`generate_token`]
///
/// Used to reject garbage cookie values before touching the store.
pub fn is_well_formed_token(value: &str) -> bool {
    value.len() == TOKEN_LENGTH && is_base32_lower(value)
}

/// Returns true if every char belongs to the lowercase base-32 alphabet
pub(crate) fn is_base32_lower(value: &str) -> bool {
    value.bytes().all(|b| BASE32_ALPHABET.contains(&b))
}

/// Short, log-safe form of a digest
pub(crate) fn fingerprint(digest: &str) -> &str {
    &digest[..digest.len().min(8)]
}

/// Lowercase unpadded base-32
fn encode_base32_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u16 = 0;
    let mut bits: u8 = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | u16::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let idx = ((buffer >> bits) & 0x1f) as usize;
            out.push(BASE32_ALPHABET[idx] as char);
        }
        buffer &= (1 << bits) - 1;
    }

    if bits > 0 {
        let idx = ((buffer << (5 - bits)) & 0x1f) as usize;
        out.push(BASE32_ALPHABET[idx] as char);
    }

    out
}
