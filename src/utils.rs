//! Field conversions, hashing, and hex validation helpers.
//!
//! Everything that touches the Pallas base field lives here so the identity
//! manager, the membership tree, the prover, and the verifier all agree on
//! the exact hash and encoding. A mismatch in any of these breaks proof
//! validity.

use anyhow::Result;
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use pasta_curves::group::ff::PrimeField;
use pasta_curves::pallas;
use sha3::{Digest, Sha3_256};

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns an error if:
/// - The hex string has incorrect length
/// - The hex string contains non-hex characters
///
/// # Examples
///
/// ```
/// use anon_signals::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(anyhow::anyhow!(
            "Invalid hex string: must be {} characters (got {})",
            expected_len,
            stripped.len()
        ));
    }

    if !is_valid_hex_string(stripped) {
        return Err(anyhow::anyhow!(
            "Invalid hex string: contains non-hex characters"
        ));
    }

    Ok(stripped.to_string())
}

const BASE_U64: u64 = 256;

/// Absorbs 32 bytes into a Pallas field element.
///
/// Uses base-256 folding so arbitrary digests map deterministically into the
/// field. This is a one-way mapping for hash outputs; round-trippable
/// encodings go through [`field_to_bytes`] / [`field_from_bytes`] instead.
#[inline]
#[must_use]
pub fn bytes_to_field(bytes: &[u8; 32]) -> pallas::Base {
    let mut value = pallas::Base::zero();
    let base = pallas::Base::from(BASE_U64);

    for &byte in bytes.iter() {
        value = value * base + pallas::Base::from(byte as u64);
    }

    value
}

/// Converts a field element to its canonical 32-byte representation.
#[inline]
#[must_use]
pub fn field_to_bytes(field: pallas::Base) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    let repr = field.to_repr();
    bytes.copy_from_slice(repr.as_ref());
    bytes
}

/// Parses the canonical 32-byte representation back into a field element.
///
/// Returns `None` if the bytes are not a canonical encoding. Inverse of
/// [`field_to_bytes`].
#[inline]
#[must_use]
pub fn field_from_bytes(bytes: &[u8; 32]) -> Option<pallas::Base> {
    Option::from(pallas::Base::from_repr(*bytes))
}

/// Hashes arbitrary bytes into the field under a domain tag.
///
/// SHA3-256 absorbs `domain || input`, and the digest is folded into the
/// field. Used for identity seeds, signal messages, and context labels, each
/// with its own tag so the derived elements are independent.
#[must_use]
pub fn hash_to_field(domain: &[u8], input: &[u8]) -> pallas::Base {
    let mut hasher = Sha3_256::new();
    hasher.update(domain);
    hasher.update(input);
    let digest: [u8; 32] = hasher.finalize().into();
    bytes_to_field(&digest)
}

pub(crate) const SIGNAL_DOMAIN: &[u8] = b"anon-signals:signal";

/// Computes the public `signal_hash` for a message.
///
/// The prover puts this in the proof bundle; the verifier recomputes it from
/// the submitted message and rejects on mismatch, which prevents replaying a
/// proof with a different message.
#[must_use]
pub fn signal_hash(message: &[u8]) -> pallas::Base {
    hash_to_field(SIGNAL_DOMAIN, message)
}

/// Poseidon hash of two field elements using the `P128Pow5T3` specification.
///
/// The same two-to-one hash is used for identity commitments, tree nodes,
/// and nullifier derivation.
///
/// # Example
///
/// ```
/// use anon_signals::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let left = pallas::Base::from(1);
/// let right = pallas::Base::from(2);
/// let hash = poseidon_hash(left, right);
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    let inputs = [left, right];
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_and_strip_hex_valid() {
        let result = validate_and_strip_hex("0x1234abcd", 8);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "1234abcd");
    }

    #[test]
    fn test_validate_and_strip_hex_uppercase_prefix() {
        let result = validate_and_strip_hex("0X1234ABCD", 8);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "1234ABCD");
    }

    #[test]
    fn test_validate_and_strip_hex_with_whitespace() {
        let result = validate_and_strip_hex("  0x1234abcd  ", 8);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "1234abcd");
    }

    #[test]
    fn test_validate_and_strip_hex_wrong_length() {
        let result = validate_and_strip_hex("0x1234abcd", 10);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must be 10 characters"));
    }

    #[test]
    fn test_validate_and_strip_hex_invalid_characters() {
        let result = validate_and_strip_hex("0x1234xyzw", 8);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("non-hex characters"));
    }

    #[test]
    fn test_field_bytes_round_trip() {
        let value = pallas::Base::from(123_456_789u64);
        let bytes = field_to_bytes(value);
        let back = field_from_bytes(&bytes).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn test_field_from_bytes_rejects_non_canonical() {
        // The field modulus is well below 2^256 - 1.
        let bytes = [0xFFu8; 32];
        assert!(field_from_bytes(&bytes).is_none());
    }

    #[test]
    fn test_hash_to_field_domain_separation() {
        let a = hash_to_field(b"domain-a", b"input");
        let b = hash_to_field(b"domain-b", b"input");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_to_field_deterministic() {
        let a = hash_to_field(b"domain", b"input");
        let b = hash_to_field(b"domain", b"input");
        assert_eq!(a, b);
    }

    #[test]
    fn test_signal_hash_distinct_messages() {
        assert_ne!(signal_hash(b"hello"), signal_hash(b"world"));
    }

    #[test]
    fn test_poseidon_hash_order_matters() {
        let left = pallas::Base::from(1);
        let right = pallas::Base::from(2);
        assert_ne!(poseidon_hash(left, right), poseidon_hash(right, left));
    }
}
