//! Response-body decryption.
//!
//! The appliance encrypts every response body with AES-256-CBC.  The key is
//! the first half of the group key; the IV is the first half of the
//! hex-decoded IV field carried in the `X-Signature` response header
//! (`<ignored>:<hexIV>`).
//!
//! One oddity is preserved deliberately: a single `0x00` byte is appended to
//! the ciphertext before decrypting, after which standard PKCS#7 unpadding
//! applies.  The appliance firmware produces ciphertext that is one byte
//! short of a block, and interoperating with it requires replicating the
//! append byte-for-byte.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use thiserror::Error;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes.
const BLOCK_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Decryption failure, distinguishable from transport and appliance errors
/// so the HTTP layer can map it to a server error of its own.
#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error("group key has odd length {0}; cannot split into an AES key")]
    OddKeyLength(usize),

    #[error("decoded IV material has odd length {0}; cannot split into an IV")]
    OddIvLength(usize),

    #[error("derived AES key has invalid length {0} (expected 32)")]
    InvalidKeyLength(usize),

    #[error("derived IV has invalid length {0} (expected 16)")]
    InvalidIvLength(usize),

    #[error("ciphertext length {0} is not block-aligned after the appended byte")]
    Misaligned(usize),

    #[error("decrypted data has invalid padding")]
    InvalidPadding,
}

// ---------------------------------------------------------------------------
// IV extraction
// ---------------------------------------------------------------------------

/// Pull the hex IV material out of a raw `X-Signature` header value.
///
/// The format is `<ignored>:<hexIV>`.  An absent header, a missing second
/// field, or non-hex material all degrade to empty IV bytes — decryption then
/// fails with a typed error instead of producing garbage.
fn iv_material(signature_header: Option<&str>) -> Vec<u8> {
    let field = signature_header
        .and_then(|value| value.split(':').nth(1))
        .unwrap_or("");
    hex::decode(field).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Decryption
// ---------------------------------------------------------------------------

/// Decrypt a response body.
///
/// `cipher` is the raw body as received; `signature_header` is the raw
/// `X-Signature` response header, if present.  Returns the plaintext bytes,
/// which callers expect (but this function does not verify) to be UTF-8
/// JSON.  The input buffers are never mutated.
pub fn decrypt(
    cipher: &[u8],
    group_key: &[u8],
    signature_header: Option<&str>,
) -> Result<Vec<u8>, DecryptionError> {
    if group_key.len() % 2 != 0 {
        return Err(DecryptionError::OddKeyLength(group_key.len()));
    }
    let key = &group_key[..group_key.len() / 2];

    let material = iv_material(signature_header);
    if material.len() % 2 != 0 {
        return Err(DecryptionError::OddIvLength(material.len()));
    }
    let iv = &material[..material.len() / 2];

    let decryptor = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| {
        if key.len() != 32 {
            DecryptionError::InvalidKeyLength(key.len())
        } else {
            DecryptionError::InvalidIvLength(iv.len())
        }
    })?;

    // The firmware's off-by-one: the body arrives one byte short of a block
    // and the missing byte is always zero.
    let mut data = Vec::with_capacity(cipher.len() + 1);
    data.extend_from_slice(cipher);
    data.push(0x00);

    if data.len() % BLOCK_SIZE != 0 {
        return Err(DecryptionError::Misaligned(data.len()));
    }

    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut data)
        .map_err(|_| DecryptionError::InvalidPadding)?;
    Ok(plaintext.to_vec())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use aes::cipher::BlockEncryptMut;

    use super::*;

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    /// 64-byte group key 00 01 02 .. 3f; the AES key is its first half.
    fn group_key() -> Vec<u8> {
        (0u8..64).collect()
    }

    /// 32 bytes of IV material 40 41 .. 5f; the IV is its first half.
    const IV_MATERIAL_HEX: &str =
        "404142434445464748494A4B4C4D4E4F505152535455565758595A5B5C5D5E5F";

    fn signature_header() -> String {
        format!("MieleH256 0000:{IV_MATERIAL_HEX}")
    }

    /// Chosen so that its padded AES-256-CBC ciphertext under the fixture
    /// key/IV ends in a 0x00 byte, which is the byte the appliance drops.
    const PLAINTEXT: &str =
        r#"{"Devices":{"href":"/Devices"},"Ident":{"DeviceName":"Dishwasher"},"Nonce":"567"}"#;

    fn encrypt_fixture() -> Vec<u8> {
        let key = group_key();
        let material = hex::decode(IV_MATERIAL_HEX).unwrap();
        Aes256CbcEnc::new_from_slices(&key[..32], &material[..16])
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(PLAINTEXT.as_bytes())
    }

    /// The appliance sends ciphertext truncated by one trailing zero byte;
    /// `decrypt` restores it and the round trip is exact.
    #[test]
    fn truncated_ciphertext_round_trip() {
        let full = encrypt_fixture();
        assert_eq!(full.last(), Some(&0x00), "fixture must end in a zero byte");

        let wire = &full[..full.len() - 1];
        let plain = decrypt(wire, &group_key(), Some(&signature_header())).unwrap();
        assert_eq!(plain, PLAINTEXT.as_bytes());
    }

    #[test]
    fn header_without_iv_field_fails_typed() {
        let full = encrypt_fixture();
        let wire = &full[..full.len() - 1];

        let err = decrypt(wire, &group_key(), Some("MieleH256 nocolonhere")).unwrap_err();
        assert!(matches!(err, DecryptionError::InvalidIvLength(0)), "{err}");
    }

    #[test]
    fn absent_header_fails_typed() {
        let full = encrypt_fixture();
        let wire = &full[..full.len() - 1];

        let err = decrypt(wire, &group_key(), None).unwrap_err();
        assert!(matches!(err, DecryptionError::InvalidIvLength(0)), "{err}");
    }

    #[test]
    fn non_hex_iv_material_degrades_to_empty() {
        let err = decrypt(b"", &group_key(), Some("MieleH256 x:zzzz")).unwrap_err();
        assert!(matches!(err, DecryptionError::InvalidIvLength(0)), "{err}");
    }

    #[test]
    fn odd_length_key_fails_fast() {
        let key: Vec<u8> = (0u8..63).collect();
        let err = decrypt(b"", &key, Some(&signature_header())).unwrap_err();
        assert!(matches!(err, DecryptionError::OddKeyLength(63)), "{err}");
    }

    #[test]
    fn odd_length_iv_material_fails_fast() {
        // 3 hex bytes of material decode fine but cannot be halved evenly.
        let err = decrypt(b"", &group_key(), Some("sig:aabbcc")).unwrap_err();
        assert!(matches!(err, DecryptionError::OddIvLength(3)), "{err}");
    }

    #[test]
    fn wrong_key_size_is_reported() {
        // 32-byte group key halves into a 16-byte key, too short for AES-256.
        let key: Vec<u8> = (0u8..32).collect();
        let err = decrypt(b"", &key, Some(&signature_header())).unwrap_err();
        assert!(matches!(err, DecryptionError::InvalidKeyLength(16)), "{err}");
    }

    #[test]
    fn misaligned_ciphertext_is_rejected() {
        // 16 bytes + the appended zero = 17, not block-aligned.
        let err = decrypt(&[0u8; 16], &group_key(), Some(&signature_header())).unwrap_err();
        assert!(matches!(err, DecryptionError::Misaligned(17)), "{err}");
    }

    #[test]
    fn garbage_ciphertext_fails_padding_not_panics() {
        // 15 garbage bytes + appended zero = one block; unpadding must fail.
        let err = decrypt(&[0xABu8; 15], &group_key(), Some(&signature_header())).unwrap_err();
        assert!(matches!(err, DecryptionError::InvalidPadding), "{err}");
    }

    #[test]
    fn empty_body_is_not_block_aligned() {
        let err = decrypt(b"", &group_key(), Some(&signature_header())).unwrap_err();
        assert!(matches!(err, DecryptionError::Misaligned(1)), "{err}");
    }
}
