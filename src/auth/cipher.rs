//! Client-side password encryption for the SSO login form.
//!
//! The gateway's login page encrypts the password in the browser before
//! submitting it, and the server-side verifier only accepts that exact
//! transform: a 64-character random prefix is prepended to the password,
//! the result is AES-128-CBC encrypted (PKCS#7 padding) under the
//! server-issued salt as key and a fresh 16-character random IV, and the
//! ciphertext is sent base64-encoded. This module replicates it byte for
//! byte; it is pure and does no I/O.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::Rng;
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

/// Alphabet the login page's script draws random characters from.
/// Frozen: visually ambiguous glyphs (I, l, O, 0, 1, 9, ...) are excluded.
const CIPHER_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTWXYZabcdefhijkmnprstwxyz2345678";

/// Length of the random prefix prepended to the password before encryption
const PREFIX_LEN: usize = 64;

/// Length of the random initialization vector
const IV_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("salt is {0} bytes after trimming, expected a 16-byte AES key")]
    BadKeyLength(usize),
}

/// Encrypt `password` the way the gateway's login page does.
///
/// An empty salt degrades to returning the password unchanged. This mirrors
/// an observed fallback in the page script and is preserved even though the
/// gateway always issues a salt in practice.
///
/// Fresh randomness is drawn on every call, so two encryptions of the same
/// password never compare equal.
pub fn encrypt(password: &str, salt: &str) -> Result<String, CipherError> {
    if salt.is_empty() {
        return Ok(password.to_string());
    }
    let prefix = random_string(PREFIX_LEN);
    let iv = random_string(IV_LEN);
    encrypt_with(password, salt, &prefix, &iv)
}

/// Deterministic inner transform; split out so tests can fix prefix and IV.
fn encrypt_with(password: &str, salt: &str, prefix: &str, iv: &str) -> Result<String, CipherError> {
    let key = salt.trim().as_bytes();
    let plaintext = format!("{prefix}{password}");

    let encryptor = Aes128CbcEnc::new_from_slices(key, iv.as_bytes())
        .map_err(|_| CipherError::BadKeyLength(key.len()))?;
    let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(BASE64.encode(ciphertext))
}

/// Random string of `len` characters drawn from the frozen alphabet
fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CIPHER_ALPHABET[rng.gen_range(0..CIPHER_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockDecryptMut;

    type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

    const SALT: &str = "ABCDEFGHJKMNPQRS";

    fn decrypt(ciphertext_b64: &str, salt: &str, iv: &str) -> String {
        let ciphertext = BASE64.decode(ciphertext_b64).expect("valid base64");
        assert_eq!(ciphertext.len() % 16, 0, "ciphertext is block-aligned");
        let plaintext = Aes128CbcDec::new_from_slices(salt.trim().as_bytes(), iv.as_bytes())
            .expect("valid key/iv")
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .expect("valid padding");
        String::from_utf8(plaintext).expect("utf-8 plaintext")
    }

    #[test]
    fn test_round_trip_recovers_prefixed_password() {
        let prefix = random_string(PREFIX_LEN);
        let iv = random_string(IV_LEN);
        let out = encrypt_with("hunter2", SALT, &prefix, &iv).unwrap();

        let plaintext = decrypt(&out, SALT, &iv);
        assert!(plaintext.ends_with("hunter2"));
        assert_eq!(plaintext.len(), PREFIX_LEN + "hunter2".len());
        assert_eq!(&plaintext[..PREFIX_LEN], prefix);
    }

    #[test]
    fn test_encrypt_output_is_block_aligned_base64() {
        let out = encrypt("some-password", SALT).unwrap();
        let decoded = BASE64.decode(&out).expect("valid base64");
        assert_eq!(decoded.len() % 16, 0);
    }

    #[test]
    fn test_encrypt_is_randomized_across_calls() {
        // Fresh prefix and IV per call: exact ciphertext equality must not hold
        let a = encrypt("some-password", SALT).unwrap();
        let b = encrypt("some-password", SALT).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_salt_returns_password_unchanged() {
        assert_eq!(encrypt("hunter2", "").unwrap(), "hunter2");
    }

    #[test]
    fn test_salt_is_trimmed_before_keying() {
        let iv = random_string(IV_LEN);
        let padded_salt = format!("  {SALT}  ");
        let out = encrypt_with("pw", &padded_salt, "p", &iv).unwrap();
        assert_eq!(decrypt(&out, SALT, &iv), "ppw");
    }

    #[test]
    fn test_wrong_length_salt_is_an_error() {
        match encrypt("pw", "short") {
            Err(CipherError::BadKeyLength(5)) => {}
            other => panic!("expected BadKeyLength, got {other:?}"),
        }
    }

    #[test]
    fn test_random_string_stays_in_alphabet() {
        let s = random_string(256);
        assert_eq!(s.len(), 256);
        assert!(s.bytes().all(|b| CIPHER_ALPHABET.contains(&b)));
    }
}
