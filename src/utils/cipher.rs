//! Reversible encryption for the personal fields of a user row.
//!
//! AES-256-CBC with PKCS#7 padding and base64 output. Key and IV are fixed
//! for every row, so equal plaintexts always produce equal ciphertexts. Rows
//! already written depend on this, so it cannot change without a data
//! migration.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SECRET_KEY: &[u8; 32] = b"MySuperSecretKeyForSinewaveApp12";
const INIT_VECTOR: &[u8; 16] = b"MyInitVector1234";

/// Shown in place of the username when a row cannot be decrypted.
pub const DECRYPTION_ERROR_SENTINEL: &str = "[decryption error]";

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Encryption error")]
    Encryption,
    #[error("Decryption error")]
    Decryption,
}

#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; 32],
    iv: [u8; 16],
}

impl Default for FieldCipher {
    fn default() -> Self {
        Self {
            key: *SECRET_KEY,
            iv: *INIT_VECTOR,
        }
    }
}

impl FieldCipher {
    /// `None` passes through untouched.
    pub fn encrypt(&self, value: Option<&str>) -> Result<Option<String>, CipherError> {
        let Some(value) = value else {
            return Ok(None);
        };
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.iv)
            .map_err(|_| CipherError::Encryption)?;
        let encrypted = cipher.encrypt_padded_vec_mut::<Pkcs7>(value.as_bytes());
        Ok(Some(STANDARD.encode(encrypted)))
    }

    /// `None` passes through untouched.
    pub fn decrypt(&self, encrypted: Option<&str>) -> Result<Option<String>, CipherError> {
        let Some(encrypted) = encrypted else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(encrypted)
            .map_err(|_| CipherError::Decryption)?;
        let cipher = Aes256CbcDec::new_from_slices(&self.key, &self.iv)
            .map_err(|_| CipherError::Decryption)?;
        let original = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
            .map_err(|_| CipherError::Decryption)?;
        String::from_utf8(original)
            .map(Some)
            .map_err(|_| CipherError::Decryption)
    }

    /// Encrypts a required column value.
    pub fn seal(&self, value: &str) -> Result<String, CipherError> {
        self.encrypt(Some(value))?.ok_or(CipherError::Encryption)
    }
}
