use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::error::{Result, VaultError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// A 32-byte AES-256 key, parsed once from the 64-hex-char config value.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes =
            hex::decode(hex_str).map_err(|e| VaultError::Encryption(format!("invalid key hex: {e}")))?;
        let array: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| VaultError::Encryption(format!("key must be {KEY_LEN} bytes")))?;
        Ok(Self(array))
    }

    /// Generates a random ephemeral key for development, per spec.md §6:
    /// `ENCRYPTION_KEY` is required in production but dev may auto-generate.
    /// Tokens encrypted under it do not survive a process restart.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// Encrypts `plaintext` with a random 16-byte IV and returns
/// `hex(iv):hex(ciphertext)`, per spec.md §4.3.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<String> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new(GenericArray::from_slice(&key.0), GenericArray::from_slice(&iv));
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
}

/// Reverses [`encrypt`]. Fails with `Encryption` on malformed envelopes,
/// wrong key, or padding corruption.
pub fn decrypt(key: &EncryptionKey, envelope: &str) -> Result<Vec<u8>> {
    let (iv_hex, ct_hex) = envelope
        .split_once(':')
        .ok_or_else(|| VaultError::Encryption("malformed envelope: missing ':'".to_string()))?;

    let iv = hex::decode(iv_hex).map_err(|e| VaultError::Encryption(format!("invalid iv hex: {e}")))?;
    let iv: [u8; IV_LEN] = iv
        .try_into()
        .map_err(|_| VaultError::Encryption(format!("iv must be {IV_LEN} bytes")))?;
    let ciphertext =
        hex::decode(ct_hex).map_err(|e| VaultError::Encryption(format!("invalid ciphertext hex: {e}")))?;

    Aes256CbcDec::new(GenericArray::from_slice(&key.0), GenericArray::from_slice(&iv))
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|e| VaultError::Encryption(format!("decrypt failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> EncryptionKey {
        EncryptionKey::from_hex(&"ab".repeat(KEY_LEN)).unwrap()
    }

    #[test]
    fn round_trips_plaintext() {
        let key = test_key();
        let envelope = encrypt(&key, b"refresh-token-xyz").unwrap();
        let decrypted = decrypt(&key, &envelope).unwrap();
        assert_eq!(decrypted, b"refresh-token-xyz");
    }

    #[test]
    fn envelope_format_is_hex_iv_colon_hex_ciphertext() {
        let key = test_key();
        let envelope = encrypt(&key, b"hello").unwrap();
        let (iv_hex, ct_hex) = envelope.split_once(':').unwrap();
        assert_eq!(iv_hex.len(), IV_LEN * 2);
        assert!(hex::decode(ct_hex).is_ok());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let envelope = encrypt(&test_key(), b"secret").unwrap();
        let other_key = EncryptionKey::from_hex(&"cd".repeat(KEY_LEN)).unwrap();
        assert!(decrypt(&other_key, &envelope).is_err());
    }

    #[test]
    fn distinct_calls_use_distinct_ivs() {
        let key = test_key();
        let a = encrypt(&key, b"same plaintext").unwrap();
        let b = encrypt(&key, b"same plaintext").unwrap();
        assert_ne!(a, b);
    }
}
