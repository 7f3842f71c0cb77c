//! Card number encryption

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::path::Path;
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult};

const PGP_ARMOR: &str = "-----BEGIN PGP";

/// Encrypts card numbers for storage and recovers them for masking
pub trait CardCipher: Send + Sync {
    /// Encrypt a plaintext PAN into a storable string
    fn encrypt(&self, plaintext: &str) -> CryptoResult<String>;

    /// Decrypt a stored PAN. The result is zeroed when dropped.
    fn decrypt(&self, ciphertext: &str) -> CryptoResult<Zeroizing<String>>;
}

/// RSA-OAEP (SHA-256) cipher with base64 ciphertext
///
/// The private key is optional: a deployment that only issues cards can run
/// with the public key alone, and listings then fall back to a fully masked
/// number.
pub struct RsaCardCipher {
    public_key: RsaPublicKey,
    private_key: Option<RsaPrivateKey>,
}

impl RsaCardCipher {
    pub fn new(public_key: RsaPublicKey, private_key: Option<RsaPrivateKey>) -> Self {
        Self {
            public_key,
            private_key,
        }
    }

    /// Build from PEM-encoded SPKI public and PKCS#8 private keys
    ///
    /// OpenPGP armored keyrings are not accepted; export the RSA key as PEM.
    pub fn from_pem(public_pem: &str, private_pem: Option<&str>) -> CryptoResult<Self> {
        for pem in std::iter::once(public_pem).chain(private_pem) {
            if pem.trim_start().starts_with(PGP_ARMOR) {
                return Err(CryptoError::InvalidKeyFormat(
                    "OpenPGP keyrings are not supported, expected a PEM RSA key".to_string(),
                ));
            }
        }

        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("public key: {}", e)))?;

        let private_key = private_pem
            .map(|pem| {
                RsaPrivateKey::from_pkcs8_pem(pem)
                    .map_err(|e| CryptoError::InvalidKeyFormat(format!("private key: {}", e)))
            })
            .transpose()?;

        Ok(Self::new(public_key, private_key))
    }

    /// Load PEM keys from disk
    pub fn from_files(public_path: &Path, private_path: Option<&Path>) -> CryptoResult<Self> {
        let public_pem = std::fs::read_to_string(public_path)
            .map_err(|e| CryptoError::KeyLoad(format!("{}: {}", public_path.display(), e)))?;

        let private_pem = private_path
            .map(|path| {
                std::fs::read_to_string(path)
                    .map(Zeroizing::new)
                    .map_err(|e| CryptoError::KeyLoad(format!("{}: {}", path.display(), e)))
            })
            .transpose()?;

        tracing::info!(
            public_key = %public_path.display(),
            has_private_key = private_pem.is_some(),
            "Loaded card encryption keys"
        );

        Self::from_pem(&public_pem, private_pem.as_deref().map(String::as_str))
    }

    /// Generate a fresh key pair (tests and local development)
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyLoad(format!("key generation: {}", e)))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self::new(public_key, Some(private_key)))
    }
}

impl CardCipher for RsaCardCipher {
    fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let ciphertext = self
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(STANDARD.encode(ciphertext))
    }

    fn decrypt(&self, ciphertext: &str) -> CryptoResult<Zeroizing<String>> {
        let private_key = self
            .private_key
            .as_ref()
            .ok_or(CryptoError::MissingPrivateKey)?;

        let raw = STANDARD
            .decode(ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(format!("base64: {}", e)))?;

        let plain = Zeroizing::new(
            private_key
                .decrypt(Oaep::new::<Sha256>(), &raw)
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?,
        );

        let text = std::str::from_utf8(&plain)
            .map_err(|e| CryptoError::DecryptionFailed(format!("utf-8: {}", e)))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = RsaCardCipher::generate(1024).unwrap();
        let ciphertext = cipher.encrypt("4000123412341234").unwrap();

        assert_ne!(ciphertext, "4000123412341234");
        assert_eq!(cipher.decrypt(&ciphertext).unwrap().as_str(), "4000123412341234");
    }

    #[test]
    fn test_encryption_is_randomized() {
        let cipher = RsaCardCipher::generate(1024).unwrap();
        let a = cipher.encrypt("4111111111111111").unwrap();
        let b = cipher.encrypt("4111111111111111").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_public_only_cannot_decrypt() {
        let full = RsaCardCipher::generate(1024).unwrap();
        let public_only = RsaCardCipher::new(full.public_key.clone(), None);

        let ciphertext = public_only.encrypt("4111111111111111").unwrap();
        assert!(matches!(
            public_only.decrypt(&ciphertext),
            Err(CryptoError::MissingPrivateKey)
        ));
        assert_eq!(full.decrypt(&ciphertext).unwrap().as_str(), "4111111111111111");
    }

    #[test]
    fn test_garbage_ciphertext_rejected() {
        let cipher = RsaCardCipher::generate(1024).unwrap();
        assert!(cipher.decrypt("not base64 !!").is_err());
        assert!(cipher.decrypt(&STANDARD.encode(b"short")).is_err());
    }

    #[test]
    fn test_from_pem() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let private_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();

        let cipher = RsaCardCipher::from_pem(&public_pem, Some(private_pem.as_str())).unwrap();
        let ciphertext = cipher.encrypt("4222222222222222").unwrap();
        assert_eq!(cipher.decrypt(&ciphertext).unwrap().as_str(), "4222222222222222");

        assert!(RsaCardCipher::from_pem("-----BEGIN NOTHING-----", None).is_err());
    }

    #[test]
    fn test_pgp_keyring_rejected_with_hint() {
        let armored = "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQENBF...\n-----END PGP PUBLIC KEY BLOCK-----\n";

        let err = RsaCardCipher::from_pem(armored, None).err().unwrap();

        assert!(matches!(err, CryptoError::InvalidKeyFormat(_)));
        assert!(err.to_string().contains("expected a PEM RSA key"));
    }
}
