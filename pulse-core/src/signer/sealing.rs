use crate::error::{PulseError, Result};
use base64::{engine::general_purpose, Engine as _};
use bip39::rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ChaCha20Poly1305 for authenticated encryption
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

const SALT_SIZE: usize = 32;
const PBKDF2_ROUNDS: u32 = 100_000;

/// Automation key material as written to the identity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum KeyEnvelope {
    #[serde(rename = "plain")]
    Plain { material: String },
    #[serde(rename = "ChaCha20Poly1305")]
    Sealed {
        salt: String,
        nonce: String,
        data: String,
        checksum: String,
    },
}

/// Wraps key material for storage, encrypting it when a passphrase is set.
pub fn seal(material: &str, passphrase: Option<&str>) -> Result<String> {
    let envelope = match passphrase {
        None => KeyEnvelope::Plain {
            material: material.to_string(),
        },
        Some(passphrase) => {
            let mut salt = [0u8; SALT_SIZE];
            OsRng.fill_bytes(&mut salt);

            let key = derive_key(passphrase, &salt);
            let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
            let cipher = ChaCha20Poly1305::new(&key);

            let data = cipher
                .encrypt(&nonce, material.as_bytes())
                .map_err(|e| PulseError::crypto(format!("Encryption failed: {}", e)))?;

            KeyEnvelope::Sealed {
                salt: general_purpose::STANDARD.encode(salt),
                nonce: general_purpose::STANDARD.encode(nonce),
                checksum: calculate_checksum(&data),
                data: general_purpose::STANDARD.encode(&data),
            }
        }
    };

    Ok(serde_json::to_string(&envelope)?)
}

/// Recovers key material written by [`seal`].
pub fn unseal(stored: &str, passphrase: Option<&str>) -> Result<String> {
    let envelope: KeyEnvelope = serde_json::from_str(stored)?;

    match envelope {
        KeyEnvelope::Plain { material } => Ok(material),
        KeyEnvelope::Sealed {
            salt,
            nonce,
            data,
            checksum,
        } => {
            let passphrase = passphrase
                .ok_or_else(|| PulseError::crypto("Automation key is sealed; passphrase required"))?;

            let salt = decode(&salt)?;
            let nonce = decode(&nonce)?;
            let data = decode(&data)?;

            if calculate_checksum(&data) != checksum {
                return Err(PulseError::crypto("Sealed key checksum verification failed"));
            }
            if nonce.len() != 12 {
                return Err(PulseError::crypto("Sealed key has an invalid nonce"));
            }

            let key = derive_key(passphrase, &salt);
            let cipher = ChaCha20Poly1305::new(&key);
            let plain = cipher
                .decrypt(Nonce::from_slice(&nonce), data.as_ref())
                .map_err(|e| PulseError::crypto(format!("Decryption failed: {}", e)))?;

            String::from_utf8(plain)
                .map_err(|e| PulseError::crypto(format!("Sealed key is not UTF-8: {}", e)))
        }
    }
}

fn decode(value: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|e| PulseError::crypto(format!("Invalid base64 in sealed key: {}", e)))
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Key {
    use pbkdf2::pbkdf2_hmac;

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    *Key::from_slice(&key)
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
