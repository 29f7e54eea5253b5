use crate::error::{PulseError, Result};
use crate::signer::Signer;
use crate::types::{Address, Signature};
use async_trait::async_trait;
use bip39::{Language, Mnemonic};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use std::str::FromStr;

/// Standard account path for EVM-style keys.
const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

pub fn generate_mnemonic() -> Result<String> {
    let mut rng = bip39::rand::thread_rng();
    let mnemonic = Mnemonic::generate_in_with(&mut rng, Language::English, 24)
        .map_err(|e| PulseError::internal(format!("Failed to generate mnemonic: {}", e)))?;
    Ok(mnemonic.to_string())
}

pub fn mnemonic_to_secret_key(mnemonic: &str) -> Result<SecretKey> {
    let mnemonic = Mnemonic::parse_in(Language::English, mnemonic)
        .map_err(|e| PulseError::config(format!("Invalid mnemonic: {}", e)))?;

    let seed = mnemonic.to_seed("");
    let secp = Secp256k1::new();

    let master_key = bitcoin::bip32::Xpriv::new_master(bitcoin::Network::Bitcoin, &seed)
        .map_err(|e| PulseError::crypto(format!("Failed to derive master key: {}", e)))?;

    let path = bitcoin::bip32::DerivationPath::from_str(DERIVATION_PATH)
        .map_err(|e| PulseError::config(format!("Invalid derivation path: {}", e)))?;

    let child_key = master_key
        .derive_priv(&secp, &path)
        .map_err(|e| PulseError::crypto(format!("Failed to derive child key: {}", e)))?;

    SecretKey::from_slice(&child_key.private_key.secret_bytes())
        .map_err(|e| PulseError::crypto(format!("Invalid secret key: {}", e)))
}

/// Address of a public key: last 20 bytes of the Keccak-256 hash of the
/// uncompressed point without its prefix byte.
pub fn address_of(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = Keccak256::digest(&uncompressed[1..]);
    Address::from_bytes(&hash[12..])
}

/// Digest signed for a payload, with the personal-message prefix wallets
/// apply so that both signers produce signatures over the same bytes.
pub fn personal_message_digest(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", payload.len()).as_bytes());
    hasher.update(payload);
    hasher.finalize().into()
}

/// Silent signer backed by a key held in process memory.
pub struct LocalSigner {
    secret_key: SecretKey,
    address: Address,
    phrase: Option<String>,
}

impl LocalSigner {
    /// Generates a fresh key. The mnemonic is kept so it can be persisted.
    pub fn generate() -> Result<Self> {
        let mnemonic = generate_mnemonic()?;
        Self::from_material(&mnemonic)
    }

    /// Builds a signer from either a mnemonic phrase or a hex private key.
    pub fn from_material(material: &str) -> Result<Self> {
        let material = material.trim();
        let (secret_key, phrase) = if material.contains(' ') {
            (mnemonic_to_secret_key(material)?, Some(material.to_string()))
        } else {
            let raw = material.strip_prefix("0x").unwrap_or(material);
            let bytes = hex::decode(raw)
                .map_err(|e| PulseError::config(format!("Invalid private key: {}", e)))?;
            let key = SecretKey::from_slice(&bytes)
                .map_err(|e| PulseError::config(format!("Invalid private key: {}", e)))?;
            (key, None)
        };

        let secp = Secp256k1::new();
        let address = address_of(&PublicKey::from_secret_key(&secp, &secret_key));

        Ok(Self {
            secret_key,
            address,
            phrase,
        })
    }

    pub fn local_address(&self) -> &Address {
        &self.address
    }

    /// Material that recreates this signer through `from_material`.
    pub fn export_material(&self) -> String {
        match &self.phrase {
            Some(phrase) => phrase.clone(),
            None => hex::encode(self.secret_key.secret_bytes()),
        }
    }

    fn sign_digest(&self, payload: &[u8]) -> Signature {
        let secp = Secp256k1::new();
        let message = Message::from_digest(personal_message_digest(payload));
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Signature(format!("0x{}", hex::encode(signature.serialize_compact())))
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn address(&self) -> Result<Address> {
        Ok(self.address.clone())
    }

    async fn sign(&self, owner: &Address, payload: &[u8]) -> Result<Signature> {
        if owner != &self.address {
            return Err(PulseError::rejected(format!(
                "Signer address {} does not match requested owner {}",
                self.address, owner
            )));
        }
        Ok(self.sign_digest(payload))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::ecdsa;

    // Well-known key 0x...01 and its address.
    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const KEY_ONE_ADDRESS: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

    #[test]
    fn test_address_derivation_matches_known_vector() {
        let signer = LocalSigner::from_material(KEY_ONE).unwrap();
        assert_eq!(signer.local_address().as_str(), KEY_ONE_ADDRESS);
        assert_eq!(signer.export_material(), KEY_ONE);
    }

    #[test]
    fn test_mnemonic_roundtrip_keeps_address() {
        let signer = LocalSigner::generate().unwrap();
        let material = signer.export_material();
        assert_eq!(material.split_whitespace().count(), 24);

        let restored = LocalSigner::from_material(&material).unwrap();
        assert_eq!(restored.local_address(), signer.local_address());
    }

    #[tokio::test]
    async fn test_sign_verifies_and_rejects_foreign_owner() {
        let signer = LocalSigner::from_material(KEY_ONE).unwrap();
        let owner = signer.address().await.unwrap();

        let signature = signer.sign(&owner, b"payload").await.unwrap();
        let raw = hex::decode(signature.0.trim_start_matches("0x")).unwrap();
        let sig = ecdsa::Signature::from_compact(&raw).unwrap();

        let secp = Secp256k1::new();
        let message = Message::from_digest(personal_message_digest(b"payload"));
        let public_key = PublicKey::from_secret_key(&secp, &signer.secret_key);
        assert!(secp.verify_ecdsa(&message, &sig, &public_key).is_ok());

        let stranger = Address::parse("0x3333333333333333333333333333333333333333").unwrap();
        assert!(matches!(
            signer.sign(&stranger, b"payload").await,
            Err(PulseError::SignerRejected(_))
        ));
    }
}
