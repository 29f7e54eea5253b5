pub mod composite;
pub mod local;
pub mod sealing;

pub use composite::{CompositeSigner, SignerRole};
pub use local::LocalSigner;

use crate::error::Result;
use crate::types::{Address, Signature};
use async_trait::async_trait;

/// Something that can prove control of an address.
///
/// Interactive implementations may prompt the user and may reject.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn address(&self) -> Result<Address>;

    async fn sign(&self, owner: &Address, payload: &[u8]) -> Result<Signature>;

    async fn contains_key(&self, owner: &Address) -> bool {
        match self.address().await {
            Ok(address) => &address == owner,
            Err(_) => false,
        }
    }
}
