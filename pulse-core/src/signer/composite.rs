use crate::error::{PulseError, Result};
use crate::signer::Signer;
use crate::types::{Address, Signature};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    /// Externally controlled, may prompt the user.
    Primary,
    /// Locally held, never prompts.
    Automation,
}

/// One logical identity over two signers. Requests are routed by the
/// address being signed for, never by what the caller intends.
pub struct CompositeSigner {
    primary: Arc<dyn Signer>,
    primary_address: Address,
    automation: Arc<dyn Signer>,
    automation_address: Address,
}

impl CompositeSigner {
    pub fn new(
        primary: Arc<dyn Signer>,
        primary_address: Address,
        automation: Arc<dyn Signer>,
        automation_address: Address,
    ) -> Self {
        Self {
            primary,
            primary_address,
            automation,
            automation_address,
        }
    }

    pub fn primary_address(&self) -> &Address {
        &self.primary_address
    }

    pub fn automation_address(&self) -> &Address {
        &self.automation_address
    }

    pub fn route(&self, owner: &Address) -> Result<SignerRole> {
        if owner == &self.automation_address {
            Ok(SignerRole::Automation)
        } else if owner == &self.primary_address {
            Ok(SignerRole::Primary)
        } else {
            Err(PulseError::SignerRouting {
                address: owner.to_string(),
            })
        }
    }
}

#[async_trait]
impl Signer for CompositeSigner {
    /// The chain owner is the primary address.
    async fn address(&self) -> Result<Address> {
        Ok(self.primary_address.clone())
    }

    async fn sign(&self, owner: &Address, payload: &[u8]) -> Result<Signature> {
        match self.route(owner)? {
            SignerRole::Automation => self.automation.sign(owner, payload).await,
            SignerRole::Primary => {
                tracing::debug!("Routing signature for {} to primary signer", owner);
                self.primary.sign(owner, payload).await
            }
        }
    }

    async fn contains_key(&self, owner: &Address) -> bool {
        self.route(owner).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{address, MockSigner};

    fn composite() -> (CompositeSigner, Arc<MockSigner>, Arc<MockSigner>) {
        let primary = Arc::new(MockSigner::new(address(1)));
        let automation = Arc::new(MockSigner::new(address(2)));
        let signer = CompositeSigner::new(
            primary.clone(),
            address(1),
            automation.clone(),
            address(2),
        );
        (signer, primary, automation)
    }

    #[tokio::test]
    async fn test_automation_requests_never_reach_primary() {
        let (signer, primary, automation) = composite();

        for _ in 0..3 {
            signer.sign(&address(2), b"bet").await.unwrap();
        }

        assert_eq!(automation.sign_count(), 3);
        assert_eq!(primary.sign_count(), 0);
    }

    #[tokio::test]
    async fn test_primary_requests_never_reach_automation() {
        let (signer, primary, automation) = composite();

        signer.sign(&address(1), b"add owner").await.unwrap();

        assert_eq!(primary.sign_count(), 1);
        assert_eq!(automation.sign_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_address_is_a_routing_error() {
        let (signer, primary, automation) = composite();

        let result = signer.sign(&address(9), b"payload").await;
        assert!(matches!(result, Err(PulseError::SignerRouting { .. })));
        assert_eq!(primary.sign_count() + automation.sign_count(), 0);
        assert!(!signer.contains_key(&address(9)).await);
        assert!(signer.contains_key(&address(2)).await);
    }
}
