pub mod http;
pub mod request;

pub use http::{HttpConnector, HttpFaucet, HttpLedgerClient};
pub use request::{Arg, Field, Request, RequestKind};

use crate::error::Result;
use crate::signer::CompositeSigner;
use crate::types::{Address, Amount, ApplicationId, ChainId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Remote query/mutate endpoint for a sharded ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn query(
        &self,
        chain_id: &ChainId,
        application_id: &ApplicationId,
        request: &Request,
    ) -> Result<String>;

    /// Submits a mutation signed by `owner`.
    async fn mutate(
        &self,
        chain_id: &ChainId,
        application_id: &ApplicationId,
        request: &Request,
        owner: &Address,
    ) -> Result<String>;

    async fn balance(&self, chain_id: &ChainId) -> Result<Amount>;

    async fn add_authorized_signer(&self, chain_id: &ChainId, owner: &Address) -> Result<()>;
}

/// Opens ledger clients bound to a signer.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn open(
        &self,
        chain_id: &ChainId,
        signer: Arc<CompositeSigner>,
    ) -> Result<Arc<dyn LedgerClient>>;

    /// Removes any replica state the connector keeps outside the shared
    /// storage.
    async fn purge_local_state(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClaimedChain {
    pub chain_id: ChainId,
    pub balance: Amount,
}

/// Hands out new chains (and tokens) to an owner.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn claim_chain(&self, owner: &Address) -> Result<ClaimedChain>;
}

/// A ledger client bound to one application on the viewer's chain, acting
/// as one owner.
#[derive(Clone)]
pub struct ApplicationHandle {
    client: Arc<dyn LedgerClient>,
    chain_id: ChainId,
    application_id: ApplicationId,
    owner: Address,
}

impl ApplicationHandle {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        chain_id: ChainId,
        application_id: ApplicationId,
        owner: Address,
    ) -> Self {
        Self {
            client,
            chain_id,
            application_id,
            owner,
        }
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub fn application_id(&self) -> &ApplicationId {
        &self.application_id
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Queries the application on the viewer's chain.
    pub async fn query(&self, request: &Request) -> Result<Value> {
        self.query_on(&self.chain_id, request).await
    }

    /// Queries the same application on another chain.
    pub async fn query_on(&self, chain_id: &ChainId, request: &Request) -> Result<Value> {
        let text = self
            .client
            .query(chain_id, &self.application_id, request)
            .await?;
        request::parse_response(&text)
    }

    /// Submits a mutation on the viewer's chain.
    pub async fn mutate(&self, request: &Request) -> Result<Value> {
        let text = self
            .client
            .mutate(&self.chain_id, &self.application_id, request, &self.owner)
            .await?;
        request::parse_response(&text)
    }
}

impl std::fmt::Debug for ApplicationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationHandle")
            .field("chain_id", &self.chain_id)
            .field("application_id", &self.application_id)
            .field("owner", &self.owner)
            .finish()
    }
}
