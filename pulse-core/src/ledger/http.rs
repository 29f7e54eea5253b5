use crate::error::{PulseError, Result};
use crate::ledger::request::{parse_response, Field, Request};
use crate::ledger::{ClaimedChain, LedgerClient, LedgerConnector, Provisioner};
use crate::signer::{CompositeSigner, Signer};
use crate::types::{Address, Amount, ApplicationId, ChainId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const OWNER_HEADER: &str = "x-pulse-owner";
const SIGNATURE_HEADER: &str = "x-pulse-signature";

fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| PulseError::config(format!("Failed to create HTTP client: {}", e)))
}

/// Connection failures are retryable; everything else keeps its own kind.
fn classify(err: reqwest::Error) -> PulseError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        PulseError::network(err.to_string())
    } else {
        PulseError::Http(err)
    }
}

async fn send(builder: reqwest::RequestBuilder, url: &str) -> Result<String> {
    let response = builder.send().await.map_err(classify)?;
    let status = response.status();
    let text = response.text().await.map_err(classify)?;

    if !status.is_success() {
        tracing::debug!("POST {} returned {}", url, status);
        if status.is_server_error() && !text.is_empty() {
            // Node-side failures carry the replica error in the body.
            return Err(PulseError::ledger(text).into_fatal_if_corrupt());
        }
        return Err(PulseError::ledger(format!("{} from {}: {}", status, url, text)));
    }

    Ok(text)
}

/// Ledger client speaking JSON over HTTP to a node service.
pub struct HttpLedgerClient {
    http: reqwest::Client,
    node_url: String,
    signer: Arc<CompositeSigner>,
}

impl HttpLedgerClient {
    pub fn new(node_url: &str, signer: Arc<CompositeSigner>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            node_url: node_url.trim_end_matches('/').to_string(),
            signer,
        })
    }

    fn chain_url(&self, chain_id: &ChainId) -> String {
        format!("{}/chains/{}", self.node_url, chain_id)
    }

    fn application_url(&self, chain_id: &ChainId, application_id: &ApplicationId) -> String {
        format!(
            "{}/chains/{}/applications/{}",
            self.node_url, chain_id, application_id
        )
    }

    async fn send_unsigned(&self, url: &str, request: &Request) -> Result<String> {
        send(self.http.post(url).json(&request.body()), url).await
    }

    async fn send_signed(&self, url: &str, request: &Request, owner: &Address) -> Result<String> {
        let body = serde_json::to_vec(&request.body())?;
        let signature = self.signer.sign(owner, &body).await?;

        let builder = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(OWNER_HEADER, owner.as_str())
            .header(SIGNATURE_HEADER, signature.0)
            .body(body);
        send(builder, url).await
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn query(
        &self,
        chain_id: &ChainId,
        application_id: &ApplicationId,
        request: &Request,
    ) -> Result<String> {
        let url = self.application_url(chain_id, application_id);
        self.send_unsigned(&url, request).await
    }

    async fn mutate(
        &self,
        chain_id: &ChainId,
        application_id: &ApplicationId,
        request: &Request,
        owner: &Address,
    ) -> Result<String> {
        let url = self.application_url(chain_id, application_id);
        tracing::debug!(
            "Submitting {} on {} as {}",
            request.operation_name(),
            chain_id,
            owner
        );
        self.send_signed(&url, request, owner).await
    }

    async fn balance(&self, chain_id: &ChainId) -> Result<Amount> {
        let request = Request::query(Field::new("balance"));
        let text = self.send_unsigned(&self.chain_url(chain_id), &request).await?;
        let data = parse_response(&text)?;

        match data.get("balance") {
            Some(Value::String(raw)) => raw.parse(),
            Some(Value::Number(n)) => n.to_string().parse(),
            _ => Err(PulseError::ledger("Balance missing from response")),
        }
    }

    async fn add_authorized_signer(&self, chain_id: &ChainId, owner: &Address) -> Result<()> {
        let request = Request::mutation(Field::new("addOwner").arg("owner", owner.as_str()));
        // Only the chain owner may add owners.
        let chain_owner = self.signer.primary_address().clone();
        let text = self
            .send_signed(&self.chain_url(chain_id), &request, &chain_owner)
            .await?;
        parse_response(&text)?;

        tracing::info!("Authorized {} on chain {}", owner, chain_id);
        Ok(())
    }
}

/// Opens [`HttpLedgerClient`]s against one node service.
pub struct HttpConnector {
    node_url: String,
}

impl HttpConnector {
    pub fn new(node_url: impl Into<String>) -> Self {
        Self {
            node_url: node_url.into(),
        }
    }
}

#[async_trait]
impl LedgerConnector for HttpConnector {
    async fn open(
        &self,
        chain_id: &ChainId,
        signer: Arc<CompositeSigner>,
    ) -> Result<Arc<dyn LedgerClient>> {
        let client = HttpLedgerClient::new(&self.node_url, signer)?;
        tracing::info!("Opened ledger client for chain {} at {}", chain_id, self.node_url);
        Ok(Arc::new(client))
    }
}

/// Faucet that claims chains over HTTP.
pub struct HttpFaucet {
    http: reqwest::Client,
    url: String,
}

impl HttpFaucet {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Provisioner for HttpFaucet {
    async fn claim_chain(&self, owner: &Address) -> Result<ClaimedChain> {
        let request = Request::mutation(
            Field::new("claim")
                .arg("owner", owner.as_str())
                .select(&["chainId", "balance"]),
        );
        let builder = self.http.post(&self.url).json(&request.body());
        let text = send(builder, &self.url).await?;
        let data = parse_response(&text)?;

        let claim = data
            .get("claim")
            .ok_or_else(|| PulseError::ledger("Faucet response missing claim"))?;
        let chain_id = claim
            .get("chainId")
            .and_then(Value::as_str)
            .ok_or_else(|| PulseError::ledger("Faucet response missing chainId"))?;
        let balance = match claim.get("balance").and_then(Value::as_str) {
            Some(raw) => raw.parse()?,
            None => Amount::ZERO,
        };

        tracing::info!("Claimed chain {} for {}", chain_id, owner);
        Ok(ClaimedChain {
            chain_id: ChainId::new(chain_id),
            balance,
        })
    }
}
