use crate::error::{PulseError, Result};
use crate::ledger::{ClaimedChain, LedgerClient, LedgerConnector, Provisioner, Request};
use crate::session::{RuntimeEnvironment, SessionHost, SessionNotice};
use crate::signer::{CompositeSigner, Signer};
use crate::types::{Address, Amount, ApplicationId, ChainId, Signature};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub(crate) fn address(n: u8) -> Address {
    Address::from_bytes(&[n; 20])
}

pub(crate) struct MockSigner {
    address: Address,
    reject: bool,
    address_calls: AtomicUsize,
    signed: Mutex<Vec<Vec<u8>>>,
}

impl MockSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            reject: false,
            address_calls: AtomicUsize::new(0),
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(address: Address) -> Self {
        Self {
            reject: true,
            ..Self::new(address)
        }
    }

    pub fn sign_count(&self) -> usize {
        self.signed.lock().len()
    }

    pub fn address_calls(&self) -> usize {
        self.address_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for MockSigner {
    async fn address(&self) -> Result<Address> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(PulseError::rejected("User rejected the request"));
        }
        Ok(self.address.clone())
    }

    async fn sign(&self, _owner: &Address, payload: &[u8]) -> Result<Signature> {
        if self.reject {
            return Err(PulseError::rejected("User rejected the request"));
        }
        self.signed.lock().push(payload.to_vec());
        Ok(Signature(format!("0xsigned-by-{}", self.address)))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedMutation {
    pub chain_id: ChainId,
    pub request: String,
    pub owner: Address,
}

#[derive(Default)]
struct LedgerScript {
    responses: HashMap<ChainId, std::result::Result<String, String>>,
    mutation_failure: Option<String>,
    registration_failure: Option<String>,
    balance: Option<std::result::Result<Amount, String>>,
    queries: Vec<(ChainId, String)>,
    mutations: Vec<RecordedMutation>,
    authorized: Vec<(ChainId, Address)>,
}

/// Ledger with per-chain scripted query responses that records every call.
#[derive(Default)]
pub(crate) struct MockLedger {
    script: Mutex<LedgerScript>,
    registration_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, chain_id: &ChainId, response: &str) {
        self.script
            .lock()
            .responses
            .insert(chain_id.clone(), Ok(response.to_string()));
    }

    pub fn fail(&self, chain_id: &ChainId, message: &str) {
        self.script
            .lock()
            .responses
            .insert(chain_id.clone(), Err(message.to_string()));
    }

    pub fn fail_mutations(&self, message: &str) {
        self.script.lock().mutation_failure = Some(message.to_string());
    }

    pub fn fail_registration(&self, message: &str) {
        self.script.lock().registration_failure = Some(message.to_string());
    }

    /// Registrations wait until the returned gate is notified.
    pub fn hold_registration(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.registration_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn set_balance(&self, balance: Amount) {
        self.script.lock().balance = Some(Ok(balance));
    }

    pub fn fail_balance(&self, message: &str) {
        self.script.lock().balance = Some(Err(message.to_string()));
    }

    pub fn queries(&self) -> Vec<(ChainId, String)> {
        self.script.lock().queries.clone()
    }

    pub fn mutations(&self) -> Vec<RecordedMutation> {
        self.script.lock().mutations.clone()
    }

    pub fn authorized(&self) -> Vec<(ChainId, Address)> {
        self.script.lock().authorized.clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn query(
        &self,
        chain_id: &ChainId,
        _application_id: &ApplicationId,
        request: &Request,
    ) -> Result<String> {
        let mut script = self.script.lock();
        script.queries.push((chain_id.clone(), request.render()));
        match script.responses.get(chain_id) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(PulseError::network(message.clone())),
            None => Err(PulseError::ledger(format!("No response for chain {}", chain_id))),
        }
    }

    async fn mutate(
        &self,
        chain_id: &ChainId,
        _application_id: &ApplicationId,
        request: &Request,
        owner: &Address,
    ) -> Result<String> {
        let mut script = self.script.lock();
        if let Some(message) = &script.mutation_failure {
            return Err(PulseError::network(message.clone()));
        }
        script.mutations.push(RecordedMutation {
            chain_id: chain_id.clone(),
            request: request.render(),
            owner: owner.clone(),
        });
        Ok(r#"{"data":{}}"#.to_string())
    }

    async fn balance(&self, _chain_id: &ChainId) -> Result<Amount> {
        match &self.script.lock().balance {
            Some(Ok(balance)) => Ok(*balance),
            Some(Err(message)) => Err(PulseError::network(message.clone())),
            None => Ok(Amount::ZERO),
        }
    }

    async fn add_authorized_signer(&self, chain_id: &ChainId, owner: &Address) -> Result<()> {
        let gate = self.registration_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut script = self.script.lock();
        if let Some(message) = &script.registration_failure {
            return Err(PulseError::ledger(message.clone()));
        }
        script.authorized.push((chain_id.clone(), owner.clone()));
        Ok(())
    }
}

pub(crate) struct MockConnector {
    pub ledger: Arc<MockLedger>,
    opened: Mutex<Vec<ChainId>>,
    purged: AtomicUsize,
}

impl MockConnector {
    pub fn new(ledger: Arc<MockLedger>) -> Self {
        Self {
            ledger,
            opened: Mutex::new(Vec::new()),
            purged: AtomicUsize::new(0),
        }
    }

    pub fn opened(&self) -> Vec<ChainId> {
        self.opened.lock().clone()
    }

    pub fn purge_count(&self) -> usize {
        self.purged.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerConnector for MockConnector {
    async fn open(
        &self,
        chain_id: &ChainId,
        _signer: Arc<CompositeSigner>,
    ) -> Result<Arc<dyn LedgerClient>> {
        self.opened.lock().push(chain_id.clone());
        Ok(self.ledger.clone())
    }

    async fn purge_local_state(&self) -> Result<()> {
        self.purged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockProvisioner {
    claims: Mutex<Vec<Address>>,
    failure: Mutex<Option<String>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn claims(&self) -> Vec<Address> {
        self.claims.lock().clone()
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn claim_chain(&self, owner: &Address) -> Result<ClaimedChain> {
        if let Some(message) = self.failure.lock().clone() {
            return Err(PulseError::ledger(message));
        }
        let mut claims = self.claims.lock();
        claims.push(owner.clone());
        Ok(ClaimedChain {
            chain_id: ChainId::new(format!("chain-{}", claims.len())),
            balance: Amount::from_tokens(10),
        })
    }
}

#[derive(Default)]
pub(crate) struct MockHost {
    notices: Mutex<Vec<SessionNotice>>,
    reloads: AtomicUsize,
}

impl MockHost {
    pub fn notices(&self) -> Vec<SessionNotice> {
        self.notices.lock().clone()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl SessionHost for MockHost {
    fn notify(&self, notice: SessionNotice) {
        self.notices.lock().push(notice);
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runtime that lacks whatever the ledger client needs.
pub(crate) struct MissingRuntime;

impl RuntimeEnvironment for MissingRuntime {
    fn check(&self) -> std::result::Result<(), String> {
        Err("shared memory unavailable".to_string())
    }
}
