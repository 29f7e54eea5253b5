pub mod config;
pub mod environment;
pub mod state;

pub use config::SessionConfig;
pub use environment::{RuntimeEnvironment, SessionHost, TokioRuntime};
pub use state::{SessionNotice, SessionSnapshot, SessionStatus};

use crate::error::{PulseError, Result};
use crate::ledger::{
    ApplicationHandle, ClaimedChain, HttpConnector, HttpFaucet, LedgerClient, LedgerConnector,
    Provisioner,
};
use crate::signer::sealing::{seal, unseal};
use crate::signer::{CompositeSigner, LocalSigner, Signer};
use crate::storage::{ChainCache, IdentityKey, IdentityStore, Storage};
use crate::task::TaskHandle;
use crate::types::{Address, Amount, ApplicationId, ChainId};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

/// Collaborators a session talks to.
pub struct SessionServices {
    pub connector: Arc<dyn LedgerConnector>,
    pub provisioner: Arc<dyn Provisioner>,
    /// Interactive signer for the primary address. Never asked for its
    /// address on restore.
    pub primary: Arc<dyn Signer>,
    pub runtime: Arc<dyn RuntimeEnvironment>,
    pub host: Arc<dyn SessionHost>,
}

#[derive(Clone)]
struct ActiveSession {
    chain_id: ChainId,
    client: Arc<dyn LedgerClient>,
    signer: Arc<CompositeSigner>,
}

/// Owns the user's chain identity: the primary/automation signer pair, the
/// ledger client signing with it, and the cached balance.
///
/// Cloning is cheap and every clone drives the same session.
#[derive(Clone)]
pub struct SessionManager {
    config: Arc<SessionConfig>,
    storage: Arc<Storage>,
    services: Arc<SessionServices>,
    active: Arc<RwLock<Option<ActiveSession>>>,
    snapshot: Arc<watch::Sender<SessionSnapshot>>,
    initialized: Arc<AtomicBool>,
    connecting: Arc<AtomicBool>,
    /// Held by reset and by background writes, so nothing lands in the
    /// store after it was wiped.
    writes: Arc<Mutex<()>>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, storage: Arc<Storage>, services: SessionServices) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            config: Arc::new(config),
            storage,
            services: Arc::new(services),
            active: Arc::new(RwLock::new(None)),
            snapshot: Arc::new(snapshot),
            initialized: Arc::new(AtomicBool::new(false)),
            connecting: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Session against the configured node and faucet, persisted under
    /// `data_dir`.
    pub async fn open(
        data_dir: &Path,
        config: SessionConfig,
        primary: Arc<dyn Signer>,
        host: Arc<dyn SessionHost>,
    ) -> Result<Self> {
        config.validate()?;

        let db_path = data_dir.join(&config.database_file);
        let storage = Arc::new(Storage::new(&db_path).await?);

        let services = SessionServices {
            connector: Arc::new(HttpConnector::new(config.node_url.clone())),
            provisioner: Arc::new(HttpFaucet::new(config.faucet_url.clone())?),
            primary,
            runtime: Arc::new(TokioRuntime),
            host,
        };

        Ok(Self::new(config, storage, services))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    /// Checks the runtime and restores any stored identity. Returns whether
    /// a session was restored. A second call does nothing.
    pub async fn initialize(&self) -> Result<bool> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(self.snapshot().is_connected());
        }

        if let Err(reason) = self.services.runtime.check() {
            self.initialized.store(false, Ordering::SeqCst);
            let err = PulseError::MissingRuntimeCapability(reason);
            tracing::error!("{}", err);
            self.update(|s| s.error = Some(err.to_string()));
            return Err(err);
        }

        self.update(|s| s.status = SessionStatus::Disconnected);
        tracing::info!("Runtime ready");

        Ok(self.restore().await)
    }

    /// Rebuilds the stored identity without prompting. Failures leave the
    /// store untouched and the session disconnected.
    pub async fn restore(&self) -> bool {
        match self.try_restore().await {
            Ok(restored) => restored,
            Err(e) => {
                let err = PulseError::RestoreFailed(e.to_string());
                tracing::warn!("{}", err);
                self.deactivate(SessionStatus::Disconnected);
                false
            }
        }
    }

    async fn try_restore(&self) -> Result<bool> {
        let store = IdentityStore::new(&self.storage);
        let identity = match store.load().await? {
            Some(identity) => identity,
            None => {
                tracing::debug!("No stored identity to restore");
                return Ok(false);
            }
        };

        let passphrase = self.config.key_passphrase.as_deref();
        let (automation, reused) = match &identity.automation_key {
            Some(stored) => (LocalSigner::from_material(&unseal(stored, passphrase)?)?, true),
            None => {
                let automation = LocalSigner::generate()?;
                let sealed = seal(&automation.export_material(), passphrase)?;
                store.set(IdentityKey::AutomationKey, &sealed).await?;
                store.set(IdentityKey::AutomationRegistered, "false").await?;
                (automation, false)
            }
        };

        let registered = reused && identity.automation_registered;
        let automation_address = automation.local_address().clone();
        let signer = self.compose(identity.primary_address.clone(), automation);
        let client = self
            .services
            .connector
            .open(&identity.chain_id, signer.clone())
            .await?;

        self.activate(ActiveSession {
            chain_id: identity.chain_id.clone(),
            client: client.clone(),
            signer,
        });
        self.update(|s| {
            s.status = SessionStatus::Syncing;
            s.chain_id = Some(identity.chain_id.clone());
            s.primary_address = Some(identity.primary_address.clone());
            s.automation_address = Some(automation_address.clone());
            s.balance = identity.balance;
            s.automation_registered = registered;
            s.error = None;
        });

        if registered {
            tracing::info!("Reusing automation signer {}", automation_address);
        } else {
            if reused {
                tracing::info!(
                    "Stored automation signer {} was never registered, retrying",
                    automation_address
                );
            }
            self.spawn_registration(client, identity.chain_id.clone(), automation_address);
        }

        tracing::info!(
            "Restored session for {} on chain {}",
            identity.primary_address,
            identity.chain_id
        );

        self.refresh_balance().await;
        Ok(true)
    }

    /// Interactive connection: asks the primary signer for its address,
    /// claims a chain and installs a fresh automation key on it.
    pub async fn connect(&self) -> Result<()> {
        if self.connecting.swap(true, Ordering::SeqCst) {
            return Err(PulseError::ConnectInProgress);
        }

        let previous = self.snapshot().status;
        self.update(|s| {
            s.is_connecting = true;
            s.status = SessionStatus::Connecting;
            s.error = None;
        });

        let result = self.try_connect().await;
        self.connecting.store(false, Ordering::SeqCst);
        self.update(|s| s.is_connecting = false);

        let err = match result {
            Ok(()) => return Ok(()),
            Err(e) => e.into_fatal_if_corrupt(),
        };

        if let PulseError::FatalSyncCorruption { signature, .. } = &err {
            tracing::error!("Fatal sync error detected ({}), resetting", signature);
            self.services.host.notify(SessionNotice::Resetting {
                reason: signature.clone(),
            });
            self.update(|s| s.error = Some(err.to_string()));
            if let Err(reset_err) = self.disconnect().await {
                tracing::error!("Reset after fatal sync error failed: {}", reset_err);
            }
            return Err(err);
        }

        tracing::error!("Connection failed: {}", err);
        let fallback = if self.active.read().is_some() {
            previous
        } else {
            SessionStatus::Disconnected
        };
        self.update(|s| {
            s.status = fallback;
            s.error = Some(err.to_string());
        });
        Err(err)
    }

    async fn try_connect(&self) -> Result<()> {
        // Ask the user who they are
        let primary_address = self.services.primary.address().await?;
        tracing::info!("Connecting {}", primary_address);

        // Claim a chain for them
        let claimed = self.services.provisioner.claim_chain(&primary_address).await?;

        // Fresh automation key, persisted before anything can use it
        let automation = LocalSigner::generate()?;
        let sealed = seal(
            &automation.export_material(),
            self.config.key_passphrase.as_deref(),
        )?;
        IdentityStore::new(&self.storage)
            .save_connection(&claimed.chain_id, &primary_address, &sealed)
            .await?;

        let automation_address = automation.local_address().clone();
        let signer = self.compose(primary_address.clone(), automation);
        let client = self
            .services
            .connector
            .open(&claimed.chain_id, signer.clone())
            .await?;

        self.activate(ActiveSession {
            chain_id: claimed.chain_id.clone(),
            client: client.clone(),
            signer,
        });
        self.update(|s| {
            s.status = SessionStatus::Connected;
            s.chain_id = Some(claimed.chain_id.clone());
            s.primary_address = Some(primary_address.clone());
            s.automation_address = Some(automation_address.clone());
            s.balance = Some(claimed.balance);
            s.automation_registered = false;
        });
        tracing::info!(
            "Connected {} on chain {} (automation signer {})",
            primary_address,
            claimed.chain_id,
            automation_address
        );

        self.spawn_registration(client, claimed.chain_id, automation_address);

        let this = self.clone();
        tokio::spawn(async move {
            this.refresh_balance().await;
        });

        Ok(())
    }

    /// Wipes every persisted identity key and ledger cache, then asks the
    /// host to reload.
    pub async fn disconnect(&self) -> Result<()> {
        tracing::info!("Resetting network...");
        self.update(|s| s.status = SessionStatus::Resetting);

        let writes = self.writes.lock().await;
        let removed = self.storage.wipe_all().await?;
        if let Err(e) = self.services.connector.purge_local_state().await {
            tracing::warn!("Failed to purge ledger state: {}", e);
        }

        self.deactivate(SessionStatus::Resetting);
        drop(writes);
        tracing::info!("Reset complete ({} rows removed), reloading", removed);
        self.services.host.reload();
        Ok(())
    }

    /// Best-effort balance read. On failure the cached value stays.
    pub async fn refresh_balance(&self) -> Option<Amount> {
        let active = self.active.read().clone()?;

        match active.client.balance(&active.chain_id).await {
            Ok(balance) => {
                let _writes = self.writes.lock().await;
                let applied = self.update_for_chain(&active.chain_id, |s| {
                    s.balance = Some(balance);
                    if matches!(s.status, SessionStatus::Syncing | SessionStatus::Connected) {
                        s.status = SessionStatus::Ready;
                    }
                });
                if !applied {
                    return None;
                }

                if let Err(e) = IdentityStore::new(&self.storage).cache_balance(balance).await {
                    tracing::debug!("Failed to cache balance: {}", e);
                }
                Some(balance)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch balance: {}", e);
                None
            }
        }
    }

    /// Refreshes the balance on the configured interval until the handle
    /// is dropped.
    pub fn spawn_balance_refresher(&self) -> TaskHandle {
        let this = self.clone();
        let period = self.config.balance_refresh_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                this.refresh_balance().await;
            }
        });

        TaskHandle::new("balance refresher", handle)
    }

    /// Asks the faucet to top up the primary address.
    pub async fn request_funds(&self) -> Result<ClaimedChain> {
        let owner = self
            .snapshot()
            .primary_address
            .ok_or(PulseError::NotConnected)?;

        let claimed = self.services.provisioner.claim_chain(&owner).await?;
        tracing::info!("Requested funds for {}", owner);

        self.refresh_balance().await;
        Ok(claimed)
    }

    /// Owners the session has registered on its chain.
    pub async fn authorized_owners(&self) -> Result<Vec<Address>> {
        let chain_id = match self.active.read().as_ref() {
            Some(active) => active.chain_id.clone(),
            None => return Ok(Vec::new()),
        };
        ChainCache::new(&self.storage).owners(&chain_id).await
    }

    /// Handle on `application_id` that acts as the automation signer.
    pub fn application(&self, application_id: &ApplicationId) -> Result<ApplicationHandle> {
        let active = self.active.read().clone().ok_or(PulseError::NotConnected)?;
        let owner = active.signer.automation_address().clone();
        Ok(ApplicationHandle::new(
            active.client,
            active.chain_id,
            application_id.clone(),
            owner,
        ))
    }

    /// Handle on `application_id` that acts as the primary signer. Every
    /// mutation through it goes to the interactive signer.
    pub fn application_as_primary(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationHandle> {
        let active = self.active.read().clone().ok_or(PulseError::NotConnected)?;
        let owner = active.signer.primary_address().clone();
        Ok(ApplicationHandle::new(
            active.client,
            active.chain_id,
            application_id.clone(),
            owner,
        ))
    }

    fn compose(&self, primary_address: Address, automation: LocalSigner) -> Arc<CompositeSigner> {
        let automation_address = automation.local_address().clone();
        Arc::new(CompositeSigner::new(
            self.services.primary.clone(),
            primary_address,
            Arc::new(automation),
            automation_address,
        ))
    }

    /// Registers the automation key on the chain in the background. A
    /// failure is logged and the session carries on.
    fn spawn_registration(
        &self,
        client: Arc<dyn LedgerClient>,
        chain_id: ChainId,
        automation_address: Address,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            match client.add_authorized_signer(&chain_id, &automation_address).await {
                Ok(()) => {
                    let _writes = this.writes.lock().await;
                    if !this.update_for_chain(&chain_id, |s| s.automation_registered = true) {
                        tracing::debug!(
                            "Session left chain {} before {} was registered",
                            chain_id,
                            automation_address
                        );
                        return;
                    }

                    let store = IdentityStore::new(&this.storage);
                    if let Err(e) = store.mark_automation_registered().await {
                        tracing::warn!("Failed to record automation registration: {}", e);
                    }
                    if let Err(e) = ChainCache::new(&this.storage)
                        .record_owner(&chain_id, &automation_address)
                        .await
                    {
                        tracing::warn!("Failed to cache chain owner: {}", e);
                    }
                    tracing::info!("Automation signer {} registered", automation_address);
                }
                Err(e) => {
                    let err = PulseError::AutomationRegistration(e.to_string());
                    tracing::warn!("{}", err);
                }
            }
        });
    }

    fn activate(&self, session: ActiveSession) {
        *self.active.write() = Some(session);
    }

    fn deactivate(&self, status: SessionStatus) {
        *self.active.write() = None;
        self.update(|s| s.clear_identity(status));
    }

    fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        self.snapshot.send_modify(f);
    }

    /// Applies `f` only while `chain_id` is still the session's chain, so
    /// background work that outlives a reset cannot resurrect it.
    fn update_for_chain(&self, chain_id: &ChainId, f: impl FnOnce(&mut SessionSnapshot)) -> bool {
        self.snapshot.send_if_modified(|s| {
            if s.chain_id.as_ref() != Some(chain_id) {
                return false;
            }
            f(s);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{
        address, MissingRuntime, MockConnector, MockHost, MockLedger, MockProvisioner, MockSigner,
    };
    use async_trait::async_trait;
    use tokio::sync::Notify;

    struct Harness {
        manager: SessionManager,
        storage: Arc<Storage>,
        ledger: Arc<MockLedger>,
        connector: Arc<MockConnector>,
        provisioner: Arc<MockProvisioner>,
        primary: Arc<MockSigner>,
        host: Arc<MockHost>,
    }

    async fn harness() -> Harness {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let ledger = Arc::new(MockLedger::new());
        harness_on(storage, ledger)
    }

    fn harness_on(storage: Arc<Storage>, ledger: Arc<MockLedger>) -> Harness {
        let connector = Arc::new(MockConnector::new(ledger.clone()));
        let provisioner = Arc::new(MockProvisioner::new());
        let primary = Arc::new(MockSigner::new(address(1)));
        let host = Arc::new(MockHost::default());

        let services = SessionServices {
            connector: connector.clone(),
            provisioner: provisioner.clone(),
            primary: primary.clone(),
            runtime: Arc::new(TokioRuntime),
            host: host.clone(),
        };
        let manager = SessionManager::new(SessionConfig::default(), storage.clone(), services);

        Harness {
            manager,
            storage,
            ledger,
            connector,
            provisioner,
            primary,
            host,
        }
    }

    /// Lets detached registration and balance tasks run.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn identity_rows(storage: &Storage) -> Vec<String> {
        IdentityStore::new(storage).keys().await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_runtime_capability() {
        let h = harness().await;
        let services = SessionServices {
            connector: h.connector.clone(),
            provisioner: h.provisioner.clone(),
            primary: h.primary.clone(),
            runtime: Arc::new(MissingRuntime),
            host: h.host.clone(),
        };
        let manager = SessionManager::new(SessionConfig::default(), h.storage.clone(), services);

        let result = manager.initialize().await;
        assert!(matches!(result, Err(PulseError::MissingRuntimeCapability(_))));

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Uninitialized);
        assert!(snapshot.error.is_some());
        assert!(identity_rows(&h.storage).await.is_empty());
        assert!(h.connector.opened().is_empty());
    }

    #[tokio::test]
    async fn test_connect_persists_and_registers_automation_key() {
        let h = harness().await;
        h.ledger.set_balance(Amount::from_tokens(3));

        assert!(!h.manager.initialize().await.unwrap());
        h.manager.connect().await.unwrap();
        assert_eq!(h.manager.snapshot().status, SessionStatus::Connected);
        settle().await;

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert_eq!(snapshot.primary_address, Some(address(1)));
        assert_eq!(snapshot.chain_id, Some(ChainId::new("chain-1")));
        assert_eq!(snapshot.balance, Some(Amount::from_tokens(3)));
        assert!(snapshot.automation_registered);

        let automation = snapshot.automation_address.unwrap();
        assert_eq!(h.ledger.authorized(), vec![(ChainId::new("chain-1"), automation)]);
        assert_eq!(h.primary.address_calls(), 1);

        let identity = IdentityStore::new(&h.storage).load().await.unwrap().unwrap();
        assert!(identity.automation_registered);
        assert_eq!(identity.primary_address, address(1));
    }

    #[tokio::test]
    async fn test_restore_twice_reuses_key_without_registering() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let ledger = Arc::new(MockLedger::new());

        let first = harness_on(storage.clone(), ledger.clone());
        first.manager.initialize().await.unwrap();
        first.manager.connect().await.unwrap();
        settle().await;
        let automation = first.manager.snapshot().automation_address.unwrap();
        assert_eq!(ledger.authorized().len(), 1);

        // A restarted process over the same store
        let second = harness_on(storage.clone(), ledger.clone());
        assert!(second.manager.initialize().await.unwrap());
        assert!(second.manager.restore().await);
        settle().await;

        let snapshot = second.manager.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert_eq!(snapshot.automation_address, Some(automation));
        assert_eq!(ledger.authorized().len(), 1);
        assert_eq!(second.primary.address_calls(), 0);
        assert_eq!(second.primary.sign_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_without_key_generates_and_registers_once() {
        let h = harness().await;
        let store = IdentityStore::new(&h.storage);
        store.set(IdentityKey::ChainId, "chain-9").await.unwrap();
        store
            .set(IdentityKey::PrimaryAddress, address(1).as_str())
            .await
            .unwrap();

        assert!(h.manager.initialize().await.unwrap());
        settle().await;

        let snapshot = h.manager.snapshot();
        let automation = snapshot.automation_address.unwrap();
        assert_eq!(h.ledger.authorized(), vec![(ChainId::new("chain-9"), automation)]);
        assert!(store.get(IdentityKey::AutomationKey).await.unwrap().is_some());
        assert_eq!(h.primary.address_calls(), 0);
    }

    #[tokio::test]
    async fn test_restore_failure_keeps_store() {
        let h = harness().await;
        IdentityStore::new(&h.storage)
            .save_connection(&ChainId::new("chain-1"), &address(1), "not an envelope")
            .await
            .unwrap();

        assert!(!h.manager.initialize().await.unwrap());

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Disconnected);
        assert!(snapshot.chain_id.is_none());
        assert_eq!(identity_rows(&h.storage).await.len(), 4);
        assert_eq!(h.host.reload_count(), 0);
    }

    #[tokio::test]
    async fn test_registration_failure_does_not_fail_connect() {
        let h = harness().await;
        h.ledger.fail_registration("owner already exists");

        h.manager.initialize().await.unwrap();
        h.manager.connect().await.unwrap();
        settle().await;

        let snapshot = h.manager.snapshot();
        assert!(snapshot.is_connected());
        assert!(!snapshot.automation_registered);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_restore_registers_stored_key_that_never_registered() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let flaky = Arc::new(MockLedger::new());
        flaky.fail_registration("transient");

        let first = harness_on(storage.clone(), flaky.clone());
        first.manager.initialize().await.unwrap();
        first.manager.connect().await.unwrap();
        settle().await;
        let automation = first.manager.snapshot().automation_address.unwrap();
        assert!(flaky.authorized().is_empty());

        let healthy = Arc::new(MockLedger::new());
        let second = harness_on(storage.clone(), healthy.clone());
        assert!(second.manager.initialize().await.unwrap());
        settle().await;

        let snapshot = second.manager.snapshot();
        assert_eq!(snapshot.automation_address, Some(automation.clone()));
        assert!(snapshot.automation_registered);
        assert_eq!(
            healthy.authorized(),
            vec![(ChainId::new("chain-1"), automation)]
        );

        // Registered now, so a further restart leaves it alone
        let third = harness_on(storage.clone(), healthy.clone());
        assert!(third.manager.initialize().await.unwrap());
        settle().await;
        assert_eq!(healthy.authorized().len(), 1);
    }

    #[tokio::test]
    async fn test_registration_finishing_after_reset_writes_nothing() {
        let h = harness().await;
        let gate = h.ledger.hold_registration();

        h.manager.initialize().await.unwrap();
        h.manager.connect().await.unwrap();
        settle().await;
        assert!(!h.manager.snapshot().automation_registered);

        h.manager.disconnect().await.unwrap();
        assert!(identity_rows(&h.storage).await.is_empty());

        gate.notify_one();
        settle().await;

        assert_eq!(h.ledger.authorized().len(), 1);
        assert!(identity_rows(&h.storage).await.is_empty());
        assert!(crate::storage::ChainCache::new(&h.storage)
            .owners(&ChainId::new("chain-1"))
            .await
            .unwrap()
            .is_empty());
        let snapshot = h.manager.snapshot();
        assert!(snapshot.chain_id.is_none());
        assert!(!snapshot.automation_registered);
    }

    #[tokio::test]
    async fn test_registration_records_chain_owner() {
        let h = harness().await;
        h.manager.initialize().await.unwrap();
        h.manager.connect().await.unwrap();
        settle().await;

        let automation = h.manager.snapshot().automation_address.unwrap();
        assert_eq!(h.manager.authorized_owners().await.unwrap(), vec![automation]);

        h.manager.disconnect().await.unwrap();
        assert!(h.manager.authorized_owners().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_sync_error_resets_everything() {
        let h = harness().await;
        IdentityStore::new(&h.storage)
            .save_connection(&ChainId::new("old-chain"), &address(1), "sealed")
            .await
            .unwrap();
        crate::storage::ChainCache::new(&h.storage)
            .record_owner(&ChainId::new("old-chain"), &address(2))
            .await
            .unwrap();
        h.provisioner
            .fail("Worker operation failed: Blob not found for certificate");

        let err = h.manager.connect().await.unwrap_err();
        assert!(matches!(err, PulseError::FatalSyncCorruption { .. }));

        let store = IdentityStore::new(&h.storage);
        for key in IdentityKey::ALL {
            assert!(store.get(key).await.unwrap().is_none(), "{} survived", key.as_str());
        }
        assert!(crate::storage::ChainCache::new(&h.storage)
            .owners(&ChainId::new("old-chain"))
            .await
            .unwrap()
            .is_empty());

        assert_eq!(h.connector.purge_count(), 1);
        assert_eq!(h.host.reload_count(), 1);
        assert_eq!(h.host.notices().len(), 1);
        assert_eq!(h.manager.snapshot().status, SessionStatus::Resetting);
        assert!(!h.manager.is_connecting());
    }

    #[tokio::test]
    async fn test_ordinary_connect_failure_is_reported() {
        let h = harness().await;
        h.provisioner.fail("faucet rate limited");

        h.manager.initialize().await.unwrap();
        let err = h.manager.connect().await.unwrap_err();
        assert!(matches!(err, PulseError::Ledger(_)));

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Disconnected);
        assert!(snapshot.error.is_some());
        assert_eq!(h.host.reload_count(), 0);
    }

    /// Primary signer that waits for the test before answering.
    struct GatedSigner {
        gate: Notify,
    }

    #[async_trait]
    impl Signer for GatedSigner {
        async fn address(&self) -> Result<Address> {
            self.gate.notified().await;
            Ok(address(1))
        }

        async fn sign(&self, _owner: &Address, _payload: &[u8]) -> Result<crate::types::Signature> {
            Err(PulseError::rejected("not used"))
        }
    }

    #[tokio::test]
    async fn test_reentrant_connect_is_rejected() {
        let h = harness().await;
        let gated = Arc::new(GatedSigner {
            gate: Notify::new(),
        });
        let services = SessionServices {
            connector: h.connector.clone(),
            provisioner: h.provisioner.clone(),
            primary: gated.clone(),
            runtime: Arc::new(TokioRuntime),
            host: h.host.clone(),
        };
        let manager = SessionManager::new(SessionConfig::default(), h.storage.clone(), services);

        let (first, second) = tokio::join!(manager.connect(), async {
            tokio::task::yield_now().await;
            assert!(manager.is_connecting());
            let second = manager.connect().await;
            gated.gate.notify_one();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(PulseError::ConnectInProgress)));
        assert_eq!(h.provisioner.claims().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_clears_session() {
        let h = harness().await;
        h.manager.initialize().await.unwrap();
        h.manager.connect().await.unwrap();
        settle().await;

        h.manager.disconnect().await.unwrap();

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Resetting);
        assert!(snapshot.chain_id.is_none());
        assert!(snapshot.automation_address.is_none());
        assert!(identity_rows(&h.storage).await.is_empty());
        assert!(matches!(
            h.manager.application(&ApplicationId::new("app")),
            Err(PulseError::NotConnected)
        ));
        assert_eq!(h.host.reload_count(), 1);
    }

    #[tokio::test]
    async fn test_balance_failure_keeps_cached_value() {
        let h = harness().await;
        h.ledger.set_balance(Amount::from_tokens(5));
        h.manager.initialize().await.unwrap();
        h.manager.connect().await.unwrap();
        settle().await;

        h.ledger.fail_balance("timeout");
        assert!(h.manager.refresh_balance().await.is_none());
        assert_eq!(h.manager.snapshot().balance, Some(Amount::from_tokens(5)));
    }

    #[tokio::test]
    async fn test_application_handle_acts_as_automation_signer() {
        let h = harness().await;
        let app_id = ApplicationId::new("app");
        assert!(matches!(
            h.manager.application(&app_id),
            Err(PulseError::NotConnected)
        ));

        h.manager.initialize().await.unwrap();
        h.manager.connect().await.unwrap();

        let snapshot = h.manager.snapshot();
        let handle = h.manager.application(&app_id).unwrap();
        assert_eq!(Some(handle.owner().clone()), snapshot.automation_address);
        assert_eq!(Some(handle.chain_id().clone()), snapshot.chain_id);

        let primary = h.manager.application_as_primary(&app_id).unwrap();
        assert_eq!(primary.owner(), &address(1));
    }

    #[tokio::test]
    async fn test_request_funds() {
        let h = harness().await;
        assert!(matches!(
            h.manager.request_funds().await,
            Err(PulseError::NotConnected)
        ));

        h.manager.initialize().await.unwrap();
        h.manager.connect().await.unwrap();
        h.manager.request_funds().await.unwrap();
        assert_eq!(h.provisioner.claims(), vec![address(1), address(1)]);
    }
}
