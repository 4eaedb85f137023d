//! Escrow bootstrap: makes sure a ledger has exactly one escrow contract
//! and that this process holds its key material.
//!
//! `UNINITIALISED -> INITIALISING -> READY`, or `-> FAILED`. A failed
//! bootstrap is not retried; it asks the process to shut down.
//!
//! The record key is claimed with a conditional insert of a claim marker
//! before anything is submitted, so of several bootstraps sharing a store
//! exactly one deploys. The others wait for the full record to appear.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::Instrument;
use xledger_crypto::{
    generate_keypair, keypair_from_private, private_from_hex, private_to_hex,
    public_from_hex, public_to_hex,
};
use xledger_ledger::{LedgerCall, LedgerClient};
use xledger_store::{escrow_record_key, ConfigStore};
use xledger_types::{ChainBrand, KeyPair, PublicKey};

use crate::tracing_spans::escrow_span;
use crate::{FnReceiptHandler, GatewayError, ReceiptTracker, ShutdownHook};

/// Address and owner key of a deployed escrow contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscrowIdentity {
    pub contract_address: String,
    pub public_key: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscrowState {
    Uninitialised,
    Initialising,
    Ready(EscrowIdentity),
    /// Terminal. Carries the reason the bootstrap failed.
    Failed(String),
}

impl EscrowState {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }
}

/// Process-local leases keyed by name.
///
/// Two bootstraps for the same ledger in one process run one after the
/// other; across processes the conditional insert of the record decides.
#[derive(Default)]
pub struct LeaseRegistry {
    leases: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lease on `key`; it is held until the guard is dropped.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lease = {
            let mut leases = self.leases.lock();
            leases
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lease.lock_owned().await
    }

    /// Forget leases nobody holds or waits for.
    pub fn cleanup(&self) {
        self.leases
            .lock()
            .retain(|_, lease| Arc::strong_count(lease) > 1);
    }

    pub fn len(&self) -> usize {
        self.leases.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.lock().is_empty()
    }
}

/// Stored under the record key while a deployment is in flight.
const CLAIM_MARKER: &str = "#deploying";

const CLAIM_POLL: Duration = Duration::from_millis(500);
const CLAIM_TIMEOUT: Duration = Duration::from_secs(600);

/// Bootstrap of the escrow contract on one ledger.
pub struct EscrowBootstrap {
    ledger_id: String,
    brand: ChainBrand,
    tracker: Arc<ReceiptTracker>,
    store: Arc<dyn ConfigStore>,
    hook: Arc<dyn ShutdownHook>,
    leases: Arc<LeaseRegistry>,
    expected_fee: u128,
    claim_poll: Duration,
    claim_timeout: Duration,
    state: watch::Sender<EscrowState>,
    key_pair: Mutex<Option<Arc<KeyPair>>>,
}

impl EscrowBootstrap {
    pub fn new(
        brand: ChainBrand,
        tracker: Arc<ReceiptTracker>,
        store: Arc<dyn ConfigStore>,
        hook: Arc<dyn ShutdownHook>,
    ) -> Self {
        let (state, _) = watch::channel(EscrowState::Uninitialised);
        Self {
            ledger_id: tracker.ledger_id().to_string(),
            brand,
            tracker,
            store,
            hook,
            leases: Arc::new(LeaseRegistry::new()),
            expected_fee: 0,
            claim_poll: CLAIM_POLL,
            claim_timeout: CLAIM_TIMEOUT,
            state,
            key_pair: Mutex::new(None),
        }
    }

    /// Fee the ledger must charge for the deployment to go ahead.
    pub fn with_expected_fee(mut self, fee: u64) -> Self {
        self.expected_fee = fee.into();
        self
    }

    /// How often to look for a record another process is deploying, and how
    /// long to wait for it before failing.
    pub fn with_claim_wait(mut self, poll: Duration, timeout: Duration) -> Self {
        self.claim_poll = poll;
        self.claim_timeout = timeout;
        self
    }

    /// Share leases with the other bootstraps of this process.
    pub fn with_leases(mut self, leases: Arc<LeaseRegistry>) -> Self {
        self.leases = leases;
        self
    }

    pub fn ledger_id(&self) -> &str {
        &self.ledger_id
    }

    pub fn state(&self) -> EscrowState {
        self.state.borrow().clone()
    }

    /// Start the bootstrap on a background task.
    ///
    /// Returns `None` if it was already started.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let started = self.state.send_if_modified(|state| {
            if *state == EscrowState::Uninitialised {
                *state = EscrowState::Initialising;
                true
            } else {
                false
            }
        });
        if !started {
            return None;
        }
        let this = Arc::clone(self);
        let span = escrow_span(&self.ledger_id, self.brand);
        Some(tokio::spawn(this.run().instrument(span)))
    }

    async fn run(self: Arc<Self>) {
        let key = escrow_record_key(self.brand, &self.ledger_id);
        let lease = self.leases.acquire(&key).await;

        let outcome = self.initialise(&key).await;

        drop(lease);
        self.leases.cleanup();

        match outcome {
            Ok((identity, key_pair)) => {
                tracing::info!(
                    contract = %identity.contract_address,
                    public_key = %identity.public_key,
                    "escrow ready"
                );
                *self.key_pair.lock() = Some(Arc::new(key_pair));
                self.state.send_replace(EscrowState::Ready(identity));
            }
            Err(e) => {
                tracing::error!(error = %e, "escrow bootstrap failed");
                let reason = e.to_string();
                self.state.send_replace(EscrowState::Failed(reason.clone()));
                self.hook.request_shutdown(&format!(
                    "escrow bootstrap failed on ledger {}: {reason}",
                    self.ledger_id
                ));
            }
        }
    }

    async fn initialise(&self, key: &str) -> Result<(EscrowIdentity, KeyPair), GatewayError> {
        if let Some(found) = self.existing_record(key).await? {
            return Ok(found);
        }

        let client: &dyn LedgerClient = self.tracker.client().as_ref();
        let fee = client.fee_policy().await?;
        if fee != self.expected_fee {
            return Err(GatewayError::internal_msg(format!(
                "ledger fee {fee} does not match the expected fee {}",
                self.expected_fee
            )));
        }

        // A released claim lets the next waiter try again.
        while !self.store.put_if_absent(key, CLAIM_MARKER)? {
            tracing::info!("escrow record claimed concurrently");
            if let Some(found) = self.existing_record(key).await? {
                return Ok(found);
            }
        }
        tracing::debug!("escrow record claimed");

        match self.deploy(client).await {
            Ok((identity, key_pair)) => {
                self.store
                    .put(key, &format_record(&identity.contract_address, &key_pair))?;
                Ok((identity, key_pair))
            }
            Err(e) => {
                if let Err(release) = self.store.delete(key) {
                    tracing::warn!(error = %release, "cannot release escrow claim");
                }
                Err(e)
            }
        }
    }

    /// The stored record, waiting while another bootstrap holds the claim.
    ///
    /// `None` when the key is free, including when a claim was released
    /// while waiting.
    async fn existing_record(
        &self,
        key: &str,
    ) -> Result<Option<(EscrowIdentity, KeyPair)>, GatewayError> {
        let deadline = tokio::time::Instant::now() + self.claim_timeout;
        loop {
            match self.store.get(key)? {
                None => return Ok(None),
                Some(record) if record == CLAIM_MARKER => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(GatewayError::internal_msg(format!(
                            "escrow deployment claimed elsewhere did not finish within {:?}",
                            self.claim_timeout
                        )));
                    }
                    tracing::debug!("escrow deployment in progress elsewhere, waiting");
                    tokio::time::sleep(self.claim_poll).await;
                }
                Some(record) => {
                    tracing::info!("escrow record found");
                    return parse_record(&record).map(Some);
                }
            }
        }
    }

    async fn deploy(
        &self,
        client: &dyn LedgerClient,
    ) -> Result<(EscrowIdentity, KeyPair), GatewayError> {
        let key_pair = generate_keypair()?;
        let work_id = client
            .submit(LedgerCall::DeployEscrow {
                owner: key_pair.public.clone(),
            })
            .await?;
        tracing::info!(%work_id, "escrow deployment submitted");

        let (tx, rx) = oneshot::channel();
        self.tracker.track_start(work_id.clone());
        self.tracker.register(
            work_id.clone(),
            FnReceiptHandler::new(move |confirmation| {
                let _ = tx.send(confirmation);
            }),
        );
        let confirmation = rx
            .await
            .map_err(|_| GatewayError::internal_msg("escrow receipt handler dropped"))?;

        if !confirmation.success {
            return Err(GatewayError::internal_msg(format!(
                "escrow deployment {work_id} failed: {}",
                confirmation.failure_reason.as_deref().unwrap_or("no reason given")
            )));
        }
        let address = confirmation
            .extra
            .get_str("contractAddress")
            .filter(|a| !a.is_empty())
            .ok_or_else(|| GatewayError::MalformedConfirmation {
                work_id: work_id.clone(),
                reason: "missing contractAddress".into(),
            })?
            .to_string();

        let identity = EscrowIdentity {
            contract_address: address,
            public_key: key_pair.public.clone(),
        };
        Ok((identity, key_pair))
    }

    /// The escrow identity, or `NotReady` until the bootstrap succeeded.
    pub fn identity(&self) -> Result<EscrowIdentity, GatewayError> {
        match &*self.state.borrow() {
            EscrowState::Ready(identity) => Ok(identity.clone()),
            EscrowState::Failed(reason) => Err(GatewayError::internal_msg(format!(
                "escrow bootstrap failed: {reason}"
            ))),
            EscrowState::Uninitialised | EscrowState::Initialising => Err(GatewayError::NotReady {
                what: format!("escrow on ledger {}", self.ledger_id),
            }),
        }
    }

    /// The escrow owner's key pair, once ready.
    pub fn key_pair(&self) -> Result<Arc<KeyPair>, GatewayError> {
        self.identity()?;
        self.key_pair
            .lock()
            .clone()
            .ok_or_else(|| GatewayError::internal_msg("escrow ready without key material"))
    }

    /// Wait until the bootstrap is `READY` or `FAILED`.
    pub async fn wait_settled(&self) -> EscrowState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(EscrowState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }
}

fn format_record(address: &str, key_pair: &KeyPair) -> String {
    format!(
        "{address}\n{}\n{}",
        public_to_hex(&key_pair.public),
        private_to_hex(&key_pair.private)
    )
}

/// Parse `"{address}\n{public hex}\n{private hex}"`.
fn parse_record(record: &str) -> Result<(EscrowIdentity, KeyPair), GatewayError> {
    let malformed =
        |what: String| GatewayError::internal_msg(format!("malformed escrow record: {what}"));

    let mut lines = record.split('\n');
    let (Some(address), Some(public), Some(private), None) =
        (lines.next(), lines.next(), lines.next(), lines.next())
    else {
        return Err(malformed("expected three lines".into()));
    };
    let address = address.trim();
    if address.is_empty() {
        return Err(malformed("empty contract address".into()));
    }
    let public = public_from_hex(public.trim()).map_err(|e| malformed(e.to_string()))?;
    let private = private_from_hex(private.trim()).map_err(|e| malformed(e.to_string()))?;

    let key_pair = keypair_from_private(private);
    if key_pair.public != public {
        return Err(malformed("public key does not belong to private key".into()));
    }
    Ok((
        EscrowIdentity {
            contract_address: address.to_string(),
            public_key: public,
        },
        key_pair,
    ))
}
