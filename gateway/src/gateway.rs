//! Top-level assembly: ledgers, trackers, escrow bootstraps, router and the
//! background receipt scan.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use xledger_store::ConfigStore;
use xledger_types::ChainBrand;

use crate::delegates::standard_delegates;
use crate::{
    deliver, Delegate, DelegateRegistry, Directories, EscrowBootstrap, GatewayConfig,
    GatewayError, GatewayMetrics, Input, LeaseRegistry, LedgerClientFactory, LedgerConfiguration,
    LedgerRegistry, Reply, ReceiptTracker, Request, ResponseSink, Router, ScanReport,
    ShutdownController, ShutdownHook, WorkerPool,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GatewayBuilder {
    config: GatewayConfig,
    store: Option<Arc<dyn ConfigStore>>,
    directories: Option<Directories>,
    factories: HashMap<ChainBrand, Arc<dyn LedgerClientFactory>>,
    delegates: Vec<Arc<dyn Delegate>>,
    shutdown: Option<Arc<ShutdownController>>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            store: None,
            directories: None,
            factories: HashMap::new(),
            delegates: Vec::new(),
            shutdown: None,
            metrics: None,
        }
    }

    /// Store for escrow records. Required when any ledger hosts an escrow.
    pub fn store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn directories(mut self, directories: Directories) -> Self {
        self.directories = Some(directories);
        self
    }

    /// Client factory for the ledgers of one brand.
    pub fn factory(mut self, factory: Arc<dyn LedgerClientFactory>) -> Self {
        self.factories.insert(factory.brand(), factory);
        self
    }

    /// An embedder delegate, registered next to the standard ones.
    pub fn delegate(mut self, delegate: Arc<dyn Delegate>) -> Self {
        self.delegates.push(delegate);
        self
    }

    pub fn shutdown(mut self, shutdown: Arc<ShutdownController>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Assemble the gateway. Must be called inside a Tokio runtime.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let config = self.config;
        config.validate()?;
        let directories = self.directories.ok_or_else(|| {
            GatewayError::Config("address and token directories are required".into())
        })?;
        let metrics = self.metrics.unwrap_or_default();
        let shutdown = self.shutdown.unwrap_or_default();
        let pool = WorkerPool::new(config.callback_workers)?;
        let leases = Arc::new(LeaseRegistry::new());

        let mut configurations = Vec::with_capacity(config.ledgers.len());
        for settings in &config.ledgers {
            let factory = self.factories.get(&settings.brand).ok_or_else(|| {
                GatewayError::Config(format!(
                    "no client factory for brand {} (ledger {})",
                    settings.brand, settings.id
                ))
            })?;
            let client = factory.create(settings)?;
            let tracker = Arc::new(ReceiptTracker::new(
                settings.id.as_str(),
                client,
                pool.clone(),
                Arc::clone(&metrics),
                config.recent_receipts,
            ));
            let mut configuration = LedgerConfiguration::new(
                settings.brand,
                Arc::clone(&tracker),
                config.recent_block_ttl(),
            );

            if let Some(escrow) = &settings.escrow {
                let store = self.store.clone().ok_or_else(|| {
                    GatewayError::Config(format!(
                        "ledger {} hosts an escrow but no store is configured",
                        settings.id
                    ))
                })?;
                let hook: Arc<dyn ShutdownHook> = shutdown.clone();
                let bootstrap = EscrowBootstrap::new(settings.brand, tracker, store, hook)
                    .with_expected_fee(escrow.expected_fee)
                    .with_leases(Arc::clone(&leases));
                configuration = configuration.with_escrow(Arc::new(bootstrap));
            }
            tracing::info!(
                ledger = %settings.id,
                brand = %settings.brand,
                escrow = settings.escrow.is_some(),
                "ledger configured"
            );
            configurations.push(configuration);
        }

        let ledgers = Arc::new(LedgerRegistry::new(
            configurations,
            Some(config.default_ledger_id()),
        )?);

        let mut delegates = standard_delegates(&ledgers.brands(), &directories);
        delegates.extend(self.delegates);
        let delegates = DelegateRegistry::from_delegates(delegates)?;
        tracing::info!(
            delegates = delegates.len(),
            default_ledger = ledgers.default_id(),
            "gateway assembled"
        );

        let router = Arc::new(Router::new(
            delegates,
            Arc::clone(&ledgers),
            directories,
            Arc::clone(&metrics),
        ));

        Ok(Gateway {
            config,
            router,
            ledgers,
            metrics,
            shutdown,
            started: AtomicBool::new(false),
            task_handles: Mutex::new(Vec::new()),
        })
    }
}

/// A running gateway.
pub struct Gateway {
    config: GatewayConfig,
    router: Arc<Router>,
    ledgers: Arc<LedgerRegistry>,
    metrics: Arc<GatewayMetrics>,
    shutdown: Arc<ShutdownController>,
    started: AtomicBool,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Gateway {
    /// Start the escrow bootstraps and the periodic receipt scan.
    ///
    /// Calling it again has no effect.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut handles = self.task_handles.lock();
        // Shutdown is signalled once; subscribe before an escrow can trigger it.
        let mut shutdown_rx = self.shutdown.subscribe();

        for escrow in self.ledgers.escrows() {
            if let Some(handle) = escrow.start() {
                handles.push(handle);
            }
        }

        let trackers = self.ledgers.trackers();
        let period = self.config.scan_interval();
        let scanner = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("receipt scanner stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        // A scan still running from an earlier tick makes this one a no-op.
                        for tracker in &trackers {
                            let tracker = Arc::clone(tracker);
                            tokio::spawn(async move {
                                tracker.scan().await;
                            });
                        }
                    }
                }
            }
        });
        handles.push(scanner);
        tracing::info!(
            ledgers = self.ledgers.trackers().len(),
            scan_interval_ms = self.config.scan_interval_ms,
            "gateway started"
        );
    }

    /// Deliver every response of `request` to `sink` on a background task.
    pub fn handle(
        &self,
        request: Request,
        sink: Arc<dyn ResponseSink>,
    ) -> JoinHandle<Result<u32, GatewayError>> {
        let router = Arc::clone(&self.router);
        let max_depth = self.config.max_continuation_depth;
        tokio::spawn(async move { deliver(&router, request, sink.as_ref(), max_depth).await })
    }

    /// Route one request and return the immediate reply.
    pub async fn route(&self, operation: &str, input: Option<Input>) -> Result<Reply, GatewayError> {
        self.router.route(operation, input).await
    }

    /// Scan every ledger once, in declaration order.
    pub async fn scan_all(&self) -> Vec<ScanReport> {
        let mut reports = Vec::new();
        for tracker in self.ledgers.trackers() {
            reports.push(tracker.scan().await);
        }
        reports
    }

    /// Signal every background task and wait for them to finish.
    pub async fn stop(&self) {
        tracing::info!("gateway stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.task_handles.lock());
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(timeout = ?SHUTDOWN_TIMEOUT, "shutdown timeout, aborting remaining tasks");
            for abort in aborts {
                abort.abort();
            }
        }
        tracing::info!("gateway stopped");
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn ledgers(&self) -> &Arc<LedgerRegistry> {
        &self.ledgers
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    /// The escrow bootstrap hosted by `ledger_id`, if any.
    pub fn escrow(&self, ledger_id: &str) -> Option<Arc<EscrowBootstrap>> {
        self.ledgers
            .get(Some(ledger_id))
            .and_then(|ledger| ledger.escrow().ok().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LedgerSettings, Output};
    use xledger_ledger::LedgerClient;
    use xledger_nullables::{NullConfigStore, NullDirectory, NullLedger};
    use xledger_types::INTERNAL_LEDGER;

    struct NullFactory(Arc<NullLedger>);

    impl LedgerClientFactory for NullFactory {
        fn brand(&self) -> ChainBrand {
            ChainBrand::Besu
        }

        fn create(&self, _settings: &LedgerSettings) -> Result<Arc<dyn LedgerClient>, GatewayError> {
            Ok(self.0.clone())
        }
    }

    fn directories() -> Directories {
        let dir = Arc::new(NullDirectory::new());
        Directories::new(dir.clone(), dir)
    }

    fn config(escrow: bool) -> GatewayConfig {
        let ledger = LedgerSettings::new("main", ChainBrand::Besu);
        GatewayConfig {
            scan_interval_ms: 10,
            ledgers: vec![if escrow { ledger.with_escrow(0) } else { ledger }],
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn missing_factory_is_a_config_error() {
        let err = GatewayBuilder::new(config(false))
            .directories(directories())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.code(), "gateway:config-error");
    }

    #[tokio::test]
    async fn escrow_without_store_is_a_config_error() {
        let err = GatewayBuilder::new(config(true))
            .directories(directories())
            .factory(Arc::new(NullFactory(Arc::new(NullLedger::new()))))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.code(), "gateway:config-error");
    }

    #[tokio::test]
    async fn standard_delegates_cover_configured_brands() {
        let gateway = GatewayBuilder::new(config(false))
            .directories(directories())
            .factory(Arc::new(NullFactory(Arc::new(NullLedger::new()))))
            .build()
            .unwrap();
        assert_eq!(gateway.router().delegates().len(), 6);
        assert_eq!(gateway.ledgers().default_id(), "main");
        assert!(gateway.escrow("main").is_none());
        assert!(gateway.ledgers().get(Some(INTERNAL_LEDGER)).is_some());
    }

    #[tokio::test]
    async fn started_gateway_scans_and_stops() {
        let null = Arc::new(NullLedger::new());
        let gateway = GatewayBuilder::new(config(true))
            .directories(directories())
            .store(Arc::new(NullConfigStore::new()))
            .factory(Arc::new(NullFactory(null.clone())))
            .build()
            .unwrap();
        gateway.start();
        gateway.start();

        // The deployment is confirmed by the background scan.
        while null.submit_count() == 0 {
            tokio::task::yield_now().await;
        }
        let (work_id, _) = null.submitted().remove(0);
        null.confirm_success(
            &work_id,
            3,
            xledger_types::ExtraData::new().with("contractAddress", "0xesc"),
        );
        let escrow = gateway.escrow("main").unwrap();
        assert!(matches!(
            escrow.wait_settled().await,
            crate::EscrowState::Ready(_)
        ));

        let reply = gateway
            .route(
                "PING",
                Some(Input::Ping {
                    message: "up".into(),
                }),
            )
            .await
            .unwrap();
        assert!(matches!(reply.output(), Output::Pong { .. }));

        gateway.stop().await;
        assert!(gateway.task_handles.lock().is_empty());
    }
}
