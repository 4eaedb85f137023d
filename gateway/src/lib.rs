//! Transaction-lifecycle tracking and delegation-routing engine.
//!
//! A request names an operation and carries a typed input. The [`Router`]
//! resolves the input's principals to a ledger configuration, picks the
//! delegate registered for `(operation, input shape, ledger brand)` and runs
//! it. Delegates that submit work to a ledger hand it to that ledger's
//! [`ReceiptTracker`], which polls for confirmation and resolves the
//! [`Continuation`] attached to the caller's `PENDING` reply.

pub mod config;
pub mod continuation;
pub mod delegate;
pub mod delegates;
pub mod delivery;
pub mod error;
pub mod escrow;
pub mod gateway;
pub mod input;
pub mod ledger_registry;
pub mod logging;
pub mod metrics;
pub mod principal;
pub mod receipts;
pub mod recently_confirmed;
pub mod router;
pub mod shutdown;
pub mod tracing_spans;
pub mod worker_pool;

pub use config::{EscrowSettings, GatewayConfig, LedgerSettings};
pub use continuation::{Continuation, ContinuationSender, Output, Reply};
pub use delegate::{Delegate, DelegateKey, DelegateRegistry};
pub use delivery::{deliver, ChannelSink, InReplyTo, Request, Response, ResponseSink};
pub use error::GatewayError;
pub use escrow::{EscrowBootstrap, EscrowIdentity, EscrowState, LeaseRegistry};
pub use gateway::{Gateway, GatewayBuilder};
pub use input::{Input, InputShape, TxProcessingMode};
pub use ledger_registry::{LedgerClientFactory, LedgerConfiguration, LedgerRegistry};
pub use logging::{init_logging, LogFormat};
pub use metrics::GatewayMetrics;
pub use principal::{Directories, Principal, PrincipalCandidate};
pub use receipts::{
    prepare, to_transaction_result, FnReceiptHandler, ReceiptHandler, ReceiptTracker, ScanReport,
    SimpleReceiptHandler,
};
pub use router::{Route, Router};
pub use shutdown::{ShutdownController, ShutdownHook};
pub use worker_pool::WorkerPool;
