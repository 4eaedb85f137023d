//! Span constructors shared across the gateway, so traces carry the same
//! names and fields wherever the work happens.

use tracing::{info_span, Span};
use xledger_types::ChainBrand;

/// One routed request, from principal resolution to the delegate's reply.
pub fn route_span(operation: &str, shape: &str) -> Span {
    info_span!("route", operation = %operation, shape = %shape)
}

/// One receipt scan of one ledger.
pub fn scan_span(ledger: &str) -> Span {
    info_span!("scan", ledger = %ledger)
}

pub fn escrow_span(ledger: &str, brand: ChainBrand) -> Span {
    info_span!("escrow_bootstrap", ledger = %ledger, brand = %brand)
}

/// Delivery of every response belonging to one request.
pub fn delivery_span(message_id: &str, operation: &str) -> Span {
    info_span!("delivery", message_id = %message_id, operation = %operation)
}
