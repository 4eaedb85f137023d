//! The delegates every gateway registers.
//!
//! `PING` is registered once under the brand-agnostic sentinel; the others
//! once per brand of a configured ledger.

mod block_for_time;
mod block_number;
mod escrow_identity;
mod ping;
mod submit_call;
mod transaction_result;

use std::sync::Arc;

use xledger_types::ChainBrand;

use crate::{Delegate, Directories, GatewayError, Input, InputShape};

pub use block_for_time::BlockForTimeDelegate;
pub use block_number::BlockNumberDelegate;
pub use escrow_identity::EscrowIdentityDelegate;
pub use ping::PingDelegate;
pub use submit_call::SubmitCallDelegate;
pub use transaction_result::TransactionResultDelegate;

pub const PING: &str = "PING";
pub const GET_BLOCK_NUMBER: &str = "UTILITY.GET_BLOCK_NUMBER";
pub const GET_BLOCK_NUMBER_FOR_TIME: &str = "UTILITY.GET_BLOCK_NUMBER_FOR_TIME";
pub const GET_TRANSACTION_RESULT: &str = "TX.GET_TRANSACTION_RESULT";
pub const SUBMIT_CALL: &str = "TX.SUBMIT_CALL";
pub const GET_ESCROW_IDENTITY: &str = "ESCROW.GET_IDENTITY";

/// Standard delegates for ledgers of the given brands.
pub fn standard_delegates(brands: &[ChainBrand], directories: &Directories) -> Vec<Arc<dyn Delegate>> {
    let mut delegates: Vec<Arc<dyn Delegate>> = vec![Arc::new(PingDelegate)];
    for &brand in brands.iter().filter(|b| **b != ChainBrand::None) {
        delegates.push(Arc::new(BlockNumberDelegate::new(brand)));
        delegates.push(Arc::new(TransactionResultDelegate::new(brand)));
        delegates.push(Arc::new(BlockForTimeDelegate::new(brand, directories.clone())));
        delegates.push(Arc::new(SubmitCallDelegate::new(brand)));
        delegates.push(Arc::new(EscrowIdentityDelegate::new(brand)));
    }
    delegates
}

fn unexpected_input(expected: InputShape, input: Option<&Input>) -> GatewayError {
    GatewayError::InvalidInput(format!(
        "expected {expected} input, got {}",
        InputShape::of(input)
    ))
}
