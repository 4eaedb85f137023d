//! Typed request inputs and their shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use xledger_types::{ExtraData, WorkId};

use crate::Principal;

/// How a submitting delegate replies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxProcessingMode {
    /// Wait for the final outcome before replying.
    ReturnResult,
    /// Reply `PENDING` at once and deliver the outcome as a continuation.
    #[default]
    ReturnId,
}

/// The input carried by a request. The variant is the input's shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "shape",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Input {
    /// Connectivity probe.
    Ping { message: String },

    /// Public query against one ledger; `None` is the default ledger.
    LedgerScope {
        #[serde(default)]
        ledger_id: Option<String>,
    },

    TransactionQuery {
        #[serde(default)]
        ledger_id: Option<String>,
        transaction_id: WorkId,
    },

    BlockForTime { symbol: String, epoch_second: u64 },

    /// Acts for an address.
    Address {
        address: String,
        #[serde(default)]
        params: ExtraData,
    },

    /// Acts on a token, either through an explicit address or through the
    /// token's controlling address.
    Token {
        symbol: String,
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        params: ExtraData,
    },

    /// Acts for a wallet; `None` is the internal ledger.
    Wallet {
        wallet_id: i32,
        #[serde(default)]
        ledger_id: Option<String>,
        #[serde(default)]
        params: ExtraData,
    },

    /// Submit an encoded ledger call on behalf of `address`.
    Call {
        address: String,
        /// Hex-encoded call bytes.
        call_data: String,
        #[serde(default)]
        mode: TxProcessingMode,
    },
}

/// Identity of an input's type, one component of a delegate key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputShape {
    /// The request carried no input.
    Empty,
    Ping,
    LedgerScope,
    TransactionQuery,
    BlockForTime,
    Address,
    Token,
    Wallet,
    Call,
}

impl InputShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Ping => "PING",
            Self::LedgerScope => "LEDGER_SCOPE",
            Self::TransactionQuery => "TRANSACTION_QUERY",
            Self::BlockForTime => "BLOCK_FOR_TIME",
            Self::Address => "ADDRESS",
            Self::Token => "TOKEN",
            Self::Wallet => "WALLET",
            Self::Call => "CALL",
        }
    }

    pub fn of(input: Option<&Input>) -> Self {
        input.map_or(Self::Empty, Input::shape)
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Input {
    pub fn shape(&self) -> InputShape {
        match self {
            Self::Ping { .. } => InputShape::Ping,
            Self::LedgerScope { .. } => InputShape::LedgerScope,
            Self::TransactionQuery { .. } => InputShape::TransactionQuery,
            Self::BlockForTime { .. } => InputShape::BlockForTime,
            Self::Address { .. } => InputShape::Address,
            Self::Token { .. } => InputShape::Token,
            Self::Wallet { .. } => InputShape::Wallet,
            Self::Call { .. } => InputShape::Call,
        }
    }

    /// Authorization paths for this input, in the order they must be tried.
    pub fn principals(&self) -> Vec<Principal> {
        match self {
            Self::Ping { .. } => vec![Principal::Public],
            Self::LedgerScope { ledger_id } | Self::TransactionQuery { ledger_id, .. } => {
                vec![Principal::Ledger(ledger_id.clone())]
            }
            Self::BlockForTime { symbol, .. } => vec![Principal::Token(symbol.clone())],
            Self::Address { address, .. } | Self::Call { address, .. } => {
                vec![Principal::Address(address.clone())]
            }
            Self::Token {
                symbol, address, ..
            } => {
                let mut principals = Vec::with_capacity(2);
                if let Some(address) = address {
                    principals.push(Principal::Address(address.clone()));
                }
                principals.push(Principal::Token(symbol.clone()));
                principals
            }
            Self::Wallet {
                wallet_id,
                ledger_id,
                ..
            } => vec![Principal::Wallet {
                wallet_id: *wallet_id,
                ledger_id: ledger_id.clone(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_json_is_tagged_by_shape() {
        let input: Input = serde_json::from_str(
            r#"{"shape":"TRANSACTION_QUERY","ledgerId":"main","transactionId":"0xabc"}"#,
        )
        .unwrap();
        assert_eq!(
            input,
            Input::TransactionQuery {
                ledger_id: Some("main".into()),
                transaction_id: WorkId::new("0xabc"),
            }
        );
        assert_eq!(input.shape(), InputShape::TransactionQuery);
    }

    #[test]
    fn call_mode_defaults_to_return_id() {
        let input: Input =
            serde_json::from_str(r#"{"shape":"CALL","address":"0x1","callData":"00"}"#).unwrap();
        assert!(matches!(
            input,
            Input::Call {
                mode: TxProcessingMode::ReturnId,
                ..
            }
        ));
    }

    #[test]
    fn token_input_tries_address_before_controller() {
        let input = Input::Token {
            symbol: "BND".into(),
            address: Some("0xa".into()),
            params: ExtraData::new(),
        };
        assert_eq!(
            input.principals(),
            vec![
                Principal::Address("0xa".into()),
                Principal::Token("BND".into())
            ]
        );
    }

    #[test]
    fn missing_input_has_empty_shape() {
        assert_eq!(InputShape::of(None), InputShape::Empty);
        let ping = Input::Ping {
            message: "hi".into(),
        };
        assert_eq!(InputShape::of(Some(&ping)), InputShape::Ping);
    }
}
