//! Principal resolution: which ledger, and as whom, a request acts.
//!
//! An input declares one or more [`Principal`]s in priority order. Each
//! resolves to a [`PrincipalCandidate`]; the first valid candidate wins, and
//! a request whose candidates are all invalid is denied.

use std::sync::Arc;

use xledger_store::{AddressDirectory, LedgerAddress, TokenDirectory, TokenRecord};
use xledger_types::{WalletId, INTERNAL_LEDGER};

use crate::{GatewayError, Input};

/// One authorization path for a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Principal {
    /// Anyone, on the internal ledger.
    Public,
    /// Anyone, on the named ledger (`None` is the default ledger).
    Ledger(Option<String>),
    /// A known address, on the address's ledger.
    Address(String),
    /// A token, through its controlling address.
    Token(String),
    /// A wallet, on the named ledger or else the internal one.
    Wallet {
        wallet_id: i32,
        ledger_id: Option<String>,
    },
}

/// Outcome of resolving one [`Principal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrincipalCandidate {
    pub valid: bool,
    /// `None` selects the configured default ledger.
    pub ledger_id: Option<String>,
    pub wallet_id: WalletId,
}

impl PrincipalCandidate {
    pub fn valid(ledger_id: Option<String>, wallet_id: WalletId) -> Self {
        Self {
            valid: true,
            ledger_id,
            wallet_id,
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            ledger_id: None,
            wallet_id: WalletId::NotApplicable,
        }
    }

    fn for_address(record: &LedgerAddress) -> Self {
        Self::valid(record.ledger_id.clone(), record.wallet_id)
    }
}

/// The address and token lookups principal resolution depends on.
#[derive(Clone)]
pub struct Directories {
    addresses: Arc<dyn AddressDirectory>,
    tokens: Arc<dyn TokenDirectory>,
}

impl Directories {
    pub fn new(addresses: Arc<dyn AddressDirectory>, tokens: Arc<dyn TokenDirectory>) -> Self {
        Self { addresses, tokens }
    }

    pub fn address_of(&self, address: &str) -> Result<Option<LedgerAddress>, GatewayError> {
        Ok(self.addresses.address_of(address)?)
    }

    pub fn token_of(&self, symbol: &str) -> Result<Option<TokenRecord>, GatewayError> {
        Ok(self.tokens.token_of(symbol)?)
    }

    /// Resolve a single principal.
    pub fn resolve_one(&self, principal: &Principal) -> Result<PrincipalCandidate, GatewayError> {
        let candidate = match principal {
            Principal::Public => {
                PrincipalCandidate::valid(Some(INTERNAL_LEDGER.to_string()), WalletId::NotApplicable)
            }
            Principal::Ledger(ledger_id) => {
                PrincipalCandidate::valid(ledger_id.clone(), WalletId::NotApplicable)
            }
            Principal::Address(address) => match self.address_of(address)? {
                Some(record) => PrincipalCandidate::for_address(&record),
                None => PrincipalCandidate::invalid(),
            },
            Principal::Token(symbol) => match self.token_of(symbol)? {
                Some(token) => match self.address_of(&token.controller)? {
                    Some(record) => PrincipalCandidate::for_address(&record),
                    None => PrincipalCandidate::invalid(),
                },
                None => PrincipalCandidate::invalid(),
            },
            Principal::Wallet {
                wallet_id,
                ledger_id,
            } => PrincipalCandidate::valid(
                Some(
                    ledger_id
                        .clone()
                        .unwrap_or_else(|| INTERNAL_LEDGER.to_string()),
                ),
                WalletId::Id(*wallet_id),
            ),
        };
        Ok(candidate)
    }

    /// Candidates for `input`, produced lazily in declared order.
    ///
    /// A missing input yields a single public candidate on the default ledger.
    pub fn resolve<'a>(
        &'a self,
        input: Option<&Input>,
    ) -> impl Iterator<Item = Result<PrincipalCandidate, GatewayError>> + 'a {
        let principals = match input {
            Some(input) => input.principals(),
            None => vec![Principal::Ledger(None)],
        };
        principals.into_iter().map(move |p| self.resolve_one(&p))
    }

    /// The first valid candidate, `None` if every candidate is invalid.
    pub fn first_valid(&self, input: Option<&Input>) -> Result<Option<PrincipalCandidate>, GatewayError> {
        for candidate in self.resolve(input) {
            let candidate = candidate?;
            if candidate.valid {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}
