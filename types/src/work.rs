//! Identifiers for submitted work and wallets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Identifies one unit of submitted work on a ledger, e.g. a transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(String);

impl WorkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Wallet a request acts for, when one is meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalletId {
    NotApplicable,
    Id(i32),
}

impl WalletId {
    pub fn id(&self) -> Option<i32> {
        match self {
            Self::NotApplicable => None,
            Self::Id(id) => Some(*id),
        }
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplicable => f.write_str("not-applicable"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for WalletId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "not-applicable" {
            return Ok(Self::NotApplicable);
        }
        s.parse::<i32>()
            .map(Self::Id)
            .map_err(|_| TypesError::InvalidWalletId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_id_parses_both_forms() {
        assert_eq!("17".parse::<WalletId>().unwrap(), WalletId::Id(17));
        assert_eq!(
            "not-applicable".parse::<WalletId>().unwrap(),
            WalletId::NotApplicable
        );
        assert!("seventeen".parse::<WalletId>().is_err());
    }

    #[test]
    fn work_id_serializes_as_bare_string() {
        let json = serde_json::to_string(&WorkId::new("0xabc")).unwrap();
        assert_eq!(json, "\"0xabc\"");
    }
}
