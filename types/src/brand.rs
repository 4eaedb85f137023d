//! Ledger brand identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Id of the reserved ledger that serves public and wallet-only requests.
///
/// It is always configured, has brand [`ChainBrand::None`] and no client.
pub const INTERNAL_LEDGER: &str = "$INTERNAL$";

/// Which distributed-ledger technology a ledger configuration targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainBrand {
    Besu,
    Corda,
    Daml,
    Fabric,
    /// Brand-agnostic sentinel. Delegates registered under it serve every brand.
    None,
    Setl,
    Sync,
}

impl ChainBrand {
    pub const ALL: [ChainBrand; 7] = [
        Self::Besu,
        Self::Corda,
        Self::Daml,
        Self::Fabric,
        Self::None,
        Self::Setl,
        Self::Sync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Besu => "BESU",
            Self::Corda => "CORDA",
            Self::Daml => "DAML",
            Self::Fabric => "FABRIC",
            Self::None => "NONE",
            Self::Setl => "SETL",
            Self::Sync => "SYNC",
        }
    }
}

impl fmt::Display for ChainBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainBrand {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypesError::UnknownBrand(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("besu".parse::<ChainBrand>().unwrap(), ChainBrand::Besu);
        assert_eq!("NONE".parse::<ChainBrand>().unwrap(), ChainBrand::None);
    }

    #[test]
    fn unknown_brand_is_rejected() {
        let err = "ripple".parse::<ChainBrand>().unwrap_err();
        assert!(matches!(err, TypesError::UnknownBrand(ref s) if s == "ripple"));
    }

    #[test]
    fn serde_uses_upper_case_names() {
        let json = serde_json::to_string(&ChainBrand::Fabric).unwrap();
        assert_eq!(json, "\"FABRIC\"");
        let back: ChainBrand = serde_json::from_str("\"SETL\"").unwrap();
        assert_eq!(back, ChainBrand::Setl);
    }
}
