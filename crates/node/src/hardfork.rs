use serde::{Deserialize, Serialize};

/// The protocol rule set the node simulates.
///
/// Variants are ordered by activation, so `>=` comparisons express "active
/// since".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "camelCase")]
pub enum Hardfork {
    /// Frontier, the original rule set.
    Frontier,
    /// Homestead.
    Homestead,
    /// Byzantium, introduces receipt status codes.
    Byzantium,
    /// Constantinople.
    Constantinople,
    /// Petersburg.
    Petersburg,
    /// Istanbul.
    Istanbul,
    /// Muir Glacier.
    MuirGlacier,
    /// Berlin, introduces typed transactions and access lists.
    Berlin,
    /// London, introduces the EIP-1559 fee market.
    London,
    /// Arrow Glacier.
    ArrowGlacier,
    /// Gray Glacier.
    GrayGlacier,
    /// The Merge.
    Merge,
    /// Shanghai.
    Shanghai,
    /// Cancun, the default.
    #[default]
    Cancun,
    /// Prague, introduces set-code transactions.
    Prague,
}

impl Hardfork {
    /// True once access-list transactions (EIP-2930) are valid.
    pub fn supports_access_lists(&self) -> bool {
        *self >= Self::Berlin
    }

    /// True once fee-market transactions and the block base fee (EIP-1559)
    /// are active.
    pub fn supports_eip1559(&self) -> bool {
        *self >= Self::London
    }

    /// True once set-code transactions (EIP-7702) are valid.
    pub fn supports_set_code(&self) -> bool {
        *self >= Self::Prague
    }

    /// The minimum hardfork required for the given EIP-2718 transaction type,
    /// if the type is gated at all.
    pub const fn required_for_tx_type(tx_type: u8) -> Option<Self> {
        match tx_type {
            1 => Some(Self::Berlin),
            2 => Some(Self::London),
            3 => Some(Self::Cancun),
            4 => Some(Self::Prague),
            _ => None,
        }
    }
}

impl std::fmt::Display for Hardfork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Frontier => "frontier",
            Self::Homestead => "homestead",
            Self::Byzantium => "byzantium",
            Self::Constantinople => "constantinople",
            Self::Petersburg => "petersburg",
            Self::Istanbul => "istanbul",
            Self::MuirGlacier => "muirGlacier",
            Self::Berlin => "berlin",
            Self::London => "london",
            Self::ArrowGlacier => "arrowGlacier",
            Self::GrayGlacier => "grayGlacier",
            Self::Merge => "merge",
            Self::Shanghai => "shanghai",
            Self::Cancun => "cancun",
            Self::Prague => "prague",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_ordering() {
        assert!(Hardfork::London.supports_access_lists());
        assert!(!Hardfork::Berlin.supports_eip1559());
        assert!(!Hardfork::Cancun.supports_set_code());
        assert_eq!(Hardfork::required_for_tx_type(2), Some(Hardfork::London));
        assert_eq!(Hardfork::required_for_tx_type(4), Some(Hardfork::Prague));
        assert_eq!(Hardfork::required_for_tx_type(0), None);
    }
}
