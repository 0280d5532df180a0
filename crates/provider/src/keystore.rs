use crate::Result;
use alloy::{
    primitives::Address,
    signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner},
};
use std::collections::HashMap;

/// The BIP-44 Ethereum derivation path prefix used for mnemonic accounts.
pub const DERIVATION_PATH_PREFIX: &str = "m/44'/60'/0'/0/";

/// The set of locally controlled signing keys.
///
/// Insertion order is preserved: `eth_accounts` reports addresses in the
/// order the keys were added (for mnemonics, ascending derivation index).
#[derive(Debug, Clone)]
pub struct AccountKeyStore {
    signers: HashMap<Address, PrivateKeySigner>,
    order: Vec<Address>,
}

impl AccountKeyStore {
    /// Build a store from explicit signing keys.
    pub fn from_keys(keys: impl IntoIterator<Item = PrivateKeySigner>) -> Self {
        let mut store = Self { signers: HashMap::new(), order: Vec::new() };
        for signer in keys {
            store.insert(signer);
        }
        store
    }

    /// Derive `count` accounts from a BIP-39 mnemonic phrase, starting at
    /// index 0 under [`DERIVATION_PATH_PREFIX`].
    pub fn from_mnemonic(phrase: &str, count: u32) -> Result<Self> {
        let mut store = Self { signers: HashMap::new(), order: Vec::new() };
        for index in 0..count {
            let signer = MnemonicBuilder::<English>::default()
                .phrase(phrase)
                .derivation_path(format!("{DERIVATION_PATH_PREFIX}{index}"))?
                .build()?;
            store.insert(signer);
        }
        Ok(store)
    }

    fn insert(&mut self, signer: PrivateKeySigner) {
        let address = signer.address();
        if self.signers.insert(address, signer).is_none() {
            self.order.push(address);
        }
    }

    /// Controlled addresses, in insertion order.
    pub fn addresses(&self) -> &[Address] {
        &self.order
    }

    /// True if the store controls `address`.
    pub fn contains(&self, address: &Address) -> bool {
        self.signers.contains_key(address)
    }

    /// The signer for `address`, if controlled.
    pub fn signer(&self, address: &Address) -> Option<&PrivateKeySigner> {
        self.signers.get(address)
    }

    /// Number of controlled accounts.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if the store controls no accounts.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const MNEMONIC: &str =
        "couch hunt wisdom giant regret supreme issue sing enroll ankle type husband";

    #[test]
    fn mnemonic_accounts_derive_in_index_order() {
        let store = AccountKeyStore::from_mnemonic(MNEMONIC, 3).unwrap();
        assert_eq!(
            store.addresses(),
            &[
                address!("4f3e91d2cacd82fffd1f33a0d26d4078401986e9"),
                address!("2a97a65d5673a2c61e95ce33cecadf24f654f96d"),
                address!("287d3a73a4bc87f73901cd147575dfb416762896"),
            ]
        );
        assert!(store.contains(&address!("4f3e91d2cacd82fffd1f33a0d26d4078401986e9")));
        assert!(!store.contains(&Address::ZERO));
    }

    #[test]
    fn duplicate_keys_collapse() {
        let signer = PrivateKeySigner::random();
        let store = AccountKeyStore::from_keys([signer.clone(), signer]);
        assert_eq!(store.len(), 1);
    }
}
