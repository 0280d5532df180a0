use crate::Hardfork;
use alloy::primitives::{address, Address, U256};
use simnode_ledger::LedgerConfig;
use std::time::Duration;

/// The default funding mnemonic for development accounts.
pub(crate) const DEFAULT_MNEMONIC: &str =
    "test test test test test test test test test test test junk";

/// Construction parameters for a [`SimNode`](crate::SimNode).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Chain id reported by `eth_chainId` and enforced on inbound
    /// transactions.
    pub chain_id: u64,
    /// Protocol rule set in force.
    pub hardfork: Hardfork,
    /// Gas limit stamped on every mined block.
    pub block_gas_limit: u64,
    /// Base fee of the genesis block (ignored pre-London).
    pub initial_base_fee: u64,
    /// Mine a block immediately on every accepted transaction.
    pub automine: bool,
    /// Beneficiary stamped on mined blocks, reported by `eth_coinbase`.
    pub coinbase: Address,
    /// Mnemonic the pre-funded accounts are derived from.
    pub mnemonic: String,
    /// Number of pre-funded accounts to derive.
    pub accounts: u32,
    /// Balance credited to each pre-funded account at genesis.
    pub initial_balance: U256,
    /// Turn failed transactions into errors on `eth_sendRawTransaction`.
    pub throw_on_transaction_failures: bool,
    /// Turn reverted calls into errors on `eth_call`.
    pub throw_on_call_failures: bool,
    /// Log query limits.
    pub ledger: LedgerConfig,
    /// How often the filter registry sweeps for idle filters.
    pub filter_sweep_interval: Duration,
    /// Idle time after which an unpolled filter is removed.
    pub filter_idle_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            hardfork: Hardfork::default(),
            block_gas_limit: 30_000_000,
            initial_base_fee: 1_000_000_000,
            automine: true,
            coinbase: address!("c014ba5ec014ba5ec014ba5ec014ba5ec014ba5e"),
            mnemonic: DEFAULT_MNEMONIC.to_owned(),
            accounts: 20,
            // 10,000 ETH each.
            initial_balance: U256::from(10_000u128 * 10u128.pow(18)),
            throw_on_transaction_failures: true,
            throw_on_call_failures: true,
            ledger: LedgerConfig::default(),
            filter_sweep_interval: Duration::from_secs(60),
            filter_idle_timeout: Duration::from_secs(300),
        }
    }
}
