use alloy::{
    consensus::{transaction::Recovered, Transaction, TxEnvelope},
    primitives::{Address, Bytes, B256, U256},
    rpc::types::TransactionRequest,
};
use std::collections::HashMap;

/// Gas charged for a plain value transfer.
const TRANSFER_GAS: u64 = 21_000;

/// The world-state view of a single account.
#[derive(Debug, Clone, Default)]
pub struct AccountState {
    /// Spendable balance in wei.
    pub balance: U256,
    /// Number of transactions sent from this account.
    pub nonce: u64,
    /// Deployed bytecode, empty for externally owned accounts.
    pub code: Bytes,
    /// Contract storage.
    pub storage: HashMap<U256, B256>,
}

/// The result of executing or simulating one transaction.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// False when execution reverted or the sender could not pay.
    pub success: bool,
    /// Gas consumed.
    pub gas_used: u64,
    /// Logs emitted during execution.
    pub logs: Vec<alloy::primitives::Log>,
    /// Return data.
    pub output: Bytes,
}

/// Applies transactions to world state.
///
/// The node is generic over this seam: mining and `eth_call` go through it,
/// state queries (`eth_getBalance` and friends) read from it. The built-in
/// [`TransferEngine`] handles plain value transfers, which is sufficient for
/// exercising the RPC surface without a full interpreter behind it.
pub trait ExecutionEngine: std::fmt::Debug + Send {
    /// Apply `tx` to state, paying `effective_gas_price` per unit of gas.
    fn execute(&mut self, tx: &Recovered<TxEnvelope>, effective_gas_price: u128)
        -> ExecutionOutcome;

    /// Evaluate `request` against current state without committing changes.
    fn simulate(&self, request: &TransactionRequest) -> ExecutionOutcome;

    /// Snapshot of the account's state.
    fn account(&self, address: &Address) -> AccountState;

    /// Overwrite an account's balance. Used to fund genesis accounts.
    fn set_balance(&mut self, address: Address, balance: U256);
}

/// A minimal engine that understands value transfers only.
///
/// A transaction whose sender cannot cover `value + gas * price` is included
/// with a failed receipt; the nonce advances and the gas fee is charged up to
/// the available balance, mirroring how a real node treats such inclusions.
#[derive(Debug, Default)]
pub struct TransferEngine {
    accounts: HashMap<Address, AccountState>,
}

impl TransferEngine {
    /// An empty world state.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, address: Address) -> &mut AccountState {
        self.accounts.entry(address).or_default()
    }
}

impl ExecutionEngine for TransferEngine {
    fn execute(
        &mut self,
        tx: &Recovered<TxEnvelope>,
        effective_gas_price: u128,
    ) -> ExecutionOutcome {
        let sender = tx.signer();
        let value = tx.inner().value();
        let fee = U256::from(effective_gas_price) * U256::from(TRANSFER_GAS);

        let sender_state = self.entry(sender);
        sender_state.nonce += 1;

        let total = value.saturating_add(fee);
        if sender_state.balance < total {
            // Burn what is available, keep the transfer unapplied.
            sender_state.balance = sender_state.balance.saturating_sub(fee);
            return ExecutionOutcome {
                success: false,
                gas_used: TRANSFER_GAS,
                logs: Vec::new(),
                output: Bytes::new(),
            };
        }
        sender_state.balance -= total;

        if let Some(to) = tx.inner().to() {
            self.entry(to).balance += value;
        }

        ExecutionOutcome {
            success: true,
            gas_used: TRANSFER_GAS,
            logs: Vec::new(),
            output: Bytes::new(),
        }
    }

    fn simulate(&self, request: &TransactionRequest) -> ExecutionOutcome {
        let value = request.value.unwrap_or_default();
        let covered = request
            .from
            .map(|from| self.account(&from).balance >= value)
            .unwrap_or(value.is_zero());

        ExecutionOutcome {
            success: covered,
            gas_used: TRANSFER_GAS,
            logs: Vec::new(),
            output: Bytes::new(),
        }
    }

    fn account(&self, address: &Address) -> AccountState {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        self.entry(address).balance = balance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        consensus::{Signed, TxLegacy},
        primitives::{Signature, TxKind},
    };

    fn transfer(from: Address, to: Address, value: u128, nonce: u64) -> Recovered<TxEnvelope> {
        let tx = TxLegacy {
            chain_id: Some(31337),
            nonce,
            gas_price: 1,
            gas_limit: TRANSFER_GAS,
            to: TxKind::Call(to),
            value: U256::from(value),
            input: Bytes::new(),
        };
        let signed = Signed::new_unchecked(
            tx,
            Signature::new(U256::from(1), U256::from(1), false),
            B256::repeat_byte(nonce as u8 + 1),
        );
        Recovered::new_unchecked(TxEnvelope::Legacy(signed), from)
    }

    #[test]
    fn funded_transfer_moves_value_and_charges_gas() {
        let alice = Address::repeat_byte(0x01);
        let bob = Address::repeat_byte(0x02);
        let mut engine = TransferEngine::new();
        engine.set_balance(alice, U256::from(1_000_000u64));

        let outcome = engine.execute(&transfer(alice, bob, 100, 0), 2);

        assert!(outcome.success);
        assert_eq!(outcome.gas_used, TRANSFER_GAS);
        assert_eq!(engine.account(&bob).balance, U256::from(100u64));
        assert_eq!(
            engine.account(&alice).balance,
            U256::from(1_000_000u64 - 100 - 2 * TRANSFER_GAS as u64)
        );
        assert_eq!(engine.account(&alice).nonce, 1);
    }

    #[test]
    fn underfunded_transfer_fails_but_advances_nonce() {
        let alice = Address::repeat_byte(0x01);
        let bob = Address::repeat_byte(0x02);
        let mut engine = TransferEngine::new();
        engine.set_balance(alice, U256::from(10u64));

        let outcome = engine.execute(&transfer(alice, bob, 100, 0), 1);

        assert!(!outcome.success);
        assert_eq!(engine.account(&alice).nonce, 1);
        assert_eq!(engine.account(&bob).balance, U256::ZERO);
    }
}
