use crate::{
    layers::{ChainIdLayer, FeeLayer, GasEstimateQuirkLayer, GasLayer, SenderLayer, SigningLayer},
    AccountKeyStore, BoxTransport, Transport,
};
use alloy::primitives::Address;

/// Composes the standard interceptor stack around a base transport.
///
/// Layers are applied innermost first, so requests flow: signing, sender
/// resolution, gas limit, gas-estimate quirk, fee price, chain-id validation,
/// transport. Every layer is optional; an empty builder returns the bare
/// transport.
#[derive(Debug, Default)]
pub struct ProviderBuilder {
    expected_chain_id: Option<u64>,
    fixed_gas_price: Option<u128>,
    automatic_fees: bool,
    fixed_gas: Option<u64>,
    gas_multiplier: Option<f64>,
    estimate_quirk: bool,
    fixed_sender: Option<Address>,
    resolve_sender: bool,
    signing: Option<(AccountKeyStore, u64)>,
}

impl ProviderBuilder {
    /// Start an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the upstream chain id against `expected` before any request.
    pub const fn expect_chain_id(mut self, expected: u64) -> Self {
        self.expected_chain_id = Some(expected);
        self
    }

    /// Substitute a fixed legacy `gasPrice` on unpriced transactions.
    pub const fn fixed_gas_price(mut self, gas_price: u128) -> Self {
        self.fixed_gas_price = Some(gas_price);
        self
    }

    /// Resolve missing fees automatically (EIP-1559 aware).
    pub const fn automatic_fees(mut self) -> Self {
        self.automatic_fees = true;
        self
    }

    /// Substitute a fixed `gas` on transactions that omit it.
    pub const fn fixed_gas(mut self, gas: u64) -> Self {
        self.fixed_gas = Some(gas);
        self
    }

    /// Estimate missing `gas` upstream, scaled by `multiplier`.
    pub const fn automatic_gas(mut self, multiplier: f64) -> Self {
        self.gas_multiplier = Some(multiplier);
        self
    }

    /// Work around upstreams known to under-estimate gas.
    pub const fn estimate_quirk(mut self) -> Self {
        self.estimate_quirk = true;
        self
    }

    /// Fill missing senders with a fixed address.
    pub const fn fixed_sender(mut self, sender: Address) -> Self {
        self.fixed_sender = Some(sender);
        self
    }

    /// Fill missing senders with the upstream's first account.
    pub const fn resolve_sender(mut self) -> Self {
        self.resolve_sender = true;
        self
    }

    /// Sign transactions from `store` locally, for chain `chain_id`.
    pub fn local_accounts(mut self, store: AccountKeyStore, chain_id: u64) -> Self {
        self.signing = Some((store, chain_id));
        self
    }

    /// Wrap `transport` in the configured layers.
    pub fn build(self, transport: impl Transport + 'static) -> BoxTransport {
        let mut stack: BoxTransport = Box::new(transport);

        if let Some(expected) = self.expected_chain_id {
            stack = Box::new(ChainIdLayer::new(stack, expected));
        }
        if let Some(gas_price) = self.fixed_gas_price {
            stack = Box::new(FeeLayer::fixed(stack, gas_price));
        } else if self.automatic_fees {
            stack = Box::new(FeeLayer::automatic(stack));
        }
        if self.estimate_quirk {
            stack = Box::new(GasEstimateQuirkLayer::new(stack));
        }
        if let Some(gas) = self.fixed_gas {
            stack = Box::new(GasLayer::fixed(stack, gas));
        } else if let Some(multiplier) = self.gas_multiplier {
            stack = Box::new(GasLayer::automatic(stack, multiplier));
        }
        if self.fixed_sender.is_some() || self.resolve_sender {
            stack = Box::new(SenderLayer::new(stack, self.fixed_sender));
        }
        if let Some((store, chain_id)) = self.signing {
            stack = Box::new(SigningLayer::new(stack, store, chain_id));
        }
        stack
    }
}
