use alloy::primitives::Address;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors produced by the transport or by an interceptor layer.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    /// The upstream returned a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// The JSON-RPC error code.
        code: i64,
        /// The upstream error message.
        message: String,
    },

    /// The upstream chain id does not match the configured one.
    #[error("invalid chain id: expected {expected}, upstream reports {actual}")]
    InvalidChainId {
        /// The chain id the provider was configured for.
        expected: u64,
        /// The chain id the upstream reported.
        actual: u64,
    },

    /// A response value could not be interpreted as a hex quantity.
    #[error("malformed quantity in response: {0}")]
    MalformedQuantity(String),

    /// A transaction request omits `from` and no default sender is derivable.
    #[error("no sender available: tx has no `from` and the node reports no accounts")]
    MissingSender,

    /// A required transaction field is absent where filling is not allowed.
    #[error("missing required transaction parameter `{0}`")]
    MissingTxParam(&'static str),

    /// Legacy and EIP-1559 fee fields were both supplied.
    #[error("both `gasPrice` and EIP-1559 fee fields present; supply exactly one fee scheme")]
    ConflictingFeeFields,

    /// The EIP-1559 fee pair is incomplete.
    #[error("incomplete EIP-1559 fee pair: `{0}` is missing")]
    IncompleteFeePair(&'static str),

    /// The sender address is not controlled by the local key store.
    #[error("account {0} is not managed by the local key store")]
    UnknownAccount(Address),

    /// Key derivation or signing failed.
    #[error(transparent)]
    Signer(#[from] alloy::signers::Error),

    /// Wallet construction from a mnemonic failed.
    #[error(transparent)]
    Wallet(#[from] alloy::signers::local::LocalSignerError),

    /// An error occurred while parsing the endpoint URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// An HTTP-level error occurred while contacting the upstream.
    #[error("error contacting upstream: {0}")]
    Http(#[from] reqwest::Error),

    /// A request or response body failed to (de)serialize.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// True if this is a JSON-RPC "method not found" response.
    pub const fn is_method_not_found(&self) -> bool {
        matches!(self, Self::Rpc { code: -32601, .. })
    }
}
