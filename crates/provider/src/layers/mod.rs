//! The interceptor layers.
//!
//! Each layer wraps a [`Transport`](crate::Transport) and rewrites requests
//! on their way to it. Layers hold only their own lazily initialized state;
//! ordering is decided by the caller, normally via
//! [`ProviderBuilder`](crate::ProviderBuilder).

mod chain_id;
pub use chain_id::ChainIdLayer;

mod fee;
pub use fee::{project_base_fee, FeeLayer, BASE_FEE_PROJECTION_BLOCKS};

mod gas;
pub use gas::{GasEstimateQuirkLayer, GasLayer};

mod sender;
pub use sender::SenderLayer;

mod sign;
pub use sign::SigningLayer;
