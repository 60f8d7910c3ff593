//! Transaction module: gas planning, nonce sequencing, building and submission

mod builder;
mod contract;
mod gas;
mod nonce;
mod sender;

pub use builder::{assemble, FeeSettings, SignedTx, TxBuilder, TxRequest, TxVariant};
pub use contract::{
    call_contract_method, preflight_contract_method, preflight_tx, send_contract_method,
    Preflight,
};
pub use gas::{percent_of, GasParams, GasPlanner, GasStrategy, Pricing, Setting, MAX_GAS_LIMIT};
pub use nonce::NonceSequencer;
pub use sender::TxSender;
