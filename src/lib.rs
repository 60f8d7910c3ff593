//! evm-txkit - EVM accounts, dual-format transactions and confirmation tracking
//!
//! An [`Account`] binds a key (from a BIP-39 mnemonic or a raw private key)
//! to a JSON-RPC ledger. Transactions are built as EIP-1559 first and fall
//! back to legacy pricing, then submitted and polled to a receipt. Token
//! facades for ERC20, ERC721 and ERC1155 sit on top of the same pipeline.

pub mod abi;
pub mod account;
pub mod address;
pub mod chain;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod token;
pub mod tx;
pub mod units;

pub use account::{Account, GasSuggestions, NetworkInfo};
pub use chain::{CallRequest, Ledger, Receipt, ReceiptStatus, RpcLedger};
pub use config::{RpcOptions, Settings};
pub use error::{ErrorKind, EvmError, EvmResult};
pub use token::{Erc1155, Erc20, Erc721};
pub use tx::{
    FeeSettings, GasPlanner, GasStrategy, Pricing, Setting, SignedTx, TxBuilder, TxRequest,
    TxSender, TxVariant,
};
