//! Chain module - the remote ledger boundary
//!
//! This module provides:
//! - The `Ledger` trait every account talks to
//! - An ethers-backed JSON-RPC implementation with multi-endpoint failover
//! - A small table of well-known networks

pub mod networks;
pub mod provider;

pub use networks::{network_name, recommended_confirmations};
pub use provider::RpcLedger;

use crate::error::EvmResult;

use async_trait::async_trait;
use ethers::types::{Address, Block, BlockId, Bytes, H256, U256};

/// A read-only or simulated call against the ledger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallRequest {
    /// Sender; zero address when absent
    pub from: Option<Address>,
    /// Destination; absent means contract creation
    pub to: Option<Address>,
    /// Value in wei
    pub value: U256,
    /// Calldata or init code
    pub data: Bytes,
}

/// Outcome recorded in a mined receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

/// Mined transaction receipt
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    /// Transaction hash
    pub tx_hash: H256,
    /// Execution status
    pub status: ReceiptStatus,
    /// Block the transaction was mined in
    pub block_number: u64,
    /// Gas consumed
    pub gas_used: u64,
    /// Price actually paid per gas unit, when the node reports it
    pub effective_gas_price: Option<U256>,
}

impl Receipt {
    /// Check whether execution succeeded
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Remote ledger operations used by accounts, builders and senders.
///
/// Implementations classify failures: node-side rejections of a simulation
/// are `SimulationReverted`, rejections of a raw transaction are
/// `SubmissionRejected`, everything else is `Transport`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Chain id reported by the node
    async fn chain_id(&self) -> EvmResult<u64>;

    /// Balance at the latest block
    async fn balance(&self, address: Address) -> EvmResult<U256>;

    /// Transaction count including pending transactions
    async fn pending_nonce(&self, address: Address) -> EvmResult<u64>;

    /// Suggested legacy gas price
    async fn gas_price(&self) -> EvmResult<U256>;

    /// Suggested EIP-1559 priority fee
    async fn max_priority_fee(&self) -> EvmResult<U256>;

    /// Gas needed to execute `call`
    async fn estimate_gas(&self, call: &CallRequest) -> EvmResult<u64>;

    /// Execute `call` without creating a transaction
    async fn call(&self, call: &CallRequest) -> EvmResult<Bytes>;

    /// Submit a signed, RLP-encoded transaction
    async fn send_raw_transaction(&self, raw: Bytes) -> EvmResult<H256>;

    /// Receipt for `hash`, `None` while not mined
    async fn transaction_receipt(&self, hash: H256) -> EvmResult<Option<Receipt>>;

    /// Latest block number
    async fn block_number(&self) -> EvmResult<u64>;

    /// Block header and transaction hashes
    async fn block(&self, id: BlockId) -> EvmResult<Option<Block<H256>>>;

    /// Deployed bytecode at `address`
    async fn code(&self, address: Address) -> EvmResult<Bytes>;
}
