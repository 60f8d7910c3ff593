//! Read-only chain queries

use super::Account;
use crate::address::{parse_address, parse_optional_address};
use crate::chain::{network_name, CallRequest, Receipt};
use crate::error::{EvmError, EvmResult};
use crate::tx::{percent_of, GasStrategy, SignedTx};

use ethers::types::{Block, BlockId, BlockNumber, Bytes, H256, U256};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use tracing::debug;

/// Current fee suggestions in wei
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSuggestions {
    /// Legacy gas price
    pub gas_price: U256,
    /// EIP-1559 priority fee
    pub gas_tip_cap: U256,
    /// EIP-1559 fee cap
    pub gas_fee_cap: U256,
}

/// Chain identity as seen by the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub chain_id: u64,
    pub network_name: String,
}

impl Account {
    /// Balance of `address` at the latest block
    pub async fn balance(&self, address: &str) -> EvmResult<U256> {
        let addr = parse_address("balance", address)?;
        self.ledger
            .balance(addr)
            .await
            .map_err(|e| e.context(format!("balance of {}", address)))
    }

    /// Balance of this account
    pub async fn eth_balance(&self) -> EvmResult<U256> {
        self.balance(&self.address_hex()).await
    }

    /// True when the balance covers `amount`; a zero amount is always covered
    pub async fn has_enough_balance(&self, amount: U256) -> EvmResult<bool> {
        if amount.is_zero() {
            return Ok(true);
        }
        Ok(self.eth_balance().await? >= amount)
    }

    /// Balances of many addresses, queried concurrently; invalid or failed
    /// lookups map to `None`
    pub async fn batch_balances(
        &self,
        addresses: &[&str],
    ) -> EvmResult<HashMap<String, Option<U256>>> {
        if addresses.is_empty() {
            return Err(EvmError::invalid("address list", "<empty>"));
        }

        let lookups = addresses.iter().map(|address| self.balance(address));
        let results = join_all(lookups).await;

        Ok(addresses
            .iter()
            .zip(results)
            .map(|(address, result)| {
                if let Err(e) = &result {
                    debug!("Balance lookup for {} failed: {}", address, e);
                }
                (address.to_string(), result.ok())
            })
            .collect())
    }

    /// Pending-view transaction count of `address`
    pub async fn nonce(&self, address: &str) -> EvmResult<u64> {
        let addr = parse_address("nonce", address)?;
        self.ledger
            .pending_nonce(addr)
            .await
            .map_err(|e| e.context(format!("nonce of {}", address)))
    }

    /// Nonces of many addresses, queried concurrently; invalid or failed
    /// lookups map to `None`
    pub async fn batch_nonces(
        &self,
        addresses: &[&str],
    ) -> EvmResult<HashMap<String, Option<u64>>> {
        if addresses.is_empty() {
            return Err(EvmError::invalid("address list", "<empty>"));
        }

        let lookups = addresses.iter().map(|address| self.nonce(address));
        let results = join_all(lookups).await;

        Ok(addresses
            .iter()
            .zip(results)
            .map(|(address, result)| {
                if let Err(e) = &result {
                    debug!("Nonce lookup for {} failed: {}", address, e);
                }
                (address.to_string(), result.ok())
            })
            .collect())
    }

    /// Node's legacy gas price suggestion
    pub async fn suggest_gas_price(&self) -> EvmResult<U256> {
        self.ledger.gas_price().await
    }

    /// Node's EIP-1559 priority fee suggestion
    pub async fn suggest_gas_tip_cap(&self) -> EvmResult<U256> {
        self.ledger.max_priority_fee().await
    }

    /// EIP-1559 fee cap heuristic: twice the legacy suggestion, saturating
    pub async fn suggest_gas_fee_cap(&self) -> EvmResult<U256> {
        Ok(self.suggest_gas_price().await?.saturating_mul(U256::from(2)))
    }

    /// All three fee suggestions
    pub async fn gas_suggestions(&self) -> EvmResult<GasSuggestions> {
        let gas_price = self.suggest_gas_price().await?;
        let gas_tip_cap = self.suggest_gas_tip_cap().await?;
        Ok(GasSuggestions {
            gas_price,
            gas_tip_cap,
            gas_fee_cap: gas_price.saturating_mul(U256::from(2)),
        })
    }

    /// Suggested price plus 10%, saturating
    pub async fn dynamic_gas_price(&self) -> EvmResult<U256> {
        Ok(percent_of(self.suggest_gas_price().await?, 110).unwrap_or(U256::MAX))
    }

    /// Suggested price under `strategy`
    pub async fn gas_price_by_strategy(&self, strategy: GasStrategy) -> EvmResult<U256> {
        Ok(strategy.apply(self.suggest_gas_price().await?))
    }

    /// Gas needed for a call; empty `from` is the zero sender, empty `to` a
    /// contract creation. Failure usually means the call would revert.
    pub async fn estimate_gas(
        &self,
        from: &str,
        to: &str,
        value: U256,
        data: Bytes,
    ) -> EvmResult<u64> {
        let call = CallRequest {
            from: parse_optional_address("from", from)?,
            to: parse_optional_address("to", to)?,
            value,
            data,
        };
        self.estimate_call(&call).await
    }

    /// `estimate_gas` over an already parsed call
    pub async fn estimate_call(&self, call: &CallRequest) -> EvmResult<u64> {
        self.ledger.estimate_gas(call).await
    }

    /// Execute a call against latest state without a transaction
    pub async fn only_read_call(&self, to: &str, data: Bytes) -> EvmResult<Bytes> {
        let call = CallRequest {
            from: None,
            to: Some(parse_address("to", to)?),
            value: U256::zero(),
            data,
        };
        self.ledger.call(&call).await
    }

    pub async fn latest_block_number(&self) -> EvmResult<u64> {
        self.ledger.block_number().await
    }

    /// Block by number, `None` when the node does not have it
    pub async fn block(&self, number: u64) -> EvmResult<Option<Block<H256>>> {
        self.ledger
            .block(BlockId::Number(BlockNumber::Number(number.into())))
            .await
    }

    pub async fn block_by_hash(&self, hash: H256) -> EvmResult<Option<Block<H256>>> {
        self.ledger.block(BlockId::Hash(hash)).await
    }

    /// True when code is deployed at `address`
    pub async fn is_contract_address(&self, address: &str) -> EvmResult<bool> {
        let addr = parse_address("contract", address)?;
        Ok(!self.ledger.code(addr).await?.is_empty())
    }

    /// True when the node answers a chain id request
    pub async fn is_connected(&self) -> bool {
        self.ledger.chain_id().await.is_ok()
    }

    /// Chain id (queried when still unknown) and its well-known name
    pub async fn network_info(&self) -> EvmResult<NetworkInfo> {
        let chain_id = match self.chain_id() {
            0 => self.ledger.chain_id().await?,
            id => id,
        };
        Ok(NetworkInfo {
            chain_id,
            network_name: network_name(chain_id),
        })
    }

    /// Re-query the chain id; on success signing is enabled
    pub async fn refresh_chain_id(&self) -> EvmResult<u64> {
        let chain_id = self.ledger.chain_id().await?;
        self.chain_id.store(chain_id, Ordering::Relaxed);
        Ok(chain_id)
    }

    /// Receipt for `hash`, `None` while pending
    pub async fn transaction_receipt(&self, hash: H256) -> EvmResult<Option<Receipt>> {
        self.ledger.transaction_receipt(hash).await
    }

    /// True when mined successfully; a pending transaction is an error
    pub async fn is_transaction_successful(&self, hash: H256) -> EvmResult<bool> {
        match self.transaction_receipt(hash).await? {
            Some(receipt) => Ok(receipt.is_success()),
            None => Err(EvmError::invalid(
                "transaction",
                format!("{:?} has no receipt yet", hash),
            )),
        }
    }

    /// Fee actually paid: gas used times the effective price, falling back
    /// to the transaction's maximum price when the node does not report it
    pub async fn calculate_transaction_fee(&self, signed: &SignedTx) -> EvmResult<U256> {
        let receipt = self
            .transaction_receipt(signed.hash())
            .await?
            .ok_or_else(|| {
                EvmError::invalid("transaction", format!("{:?} has no receipt yet", signed.hash()))
            })?;
        let price = receipt
            .effective_gas_price
            .unwrap_or_else(|| signed.pricing().max_price_per_gas());
        U256::from(receipt.gas_used).checked_mul(price).ok_or_else(|| {
            EvmError::invalid(
                "transaction fee",
                format!("{} x {} overflows", receipt.gas_used, price),
            )
        })
    }
}
