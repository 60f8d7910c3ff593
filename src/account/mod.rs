//! Account module - a signing key bound to a ledger
//!
//! This module provides:
//! - Construction from a mnemonic (BIP-44 path) or a raw private key
//! - Chain state queries
//! - Hash, message and EIP-712 typed-data signatures
//! - Convenience sends built on the transaction pipeline

mod key;
mod query;
mod signature;

pub use key::{
    derivation_path, derive_wallet, generate_mnemonic, generate_mnemonic_with_rng,
    wallet_from_private_key,
};
pub use query::{GasSuggestions, NetworkInfo};
pub use signature::{parse_signature, parse_typed_data, recover_signer, typed_data_hash};

use crate::address::{checksum, parse_address};
use crate::chain::{recommended_confirmations, Ledger, RpcLedger};
use crate::config::{RpcOptions, Settings};
use crate::error::{EvmError, EvmResult};
use crate::tx::{
    self, FeeSettings, GasParams, GasPlanner, NonceSequencer, Setting, SignedTx, TxRequest,
    TxSender,
};

use ethers::abi::Token;
use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, H256, U256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A signing key bound to a ledger
pub struct Account {
    /// Signing key; the address is always derived from it
    wallet: LocalWallet,
    /// Discovered chain id, 0 when unknown
    chain_id: AtomicU64,
    /// Shared remote ledger
    ledger: Arc<dyn Ledger>,
    /// Submission and confirmation policy
    sender: TxSender,
    /// Optional shared nonce sequencer
    nonce_sequencer: Option<Arc<NonceSequencer>>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address_hex())
            .field("chain_id", &self.chain_id())
            .field("nonce_sequencer", &self.nonce_sequencer.is_some())
            .finish()
    }
}

impl Account {
    /// Derive account `index` from a BIP-39 mnemonic
    pub async fn from_mnemonic(
        mnemonic: &str,
        index: u32,
        ledger: Arc<dyn Ledger>,
    ) -> EvmResult<Self> {
        let wallet = derive_wallet(mnemonic, index)?;
        Ok(Self::with_wallet(wallet, ledger).await)
    }

    /// Import a hex private key
    pub async fn from_private_key(hex_key: &str, ledger: Arc<dyn Ledger>) -> EvmResult<Self> {
        let wallet = wallet_from_private_key(hex_key)?;
        Ok(Self::with_wallet(wallet, ledger).await)
    }

    /// `from_mnemonic` over a freshly opened `RpcLedger`
    pub async fn connect_mnemonic(
        mnemonic: &str,
        index: u32,
        options: &RpcOptions,
    ) -> EvmResult<Self> {
        let wallet = derive_wallet(mnemonic, index)?;
        let ledger = Arc::new(RpcLedger::connect(options)?);
        Ok(Self::with_wallet(wallet, ledger).await)
    }

    /// `from_private_key` over a freshly opened `RpcLedger`
    pub async fn connect_private_key(hex_key: &str, options: &RpcOptions) -> EvmResult<Self> {
        let wallet = wallet_from_private_key(hex_key)?;
        let ledger = Arc::new(RpcLedger::connect(options)?);
        Ok(Self::with_wallet(wallet, ledger).await)
    }

    /// Bind `wallet` to `ledger`, discovering the chain id best-effort
    pub async fn with_wallet(wallet: LocalWallet, ledger: Arc<dyn Ledger>) -> Self {
        let chain_id = match ledger.chain_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    "Chain id discovery failed for {}, signing disabled until refreshed: {}",
                    checksum(&wallet.address()),
                    e
                );
                0
            }
        };
        info!(
            "Account {} on chain {}",
            checksum(&wallet.address()),
            chain_id
        );

        Self {
            wallet,
            chain_id: AtomicU64::new(chain_id),
            ledger,
            sender: TxSender::default(),
            nonce_sequencer: None,
        }
    }

    /// Apply the gas, confirmation and retry sections of `settings`
    pub fn with_settings(self, settings: &Settings) -> Self {
        self.with_sender(TxSender::from_settings(settings))
    }

    pub fn with_sender(mut self, sender: TxSender) -> Self {
        self.sender = sender;
        self
    }

    /// Draw nonces from `sequencer` instead of querying the pending nonce per build
    pub fn with_nonce_sequencer(mut self, sequencer: Arc<NonceSequencer>) -> Self {
        self.nonce_sequencer = Some(sequencer);
        self
    }

    /// Release the account; the ledger handle is dropped with it
    pub fn close(self) {
        debug!("Closing account {}", self.address_hex());
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// EIP-55 checksummed address
    pub fn address_hex(&self) -> String {
        checksum(&self.address())
    }

    /// `0x`-prefixed private key
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.wallet.signer().to_bytes()))
    }

    /// `0x`-prefixed uncompressed public key (65 bytes, leading 0x04)
    pub fn public_key_hex(&self) -> String {
        let point = self.wallet.signer().verifying_key().to_encoded_point(false);
        format!("0x{}", hex::encode(point.as_bytes()))
    }

    /// Chain id, 0 when unknown
    pub fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::Relaxed)
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    /// Shared handle to the ledger
    pub fn ledger_handle(&self) -> Arc<dyn Ledger> {
        self.ledger.clone()
    }

    pub fn sender(&self) -> &TxSender {
        &self.sender
    }

    pub fn nonce_sequencer(&self) -> Option<&Arc<NonceSequencer>> {
        self.nonce_sequencer.as_ref()
    }

    /// Nonce for the next build, and whether it came from the sequencer
    pub(crate) async fn next_nonce(&self) -> EvmResult<(u64, bool)> {
        match &self.nonce_sequencer {
            Some(seq) => {
                let nonce = seq
                    .reserve(self.ledger(), self.chain_id(), self.address())
                    .await
                    .map_err(|e| e.context("reserve nonce"))?;
                Ok((nonce, true))
            }
            None => {
                let nonce = self
                    .ledger
                    .pending_nonce(self.address())
                    .await
                    .map_err(|e| e.context("pending nonce"))?;
                Ok((nonce, false))
            }
        }
    }

    /// Return a sequencer nonce whose transaction was never signed
    pub(crate) async fn release_nonce(&self, nonce: u64) {
        if let Some(seq) = &self.nonce_sequencer {
            seq.release(self.chain_id(), self.address(), nonce).await;
        }
    }

    /// Sign `tx` with this key; the chain id set on `tx` keys the signature
    pub(crate) fn sign_transaction(&self, tx: &TypedTransaction) -> EvmResult<Signature> {
        self.wallet
            .sign_transaction_sync(tx)
            .map_err(|e| EvmError::Signing(e.to_string()))
    }

    // ----- Transaction pipeline -----

    /// Build with auto gas, dynamic first then legacy
    pub async fn build_tx(&self, req: &TxRequest) -> EvmResult<SignedTx> {
        self.sender
            .builder()
            .build(self, req, &FeeSettings::default())
            .await
    }

    /// Submit and wait for a successful receipt
    pub async fn send_tx(&self, signed: &SignedTx) -> EvmResult<H256> {
        self.sender.send_tx(self, signed).await
    }

    pub async fn send_tx_with_retry(&self, signed: &SignedTx, max_retries: u32) -> EvmResult<H256> {
        self.sender.send_tx_with_retry(self, signed, max_retries).await
    }

    pub async fn send_tx_with_smart_gas(&self, signed: &SignedTx) -> EvmResult<H256> {
        self.sender.send_tx_with_smart_gas(self, signed).await
    }

    pub async fn batch_send(&self, txs: &[SignedTx]) -> Vec<EvmResult<H256>> {
        self.sender.batch_send(self, txs).await
    }

    /// Wait until `hash` is `confirmations` blocks deep
    pub async fn wait_for_transaction(
        &self,
        hash: H256,
        confirmations: u64,
    ) -> EvmResult<crate::chain::Receipt> {
        self.sender
            .wait_for_confirmations(self, hash, confirmations, None)
            .await
    }

    /// Wait for the confirmation depth customary on this chain
    pub async fn wait_for_finality(&self, hash: H256) -> EvmResult<crate::chain::Receipt> {
        let depth = recommended_confirmations(self.chain_id());
        debug!("Waiting for {} confirmations of {:?}", depth, hash);
        self.wait_for_transaction(hash, depth).await
    }

    /// See [`tx::send_contract_method`]
    pub async fn send_contract_method(
        &self,
        contract: &str,
        abi_json: &str,
        method: &str,
        value: U256,
        args: &[Token],
    ) -> EvmResult<SignedTx> {
        tx::send_contract_method(self, contract, abi_json, method, value, args).await
    }

    /// Transfer `amount` wei of the native coin
    pub async fn send_eth(&self, to: &str, amount: U256) -> EvmResult<H256> {
        self.send_eth_with_gas(to, amount, Setting::Auto, Setting::Auto)
            .await
    }

    /// Transfer with optional fixed gas; checks balance covers value plus fee.
    ///
    /// An explicit price signs legacy at that price; an auto price builds
    /// dynamic first. The balance check uses the signed transaction's own
    /// maximum fee.
    pub async fn send_eth_with_gas(
        &self,
        to: &str,
        amount: U256,
        gas_limit: Setting<u64>,
        gas_price: Setting<U256>,
    ) -> EvmResult<H256> {
        if amount.is_zero() {
            return Err(EvmError::invalid("amount", "0"));
        }
        parse_address("to", to)?;

        let req = TxRequest {
            gas_limit,
            ..TxRequest::transfer(to, amount)
        };
        let signed = match gas_price {
            Setting::Explicit(_) => {
                self.sender
                    .builder()
                    .build_legacy(self, &req, gas_price)
                    .await?
            }
            Setting::Auto => self.build_tx(&req).await?,
        };
        self.ensure_affordable(&signed).await?;
        self.send_tx(&signed).await
    }

    /// Send calldata to a contract; `data` must not be empty
    pub async fn send_contract_call(&self, to: &str, data: Bytes, value: U256) -> EvmResult<H256> {
        parse_address("contract", to)?;
        if data.is_empty() {
            return Err(EvmError::invalid("calldata", "<empty>"));
        }

        let req = TxRequest::call(to, data).with_value(value);
        let signed = self.build_tx(&req).await?;
        if !value.is_zero() {
            self.ensure_affordable(&signed).await?;
        }
        self.send_tx(&signed).await
    }

    /// Deploy `bytecode`; returns the transaction hash and the new contract address
    pub async fn deploy(&self, bytecode: Bytes) -> EvmResult<(H256, Address)> {
        if bytecode.is_empty() {
            return Err(EvmError::invalid("bytecode", "<empty>"));
        }

        let signed = self.build_tx(&TxRequest::deploy(bytecode)).await?;
        let contract = ethers::utils::get_contract_address(self.address(), signed.nonce());
        let hash = self.send_tx(&signed).await?;
        info!("Deployed contract {} in {:?}", checksum(&contract), hash);
        Ok((hash, contract))
    }

    /// Balance must cover the value plus the maximum fee `signed` can pay;
    /// an unaffordable transaction gives its nonce back
    async fn ensure_affordable(&self, signed: &SignedTx) -> EvmResult<()> {
        let params = GasParams {
            gas_limit: signed.gas_limit(),
            pricing: signed.pricing(),
        };
        let result = match GasPlanner::total_cost(signed.value(), &params) {
            Ok(needed) => self.ensure_balance(needed).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.release_nonce(signed.nonce()).await;
        }
        result
    }

    async fn ensure_balance(&self, needed: U256) -> EvmResult<()> {
        if !self.has_enough_balance(needed).await? {
            return Err(EvmError::invalid(
                "balance",
                format!("insufficient funds, need {} wei", needed),
            ));
        }
        Ok(())
    }
}

/// Account over a mock ledger with the standard test key, no chain id lookup
#[cfg(test)]
pub(crate) fn test_account(ledger: crate::chain::MockLedger, chain_id: u64) -> Account {
    Account {
        wallet: wallet_from_private_key(TEST_PRIVATE_KEY).unwrap(),
        chain_id: AtomicU64::new(chain_id),
        ledger: Arc::new(ledger),
        sender: TxSender::default(),
        nonce_sequencer: None,
    }
}

#[cfg(test)]
pub(crate) const TEST_PRIVATE_KEY: &str =
    "0x8c3083c24062f065ff2ee71b21f665375b266cebffa920e8909ec7c48006725d";

#[cfg(test)]
pub(crate) const TEST_ADDRESS: &str = "0x7161ada3EA6e53E5652A45988DdfF1cE595E09c2";
