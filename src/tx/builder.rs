//! Transaction assembly and signing in legacy and EIP-1559 formats

use crate::account::Account;
use crate::address::{checksum, parse_optional_address};
use crate::chain::CallRequest;
use crate::error::{ErrorKind, EvmError, EvmResult};
use crate::metrics;
use crate::tx::{GasParams, GasPlanner, Pricing, Setting};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Bytes, Eip1559TransactionRequest, Signature, TransactionRequest, H256, U256,
};
use ethers::utils::rlp::Rlp;
use tracing::{debug, info, warn};

/// Wire format of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxVariant {
    /// Single gas price, EIP-155 replay protection
    Legacy,
    /// EIP-1559 type-2, tip plus fee cap
    Dynamic,
}

impl TxVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxVariant::Legacy => "legacy",
            TxVariant::Dynamic => "dynamic",
        }
    }
}

/// What to send; gas pricing is supplied separately
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxRequest {
    /// Destination address; empty means contract creation
    pub to: String,
    /// Value in wei
    pub value: U256,
    /// Calldata or init code
    pub data: Bytes,
    pub gas_limit: Setting<u64>,
    /// Nonce override; otherwise sequencer or pending nonce
    pub nonce: Option<u64>,
}

impl TxRequest {
    /// Plain value transfer
    pub fn transfer(to: impl Into<String>, value: U256) -> Self {
        Self {
            to: to.into(),
            value,
            ..Default::default()
        }
    }

    /// Contract call with calldata
    pub fn call(to: impl Into<String>, data: Bytes) -> Self {
        Self {
            to: to.into(),
            data,
            ..Default::default()
        }
    }

    /// Contract creation from init code
    pub fn deploy(bytecode: Bytes) -> Self {
        Self {
            data: bytecode,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Setting::Explicit(gas_limit);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// True when no destination is given
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_empty()
    }
}

/// Fee inputs for `TxBuilder::build`; every field defaults to auto
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSettings {
    /// Legacy gas price
    pub gas_price: Setting<U256>,
    /// EIP-1559 priority fee
    pub tip: Setting<U256>,
    /// EIP-1559 fee cap
    pub fee_cap: Setting<U256>,
}

/// Immutable signed transaction
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTx {
    tx: TypedTransaction,
    signature: Signature,
    raw: Bytes,
    hash: H256,
}

impl SignedTx {
    /// Pair a transaction with its signature and compute the wire form
    pub fn new(tx: TypedTransaction, signature: Signature) -> Self {
        let raw = tx.rlp_signed(&signature);
        let hash = tx.hash(&signature);
        Self {
            tx,
            signature,
            raw,
            hash,
        }
    }

    /// Decode a raw signed transaction (legacy or typed envelope)
    pub fn decode(raw: &[u8]) -> EvmResult<Self> {
        let rlp = Rlp::new(raw);
        let (tx, signature) = TypedTransaction::decode_signed(&rlp)
            .map_err(|e| EvmError::invalid("raw transaction", e.to_string()))?;
        Ok(Self::new(tx, signature))
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// RLP bytes as submitted to the node
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn tx(&self) -> &TypedTransaction {
        &self.tx
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn variant(&self) -> TxVariant {
        match self.tx {
            TypedTransaction::Eip1559(_) => TxVariant::Dynamic,
            _ => TxVariant::Legacy,
        }
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce().map(|n| n.low_u64()).unwrap_or_default()
    }

    /// Destination, `None` for contract creation
    pub fn to(&self) -> Option<Address> {
        self.tx.to().and_then(|t| t.as_address().copied())
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to().is_none()
    }

    pub fn value(&self) -> U256 {
        self.tx.value().copied().unwrap_or_default()
    }

    pub fn data(&self) -> Bytes {
        self.tx.data().cloned().unwrap_or_default()
    }

    pub fn gas_limit(&self) -> u64 {
        self.tx.gas().map(|g| g.low_u64()).unwrap_or_default()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.tx.chain_id().map(|c| c.low_u64())
    }

    pub fn pricing(&self) -> Pricing {
        match &self.tx {
            TypedTransaction::Eip1559(inner) => Pricing::dynamic(
                inner.max_priority_fee_per_gas.unwrap_or_default(),
                inner.max_fee_per_gas.unwrap_or_default(),
            ),
            TypedTransaction::Legacy(inner) => {
                Pricing::legacy(inner.gas_price.unwrap_or_default())
            }
            TypedTransaction::Eip2930(inner) => {
                Pricing::legacy(inner.tx.gas_price.unwrap_or_default())
            }
        }
    }

    /// Recover the signer
    pub fn signer(&self) -> EvmResult<Address> {
        self.signature
            .recover(self.tx.sighash())
            .map_err(|e| EvmError::Signing(e.to_string()))
    }

    /// Request that rebuilds this transaction: same destination, value,
    /// data, gas limit and nonce
    pub fn to_request(&self) -> TxRequest {
        TxRequest {
            to: self.to().map(|a| checksum(&a)).unwrap_or_default(),
            value: self.value(),
            data: self.data(),
            gas_limit: Setting::Explicit(self.gas_limit()),
            nonce: Some(self.nonce()),
        }
    }
}

/// Assemble an unsigned transaction of the variant `params` selects
pub fn assemble(
    from: Address,
    chain_id: u64,
    nonce: u64,
    to: Option<Address>,
    value: U256,
    data: Bytes,
    params: &GasParams,
) -> TypedTransaction {
    match params.pricing {
        Pricing::Legacy { gas_price } => {
            let mut tx = TransactionRequest::new()
                .from(from)
                .nonce(nonce)
                .gas(params.gas_limit)
                .gas_price(gas_price)
                .value(value)
                .data(data)
                .chain_id(chain_id);
            if let Some(to) = to {
                tx = tx.to(to);
            }
            TypedTransaction::Legacy(tx)
        }
        Pricing::Dynamic {
            max_priority_fee_per_gas,
            max_fee_per_gas,
        } => {
            let mut tx = Eip1559TransactionRequest::new()
                .from(from)
                .nonce(nonce)
                .gas(params.gas_limit)
                .max_priority_fee_per_gas(max_priority_fee_per_gas)
                .max_fee_per_gas(max_fee_per_gas)
                .value(value)
                .data(data)
                .chain_id(chain_id);
            if let Some(to) = to {
                tx = tx.to(to);
            }
            TypedTransaction::Eip1559(tx)
        }
    }
}

/// Builds signed transactions for an account
#[derive(Debug, Clone, Copy, Default)]
pub struct TxBuilder {
    planner: GasPlanner,
}

impl TxBuilder {
    /// Create a new transaction builder
    pub fn new(planner: GasPlanner) -> Self {
        Self { planner }
    }

    pub fn planner(&self) -> &GasPlanner {
        &self.planner
    }

    /// Build and sign a legacy transaction
    pub async fn build_legacy(
        &self,
        account: &Account,
        req: &TxRequest,
        gas_price: Setting<U256>,
    ) -> EvmResult<SignedTx> {
        preflight_checks(account, req)?;
        let gas_price = self.planner.resolve_gas_price(account, gas_price).await?;
        self.build_with_pricing(account, req, Pricing::legacy(gas_price))
            .await
    }

    /// Build and sign an EIP-1559 transaction
    pub async fn build_dynamic(
        &self,
        account: &Account,
        req: &TxRequest,
        tip: Setting<U256>,
        fee_cap: Setting<U256>,
    ) -> EvmResult<SignedTx> {
        preflight_checks(account, req)?;
        let pricing = self
            .planner
            .resolve_dynamic_fees(account, tip, fee_cap)
            .await?;
        self.build_with_pricing(account, req, pricing).await
    }

    /// Build dynamic first, falling back to legacy when that fails.
    ///
    /// Input and chain id errors are returned directly; no variant can fix
    /// them. When both attempts fail the legacy error is returned.
    pub async fn build(
        &self,
        account: &Account,
        req: &TxRequest,
        fees: &FeeSettings,
    ) -> EvmResult<SignedTx> {
        debug!("Building {} variant", TxVariant::Dynamic.as_str());
        let dynamic_err = match self.build_dynamic(account, req, fees.tip, fees.fee_cap).await {
            Ok(signed) => return Ok(signed),
            Err(e) if matches!(e.kind(), ErrorKind::InputValidation | ErrorKind::ChainIdUnknown) => {
                return Err(e)
            }
            Err(e) => e,
        };

        warn!(
            "Dynamic fee build failed, falling back to {}: {}",
            TxVariant::Legacy.as_str(),
            dynamic_err
        );
        metrics::record_builder_fallback();

        self.build_legacy(account, req, fees.gas_price)
            .await
            .map_err(|legacy_err| {
                warn!("Legacy build failed after dynamic failure: {}", legacy_err);
                legacy_err
            })
    }

    /// Resolve gas limit and nonce, then sign with exactly `pricing`
    pub async fn build_with_pricing(
        &self,
        account: &Account,
        req: &TxRequest,
        pricing: Pricing,
    ) -> EvmResult<SignedTx> {
        let (to, chain_id) = preflight_checks(account, req)?;

        let call = CallRequest {
            from: Some(account.address()),
            to,
            value: req.value,
            data: req.data.clone(),
        };
        let gas_limit = self
            .planner
            .resolve_gas_limit(account, req.gas_limit, &call)
            .await?;
        let params = GasParams { gas_limit, pricing };

        let (nonce, reserved) = match req.nonce {
            Some(n) => (n, false),
            None => account.next_nonce().await?,
        };

        let tx = assemble(
            account.address(),
            chain_id,
            nonce,
            to,
            req.value,
            req.data.clone(),
            &params,
        );

        let signature = match account.sign_transaction(&tx) {
            Ok(sig) => sig,
            Err(e) => {
                if reserved {
                    account.release_nonce(nonce).await;
                }
                return Err(e);
            }
        };

        let signed = SignedTx::new(tx, signature);
        info!(
            "Signed {} tx {:?} nonce {} gas {} to {}",
            signed.variant().as_str(),
            signed.hash(),
            nonce,
            gas_limit,
            to.map(|a| checksum(&a))
                .unwrap_or_else(|| "<contract creation>".to_string())
        );
        Ok(signed)
    }
}

/// Validation that needs no network: destination format and chain id
fn preflight_checks(account: &Account, req: &TxRequest) -> EvmResult<(Option<Address>, u64)> {
    let to = parse_optional_address("to", &req.to)?;
    let chain_id = account.chain_id();
    if chain_id == 0 {
        return Err(EvmError::ChainIdUnknown);
    }
    Ok((to, chain_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{test_account, TEST_ADDRESS};
    use crate::chain::MockLedger;
    use crate::tx::NonceSequencer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const RECIPIENT: &str = "0xD32D26054099DbB5A14387d0cF15Df4452EFE4a9";

    fn gwei(n: u64) -> U256 {
        U256::from(n) * U256::exp10(9)
    }

    fn ledger_with_fees() -> MockLedger {
        let mut ledger = MockLedger::new();
        ledger.expect_pending_nonce().returning(|_| Ok(4));
        ledger.expect_estimate_gas().returning(|_| Ok(21_000));
        ledger.expect_gas_price().returning(|| Ok(gwei(10)));
        ledger.expect_max_priority_fee().returning(|| Ok(gwei(1)));
        ledger
    }

    #[tokio::test]
    async fn test_build_legacy_signs_with_chain_id() {
        let account = test_account(ledger_with_fees(), 56);

        let req = TxRequest::transfer(RECIPIENT, U256::from(1_000u64));
        let signed = TxBuilder::default()
            .build_legacy(&account, &req, Setting::Auto)
            .await
            .unwrap();

        assert_eq!(signed.variant(), TxVariant::Legacy);
        assert_eq!(signed.nonce(), 4);
        assert_eq!(signed.gas_limit(), 21_000);
        assert_eq!(signed.pricing(), Pricing::legacy(gwei(10)));
        assert_eq!(signed.chain_id(), Some(56));
        assert_eq!(signed.signer().unwrap(), TEST_ADDRESS.parse::<Address>().unwrap());

        let decoded = SignedTx::decode(signed.raw()).unwrap();
        assert_eq!(decoded.hash(), signed.hash());
        assert_eq!(decoded.chain_id(), Some(56));
        assert_eq!(decoded.to(), Some(RECIPIENT.parse().unwrap()));
    }

    #[tokio::test]
    async fn test_build_dynamic_fee_cap_covers_tip() {
        let account = test_account(ledger_with_fees(), 1);

        let req = TxRequest::transfer(RECIPIENT, U256::zero());
        let signed = TxBuilder::default()
            .build_dynamic(&account, &req, Setting::Explicit(gwei(50)), Setting::Explicit(gwei(5)))
            .await
            .unwrap();

        assert_eq!(signed.variant(), TxVariant::Dynamic);
        match signed.pricing() {
            Pricing::Dynamic {
                max_priority_fee_per_gas,
                max_fee_per_gas,
            } => assert!(max_fee_per_gas >= max_priority_fee_per_gas),
            other => panic!("unexpected pricing {:?}", other),
        }

        let decoded = SignedTx::decode(signed.raw()).unwrap();
        assert_eq!(decoded.variant(), TxVariant::Dynamic);
        assert_eq!(decoded.hash(), signed.hash());
    }

    #[tokio::test]
    async fn test_contract_creation_has_no_destination() {
        let account = test_account(ledger_with_fees(), 1);

        let req = TxRequest::deploy(Bytes::from(vec![0x60, 0x80, 0x60, 0x40]));
        let signed = TxBuilder::default()
            .build(&account, &req, &FeeSettings::default())
            .await
            .unwrap();

        let decoded = SignedTx::decode(signed.raw()).unwrap();
        assert!(decoded.is_contract_creation());
        assert_eq!(decoded.to(), None);
        assert_eq!(decoded.data(), Bytes::from(vec![0x60, 0x80, 0x60, 0x40]));
        assert!(decoded.to_request().to.is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_legacy() {
        let mut ledger = MockLedger::new();
        ledger.expect_pending_nonce().returning(|_| Ok(0));
        ledger.expect_estimate_gas().returning(|_| Ok(21_000));
        ledger.expect_gas_price().returning(|| Ok(gwei(3)));
        ledger.expect_max_priority_fee().returning(|| {
            Err(EvmError::Transport {
                operation: "eth_maxPriorityFeePerGas".to_string(),
                message: "method not found".to_string(),
            })
        });
        let account = test_account(ledger, 97);

        let signed = TxBuilder::default()
            .build(&account, &TxRequest::transfer(RECIPIENT, U256::one()), &FeeSettings::default())
            .await
            .unwrap();

        assert_eq!(signed.variant(), TxVariant::Legacy);
        assert_eq!(signed.pricing(), Pricing::legacy(gwei(3)));
    }

    #[tokio::test]
    async fn test_both_variants_failing_returns_legacy_error() {
        let estimates = Arc::new(AtomicUsize::new(0));
        let counter = estimates.clone();

        let mut ledger = MockLedger::new();
        ledger.expect_gas_price().returning(|| Ok(gwei(3)));
        ledger.expect_max_priority_fee().returning(|| Ok(gwei(1)));
        ledger.expect_pending_nonce().never();
        ledger.expect_estimate_gas().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EvmError::Transport {
                    operation: "eth_estimateGas".to_string(),
                    message: "rate limited".to_string(),
                })
            } else {
                Err(EvmError::SimulationReverted {
                    operation: "eth_estimateGas".to_string(),
                    message: "execution reverted: paused".to_string(),
                })
            }
        });
        let account = test_account(ledger, 1);

        let err = TxBuilder::default()
            .build(&account, &TxRequest::transfer(RECIPIENT, U256::one()), &FeeSettings::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SimulationRevert);
        assert!(err.to_string().contains("paused"));
        assert!(!err.to_string().contains("rate limited"));
        assert_eq!(estimates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_destination_skips_fallback_and_network() {
        // No expectations: any ledger call would panic
        let account = test_account(MockLedger::new(), 1);

        let err = TxBuilder::default()
            .build(&account, &TxRequest::transfer("0x1234", U256::one()), &FeeSettings::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(err.to_string().contains("to address"));
    }

    #[tokio::test]
    async fn test_unknown_chain_id_refuses_to_sign() {
        let account = test_account(MockLedger::new(), 0);

        let err = TxBuilder::default()
            .build_legacy(
                &account,
                &TxRequest::transfer(RECIPIENT, U256::one()),
                Setting::Explicit(gwei(1)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChainIdUnknown);
    }

    #[tokio::test]
    async fn test_explicit_zero_gas_price_is_kept() {
        let account = test_account(ledger_with_fees(), 1);

        let signed = TxBuilder::default()
            .build_legacy(
                &account,
                &TxRequest::transfer(RECIPIENT, U256::one()).with_gas_limit(30_000).with_nonce(9),
                Setting::Explicit(U256::zero()),
            )
            .await
            .unwrap();

        assert_eq!(signed.pricing(), Pricing::legacy(U256::zero()));
        assert_eq!(signed.gas_limit(), 30_000);
        assert_eq!(signed.nonce(), 9);
    }

    #[tokio::test]
    async fn test_sequencer_supplies_consecutive_nonces() {
        let account = test_account(ledger_with_fees(), 1)
            .with_nonce_sequencer(Arc::new(NonceSequencer::new()));
        let builder = TxBuilder::default();
        let req = TxRequest::transfer(RECIPIENT, U256::one());

        let first = builder.build_legacy(&account, &req, Setting::Auto).await.unwrap();
        let second = builder.build_legacy(&account, &req, Setting::Auto).await.unwrap();
        assert_eq!(first.nonce(), 4);
        assert_eq!(second.nonce(), 5);
    }
}
