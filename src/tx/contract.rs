//! Contract method calls: encode, build with fallback, send and confirm

use crate::abi;
use crate::account::Account;
use crate::address::{parse_address, parse_optional_address};
use crate::chain::CallRequest;
use crate::error::EvmResult;
use crate::tx::{FeeSettings, SignedTx, TxRequest};

use ethers::abi::Token;
use ethers::types::{Bytes, U256};
use tracing::debug;

/// Outcome of simulating a transaction without sending it
#[derive(Debug, Clone, PartialEq)]
pub struct Preflight {
    /// Gas the node expects the transaction to use
    pub gas_estimate: u64,
    /// Return data of the simulated call
    pub return_data: Bytes,
}

/// ABI-encode `method(args)`, build dynamic-first with legacy fallback,
/// submit and wait for a successful receipt.
///
/// Every token write goes through here.
pub async fn send_contract_method(
    account: &Account,
    contract: &str,
    abi_json: &str,
    method: &str,
    value: U256,
    args: &[Token],
) -> EvmResult<SignedTx> {
    let contract_address = parse_address("contract", contract)?;
    let data = abi::pack(abi_json, method, args)?;
    debug!("Calling {} on {:?} ({} bytes)", method, contract_address, data.len());

    let req = TxRequest::call(contract, data).with_value(value);
    let signed = account
        .sender()
        .builder()
        .build(account, &req, &FeeSettings::default())
        .await
        .map_err(|e| e.context(format!("build {} on {}", method, contract)))?;

    account
        .send_tx(&signed)
        .await
        .map_err(|e| e.context(format!("send {} on {}", method, contract)))?;

    Ok(signed)
}

/// Read-only call of `method(args)`, decoded against the ABI
pub async fn call_contract_method(
    account: &Account,
    contract: &str,
    abi_json: &str,
    method: &str,
    args: &[Token],
) -> EvmResult<Vec<Token>> {
    let coder = abi::AbiCoder::parse(abi_json)?;
    let data = coder.pack(method, args)?;
    let output = account
        .only_read_call(contract, data)
        .await
        .map_err(|e| e.context(format!("call {} on {}", method, contract)))?;
    coder.unpack(method, &output)
}

/// Estimate gas and simulate the call; either failure is returned
pub async fn preflight_tx(
    account: &Account,
    from: &str,
    to: &str,
    value: U256,
    data: Bytes,
) -> EvmResult<Preflight> {
    let call = CallRequest {
        from: Some(parse_address("from", from)?),
        to: parse_optional_address("to", to)?,
        value,
        data,
    };

    let gas_estimate = account
        .estimate_call(&call)
        .await
        .map_err(|e| e.context("preflight estimate"))?;
    let return_data = account
        .ledger()
        .call(&call)
        .await
        .map_err(|e| e.context("preflight call"))?;

    Ok(Preflight {
        gas_estimate,
        return_data,
    })
}

/// `preflight_tx` for `method(args)` sent from this account
pub async fn preflight_contract_method(
    account: &Account,
    contract: &str,
    abi_json: &str,
    method: &str,
    value: U256,
    args: &[Token],
) -> EvmResult<Preflight> {
    parse_address("contract", contract)?;
    let data = abi::pack(abi_json, method, args)?;
    preflight_tx(account, &account.address_hex(), contract, value, data)
        .await
        .map_err(|e| e.context(format!("preflight {} on {}", method, contract)))
}
