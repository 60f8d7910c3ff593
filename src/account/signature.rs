//! Hash, message and EIP-712 typed-data signatures (r || s || v, v in {27, 28})

use super::Account;
use crate::error::{EvmError, EvmResult};

use ethers::types::transaction::eip712::{Eip712, TypedData};
use ethers::types::{Address, Signature, H256};
use ethers::utils::hash_message;

fn parse_hash(hash: &[u8]) -> EvmResult<H256> {
    if hash.len() != 32 {
        return Err(EvmError::invalid(
            "hash",
            format!("{} bytes, expected 32", hash.len()),
        ));
    }
    Ok(H256::from_slice(hash))
}

/// Decode a 65-byte hex signature; v of 0/1 is normalized to 27/28
pub fn parse_signature(signature: &str) -> EvmResult<Signature> {
    let stripped = signature.strip_prefix("0x").unwrap_or(signature);
    let mut bytes =
        hex::decode(stripped).map_err(|_| EvmError::invalid("signature", signature))?;
    if bytes.len() != 65 {
        return Err(EvmError::invalid(
            "signature",
            format!("{} bytes, expected 65", bytes.len()),
        ));
    }
    match bytes[64] {
        0 | 1 => bytes[64] += 27,
        27 | 28 => {}
        v => return Err(EvmError::invalid("signature v", v.to_string())),
    }
    Signature::try_from(bytes.as_slice()).map_err(|e| EvmError::invalid("signature", e.to_string()))
}

/// Address that produced `signature` over `hash`
pub fn recover_signer(hash: &[u8], signature: &str) -> EvmResult<Address> {
    let hash = parse_hash(hash)?;
    parse_signature(signature)?
        .recover(hash)
        .map_err(|e| EvmError::Signing(format!("recovery failed: {}", e)))
}

/// EIP-712 digest: keccak256(0x1901 || domain separator || struct hash)
pub fn typed_data_hash(typed: &TypedData) -> EvmResult<H256> {
    if typed.primary_type.is_empty() {
        return Err(EvmError::invalid("typed data primary type", "<empty>"));
    }
    if typed.message.is_empty() {
        return Err(EvmError::invalid("typed data message", "<empty>"));
    }
    if !typed.types.contains_key(&typed.primary_type) {
        return Err(EvmError::invalid(
            "typed data primary type",
            format!("{} has no type definition", typed.primary_type),
        ));
    }
    typed
        .encode_eip712()
        .map(H256::from)
        .map_err(|e| EvmError::invalid("typed data", e.to_string()))
}

/// Parse an `eth_signTypedData_v4` JSON document
pub fn parse_typed_data(json: &str) -> EvmResult<TypedData> {
    serde_json::from_str(json).map_err(|e| EvmError::invalid("typed data", e.to_string()))
}

fn encode(signature: &Signature) -> String {
    format!("0x{}", hex::encode(signature.to_vec()))
}

impl Account {
    /// Sign a raw 32-byte hash
    pub fn sign_hash(&self, hash: &[u8]) -> EvmResult<String> {
        let hash = parse_hash(hash)?;
        let signature = self
            .wallet
            .sign_hash(hash)
            .map_err(|e| EvmError::Signing(e.to_string()))?;
        Ok(encode(&signature))
    }

    /// `personal_sign`: hash with the Ethereum signed-message prefix, then sign
    pub fn sign_personal(&self, message: &[u8]) -> EvmResult<String> {
        if message.is_empty() {
            return Err(EvmError::invalid("message", "<empty>"));
        }
        self.sign_hash(hash_message(message).as_bytes())
    }

    pub fn sign_message(&self, message: &str) -> EvmResult<String> {
        self.sign_personal(message.as_bytes())
    }

    /// `personal_sign` over hex-decoded bytes
    pub fn sign_hex(&self, hex_data: &str) -> EvmResult<String> {
        let stripped = hex_data.strip_prefix("0x").unwrap_or(hex_data);
        let bytes = hex::decode(stripped).map_err(|_| EvmError::invalid("hex data", hex_data))?;
        self.sign_personal(&bytes)
    }

    /// True when `signature` over `hash` was produced by this account
    pub fn verify_signature(&self, hash: &[u8], signature: &str) -> EvmResult<bool> {
        Ok(recover_signer(hash, signature)? == self.address())
    }

    pub fn recover_address(&self, hash: &[u8], signature: &str) -> EvmResult<Address> {
        recover_signer(hash, signature)
    }

    /// Verify a `sign_message` signature against this account
    pub fn verify_message_signature(&self, message: &str, signature: &str) -> EvmResult<bool> {
        Ok(self.recover_address_from_message(message, signature)? == self.address())
    }

    pub fn recover_address_from_message(
        &self,
        message: &str,
        signature: &str,
    ) -> EvmResult<Address> {
        recover_signer(hash_message(message).as_bytes(), signature)
    }

    /// Sign the EIP-712 digest of `typed` directly, without a message prefix
    pub fn sign_typed_data(&self, typed: &TypedData) -> EvmResult<String> {
        self.sign_hash(typed_data_hash(typed)?.as_bytes())
    }

    /// `sign_typed_data` over an `eth_signTypedData_v4` JSON document
    pub fn sign_typed_data_json(&self, json: &str) -> EvmResult<String> {
        self.sign_typed_data(&parse_typed_data(json)?)
    }

    /// True when `signature` over the digest of `typed` came from this account
    pub fn verify_typed_data(&self, typed: &TypedData, signature: &str) -> EvmResult<bool> {
        self.verify_signature(typed_data_hash(typed)?.as_bytes(), signature)
    }
}
