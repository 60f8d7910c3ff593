//! Calldata packing and return-data unpacking against a JSON ABI
//!
//! Encoding itself is delegated to `ethers::abi`; this module only handles
//! method lookup, overload selection and typed extraction of results.

use crate::error::{EvmError, EvmResult};

use ethers::abi::{Abi, Function, ParamType, Token};
use ethers::types::{Address, Bytes, U256};

/// Parsed ABI document
#[derive(Debug, Clone)]
pub struct AbiCoder {
    abi: Abi,
}

impl AbiCoder {
    /// Parse a Solidity JSON ABI
    pub fn parse(abi_json: &str) -> EvmResult<Self> {
        let abi: Abi = serde_json::from_str(abi_json)
            .map_err(|e| EvmError::Abi(format!("invalid ABI JSON: {}", e)))?;
        Ok(Self { abi })
    }

    /// Encode a call: 4-byte selector followed by the packed arguments
    pub fn pack(&self, method: &str, args: &[Token]) -> EvmResult<Bytes> {
        let function = self.select(method, args)?;
        function
            .encode_input(args)
            .map(Bytes::from)
            .map_err(|e| EvmError::Abi(format!("failed to encode {}: {}", method, e)))
    }

    /// Decode return data of `method`
    pub fn unpack(&self, method: &str, data: &[u8]) -> EvmResult<Vec<Token>> {
        let function = self.first(method)?;
        function
            .decode_output(data)
            .map_err(|e| EvmError::Abi(format!("failed to decode {} output: {}", method, e)))
    }

    /// Human-readable signature of the overload matching `args`
    pub fn signature(&self, method: &str, args: &[Token]) -> EvmResult<String> {
        Ok(self.select(method, args)?.signature())
    }

    fn first(&self, method: &str) -> EvmResult<&Function> {
        self.abi
            .functions_by_name(method)
            .ok()
            .and_then(|fs| fs.first())
            .ok_or_else(|| EvmError::Abi(format!("method {} not found in ABI", method)))
    }

    /// Pick the overload whose parameter list accepts `args`
    fn select(&self, method: &str, args: &[Token]) -> EvmResult<&Function> {
        let candidates = self
            .abi
            .functions_by_name(method)
            .map_err(|_| EvmError::Abi(format!("method {} not found in ABI", method)))?;

        candidates
            .iter()
            .find(|f| {
                let types: Vec<ParamType> = f.inputs.iter().map(|p| p.kind.clone()).collect();
                types.len() == args.len() && Token::types_check(args, &types)
            })
            .ok_or_else(|| {
                EvmError::Abi(format!(
                    "no overload of {} accepts {} argument(s) of the given types",
                    method,
                    args.len()
                ))
            })
    }
}

/// Parse `abi_json` and pack a call to `method`
pub fn pack(abi_json: &str, method: &str, args: &[Token]) -> EvmResult<Bytes> {
    AbiCoder::parse(abi_json)?.pack(method, args)
}

/// Parse `abi_json` and unpack the return data of `method`
pub fn unpack(abi_json: &str, method: &str, data: &[u8]) -> EvmResult<Vec<Token>> {
    AbiCoder::parse(abi_json)?.unpack(method, data)
}

fn first_token(method: &str, tokens: Vec<Token>) -> EvmResult<Token> {
    tokens
        .into_iter()
        .next()
        .ok_or_else(|| EvmError::Abi(format!("{} returned no values", method)))
}

fn unexpected(method: &str, expected: &str) -> EvmError {
    EvmError::Abi(format!("{} did not return {}", method, expected))
}

/// First return value as a string
pub fn output_string(method: &str, tokens: Vec<Token>) -> EvmResult<String> {
    first_token(method, tokens)?
        .into_string()
        .ok_or_else(|| unexpected(method, "a string"))
}

/// First return value as an unsigned integer
pub fn output_uint(method: &str, tokens: Vec<Token>) -> EvmResult<U256> {
    first_token(method, tokens)?
        .into_uint()
        .ok_or_else(|| unexpected(method, "a uint"))
}

/// First return value as an address
pub fn output_address(method: &str, tokens: Vec<Token>) -> EvmResult<Address> {
    first_token(method, tokens)?
        .into_address()
        .ok_or_else(|| unexpected(method, "an address"))
}

/// First return value as a bool
pub fn output_bool(method: &str, tokens: Vec<Token>) -> EvmResult<bool> {
    first_token(method, tokens)?
        .into_bool()
        .ok_or_else(|| unexpected(method, "a bool"))
}

/// First return value as a uint array
pub fn output_uint_array(method: &str, tokens: Vec<Token>) -> EvmResult<Vec<U256>> {
    let items = first_token(method, tokens)?
        .into_array()
        .ok_or_else(|| unexpected(method, "an array"))?;
    items
        .into_iter()
        .map(|t| t.into_uint().ok_or_else(|| unexpected(method, "a uint array")))
        .collect()
}
