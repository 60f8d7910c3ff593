use super::{address_arg, Bound};
use crate::abi::{output_address, output_bool, output_string, output_uint};
use crate::account::Account;
use crate::error::EvmResult;
use crate::tx::SignedTx;

use ethers::abi::Token;
use ethers::types::{Address, U256};

/// Non-fungible token interface, including both `safeTransferFrom` overloads
pub const ERC721_ABI: &str = r#"[
  {"type":"function","name":"name","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"string"}]},
  {"type":"function","name":"symbol","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"string"}]},
  {"type":"function","name":"totalSupply","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"ownerOf","stateMutability":"view","inputs":[{"name":"tokenId","type":"uint256"}],"outputs":[{"name":"","type":"address"}]},
  {"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"tokenURI","stateMutability":"view","inputs":[{"name":"tokenId","type":"uint256"}],"outputs":[{"name":"","type":"string"}]},
  {"type":"function","name":"getApproved","stateMutability":"view","inputs":[{"name":"tokenId","type":"uint256"}],"outputs":[{"name":"","type":"address"}]},
  {"type":"function","name":"isApprovedForAll","stateMutability":"view","inputs":[{"name":"owner","type":"address"},{"name":"operator","type":"address"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"transfer","stateMutability":"nonpayable","inputs":[{"name":"to","type":"address"},{"name":"tokenId","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"transferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"tokenId","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"approve","stateMutability":"nonpayable","inputs":[{"name":"approved","type":"address"},{"name":"tokenId","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"setApprovalForAll","stateMutability":"nonpayable","inputs":[{"name":"operator","type":"address"},{"name":"approved","type":"bool"}],"outputs":[]},
  {"type":"function","name":"safeTransferFrom","stateMutability":"nonpayable","inputs":[{"name":"to","type":"address"},{"name":"tokenId","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"safeTransferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"tokenId","type":"uint256"}],"outputs":[]}
]"#;

/// ERC721 collection bound to an account
#[derive(Debug, Clone, Copy)]
pub struct Erc721<'a> {
    inner: Bound<'a>,
}

impl<'a> Erc721<'a> {
    pub fn new(account: &'a Account, contract: &str) -> EvmResult<Self> {
        Ok(Self {
            inner: Bound::new(account, contract, ERC721_ABI)?,
        })
    }

    pub async fn name(&self) -> EvmResult<String> {
        output_string("name", self.inner.read("name", &[]).await?)
    }

    pub async fn symbol(&self) -> EvmResult<String> {
        output_string("symbol", self.inner.read("symbol", &[]).await?)
    }

    pub async fn total_supply(&self) -> EvmResult<U256> {
        output_uint("totalSupply", self.inner.read("totalSupply", &[]).await?)
    }

    pub async fn owner_of(&self, token_id: U256) -> EvmResult<Address> {
        output_address("ownerOf", self.inner.read("ownerOf", &[Token::Uint(token_id)]).await?)
    }

    /// Number of tokens held by `owner`
    pub async fn balance_of(&self, owner: &str) -> EvmResult<U256> {
        let args = [address_arg("owner", owner)?];
        output_uint("balanceOf", self.inner.read("balanceOf", &args).await?)
    }

    pub async fn token_uri(&self, token_id: U256) -> EvmResult<String> {
        output_string("tokenURI", self.inner.read("tokenURI", &[Token::Uint(token_id)]).await?)
    }

    /// Approved spender of `token_id`, zero when none
    pub async fn get_approved(&self, token_id: U256) -> EvmResult<Address> {
        output_address(
            "getApproved",
            self.inner.read("getApproved", &[Token::Uint(token_id)]).await?,
        )
    }

    pub async fn is_approved_for_all(&self, owner: &str, operator: &str) -> EvmResult<bool> {
        let args = [address_arg("owner", owner)?, address_arg("operator", operator)?];
        output_bool("isApprovedForAll", self.inner.read("isApprovedForAll", &args).await?)
    }

    pub async fn transfer(&self, to: &str, token_id: U256) -> EvmResult<SignedTx> {
        let args = [address_arg("recipient", to)?, Token::Uint(token_id)];
        self.inner.write("transfer", &args).await
    }

    pub async fn transfer_from(&self, from: &str, to: &str, token_id: U256) -> EvmResult<SignedTx> {
        let args = [
            address_arg("owner", from)?,
            address_arg("recipient", to)?,
            Token::Uint(token_id),
        ];
        self.inner.write("transferFrom", &args).await
    }

    pub async fn approve(&self, approved: &str, token_id: U256) -> EvmResult<SignedTx> {
        let args = [address_arg("approved", approved)?, Token::Uint(token_id)];
        self.inner.write("approve", &args).await
    }

    pub async fn set_approval_for_all(&self, operator: &str, approved: bool) -> EvmResult<SignedTx> {
        let args = [address_arg("operator", operator)?, Token::Bool(approved)];
        self.inner.write("setApprovalForAll", &args).await
    }

    /// Two-argument `safeTransferFrom(to, tokenId)`
    pub async fn safe_transfer_from(&self, to: &str, token_id: U256) -> EvmResult<SignedTx> {
        let args = [address_arg("recipient", to)?, Token::Uint(token_id)];
        self.inner.write("safeTransferFrom", &args).await
    }

    /// Three-argument `safeTransferFrom(from, to, tokenId)`
    pub async fn safe_transfer_from_owner(
        &self,
        from: &str,
        to: &str,
        token_id: U256,
    ) -> EvmResult<SignedTx> {
        let args = [
            address_arg("owner", from)?,
            address_arg("recipient", to)?,
            Token::Uint(token_id),
        ];
        self.inner.write("safeTransferFrom", &args).await
    }
}
