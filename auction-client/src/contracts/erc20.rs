use super::{method_defaults, Web3};
use anyhow::{anyhow, Error, Result};
use contracts::ERC20;
use ethcontract::{
    transaction::{confirm::ConfirmParams, Account, ResolveCondition, TransactionResult},
    web3::types::TransactionReceipt,
    Address, U256,
};

/// Capability contract for interacting with an ERC20 token: the reads the
/// workflow needs plus the approval transaction. Implementations block until
/// submitted transactions are confirmed.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Erc20Interacting: Send + Sync {
    /// The token's contract address.
    fn address(&self) -> Address;

    /// The token's declared decimal precision.
    async fn decimals(&self) -> Result<u8>;

    async fn balance_of(&self, owner: Address) -> Result<U256>;

    /// The amount `spender` is currently authorized to move on behalf of
    /// `owner`. Always read fresh, never cached.
    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256>;

    /// Authorizes `spender` to move `amount` of this token and waits until
    /// the transaction is mined.
    async fn approve(&self, spender: Address, amount: U256) -> Result<TransactionReceipt>;
}

pub struct Erc20Token {
    instance: ERC20,
    block_timeout: usize,
}

impl Erc20Token {
    /// Creates a token binding at the given address, sending transactions
    /// from the given account.
    pub fn at(web3: &Web3, address: Address, account: Account, block_timeout: usize) -> Self {
        let mut instance = ERC20::at(web3, address);
        *instance.defaults_mut() = method_defaults(account);
        Self {
            instance,
            block_timeout,
        }
    }

    fn confirm_params(&self) -> ConfirmParams {
        let mut params = ConfirmParams::mined();
        params.block_timeout = Some(self.block_timeout as _);
        params
    }
}

#[async_trait::async_trait]
impl Erc20Interacting for Erc20Token {
    fn address(&self) -> Address {
        self.instance.address()
    }

    async fn decimals(&self) -> Result<u8> {
        self.instance.decimals().call().await.map_err(Error::from)
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.instance
            .balance_of(owner)
            .call()
            .await
            .map_err(Error::from)
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.instance
            .allowance(owner, spender)
            .call()
            .await
            .map_err(Error::from)
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<TransactionReceipt> {
        let mut method = self.instance.approve(spender, amount);
        method.tx.resolve = Some(ResolveCondition::Confirmed(self.confirm_params()));
        match method.send().await? {
            TransactionResult::Receipt(receipt) => Ok(receipt),
            TransactionResult::Hash(hash) => {
                Err(anyhow!("approval transaction {:?} was not confirmed", hash))
            }
        }
    }
}
