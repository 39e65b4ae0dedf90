use super::{method_defaults, Web3};
use crate::models::NormalizedAuctionRequest;
use anyhow::{anyhow, Result};
use contracts::EasyAuction;
use ethcontract::{
    transaction::{confirm::ConfirmParams, Account, ResolveCondition, TransactionResult},
    web3::types::TransactionReceipt,
    Address, U256,
};

/// Capability contract for the auction contract's creation call. The
/// implementation blocks until the transaction is mined and returns the
/// confirmed receipt with the emitted event records.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuctionInteracting: Send + Sync {
    /// The auction contract's address. This is the spender that must be
    /// authorized to move the auctioned tokens.
    fn address(&self) -> Address;

    async fn initiate_auction(
        &self,
        request: NormalizedAuctionRequest,
    ) -> Result<TransactionReceipt>;
}

pub struct EasyAuctionContract {
    instance: EasyAuction,
    block_timeout: usize,
}

impl EasyAuctionContract {
    /// Creates the auction contract binding, either at an explicit address or
    /// at the known deployment for the connected network.
    pub async fn new(
        web3: &Web3,
        account: Account,
        address: Option<Address>,
        block_timeout: usize,
    ) -> Result<Self> {
        let mut instance = match address {
            Some(address) => EasyAuction::at(web3, address),
            None => EasyAuction::deployed(web3).await?,
        };
        *instance.defaults_mut() = method_defaults(account);

        Ok(Self {
            instance,
            block_timeout,
        })
    }
}

#[async_trait::async_trait]
impl AuctionInteracting for EasyAuctionContract {
    fn address(&self) -> Address {
        self.instance.address()
    }

    async fn initiate_auction(
        &self,
        request: NormalizedAuctionRequest,
    ) -> Result<TransactionReceipt> {
        let mut method = self.instance.initiate_auction(
            request.auctioning_token,
            request.bidding_token,
            U256::from(request.duration.as_secs()),
            request.sell_amount_atoms,
            request.min_buy_amount_atoms,
            request.min_bid_atoms,
        );
        let mut params = ConfirmParams::mined();
        params.block_timeout = Some(self.block_timeout as _);
        method.tx.resolve = Some(ResolveCondition::Confirmed(params));

        match method.send().await? {
            TransactionResult::Receipt(receipt) => Ok(receipt),
            TransactionResult::Hash(hash) => Err(anyhow!(
                "auction creation transaction {:?} was not confirmed",
                hash
            )),
        }
    }
}
