//! The auction initiation workflow. Runs a strictly linear sequence of
//! dependent remote operations: fetch token decimals, normalize the request,
//! check balance and allowance, approve the auction contract if needed,
//! submit the auction creation transaction and extract the new auction's id
//! from the confirmed receipt. Each stage waits for its remote operation to
//! complete before the next one starts and any failure aborts the run with a
//! specific error kind.

use crate::{
    amounts::AmountError,
    contracts::{easy_auction::AuctionInteracting, erc20::Erc20Interacting},
    models::{AuctionId, AuctionRequest},
};
use anyhow::Error;
use ethcontract::{
    common::abi::{Event as AbiEvent, EventParam, ParamType},
    errors::{ExecutionError, MethodError},
    web3::types::TransactionReceipt,
    Address, U256,
};
use lazy_static::lazy_static;
use std::sync::Arc;
use thiserror::Error;

lazy_static! {
    /// ABI definition of the event the auction contract emits once per
    /// created auction.
    static ref NEW_AUCTION_EVENT: AbiEvent = AbiEvent {
        name: "NewAuction".into(),
        inputs: vec![
            EventParam {
                name: "auctionId".into(),
                kind: ParamType::Uint(256),
                indexed: true,
            },
            EventParam {
                name: "_auctioningToken".into(),
                kind: ParamType::Address,
                indexed: true,
            },
            EventParam {
                name: "_biddingToken".into(),
                kind: ParamType::Address,
                indexed: true,
            },
        ],
        anonymous: false,
    };
}

/// The reasons an initiation run can abort. Exactly one of these, or the
/// created auction's id, is reported to the operator; partial progress is
/// never reported as success.
#[derive(Debug, Error)]
pub enum InitiationError {
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
    #[error("sell token balance {balance} does not cover the sell amount of {required} atoms")]
    InsufficientBalance { balance: U256, required: U256 },
    #[error("token approval failed: {0}")]
    ApprovalRejected(Error),
    #[error("auction contract rejected the creation call: {0}")]
    SubmissionReverted(Error),
    #[error("transport or confirmation failure: {0}")]
    NetworkUnavailable(Error),
    #[error("transaction receipt contains no NewAuction event")]
    AuctionIdNotFound,
    #[error("transaction receipt contains {0} NewAuction events, expected exactly one")]
    AmbiguousResult(usize),
}

/// True if the error is the contract rejecting the call, as opposed to the
/// transaction never reliably making it into a block.
fn is_contract_rejection(err: &Error) -> bool {
    match err.downcast_ref::<MethodError>() {
        Some(method_error) => matches!(
            method_error.inner,
            ExecutionError::Revert(_) | ExecutionError::InvalidOpcode | ExecutionError::Failure(_)
        ),
        None => false,
    }
}

pub struct AuctionInitiator {
    auction: Arc<dyn AuctionInteracting>,
    owner: Address,
}

impl AuctionInitiator {
    pub fn new(auction: Arc<dyn AuctionInteracting>, owner: Address) -> Self {
        Self { auction, owner }
    }

    /// Runs the full initiation workflow for one request and returns the id
    /// of the created auction.
    ///
    /// Must not be called twice for the same logical request: a second call
    /// creates a second, distinct auction.
    pub async fn initiate(
        &self,
        auctioning_token: &dyn Erc20Interacting,
        bidding_token: &dyn Erc20Interacting,
        request: &AuctionRequest,
    ) -> Result<AuctionId, InitiationError> {
        let auctioning_decimals = auctioning_token
            .decimals()
            .await
            .map_err(InitiationError::NetworkUnavailable)?;
        let bidding_decimals = bidding_token
            .decimals()
            .await
            .map_err(InitiationError::NetworkUnavailable)?;
        let normalized = request.normalize(auctioning_decimals, bidding_decimals)?;
        log::debug!("normalized auction request: {:?}", normalized);

        self.ensure_allowance(auctioning_token, normalized.sell_amount_atoms)
            .await?;

        log::info!("initiating auction");
        let receipt = self
            .auction
            .initiate_auction(normalized)
            .await
            .map_err(|err| {
                if is_contract_rejection(&err) {
                    InitiationError::SubmissionReverted(err)
                } else {
                    InitiationError::NetworkUnavailable(err)
                }
            })?;

        extract_auction_id(&receipt)
    }

    /// Makes sure the auction contract is authorized to move `required` atoms
    /// of the sell token, submitting an approval only when the current
    /// allowance does not already suffice. Re-invoking with a sufficient
    /// allowance is a no-op, so the gate is idempotent under retry.
    async fn ensure_allowance(
        &self,
        token: &dyn Erc20Interacting,
        required: U256,
    ) -> Result<(), InitiationError> {
        // A balance that cannot fund the sell amount dooms the auction
        // creation, so bail out before burning gas on an approval.
        let balance = token
            .balance_of(self.owner)
            .await
            .map_err(InitiationError::NetworkUnavailable)?;
        if balance < required {
            return Err(InitiationError::InsufficientBalance { balance, required });
        }

        let spender = self.auction.address();
        let allowance = token
            .allowance(self.owner, spender)
            .await
            .map_err(InitiationError::NetworkUnavailable)?;
        if allowance >= required {
            log::debug!(
                "existing allowance of {} atoms covers the sell amount",
                allowance
            );
            return Ok(());
        }

        log::info!("approving auction contract for {} atoms", required);
        token
            .approve(spender, required)
            .await
            .map_err(InitiationError::ApprovalRejected)?;
        log::info!("approval confirmed");

        Ok(())
    }
}

/// Scans a confirmed receipt's event records for the `NewAuction` event and
/// extracts the assigned auction id. A receipt without the event means the
/// client is talking to an incompatible contract; a receipt with several
/// means one transaction created several auctions, which is never silently
/// resolved by picking one.
pub fn extract_auction_id(receipt: &TransactionReceipt) -> Result<AuctionId, InitiationError> {
    let signature = NEW_AUCTION_EVENT.signature();
    let mut auction_ids = Vec::new();
    for log in &receipt.logs {
        if log.topics.first() != Some(&signature) {
            continue;
        }
        let raw_log = (log.topics.clone(), log.data.0.clone()).into();
        let decoded = match NEW_AUCTION_EVENT.parse_log(raw_log) {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("failed to decode NewAuction log: {}", err);
                return Err(InitiationError::AuctionIdNotFound);
            }
        };
        let auction_id = decoded
            .params
            .into_iter()
            .find(|param| param.name == "auctionId")
            .and_then(|param| param.value.into_uint())
            .ok_or(InitiationError::AuctionIdNotFound)?;
        auction_ids.push(auction_id);
    }

    match auction_ids.as_slice() {
        [] => Err(InitiationError::AuctionIdNotFound),
        [auction_id] => Ok(AuctionId(*auction_id)),
        _ => Err(InitiationError::AmbiguousResult(auction_ids.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{
        easy_auction::MockAuctionInteracting, erc20::MockErc20Interacting,
    };
    use anyhow::anyhow;
    use ethcontract::{
        web3::types::{Bytes, Log, H2048},
        H256,
    };
    use futures::FutureExt as _;
    use mockall::predicate::eq;
    use std::time::Duration;

    fn owner() -> Address {
        Address::from_low_u64_be(1)
    }

    fn auction_address() -> Address {
        Address::from_low_u64_be(2)
    }

    fn request() -> AuctionRequest {
        AuctionRequest {
            auctioning_token: Address::from_low_u64_be(3),
            bidding_token: Address::from_low_u64_be(4),
            sell_amount: "0.1".to_owned(),
            min_buy_amount: "50".to_owned(),
            min_buy_amount_per_order: "0.01".to_owned(),
            duration: Duration::from_secs(3600),
        }
    }

    fn receipt_with_logs(logs: Vec<Log>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: H256::zero(),
            transaction_index: 0.into(),
            block_hash: None,
            block_number: None,
            cumulative_gas_used: U256::zero(),
            gas_used: None,
            contract_address: None,
            logs,
            status: Some(1.into()),
            root: None,
            logs_bloom: H2048::zero(),
        }
    }

    fn address_topic(address: Address) -> H256 {
        let mut topic = H256::zero();
        topic.as_bytes_mut()[12..].copy_from_slice(address.as_bytes());
        topic
    }

    fn log_with_topics(topics: Vec<H256>) -> Log {
        Log {
            address: auction_address(),
            topics,
            data: Bytes(Vec::new()),
            block_hash: None,
            block_number: None,
            transaction_hash: None,
            transaction_index: None,
            log_index: None,
            transaction_log_index: None,
            log_type: None,
            removed: None,
        }
    }

    fn new_auction_log(auction_id: u64) -> Log {
        log_with_topics(vec![
            NEW_AUCTION_EVENT.signature(),
            H256::from_low_u64_be(auction_id),
            address_topic(Address::from_low_u64_be(3)),
            address_topic(Address::from_low_u64_be(4)),
        ])
    }

    fn unrelated_log() -> Log {
        log_with_topics(vec![H256::from_low_u64_be(1337)])
    }

    fn erc20_with_decimals(decimals: u8) -> MockErc20Interacting {
        let mut token = MockErc20Interacting::new();
        token.expect_decimals().returning(move || Ok(decimals));
        token
    }

    #[test]
    fn extracts_auction_id_from_new_auction_event() {
        let receipt = receipt_with_logs(vec![unrelated_log(), new_auction_log(42)]);
        let auction_id = extract_auction_id(&receipt).unwrap();
        assert_eq!(auction_id, AuctionId(42.into()));
    }

    #[test]
    fn fails_when_receipt_has_no_new_auction_event() {
        let receipt = receipt_with_logs(vec![unrelated_log()]);
        match extract_auction_id(&receipt).unwrap_err() {
            InitiationError::AuctionIdNotFound => (),
            err => panic!("expected AuctionIdNotFound, got {:?}", err),
        }
    }

    #[test]
    fn fails_when_receipt_has_multiple_new_auction_events() {
        let receipt = receipt_with_logs(vec![new_auction_log(1), new_auction_log(2)]);
        match extract_auction_id(&receipt).unwrap_err() {
            InitiationError::AmbiguousResult(2) => (),
            err => panic!("expected AmbiguousResult(2), got {:?}", err),
        }
    }

    #[test]
    fn skips_approval_when_allowance_suffices() {
        let mut sell_token = erc20_with_decimals(18);
        sell_token
            .expect_balance_of()
            .with(eq(owner()))
            .returning(|_| Ok(U256::exp10(18)));
        sell_token
            .expect_allowance()
            .with(eq(owner()), eq(auction_address()))
            .returning(|_, _| Ok(U256::exp10(17)));
        let buy_token = erc20_with_decimals(18);

        let mut auction = MockAuctionInteracting::new();
        auction.expect_address().return_const(auction_address());
        auction
            .expect_initiate_auction()
            .times(1)
            .returning(|_| Ok(receipt_with_logs(vec![new_auction_log(7)])));

        let initiator = AuctionInitiator::new(Arc::new(auction), owner());
        let result = initiator
            .initiate(&sell_token, &buy_token, &request())
            .now_or_never()
            .unwrap();

        assert_eq!(result.unwrap(), AuctionId(7.into()));
    }

    #[test]
    fn approves_exactly_once_when_allowance_is_insufficient() {
        let mut sell_token = erc20_with_decimals(18);
        sell_token
            .expect_balance_of()
            .with(eq(owner()))
            .returning(|_| Ok(U256::exp10(18)));
        sell_token
            .expect_allowance()
            .with(eq(owner()), eq(auction_address()))
            .returning(|_, _| Ok(U256::zero()));
        sell_token
            .expect_approve()
            .with(eq(auction_address()), eq(U256::exp10(17)))
            .times(1)
            .returning(|_, _| Ok(receipt_with_logs(Vec::new())));
        let buy_token = erc20_with_decimals(18);

        let mut auction = MockAuctionInteracting::new();
        auction.expect_address().return_const(auction_address());
        auction
            .expect_initiate_auction()
            .withf(|request| {
                request.sell_amount_atoms == U256::exp10(17)
                    && request.min_buy_amount_atoms == U256::exp10(18) * 50
                    && request.min_bid_atoms == U256::exp10(16)
                    && request.duration == Duration::from_secs(3600)
            })
            .times(1)
            .returning(|_| Ok(receipt_with_logs(vec![new_auction_log(7)])));

        let initiator = AuctionInitiator::new(Arc::new(auction), owner());
        let result = initiator
            .initiate(&sell_token, &buy_token, &request())
            .now_or_never()
            .unwrap();

        assert_eq!(result.unwrap(), AuctionId(7.into()));
    }

    #[test]
    fn fails_with_insufficient_balance_before_any_transaction() {
        let mut sell_token = erc20_with_decimals(18);
        sell_token
            .expect_balance_of()
            .with(eq(owner()))
            .returning(|_| Ok(U256::exp10(16)));
        let buy_token = erc20_with_decimals(18);

        // No expectations besides the address: any approval or auction
        // creation call would panic the mock.
        let mut auction = MockAuctionInteracting::new();
        auction.expect_address().return_const(auction_address());

        let initiator = AuctionInitiator::new(Arc::new(auction), owner());
        let result = initiator
            .initiate(&sell_token, &buy_token, &request())
            .now_or_never()
            .unwrap();

        match result.unwrap_err() {
            InitiationError::InsufficientBalance { balance, required } => {
                assert_eq!(balance, U256::exp10(16));
                assert_eq!(required, U256::exp10(17));
            }
            err => panic!("expected InsufficientBalance, got {:?}", err),
        }
    }

    #[test]
    fn fails_with_invalid_amount_before_any_transaction() {
        let sell_token = erc20_with_decimals(2);
        let buy_token = erc20_with_decimals(18);
        let auction = MockAuctionInteracting::new();

        let initiator = AuctionInitiator::new(Arc::new(auction), owner());
        let mut request = request();
        request.sell_amount = "0.123".to_owned();
        let result = initiator
            .initiate(&sell_token, &buy_token, &request)
            .now_or_never()
            .unwrap();

        match result.unwrap_err() {
            InitiationError::InvalidAmount(_) => (),
            err => panic!("expected InvalidAmount, got {:?}", err),
        }
    }

    #[test]
    fn maps_creation_reverts_to_submission_reverted() {
        let mut sell_token = erc20_with_decimals(18);
        sell_token
            .expect_balance_of()
            .returning(|_| Ok(U256::exp10(18)));
        sell_token
            .expect_allowance()
            .returning(|_, _| Ok(U256::exp10(17)));
        let buy_token = erc20_with_decimals(18);

        let mut auction = MockAuctionInteracting::new();
        auction.expect_address().return_const(auction_address());
        auction.expect_initiate_auction().return_once(|_| {
            Err(anyhow!(MethodError::from_parts(
                "initiateAuction(address,address,uint256,uint256,uint256,uint256)".to_owned(),
                ExecutionError::Revert(Some("invalid auction duration".to_owned())),
            )))
        });

        let initiator = AuctionInitiator::new(Arc::new(auction), owner());
        let result = initiator
            .initiate(&sell_token, &buy_token, &request())
            .now_or_never()
            .unwrap();

        match result.unwrap_err() {
            InitiationError::SubmissionReverted(_) => (),
            err => panic!("expected SubmissionReverted, got {:?}", err),
        }
    }

    #[test]
    fn maps_transport_failures_to_network_unavailable() {
        let mut sell_token = erc20_with_decimals(18);
        sell_token
            .expect_balance_of()
            .returning(|_| Ok(U256::exp10(18)));
        sell_token
            .expect_allowance()
            .returning(|_, _| Ok(U256::exp10(17)));
        let buy_token = erc20_with_decimals(18);

        let mut auction = MockAuctionInteracting::new();
        auction.expect_address().return_const(auction_address());
        auction
            .expect_initiate_auction()
            .return_once(|_| Err(anyhow!("connection reset by peer")));

        let initiator = AuctionInitiator::new(Arc::new(auction), owner());
        let result = initiator
            .initiate(&sell_token, &buy_token, &request())
            .now_or_never()
            .unwrap();

        match result.unwrap_err() {
            InitiationError::NetworkUnavailable(_) => (),
            err => panic!("expected NetworkUnavailable, got {:?}", err),
        }
    }

    #[test]
    fn maps_approval_failures_to_approval_rejected() {
        let mut sell_token = erc20_with_decimals(18);
        sell_token
            .expect_balance_of()
            .returning(|_| Ok(U256::exp10(18)));
        sell_token
            .expect_allowance()
            .returning(|_, _| Ok(U256::zero()));
        sell_token.expect_approve().return_once(|_, _| {
            Err(anyhow!(MethodError::from_parts(
                "approve(address,uint256)".to_owned(),
                ExecutionError::Revert(None),
            )))
        });
        let buy_token = erc20_with_decimals(18);

        let mut auction = MockAuctionInteracting::new();
        auction.expect_address().return_const(auction_address());

        let initiator = AuctionInitiator::new(Arc::new(auction), owner());
        let result = initiator
            .initiate(&sell_token, &buy_token, &request())
            .now_or_never()
            .unwrap();

        match result.unwrap_err() {
            InitiationError::ApprovalRejected(_) => (),
            err => panic!("expected ApprovalRejected, got {:?}", err),
        }
    }
}
