use crate::amounts::{self, AmountError};
use ethcontract::{Address, U256};
use std::fmt;
use std::time::Duration;

/// Operator supplied auction parameters with amounts in decimal token units.
#[derive(Clone, Debug)]
pub struct AuctionRequest {
    pub auctioning_token: Address,
    pub bidding_token: Address,
    pub sell_amount: String,
    pub min_buy_amount: String,
    pub min_buy_amount_per_order: String,
    pub duration: Duration,
}

impl AuctionRequest {
    /// Converts the decimal amounts into atoms using each token's declared
    /// precision. The sell amount is denominated in the auctioned token, both
    /// buy amounts in the bidding token.
    pub fn normalize(
        &self,
        auctioning_decimals: u8,
        bidding_decimals: u8,
    ) -> Result<NormalizedAuctionRequest, AmountError> {
        Ok(NormalizedAuctionRequest {
            auctioning_token: self.auctioning_token,
            bidding_token: self.bidding_token,
            sell_amount_atoms: amounts::parse_decimal_amount(
                &self.sell_amount,
                auctioning_decimals,
            )?,
            min_buy_amount_atoms: amounts::parse_decimal_amount(
                &self.min_buy_amount,
                bidding_decimals,
            )?,
            min_bid_atoms: amounts::parse_decimal_amount(
                &self.min_buy_amount_per_order,
                bidding_decimals,
            )?,
            duration: self.duration,
        })
    }
}

/// Auction parameters with all amounts converted to atoms. Never mutated
/// after construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NormalizedAuctionRequest {
    pub auctioning_token: Address,
    pub bidding_token: Address,
    pub sell_amount_atoms: U256,
    pub min_buy_amount_atoms: U256,
    pub min_bid_atoms: U256,
    pub duration: Duration,
}

/// The identifier the auction contract assigns to a newly created auction.
/// It only exists once the creation transaction is mined and is the handle
/// for all further interaction with that auction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AuctionId(pub U256);

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(sell: &str, min_buy: &str, min_bid: &str) -> AuctionRequest {
        AuctionRequest {
            auctioning_token: Address::from_low_u64_be(1),
            bidding_token: Address::from_low_u64_be(2),
            sell_amount: sell.to_owned(),
            min_buy_amount: min_buy.to_owned(),
            min_buy_amount_per_order: min_bid.to_owned(),
            duration: Duration::from_secs(3600),
        }
    }

    #[test]
    fn normalizes_amounts_with_per_token_decimals() {
        let normalized = request("0.1", "50", "0.01").normalize(18, 6).unwrap();
        assert_eq!(normalized.sell_amount_atoms, U256::exp10(17));
        assert_eq!(normalized.min_buy_amount_atoms, U256::exp10(6) * 50);
        assert_eq!(normalized.min_bid_atoms, U256::exp10(4));
        assert_eq!(normalized.duration, Duration::from_secs(3600));
    }

    #[test]
    fn auction_id_displays_as_bare_integer() {
        // This rendering is what the command prints on stdout, so it must
        // stay a plain decimal integer.
        assert_eq!(AuctionId(42.into()).to_string(), "42");
        assert_eq!(AuctionId(U256::exp10(20)).to_string(), "100000000000000000000");
    }

    #[test]
    fn normalization_rejects_unsupported_precision() {
        assert!(request("0.1", "50", "0.01").normalize(0, 18).is_err());
        assert!(request("1", "50", "0.01").normalize(18, 1).is_err());
    }
}
