use auction_client::contracts::{
    self,
    easy_auction::{AuctionInteracting as _, EasyAuctionContract},
    erc20::Erc20Token,
    web3_provider,
};
use auction_client::http::HttpFactory;
use auction_client::initiation::AuctionInitiator;
use auction_client::logging;
use auction_client::models::{AuctionId, AuctionRequest};
use auction_client::util::FutureWaitExt as _;

use anyhow::Result;
use ethcontract::{Address, PrivateKey};
use log::{error, info};
use std::num::ParseIntError;
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;
use url::Url;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "auction-client",
    about = "Initiates a batch auction on a deployed auction contract.",
    rename_all = "kebab"
)]
struct Options {
    /// The log filter to use.
    ///
    /// This follows the `slog-envlogger` syntax (e.g. 'info,auction_client=debug').
    #[structopt(
        long,
        env = "AUCTION_CLIENT_LOG",
        default_value = "warn,auction_client=info"
    )]
    log_filter: String,

    /// The Ethereum node URL to connect to.
    #[structopt(short, long, env = "ETHEREUM_NODE_URL")]
    node_url: Url,

    /// The private key of the account funding and owning the auction.
    #[structopt(short = "k", long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: PrivateKey,

    /// The address of the auction contract. Defaults to the known deployment
    /// for the connected network.
    #[structopt(long, env = "AUCTION_ADDRESS", parse(try_from_str = parse_address))]
    auction_address: Option<Address>,

    /// The address of the token being auctioned off.
    #[structopt(long, env = "AUCTIONED_TOKEN", parse(try_from_str = parse_address))]
    auctioned_token: Address,

    /// The address of the token bids are placed in.
    #[structopt(long, env = "BIDDER_TOKEN", parse(try_from_str = parse_address))]
    bidder_token: Address,

    /// The amount of auctioning tokens to sell, in decimal token units
    /// (e.g. '0.1' for a tenth of a token).
    #[structopt(long, env = "SELL_AMOUNT")]
    sell_amount: String,

    /// The minimum total amount of bidding tokens to receive, in decimal
    /// token units.
    #[structopt(long, env = "MIN_BUY_AMOUNT")]
    min_buy_amount: String,

    /// The smallest bid the auction accepts, in decimal units of the bidding
    /// token.
    #[structopt(long, env = "MIN_BUY_AMOUNT_PER_ORDER", default_value = "0.01")]
    min_buy_amount_per_order: String,

    /// How long the auction accepts bids, in seconds from the creation
    /// transaction being mined.
    #[structopt(
        long,
        env = "AUCTION_DURATION",
        default_value = "3600",
        parse(try_from_str = duration_secs),
    )]
    duration: Duration,

    /// The timeout in milliseconds of web3 JSON RPC calls, defaults to 10000ms
    #[structopt(
        long,
        env = "WEB3_RPC_TIMEOUT",
        default_value = "10000",
        parse(try_from_str = duration_millis),
    )]
    rpc_timeout: Duration,

    /// The number of blocks to wait for a submitted transaction to be mined
    /// before giving up on its confirmation.
    #[structopt(long, env = "CONFIRMATION_BLOCK_TIMEOUT", default_value = "25")]
    confirmation_block_timeout: usize,
}

fn main() {
    let options = Options::from_args();
    let (_, _guard) = logging::init(&options.log_filter);
    info!("Starting auction client with runtime options: {:#?}", options);

    match run(options).wait() {
        Ok(auction_id) => {
            info!("created auction {}", auction_id);
            // The id is the command's result; logs go to stderr and may be
            // filtered, so scripts read it from stdout.
            println!("{}", auction_id);
        }
        Err(err) => {
            error!("auction initiation failed: {:?}", err);
            std::process::exit(1);
        }
    }
}

async fn run(options: Options) -> Result<AuctionId> {
    let http_factory = HttpFactory::new(options.rpc_timeout);
    let web3 = web3_provider(&http_factory, options.node_url.as_str(), options.rpc_timeout)?;
    let chain_id = web3.eth().chain_id().await?.as_u64();
    let account = contracts::account(options.private_key.clone(), chain_id);
    let owner = account.address();
    info!("Using account {:?} on chain {}", owner, chain_id);

    let auction = Arc::new(
        EasyAuctionContract::new(
            &web3,
            account.clone(),
            options.auction_address,
            options.confirmation_block_timeout,
        )
        .await?,
    );
    info!("Using auction contract at {:?}", auction.address());

    let auctioned_token = Erc20Token::at(
        &web3,
        options.auctioned_token,
        account.clone(),
        options.confirmation_block_timeout,
    );
    let bidder_token = Erc20Token::at(
        &web3,
        options.bidder_token,
        account,
        options.confirmation_block_timeout,
    );

    let request = AuctionRequest {
        auctioning_token: options.auctioned_token,
        bidding_token: options.bidder_token,
        sell_amount: options.sell_amount,
        min_buy_amount: options.min_buy_amount,
        min_buy_amount_per_order: options.min_buy_amount_per_order,
        duration: options.duration,
    };

    let initiator = AuctionInitiator::new(auction, owner);
    let auction_id = initiator
        .initiate(&auctioned_token, &bidder_token, &request)
        .await?;

    Ok(auction_id)
}

fn parse_address(s: &str) -> Result<Address> {
    let address = s.trim_start_matches("0x").parse()?;
    Ok(address)
}

fn duration_millis(s: &str) -> Result<Duration, ParseIntError> {
    Ok(Duration::from_millis(s.parse()?))
}

fn duration_secs(s: &str) -> Result<Duration, ParseIntError> {
    Ok(Duration::from_secs(s.parse()?))
}
