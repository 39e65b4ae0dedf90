include!(concat!(env!("OUT_DIR"), "/EasyAuction.rs"));
include!(concat!(env!("OUT_DIR"), "/ERC20.rs"));
