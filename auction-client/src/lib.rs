// Mockall triggers this warning for every mocked trait. This is fixed in Mockall master but not
// released.
#![cfg_attr(test, allow(clippy::unused_unit))]

pub mod amounts;
pub mod contracts;
pub mod http;
pub mod initiation;
pub mod logging;
pub mod models;
pub mod transport;
pub mod util;
