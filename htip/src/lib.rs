pub mod config;
pub mod driver;
pub mod error;
pub mod fdb;
pub mod frame;
pub mod htip;
pub mod inventory;
pub mod tlv;
pub mod transmit;

pub use error::{HtipError, Result};
