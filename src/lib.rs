pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod lifecycle;
pub mod monitoring;
pub mod split;
pub mod store;
pub mod submitter;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{SplitError, SplitResult};
