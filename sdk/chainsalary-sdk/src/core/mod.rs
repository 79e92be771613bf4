pub mod clock;
pub mod connection;
pub mod constants;
pub mod engine;
pub mod host;
pub mod ledger;
pub mod signer;
pub mod storage;
