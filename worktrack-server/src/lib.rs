pub mod error;
pub mod identity;
pub mod metrics;
pub mod notify;
pub mod qr;
pub mod server;
pub mod storage;
pub mod workflow;

pub use error::CoreError;
