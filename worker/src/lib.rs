pub mod config;
pub mod rpc;
pub mod worker;

pub use config::WorkerConfig;
pub use rpc::{CoordinatorClient, RpcError};
pub use worker::{StopReason, Worker};
