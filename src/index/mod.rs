pub mod batch;
pub mod controller;
pub mod document;
pub mod instance;
mod internal;
pub mod shard;
pub mod snapshot;
pub mod updater;
pub mod worker;

pub use controller::{ControllerConfig, IndexController};
pub use instance::{InstanceIndex, InstanceState};
pub use shard::Shard;
pub use worker::{UpdateQueue, WorkerConfig};
