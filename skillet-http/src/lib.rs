//! HTTP boundary for the skillet indexing service: control endpoints that
//! map 1:1 onto controller operations, and the read-side receiver endpoints
//! replicated stores are posted to.

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::{router, serve};
