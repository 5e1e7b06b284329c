//! Runtime adapters: the server handle, the tokio tick driver and the status
//! API surface.

pub mod api;
pub mod server;
#[cfg(feature = "tokio-runtime")]
pub mod tick_driver;

pub use api::{health, Health, ServerStatus};
pub use server::Server;
#[cfg(feature = "tokio-runtime")]
pub use tick_driver::run_ticks;
