//! Configuration models for the server, its tick cadence and the background
//! executor.

pub mod server;

pub use server::{ExecutorConfig, ServerConfig, ENV_PREFIX};
