//! Builders that assemble a runnable server from configuration.

pub mod server_builder;

pub use server_builder::ServerBuilder;
