//! Unit tests for individual components

mod config_test;
mod error_test;
mod key_test;
mod runtime_test;
