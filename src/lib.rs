//! # Game Sequencer
//!
//! The heartbeat of a persistent multiplayer simulation server: a fixed-cadence
//! tick driver plus the cooperative task scheduler every other subsystem
//! registers work against.
//!
//! ## Core Problem Solved
//!
//! A world that many players share has to advance in lockstep. Every feature
//! (stat restoration, ground item expiry, minigame rounds, combat cooldowns)
//! wants to run "every N ticks" or "once, N ticks from now", and all of them
//! mutate the same game state. This crate gives them:
//!
//! - **A strict per-tick order**: scheduled tasks, then the network pump, then
//!   the world update, on a single logic thread with no locking of game state
//! - **A uniform unit of work**: [`core::ScheduledTask`] wraps any
//!   [`core::Task`] with a tick delay, an instant flag, a grouping key and a
//!   terminal cancellation state
//! - **Failure isolation**: one task failing (or panicking) never stops the
//!   other tasks of the tick; one failed tick never stops the server
//! - **An offload pool**: [`core::BackgroundExecutor`] runs slow work off the
//!   logic thread and falls back to running it on the caller rather than
//!   dropping it
//!
//! ## TaskManager
//!
//! ```rust
//! use game_sequencer::core::{ScheduledTask, TaskKey, TaskManager};
//!
//! let mut tasks = TaskManager::new();
//! let player = TaskKey::named("player:zezima");
//!
//! let restore = ScheduledTask::from_fn(3, false, |_ctx| Ok(()))
//!     .unwrap()
//!     .attach(player.clone());
//! tasks.submit(restore);
//!
//! for _ in 0..3 {
//!     tasks.sequence();
//! }
//!
//! // Logout tears down everything bound to the player.
//! assert_eq!(tasks.cancel(&player), 1);
//! assert!(tasks.is_empty());
//! ```
//!
//! ## Bootstrap
//!
//! ```rust,ignore
//! use game_sequencer::config::ServerConfig;
//! use game_sequencer::builders::ServerBuilder;
//!
//! let server = ServerBuilder::new(ServerConfig::from_env()?, network, world)
//!     .with_task(restore_stats_task)
//!     .with_task(ground_items_task)
//!     .build()?;
//!
//! server.run(tokio::signal::ctrl_c()).await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, the task manager, the background
/// executor and the game sequencer.
pub mod core;
/// Configuration models for the server, tick cadence and background executor.
pub mod config;
/// Builders that assemble a runnable server from configuration.
pub mod builders;
/// Runtime adapters: the tick driver, the server handle and the status API.
pub mod runtime;
/// Shared utilities.
pub mod util;
