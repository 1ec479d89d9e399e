//! # cadenza-core
//!
//! Backend library for the Cadenza vocal editor. Provides the transactional
//! command engine, notification bus, undo/redo history, validation,
//! persistence guard, and extension discovery — independent of any UI
//! framework.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cadenza_core::config::Preferences;
//! use cadenza_core::manager::{DocManager, Message};
//! use cadenza_core::notification::Notification;
//! use cadenza_core::plugins;
//!
//! // 1. Load preferences and scan the extension catalog
//! let preferences = Arc::new(Preferences::load());
//! let catalog = Arc::new(plugins::scan(&preferences.plugin_dir()));
//!
//! // 2. Create the manager on the event-loop thread; it is owner-bound
//! let mut manager = DocManager::new(Arc::clone(&preferences), catalog);
//! manager.install_crash_guard();
//!
//! // 3. Every edit is a transaction of commands
//! manager.begin_transaction(false);
//! // manager.submit_command(MoveNote { .. });
//! manager.commit();
//!
//! // 4. System events go through the same entry point
//! manager.notify(Notification::SaveRequested { path: None });
//!
//! // 5. Undo/redo replay whole transactions
//! manager.undo();
//! manager.redo();
//! ```
//!
//! ## Module Overview
//!
//! - [`manager`] — `DocManager` and `Message` — the single entry point for
//!   document mutation. Owns the transaction lifecycle and the cascade
//!   handling for notifications.
//! - [`command`] — the `Command` contract: atomic, reversible mutations with
//!   optional commit-time merging and scoped validation hints
//! - [`notification`] — the closed set of system events delivered through
//!   the bus without entering history
//! - [`bus`] — synchronous subscriber fan-out with per-subscriber fault
//!   isolation
//! - [`history`] — `CommandGroup` transactions, bounded undo/redo queues,
//!   saved/autosaved position marks
//! - [`validate`] — timing and phonemizer passes that recompute derived
//!   document state
//! - [`phonemizer`] — the extension capability contract and catalog
//! - [`plugins`] — dynamic-library discovery with per-file fault isolation
//! - [`persistence`] — atomic project save/load, crash backup hook,
//!   autosave timer
//! - [`config`] — TOML configuration loading (embedded defaults + user
//!   override), live undo limit

pub mod bus;
pub mod command;
pub mod config;
pub mod history;
pub mod manager;
pub mod notification;
pub mod persistence;
pub mod phonemizer;
pub mod plugins;
pub mod validate;

pub use bus::{Event, Subscriber, SubscriberHandle};
pub use command::{Command, CommandError, ValidateOptions};
pub use config::Preferences;
pub use history::{CommandGroup, GroupId, History};
pub use manager::{DocManager, Message};
pub use notification::Notification;
pub use persistence::{AutosaveTimer, GuardSignal, PersistError};
pub use phonemizer::{Phonemizer, PhonemizerCatalog, PhonemizerDescriptor};
