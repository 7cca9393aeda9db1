//! Lounge Core Library
//!
//! Shared state store for the lounge hub: lounge liveness, user membership,
//! bans and the whitelist, all behind one serialized SQLite connection.

pub mod error;
pub mod invariants;
pub mod models;
pub mod storage;

pub use error::{Error, Result};
pub use models::*;
pub use storage::{
    Database, LoungeStore, RetryPolicy, SettingsStore, StoreOptions, SweepReport, UserStore,
};
