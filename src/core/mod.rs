//! Core primitives shared by the overlay engine.
//!
//! Data model, errors, configuration, persistence, and the thin filesystem,
//! repository, and clock collaborators the engine is built on.

pub mod config;
pub mod error;
pub mod fsops;
pub mod journal;
pub mod logging;
pub mod output;
pub mod paths;
pub mod persist;
pub mod repo;
pub mod store;
pub mod time;
