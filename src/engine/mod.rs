//! Overlay engine.
//!
//! Every operation loads the workspace record, computes against the store
//! catalogs, mutates the workspace tree, and persists the record once.

pub mod admin;
pub mod catalog;
pub mod commit;
pub mod context;
pub mod diff;
pub mod drift;
pub mod execute;
pub mod plan;
pub mod scope;
pub mod stack;
pub mod state;
pub mod track;

pub use context::{Engine, EngineOptions};
