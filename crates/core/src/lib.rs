//! DeckVault core library.
//!
//! This crate provides the foundational components for card-game deck version
//! control on top of a git-compatible hosting service: structural deck
//! diffing, three-way conflict detection and merging, commit-message
//! annotations, snapshot caching, the store client, and the versioning
//! orchestrator.

pub mod annotation;
pub mod cache;
pub mod config;
pub mod conflict;
pub mod diff;
pub mod errors;
pub mod models;
pub mod store;
pub mod vcs;

// Re-exports for convenience.
pub use config::EngineConfig;
pub use errors::CoreError;
pub use store::{DeckStore, GitHubStore};
pub use vcs::DeckVersionControl;
