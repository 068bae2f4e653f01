//! # Context Assistant Core
//!
//! Shared, I/O-free logic for Context Assistant: the flat similarity index,
//! named contexts and their equivalence rules, assistant profiles, retrieval
//! orchestration, collaborator traits and the store trait.
//!
//! This crate contains no tokio runtime, sqlx or filesystem I/O. Native
//! concerns (SQLite, HTTP clients, index artifacts on disk) live in the
//! `context-assistant` app crate.

pub mod capability;
pub mod chunk;
pub mod context;
pub mod equivalence;
pub mod error;
pub mod index;
pub mod models;
pub mod profile;
pub mod retrieval;
pub mod store;
pub mod vector;

pub use error::{Error, Result};
