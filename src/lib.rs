//! # Context Assistant
//!
//! Retrieval-augmented chat profiles ("custom assistants") backed by a local
//! context embedding store.
//!
//! Documents are split into chunks, embedded, and stored as named
//! *contexts*, each with an exact L2 similarity index. An *assistant
//! profile* bundles a chat model, a system prompt and any number of
//! contexts. When a profile is asked a question, the question is embedded,
//! the closest chunks of every attached context are merged into one prompt,
//! and only the raw question and the reply are kept in the transcript.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Documents│──▶│ Chunk+Embed │──▶│ SQLite + idx │
//! │ txt/docx │   │  (ingest)   │   │  artifacts   │
//! └──────────┘   └─────────────┘   └──────┬───────┘
//!                                         │
//!                     ┌───────────────────┤
//!                     ▼                   ▼
//!                ┌──────────┐       ┌──────────┐
//!                │   CLI    │       │   HTTP   │
//!                │(cassist) │       │  (axum)  │
//!                └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cassist init                                  # create database
//! cassist context add docs/curtainwall101.docx  # embed a document
//! cassist bootstrap                             # create [[profiles]]
//! cassist ask BuddBot "What is a mullion?"
//! cassist serve                                 # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and reset |
//! | [`artifact`] | Index artifact files |
//! | [`sqlite_store`] | SQLite `ContextStore` |
//! | [`openai`] | OpenAI-compatible embedder and chat completer |
//! | [`extract`] | Text extraction (txt, docx, pdf) |
//! | [`ingest`] | Document → context pipeline |
//! | [`bootstrap`] | Default profiles from config |
//! | [`cache`] | Per-name profile cache |
//! | [`server`] | HTTP server |
//!
//! Pure logic (index, equivalence, profiles, retrieval) lives in the
//! `context-assistant-core` crate.

pub mod artifact;
pub mod ask;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod context_cmd;
pub mod db;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod openai;
pub mod profile_cmd;
pub mod server;
pub mod sqlite_store;
