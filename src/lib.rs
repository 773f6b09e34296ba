//! # Knowledge Assistant
//!
//! An internal knowledge assistant: users upload text documents, ask
//! questions, and get answers generated from the single most similar
//! stored document, or a clear statement that nothing suitable exists.
//!
//! The retrieval core (similarity, best match, answerability decision)
//! and the assistant pipeline live in the `knowledge-assistant-core`
//! crate. This crate supplies the concrete providers, SQLite
//! persistence, authentication, the HTTP server and the `ka` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌──────────┐
//! │   CLI    │──▶│  KnowledgeAssistant  │──▶│  SQLite  │
//! │   (ka)   │   │ embed → match → gen  │   │ docs+vec │
//! └──────────┘   └──────────┬───────────┘   └──────────┘
//!       ┌───────────────────┤
//!       ▼                   ▼
//! ┌──────────┐       ┌──────────────┐
//! │   HTTP   │       │  OpenAI /    │
//! │  + JWT   │       │  Ollama      │
//! └──────────┘       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ka init                                  # create database
//! ka upload "Cats are small domesticated felines that purr."
//! ka ask "What sound do cats make?" --explain
//! ka serve                                 # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Answer generation providers |
//! | [`upstream`] | Shared HTTP retry logic for providers |
//! | [`auth`] | Users, password hashing, bearer tokens |
//! | [`knowledge`] | Assistant wiring and CLI commands |
//! | [`server`] | HTTP server |
//! | [`logging`] | Tracing subscriber setup |

pub mod auth;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod knowledge;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod upstream;
