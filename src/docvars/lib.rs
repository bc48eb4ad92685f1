//! # Docvars Architecture
//!
//! Docvars is a **registry of named, typed variables that live inside a host
//! document**. Each variable is a dedicated object in the document holding
//! one `Value` property plus bookkeeping properties (group, row key, group
//! key). The registry adds naming rules, stable ordering, type conversion
//! and import/export on top of whatever the host provides.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (main.rs, args.rs, cli/)                         │
//! │  - Parses arguments, prints messages, maps errors to exits  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade, resolves names into `Variable` handles      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs, variable.rs, ordering.rs)    │
//! │  - Registry semantics: create, delete, reorder, import...   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Host Layer (store/)                                        │
//! │  - `DocumentStore` trait: objects, properties, expressions  │
//! │  - `HostDocument` over a file or memory backend             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything from `api.rs` inward takes Rust arguments and returns Rust
//! types. Nothing below the CLI writes to stdout or exits the process.
//!
//! ## Ordering
//!
//! Variables are shown group by group, and row by row inside a group. Both
//! orders come from integer keys stored on the variable objects, so they
//! survive save and reload. See [`ordering`] for the key rules and the
//! repair pass that runs on [`api::VarsApi::open`].
//!
//! ## Module Overview
//!
//! - [`api`]: The facade, entry point for all operations
//! - [`commands`]: Create, delete, list, reorder, import, export, doctor
//! - [`variable`]: The `Variable` handle and per-variable attributes
//! - [`ordering`]: Group and row keys, reordering, repair
//! - [`names`]: Name sanitizing and case-insensitive lookup
//! - [`convert`]: Value casting and type migration
//! - [`model`]: `TypeTag`, `Value`, `EditorMode`, `VarRecord`
//! - [`store`]: The host abstraction and its reference implementation
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod names;
pub mod ordering;
pub mod store;
pub mod variable;
