//! # Software Center Index
//!
//! Builds the searchable application catalog of a software center.
//!
//! Application metadata arrives in several shapes: desktop entries,
//! AppStream XML, apt `*AppInfo` lists, JSON feeds and the software-center
//! agent's payloads. Each record is normalized behind one parser interface,
//! turned into a document with typed value slots, boolean terms and
//! weighted free text, and written to an SQLite FTS5 index that is rebuilt
//! from scratch and swapped into place atomically.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │   Sources   │──▶│   Parsers    │──▶│   Builder    │──▶│  SQLite  │
//! │ desktop/XML │   │ AppInfo trait│   │ values+terms │   │   FTS5   │
//! │ JSON/agent  │   └──────────────┘   └──────┬───────┘   └────┬─────┘
//! └─────────────┘                             │                │
//!                                     ┌───────┴──────┐   ┌─────┴────┐
//!                                     │ apt packages │   │   CLI    │
//!                                     │ cataloged ts │   │(sc-index)│
//!                                     └──────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Value slots, documents, metadata keys |
//! | [`parsers`] | Per-format metadata parsers |
//! | [`builder`] | Record to document mapping |
//! | [`terms`] | Weighted free-text indexing |
//! | [`packages`] | Package candidates from apt lists |
//! | [`i18n`] | Locale languages and gettext catalogs |
//! | [`cataloged`] | First-seen timestamps per package |
//! | [`store`] | Index write backends |
//! | [`rebuild`] | Batch driver and atomic swap |
//! | [`search`] | Ranked search with filters and spelling |
//! | [`show`] | Per-package document dump |
//! | [`info`] | Batch metadata and statistics |
//! | [`sources`] | Configured source listing |
//! | [`db`] | Database connections |
//! | [`migrate`] | Index schema |

pub mod builder;
pub mod cataloged;
pub mod config;
pub mod db;
pub mod i18n;
pub mod info;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod packages;
pub mod parsers;
pub mod progress;
pub mod rebuild;
pub mod search;
pub mod show;
pub mod sources;
pub mod store;
pub mod terms;
