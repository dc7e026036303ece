//! Storage infrastructure: the configuration file and what is loaded from it.
//!
//! - **`config`** reads and writes the TOML file, falling back to defaults
//!   when it does not exist yet.
//! - **`data_store`** serves characters and templates from the tables in that
//!   file through the [`DataStore`](crate::application::collaborators::DataStore)
//!   interface.

pub mod config;
pub mod data_store;
