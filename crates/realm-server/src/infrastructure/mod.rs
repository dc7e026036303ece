//! Infrastructure layer for the game server.
//!
//! Contains the OS-facing adapters: the TCP listener and per-connection
//! read/send loops, and the TOML configuration file with the data store built
//! from it.
//!
//! **Dependency rule**: this layer may depend on `application` and `realm_core`,
//! but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
