//! Network infrastructure.
//!
//! # Sub-modules
//!
//! - **`server`** – The TCP accept loop and the per-connection tasks.  Each
//!   connection gets a read loop that splits the byte stream into frames and
//!   feeds them to the [`Coordinator`](crate::application::coordinator::Coordinator),
//!   and a send loop that drains the session's outbound queue onto the socket.

pub mod server;
