// src/link/mod.rs
//! Receiver connection management

pub mod client;
pub mod transport;

pub use client::{Endpoint, GgaClient, LinkEvent, LinkSettings};
pub use transport::{Connector, LineSource, TcpConnector};
