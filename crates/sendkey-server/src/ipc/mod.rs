//! IPC layer: MRPC server, coordinator service, and client connection.

mod client;
mod server;
mod service;

pub use client::Connection;
pub(crate) use server::IPCServer;
