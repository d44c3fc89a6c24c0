//! JSON-RPC client over TCP.
//!
//! This module provides the client side of a small line-delimited JSON-RPC
//! protocol: one request, one response, one connection per period of use.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐          TCP stream          ┌─────────────────────┐
//! │   Application   │  ◄──────────────────────────►│   JSON-RPC server   │
//! │   (RpcClient)   │   JSON + delimiter framing   │                     │
//! └─────────────────┘                              └─────────────────────┘
//! ```
//!
//! # Protocol
//!
//! Each message is one JSON object followed by the delimiter (newline by
//! default):
//!
//! ```text
//! {"id":1,"method":"echo","params":["foo","bar"]}\n
//! {"result":["foo","bar"],"error":null}\n
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use linerpc::rpc::RpcClient;
//!
//! let mut client = RpcClient::with_target("127.0.0.1", 3000)?;
//! let result = client.call("echo", ["foo", "bar"]).await?;
//! ```

mod client;
mod framing;

pub use client::{Outcome, RpcClient, RpcError};
pub use framing::{write_frame, FrameBuffer, FrameError};
