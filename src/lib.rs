//! linerpc library
//!
//! A client for line-delimited JSON-RPC over raw TCP:
//!
//! - `rpc` - `RpcClient`, its error type and the delimiter framing
//! - `protocol` - request and response wire types
//! - `config` - connection and framing settings
//!
//! # Example
//!
//! ```ignore
//! use linerpc::{ClientConfig, RpcClient, RpcError};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("127.0.0.1", 3000).with_timeout(Duration::from_secs(5));
//! let mut client = RpcClient::new(config)?;
//!
//! match client.call("echo", ["foo", "bar"]).await {
//!     Ok(result) => println!("{result}"),
//!     Err(RpcError::Application(error)) => eprintln!("server said no: {error}"),
//!     Err(e) if e.is_fatal() => eprintln!("connection lost: {e}"),
//!     Err(e) => eprintln!("call failed: {e}"),
//! }
//! ```

pub mod config;
pub mod protocol;
pub mod rpc;

pub use config::ClientConfig;
pub use protocol::{Request, Response};
pub use rpc::{Outcome, RpcClient, RpcError};
