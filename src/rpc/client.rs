//! TCP client for line-delimited JSON-RPC.
//!
//! This module provides `RpcClient`, an async client that connects to a
//! JSON-RPC server over TCP, sends one request at a time and waits for the
//! delimiter-terminated response with a deadline.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::protocol::{Request, Response};
use crate::rpc::framing::{write_frame, FrameBuffer, FrameError};

/// Bytes requested from the socket per read.
const READ_CHUNK_SIZE: usize = 512;

/// RPC error types.
///
/// Connect, encode, decode and application errors are recoverable: the
/// failure is recorded on the client and the caller may simply retry.
/// The rest are fatal to the connection, see [`RpcError::is_fatal`].
#[derive(Debug, Error)]
pub enum RpcError {
    /// Failed to establish the TCP connection.
    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The request could not be serialized.
    ///
    /// Requests are built from `serde_json::Value`s, which always serialize;
    /// the variant is kept so encoding has a typed failure like decoding.
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// The response frame was not a valid response.
    #[error("Parse error: {0}")]
    Decode(#[source] serde_json::Error),

    /// The server answered with a non-empty error field.
    #[error("Server error: {0}")]
    Application(Value),

    /// No complete response arrived before the deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// The server sent an oversized frame.
    #[error(transparent)]
    FrameTooLarge(#[from] FrameError),

    /// The client configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RpcError {
    /// Whether the error invalidated the connection.
    ///
    /// Fatal errors always leave the client disconnected; the next call
    /// opens a fresh connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RpcError::Timeout(_)
                | RpcError::ConnectionClosed
                | RpcError::Io(_)
                | RpcError::FrameTooLarge(_)
        )
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => RpcError::ConnectionClosed,
            _ => RpcError::Io(err),
        }
    }
}

/// Outcome of the most recent call.
///
/// Exactly one of result or error exists per call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The decoded `result` field.
    Result(Value),
    /// The server's error value, or a description of the local failure.
    Error(Value),
}

/// Line-delimited JSON-RPC client.
///
/// The client owns at most one TCP connection, opened lazily by the first
/// call and reopened after any fatal error. Calls take `&mut self`, so only
/// one request is ever outstanding.
///
/// # Connection Lifecycle
///
/// - `connect()` - Open (or reopen) the connection
/// - `connect_with_retry()` - Retry connection with exponential backoff
/// - `call()` - Send request and wait for response (with timeout)
/// - `disconnect()` - Close the connection; also run on drop
///
/// # Example
///
/// ```ignore
/// use linerpc::rpc::RpcClient;
///
/// let mut client = RpcClient::with_target("127.0.0.1", 3000)?;
/// let echoed = client.call("echo", ["foo", "bar"]).await?;
/// assert_eq!(echoed, serde_json::json!(["foo", "bar"]));
/// ```
pub struct RpcClient {
    config: ClientConfig,
    stream: Option<TcpStream>,
    /// Monotonically increasing request ID counter.
    request_id: AtomicU64,
    outcome: Option<Outcome>,
}

impl RpcClient {
    /// Create a disconnected client.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Config` if the config fails validation.
    pub fn new(config: ClientConfig) -> Result<Self, RpcError> {
        config.validate().map_err(RpcError::Config)?;

        Ok(Self {
            config,
            stream: None,
            request_id: AtomicU64::new(1),
            outcome: None,
        })
    }

    /// Create a disconnected client for `host:port` with default settings.
    pub fn with_target(host: impl Into<String>, port: u16) -> Result<Self, RpcError> {
        Self::new(ClientConfig::new(host, port))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Set the per-call timeout.
    ///
    /// Default is 30 seconds.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Address of the connected server, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// ID of the last request sent, or 0 before the first call.
    pub fn last_request_id(&self) -> u64 {
        self.request_id.load(Ordering::Relaxed) - 1
    }

    /// Outcome of the most recent call.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Result of the most recent call, if it succeeded.
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Some(Outcome::Result(value)) => Some(value),
            _ => None,
        }
    }

    /// Error of the most recent call, if it failed.
    pub fn error(&self) -> Option<&Value> {
        match &self.outcome {
            Some(Outcome::Error(value)) => Some(value),
            _ => None,
        }
    }

    /// Connect to the configured server, closing any existing connection first.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Connect` if:
    /// - The host cannot be resolved
    /// - Connection is refused or the host is unreachable
    /// - The handshake does not finish within the connect timeout
    ///
    /// The failure is also recorded as the client's error.
    pub async fn connect(&mut self) -> Result<(), RpcError> {
        self.disconnect();

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let limit = self.config.effective_connect_timeout();
        debug!(%addr, timeout = ?limit, "Connecting");

        let target = (self.config.host.as_str(), self.config.port);
        let stream = match timeout(limit, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(self.record_failure(RpcError::Connect { addr, source })),
            Err(_) => {
                let source = std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", limit),
                );
                return Err(self.record_failure(RpcError::Connect { addr, source }));
            }
        };

        // Requests are small and latency-bound; send them immediately.
        if let Err(source) = stream.set_nodelay(true) {
            return Err(self.record_failure(RpcError::Connect { addr, source }));
        }

        debug!(%addr, "Connected");
        self.stream = Some(stream);
        Ok(())
    }

    /// Point the client at a new server and connect to it.
    ///
    /// The new target is kept for later reconnects.
    pub async fn connect_to(&mut self, host: impl Into<String>, port: u16) -> Result<(), RpcError> {
        let mut config = self.config.clone();
        config.host = host.into();
        config.port = port;
        if let Err(reason) = config.validate() {
            self.disconnect();
            return Err(self.record_failure(RpcError::Config(reason)));
        }

        self.config = config;
        self.connect().await
    }

    /// Connect with automatic retry and exponential backoff.
    ///
    /// Useful when the server may still be starting up.
    /// Retries with delays of 100ms, 200ms, 400ms, etc.
    ///
    /// # Errors
    ///
    /// Returns the last connection error if all attempts fail, or
    /// `RpcError::Config` if `max_attempts` is zero.
    pub async fn connect_with_retry(&mut self, max_attempts: u32) -> Result<(), RpcError> {
        if max_attempts == 0 {
            return Err(self.record_failure(RpcError::Config(
                "max_attempts must be > 0".to_string(),
            )));
        }

        let mut attempt = 1;
        loop {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let delay = Duration::from_millis(100 * (1 << (attempt - 1).min(16)));
                    debug!(attempt, ?delay, error = %e, "Connect failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Close the connection. Does nothing if not connected.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(peer = ?stream.peer_addr().ok(), "Disconnecting");
        }
    }

    /// Send a request and wait for the response.
    ///
    /// This method:
    /// 1. Connects if there is no open connection
    /// 2. Builds a request with the next ID
    /// 3. Sends it followed by the delimiter
    /// 4. Reads until a full frame arrives or the timeout passes
    /// 5. Extracts the result or error
    ///
    /// # Errors
    ///
    /// Recoverable, connection state unchanged:
    /// - Connection could not be opened (`RpcError::Connect`)
    /// - Response is not valid JSON (`RpcError::Decode`)
    /// - Server returned an error (`RpcError::Application`)
    ///
    /// Fatal, client is disconnected afterwards:
    /// - Request timed out (`RpcError::Timeout`)
    /// - Connection is lost (`RpcError::ConnectionClosed`, `RpcError::Io`)
    /// - Response exceeds the frame limit (`RpcError::FrameTooLarge`)
    ///
    /// # Example
    ///
    /// ```ignore
    /// let sum = client.call("add", [1, 2]).await?;
    /// ```
    pub async fn call<P>(&mut self, method: &str, params: P) -> Result<Value, RpcError>
    where
        P: IntoIterator,
        P::Item: Into<Value>,
    {
        if self.stream.is_none() {
            self.connect().await?;
        }

        let id = self.next_id();
        let request = Request::new(id, method, params.into_iter().map(Into::into).collect());
        let body = match serde_json::to_vec(&request) {
            Ok(body) => body,
            Err(e) => return Err(self.record_failure(RpcError::Encode(e))),
        };

        // The call owns the stream until a full frame is back, so a dropped
        // future takes the half-used connection with it.
        let Some(mut stream) = self.stream.take() else {
            return Err(self.record_failure(RpcError::ConnectionClosed));
        };

        debug!(id, method, "Sending request");
        let frame = match self.send_receive(&mut stream, &body).await {
            Ok(frame) => {
                self.stream = Some(stream);
                frame
            }
            Err(e) => {
                warn!(id, method, error = %e, "Call failed, dropping connection");
                drop(stream);
                return Err(self.record_failure(e));
            }
        };
        trace!(id, bytes = frame.len(), "Received frame");

        let response: Response = match serde_json::from_slice(&frame) {
            Ok(response) => response,
            Err(e) => return Err(self.record_failure(RpcError::Decode(e))),
        };

        match response.into_result() {
            Ok(value) => {
                self.outcome = Some(Outcome::Result(value.clone()));
                Ok(value)
            }
            Err(error) => Err(self.record_failure(RpcError::Application(error))),
        }
    }

    /// Send a request and deserialize the result into `T`.
    ///
    /// A result that does not match `T` is reported as `RpcError::Decode`.
    pub async fn call_typed<T, P>(&mut self, method: &str, params: P) -> Result<T, RpcError>
    where
        T: DeserializeOwned,
        P: IntoIterator,
        P::Item: Into<Value>,
    {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|e| self.record_failure(RpcError::Decode(e)))
    }

    /// Generate the next request ID.
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Write one frame and read one frame back.
    ///
    /// Every error returned here leaves the stream in an unknown state.
    async fn send_receive(&self, stream: &mut TcpStream, body: &[u8]) -> Result<Vec<u8>, RpcError> {
        let call_timeout = self.config.timeout;

        timeout(call_timeout, write_frame(&mut *stream, body, &self.config.delimiter))
            .await
            .map_err(|_| RpcError::Timeout(call_timeout))??;

        // One deadline for the whole read; each wait only gets what is left of it.
        let deadline = Instant::now() + call_timeout;
        let mut frames = FrameBuffer::new(&self.config.delimiter, self.config.max_frame_size);
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let n = match timeout_at(deadline, stream.read(&mut chunk)).await {
                Err(_) => return Err(RpcError::Timeout(call_timeout)),
                Ok(Ok(0)) => return Err(RpcError::ConnectionClosed),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(RpcError::Io(e)),
            };
            trace!(bytes = n, buffered = frames.len(), "Read chunk");

            if let Some(frame) = frames.push(&chunk[..n])? {
                return Ok(frame);
            }
        }
    }

    /// Record `err` as the outcome of the current call and hand it back.
    fn record_failure(&mut self, err: RpcError) -> RpcError {
        let value = match &err {
            RpcError::Application(value) => value.clone(),
            other => Value::String(other.to_string()),
        };
        self.outcome = Some(Outcome::Error(value));
        err
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
