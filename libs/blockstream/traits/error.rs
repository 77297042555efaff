use std::time::Duration;
use thiserror::Error;

/// Failures reported by the stream server in the `reason` of a non-`ok` frame
///
/// Every variant carries the server's reason with surrounding whitespace removed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Too many websocket messages sent on this connection
    #[error("WebSocket rate limit exceeded: {0}")]
    RateLimit(String),

    /// Outbound frame exceeded the server's size limit
    #[error("Message too large: {0}")]
    MessageTooLarge(String),

    /// The envelope did not carry an API key
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    /// The envelope `version` is not accepted by the server
    #[error("API version not supported: {0}")]
    UnsupportedApiVersion(String),

    /// The API key was rejected
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    /// Daily event quota for the API key is exhausted
    #[error("Event rate limit reached: {0}")]
    EventRateLimit(String),

    /// Daily simulated-transaction quota for the API key is exhausted
    #[error("Simulated event rate limit reached: {0}")]
    SimulatedEventRateLimit(String),

    /// Any reason not matched above
    #[error("Server error: {0}")]
    Other(String),
}

impl ServerError {
    /// The reason sent by the server
    pub fn reason(&self) -> &str {
        match self {
            ServerError::RateLimit(reason)
            | ServerError::MessageTooLarge(reason)
            | ServerError::MissingApiKey(reason)
            | ServerError::UnsupportedApiVersion(reason)
            | ServerError::InvalidApiKey(reason)
            | ServerError::EventRateLimit(reason)
            | ServerError::SimulatedEventRateLimit(reason)
            | ServerError::Other(reason) => reason,
        }
    }

    /// Whether the supervisor reconnects after this error instead of surfacing it
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServerError::RateLimit(_))
    }
}

/// Main error type for blockstream
#[derive(Error, Debug)]
pub enum StreamError {
    /// Opening the websocket failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Read or write on an open websocket failed
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The server closed the connection or the stream ended
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// No pong arrived within the timeout after a ping
    #[error("Heartbeat timed out after {0:?}")]
    HeartbeatTimeout(Duration),

    /// An inbound frame broke the protocol contract; the session is dead
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The server reported an error for this session
    #[error(transparent)]
    Server(#[from] ServerError),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The network id has no entry in the network table
    #[error("Unknown network id: {0}")]
    UnknownNetwork(u64),

    /// The transaction status has no matching event code
    #[error("Unknown transaction status: {0}")]
    UnknownStatus(String),

    /// A subscription handler returned an error
    #[error("Subscription handler failed: {0}")]
    Handler(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation does not fit the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The reconnection strategy gave up
    #[error("Reconnection failed after {attempts} attempts: {reason}")]
    ReconnectionFailed { attempts: usize, reason: String },

    /// The client was shut down before the operation started
    #[error("Client has been shut down")]
    Shutdown,
}

impl StreamError {
    /// Transport failures end the current session and are recovered by reconnecting
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StreamError::WebSocket(_)
                | StreamError::ConnectionClosed(_)
                | StreamError::HeartbeatTimeout(_)
        )
    }

    /// Whether the supervisor should open a new connection after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            StreamError::Server(server) => server.is_retryable(),
            other => other.is_transport(),
        }
    }
}

/// Result type for blockstream operations
pub type Result<T> = std::result::Result<T, StreamError>;
