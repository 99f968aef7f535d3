/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, either by the session (kick) or
    /// because the socket writer went away.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
}
