//! multistream-select error types.
//!
//! Errors are layered the same way the protocol is:
//!
//! | Layer        | Error                    | Raised when                                   |
//! |--------------|--------------------------|-----------------------------------------------|
//! | Framing      | [`CommunicatorError`]    | stream I/O fails or a frame is malformed      |
//! | Handshake    | [`HandshakeError`]       | peer does not speak `/multistream/1.0.0`      |
//! | Host         | [`MultiselectError`]     | a responder session terminates without a pick |
//! | Client       | [`MultiselectClientError`] | an initiator session cannot agree on a pick |
//!
//! Each layer wraps the one below via `#[source]`, so the full chain is
//! available to tools like `anyhow`. None of these are retried internally;
//! every error ends the negotiation session it was raised in.

use thiserror::Error;

/// Framing-level failure on a [`Communicator`](crate::protocol::Communicator).
#[derive(Error, Debug)]
pub enum CommunicatorError {
    /// Underlying stream read/write failed or closed early.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame: bad length prefix, missing terminator or invalid UTF-8.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Frame (incoming or outgoing) larger than the configured limit.
    #[error("Message of {len} bytes exceeds limit of {max} bytes")]
    MessageTooLarge {
        /// Declared or actual payload length.
        len: u64,
        /// Configured maximum payload length.
        max: usize,
    },
}

impl CommunicatorError {
    /// True when the peer went away (EOF or reset) rather than sending garbage.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// The protocol-identity exchange failed.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Peer answered with something other than the handshake literal.
    #[error("Handshake mismatch: expected {expected:?}, received {received:?}")]
    Mismatch {
        /// The literal we require.
        expected: &'static str,
        /// What the peer actually sent.
        received: String,
    },

    /// The handshake message could not be sent or read.
    #[error("Handshake transport failure: {0}")]
    Communicator(#[from] CommunicatorError),
}

/// Host (responder) side negotiation failure.
#[derive(Error, Debug)]
pub enum MultiselectError {
    /// Handshake with the client failed; nothing was negotiated.
    #[error("Multiselect handshake failed: {0}")]
    Handshake(#[source] HandshakeError),

    /// The session broke while serving proposals.
    #[error("Multiselect session failed: {0}")]
    Communicator(#[source] CommunicatorError),

    /// A `debug-sigkill` was received on a debug host.
    #[error("Multiselect session killed by peer")]
    Killed,
}

impl From<HandshakeError> for MultiselectError {
    fn from(err: HandshakeError) -> Self {
        MultiselectError::Handshake(err)
    }
}

impl From<CommunicatorError> for MultiselectError {
    fn from(err: CommunicatorError) -> Self {
        MultiselectError::Communicator(err)
    }
}

/// Client (initiator) side negotiation failure.
#[derive(Error, Debug)]
pub enum MultiselectClientError {
    /// Handshake with the host failed; nothing was proposed.
    #[error("Multiselect client handshake failed: {0}")]
    Handshake(#[source] HandshakeError),

    /// The session broke while proposing.
    #[error("Multiselect client session failed: {0}")]
    Communicator(#[source] CommunicatorError),

    /// `select_one_of` was called with nothing to propose.
    #[error("No candidate protocols to propose")]
    NoCandidates,

    /// Every candidate was answered with `na`.
    #[error("Host supports none of the proposed protocols: {tried:?}")]
    NoMatch {
        /// Candidates proposed, in order.
        tried: Vec<String>,
    },

    /// A forced single proposal was answered with `na`.
    #[error("Host rejected protocol {proposed:?}")]
    Rejected {
        /// The protocol that was demanded.
        proposed: String,
    },

    /// Host replied with neither an echo nor `na`; the peers are out of sync.
    #[error("Unexpected reply {received:?} to proposal {proposed:?}")]
    UnexpectedReply {
        /// What we proposed.
        proposed: String,
        /// What came back.
        received: String,
    },

    /// A candidate is not a valid protocol id (empty, multi-line or `ls`/`na`).
    #[error("Invalid candidate protocol: {0}")]
    InvalidCandidate(String),

    /// The host's `ls` reply contained an invalid protocol id.
    #[error("Invalid protocol listing: {0}")]
    InvalidListing(String),

    /// The session already produced its result.
    #[error("Negotiation session already terminated")]
    Terminated,
}

impl From<HandshakeError> for MultiselectClientError {
    fn from(err: HandshakeError) -> Self {
        MultiselectClientError::Handshake(err)
    }
}

impl From<CommunicatorError> for MultiselectClientError {
    fn from(err: CommunicatorError) -> Self {
        MultiselectClientError::Communicator(err)
    }
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    /// Framing failure outside of a negotiation session.
    #[error(transparent)]
    Communicator(#[from] CommunicatorError),

    /// Host negotiation failed.
    #[error(transparent)]
    Multiselect(#[from] MultiselectError),

    /// Client negotiation failed.
    #[error(transparent)]
    MultiselectClient(#[from] MultiselectClientError),

    /// Protocol id is empty, contains a newline, or is reserved.
    #[error("Invalid protocol id: {0}")]
    InvalidProtocol(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Handler or transport failure after negotiation.
    #[error("Server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for multistream operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
