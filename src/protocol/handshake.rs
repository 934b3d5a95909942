//! The `/multistream/1.0.0` identity exchange.

use tokio::io::{AsyncRead, AsyncWrite};

use super::communicator::Communicator;
use super::HANDSHAKE_ID;
use crate::error::HandshakeError;

/// Which side of the negotiation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Responder holding the protocol registry.
    Host,
    /// Initiator proposing protocols.
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Client => f.write_str("client"),
        }
    }
}

/// Send our handshake literal, then require the peer's to match it.
///
/// Both roles run the same sequence, so neither side waits on the other
/// before writing.
pub async fn perform_handshake<S>(
    comm: &mut Communicator<S>,
    role: Role,
) -> Result<(), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    comm.write_message(HANDSHAKE_ID).await?;
    let received = comm.read_message().await?;

    if received != HANDSHAKE_ID {
        tracing::debug!(%role, received = %received, "multistream handshake mismatch");
        return Err(HandshakeError::Mismatch {
            expected: HANDSHAKE_ID,
            received,
        });
    }

    tracing::debug!(%role, "multistream handshake complete");
    Ok(())
}
