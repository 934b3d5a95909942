//! Client (initiator) side of the negotiation.

use tokio::io::{AsyncRead, AsyncWrite};

use super::communicator::Communicator;
use super::handshake::{perform_handshake, Role};
use super::id::ProtocolId;
use super::{LS, NA};
use crate::error::MultiselectClientError;

type ClientResult<T> = std::result::Result<T, MultiselectClientError>;

/// Client session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Handshake not yet done
    AwaitingHandshake,
    /// Handshake done, ready to propose
    Ready,
    /// A protocol was agreed
    Selected,
    /// Negotiation failed
    Failed,
}

/// One client negotiation session over a single stream.
///
/// Select operations run the handshake first if it has not happened yet.
/// A session yields exactly one result: once a select call has succeeded
/// or failed, further calls return [`MultiselectClientError::Terminated`].
#[derive(Debug)]
pub struct Client<S> {
    comm: Communicator<S>,
    state: ClientState,
}

impl<S> Client<S> {
    /// Start a session on an existing communicator.
    pub fn new(comm: Communicator<S>) -> Self {
        Self {
            comm,
            state: ClientState::AwaitingHandshake,
        }
    }

    /// Start a session on a raw stream with default framing.
    pub fn from_stream(stream: S) -> Self {
        Self::new(Communicator::new(stream))
    }

    /// Current session state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// True once a select call has produced its result.
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, ClientState::Selected | ClientState::Failed)
    }

    /// Give back the communicator, e.g. to talk the agreed protocol.
    pub fn into_inner(self) -> Communicator<S> {
        self.comm
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Exchange and verify the multistream handshake.
    pub async fn handshake(&mut self) -> ClientResult<()> {
        match self.state {
            ClientState::AwaitingHandshake => {},
            ClientState::Ready => return Ok(()),
            ClientState::Selected | ClientState::Failed => {
                return Err(MultiselectClientError::Terminated)
            },
        }

        match perform_handshake(&mut self.comm, Role::Client).await {
            Ok(()) => {
                self.state = ClientState::Ready;
                Ok(())
            },
            Err(e) => {
                self.state = ClientState::Failed;
                Err(e.into())
            },
        }
    }

    /// Propose `candidates` in order and return the first one the host
    /// echoes back.
    ///
    /// `na` moves on to the next candidate; any other reply is a protocol
    /// violation and ends the session. Repeated candidates are proposed once.
    pub async fn select_one_of<P>(&mut self, candidates: &[P]) -> ClientResult<ProtocolId>
    where
        P: AsRef<str>,
    {
        if candidates.is_empty() && !self.is_terminated() {
            return self.finish(Err(MultiselectClientError::NoCandidates));
        }
        self.handshake().await?;

        let result = self.try_candidates(candidates).await;
        self.finish(result)
    }

    /// Demand exactly `candidate`: one proposal, no fallback.
    pub async fn select_protocol_or_fail<P>(&mut self, candidate: P) -> ClientResult<ProtocolId>
    where
        P: AsRef<str>,
    {
        self.handshake().await?;

        let result = match self.propose(candidate.as_ref()).await {
            Ok(Some(protocol)) => Ok(protocol),
            Ok(None) => Err(MultiselectClientError::Rejected {
                proposed: candidate.as_ref().to_string(),
            }),
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    /// Ask the host which protocols it supports.
    ///
    /// Does not end the session; a select call can follow.
    pub async fn ls(&mut self) -> ClientResult<Vec<ProtocolId>> {
        self.handshake().await?;

        let reply = match self.round_trip(LS).await {
            Ok(reply) => reply,
            Err(e) => {
                self.state = ClientState::Failed;
                return Err(e);
            },
        };

        reply
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(|line| {
                ProtocolId::new(line)
                    .map_err(|e| MultiselectClientError::InvalidListing(e.to_string()))
            })
            .collect()
    }

    async fn try_candidates<P>(&mut self, candidates: &[P]) -> ClientResult<ProtocolId>
    where
        P: AsRef<str>,
    {
        let mut tried: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let candidate = candidate.as_ref();
            if tried.iter().any(|t| t == candidate) {
                tracing::debug!(candidate, "skipping repeated candidate");
                continue;
            }
            tried.push(candidate.to_string());

            if let Some(protocol) = self.propose(candidate).await? {
                return Ok(protocol);
            }
        }

        Err(MultiselectClientError::NoMatch { tried })
    }

    /// Send one proposal. `Some` on echo, `None` on `na`.
    async fn propose(&mut self, candidate: &str) -> ClientResult<Option<ProtocolId>> {
        let protocol = ProtocolId::new(candidate)
            .map_err(|e| MultiselectClientError::InvalidCandidate(e.to_string()))?;
        // A host reply can never select these: `na` is the rejection itself
        if protocol == LS || protocol == NA {
            return Err(MultiselectClientError::InvalidCandidate(format!(
                "{candidate:?} is a reserved multistream command"
            )));
        }
        let reply = self.round_trip(protocol.as_str()).await?;

        if reply == candidate {
            tracing::debug!(protocol = %protocol, "protocol accepted");
            return Ok(Some(protocol));
        }

        if reply == NA {
            tracing::debug!(candidate, "protocol not available");
            return Ok(None);
        }

        Err(MultiselectClientError::UnexpectedReply {
            proposed: candidate.to_string(),
            received: reply,
        })
    }

    async fn round_trip(&mut self, message: &str) -> ClientResult<String> {
        self.comm.write_message(message).await?;
        Ok(self.comm.read_message().await?)
    }

    fn finish(&mut self, result: ClientResult<ProtocolId>) -> ClientResult<ProtocolId> {
        match &result {
            Ok(protocol) => {
                self.state = ClientState::Selected;
                tracing::info!(protocol = %protocol, "multistream protocol selected");
            },
            Err(e) => {
                self.state = ClientState::Failed;
                tracing::debug!(error = %e, "client negotiation failed");
            },
        }
        result
    }
}
