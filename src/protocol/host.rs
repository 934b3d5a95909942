//! Host (responder) side of the negotiation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use super::communicator::Communicator;
use super::handshake::{perform_handshake, Role};
use super::id::ProtocolId;
use super::registry::HandlerRegistry;
use super::{DEBUG_SIGKILL, LS, NA};
use crate::error::{Error, MultiselectError, Result};

/// Host session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostState {
    /// Session created, handshake not yet done
    AwaitingHandshake,
    /// Handshake done, answering proposals
    Serving,
    /// A proposal was acknowledged
    Selected,
    /// Session ended without a selection
    Aborted,
}

/// Host construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Honor `debug-sigkill`. Leave off outside tests and ops tooling: it
    /// lets any peer end the session in-band.
    #[serde(default)]
    pub debug: bool,
}

/// Outcome of [`Host::accept`] and [`Host::negotiate_stream`].
#[derive(Debug)]
pub struct Negotiated<S, H> {
    /// Agreed protocol.
    pub protocol: ProtocolId,
    /// Handler registered for `protocol` when it was acknowledged.
    pub handler: H,
    /// The stream, positioned right after the acknowledgement.
    pub stream: S,
}

/// Per-connection session bookkeeping.
struct Session {
    state: HostState,
    proposals: u32,
}

impl Session {
    fn new() -> Self {
        Self {
            state: HostState::AwaitingHandshake,
            proposals: 0,
        }
    }

    fn transition(&mut self, next: HostState) {
        tracing::debug!(from = ?self.state, to = ?next, "host session state change");
        self.state = next;
    }
}

/// Multistream host: owns the handler registry and answers proposals.
///
/// Cloning is cheap and clones share the registry, so one `Host` can serve
/// any number of concurrent connections while setup code keeps registering
/// handlers.
#[derive(Debug)]
pub struct Host<H> {
    registry: Arc<HandlerRegistry<H>>,
    config: HostConfig,
}

impl<H> Clone for Host<H> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: self.config,
        }
    }
}

impl<H> Default for Host<H> {
    fn default() -> Self {
        Self::with_config(HostConfig::default())
    }
}

impl<H> Host<H> {
    /// Create a host with no handlers and debug commands disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host that honors `debug-sigkill`.
    pub fn debug() -> Self {
        Self::with_config(HostConfig { debug: true })
    }

    /// Create a host with explicit options.
    pub fn with_config(config: HostConfig) -> Self {
        Self {
            registry: Arc::new(HandlerRegistry::new()),
            config,
        }
    }

    /// Whether `debug-sigkill` is honored.
    pub fn is_debug(&self) -> bool {
        self.config.debug
    }

    /// Register `handler` for `protocol`, returning any handler it replaces.
    pub fn add_handler(&self, protocol: ProtocolId, handler: H) -> Result<Option<H>> {
        if self.config.debug && protocol == DEBUG_SIGKILL {
            return Err(Error::InvalidProtocol(format!(
                "{DEBUG_SIGKILL:?} is reserved on a debug host"
            )));
        }
        tracing::debug!(protocol = %protocol, "registering protocol handler");
        self.registry.insert(protocol, handler)
    }

    /// Unregister `protocol`.
    pub fn remove_handler(&self, protocol: &str) -> Option<H> {
        self.registry.remove(protocol)
    }

    /// Registered protocols in registration order.
    pub fn protocols(&self) -> Vec<ProtocolId> {
        self.registry.protocols()
    }

    /// The shared registry.
    pub fn registry(&self) -> &HandlerRegistry<H> {
        &self.registry
    }
}

impl<H: Clone> Host<H> {
    /// Handler registered for `protocol`.
    pub fn handler(&self, protocol: &str) -> Option<H> {
        self.registry.get(protocol)
    }

    /// Run one negotiation session and return the selected protocol.
    ///
    /// Serves proposals until one matches, the peer disconnects or (debug
    /// hosts only) a `debug-sigkill` arrives. There is no round limit; put
    /// a deadline on the stream to bound it.
    pub async fn negotiate<S>(
        &self,
        comm: &mut Communicator<S>,
    ) -> std::result::Result<ProtocolId, MultiselectError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.serve(comm).await.map(|(protocol, _)| protocol)
    }

    /// Wrap `stream` with default framing and [`accept`](Self::accept) it.
    pub async fn negotiate_stream<S>(
        &self,
        stream: S,
    ) -> std::result::Result<Negotiated<S, H>, MultiselectError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.accept(Communicator::new(stream)).await
    }

    /// Negotiate on `comm`, then hand back the stream together with the
    /// selected protocol and its handler.
    pub async fn accept<S>(
        &self,
        mut comm: Communicator<S>,
    ) -> std::result::Result<Negotiated<S, H>, MultiselectError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (protocol, handler) = self.serve(&mut comm).await?;
        Ok(Negotiated {
            protocol,
            handler,
            stream: comm.into_inner(),
        })
    }

    async fn serve<S>(
        &self,
        comm: &mut Communicator<S>,
    ) -> std::result::Result<(ProtocolId, H), MultiselectError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut session = Session::new();

        if let Err(e) = perform_handshake(comm, Role::Host).await {
            session.transition(HostState::Aborted);
            return Err(e.into());
        }
        session.transition(HostState::Serving);

        let result = self.serve_proposals(comm, &mut session).await;
        match &result {
            Ok((protocol, _)) => {
                session.transition(HostState::Selected);
                tracing::info!(
                    protocol = %protocol,
                    proposals = session.proposals,
                    "multistream protocol selected"
                );
            },
            Err(e) => {
                session.transition(HostState::Aborted);
                tracing::debug!(error = %e, proposals = session.proposals, "host session aborted");
            },
        }
        result
    }

    async fn serve_proposals<S>(
        &self,
        comm: &mut Communicator<S>,
        session: &mut Session,
    ) -> std::result::Result<(ProtocolId, H), MultiselectError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let message = comm.read_message().await?;

            if message == LS {
                let listing = self.registry.listing();
                comm.write_message(&listing).await?;
                continue;
            }

            if self.config.debug && message == DEBUG_SIGKILL {
                tracing::warn!("debug-sigkill received, dropping session");
                return Err(MultiselectError::Killed);
            }

            session.proposals += 1;
            match self.registry.lookup(&message) {
                Some(selected) => {
                    comm.write_message(&message).await?;
                    return Ok(selected);
                },
                None => {
                    tracing::debug!(proposal = %message, "protocol not available");
                    comm.write_message(NA).await?;
                },
            }
        }
    }
}
