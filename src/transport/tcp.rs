//! TCP transport for multistream negotiation.
//!
//! One tokio task per accepted connection: negotiate under the configured
//! deadline, then run the selected handler on the same socket.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use super::{StreamHandler, Transport};
use crate::config::{FramingConfig, TcpConfig};
use crate::error::{CommunicatorError, Error, MultiselectError, Result};
use crate::protocol::{Client, Communicator, Host, ProtocolId, MAX_MESSAGE_LEN};

/// TCP listener that negotiates every connection with a [`Host`].
#[derive(Debug, Clone)]
pub struct TcpTransport {
    /// Address to listen on.
    listen_addr: SocketAddr,
    /// Deadline for one negotiation.
    negotiation_timeout: Option<Duration>,
    /// Largest multistream message accepted.
    max_message_len: usize,
}

impl TcpTransport {
    /// Create a new TCP transport.
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            negotiation_timeout: TcpConfig::default().negotiation_timeout(),
            max_message_len: MAX_MESSAGE_LEN,
        }
    }

    /// Create with default localhost address.
    pub fn localhost(port: u16) -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    /// Build from configuration sections.
    pub fn from_config(transport: &TcpConfig, framing: &FramingConfig) -> Result<Self> {
        let addr: SocketAddr = transport.listen_addr().parse().map_err(|e| {
            Error::Config(format!("Invalid listen address {}: {e}", transport.listen_addr()))
        })?;

        Ok(Self {
            listen_addr: addr,
            negotiation_timeout: transport.negotiation_timeout(),
            max_message_len: framing.max_message_len,
        })
    }

    /// Set the negotiation deadline (`None` disables it).
    pub fn with_negotiation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    /// Set the largest multistream message accepted.
    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len;
        self
    }

    /// Serve `host` on an already bound listener.
    ///
    /// Accept failures are logged and never end the loop; resource errors
    /// such as running out of file descriptors pause accepting briefly.
    pub async fn serve_on(&self, listener: TcpListener, host: Host<StreamHandler>) -> Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                    if let Some(delay) = accept_backoff(&e) {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                },
            };
            tracing::debug!(%peer, "accepted connection");

            let host = host.clone();
            let timeout = self.negotiation_timeout;
            let max_message_len = self.max_message_len;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(host, stream, timeout, max_message_len).await {
                    tracing::warn!(%peer, error = %e, "connection ended with error");
                }
            });
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::localhost(TcpConfig::default().port)
    }
}

impl Transport for TcpTransport {
    fn serve(
        &self,
        host: Host<StreamHandler>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let addr = self.listen_addr;

        Box::pin(async move {
            let listener = TcpListener::bind(addr).await.map_err(|e| {
                Error::Server(format!("Failed to bind TCP to {addr}: {e}"))
            })?;
            tracing::info!("TCP transport listening on {}", addr);
            tracing::info!("Protocols: {:?}", host.protocols());

            self.serve_on(listener, host).await
        })
    }

    fn name(&self) -> &'static str {
        "TCP"
    }

    fn listen_addr(&self) -> String {
        format!("tcp://{}", self.listen_addr)
    }
}

const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Pause before the next accept, or `None` when only that peer is affected.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

fn timed_out() -> MultiselectError {
    MultiselectError::Communicator(CommunicatorError::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        "multistream negotiation timed out",
    )))
}

async fn handle_connection(
    host: Host<StreamHandler>,
    stream: TcpStream,
    timeout: Option<Duration>,
    max_message_len: usize,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let comm = Communicator::new(stream).with_max_message_len(max_message_len);

    let negotiation = host.accept(comm);
    let negotiated = match timeout {
        Some(limit) => tokio::time::timeout(limit, negotiation)
            .await
            .map_err(|_| timed_out())??,
        None => negotiation.await?,
    };

    tracing::debug!(protocol = %negotiated.protocol, "dispatching to handler");
    (negotiated.handler)(negotiated.protocol, negotiated.stream).await
}

/// Connect to `addr` and start a client session on the socket.
pub async fn connect(addr: SocketAddr, framing: &FramingConfig) -> Result<Client<TcpStream>> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(Client::new(
        Communicator::new(stream).with_max_message_len(framing.max_message_len),
    ))
}

/// Connect to `addr` and agree on the first of `candidates` it supports.
///
/// Returns the agreed protocol and the socket, ready for that protocol.
pub async fn dial<P>(
    addr: SocketAddr,
    candidates: &[P],
    timeout: Option<Duration>,
) -> Result<(ProtocolId, TcpStream)>
where
    P: AsRef<str>,
{
    let mut client = connect(addr, &FramingConfig::default()).await?;

    let selection = client.select_one_of(candidates);
    let protocol = match timeout {
        Some(limit) => tokio::time::timeout(limit, selection)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "multistream negotiation timed out"))??,
        None => selection.await?,
    };

    Ok((protocol, client.into_inner().into_inner()))
}
