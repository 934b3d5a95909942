//! Transport layer driving multistream negotiation.
//!
//! The negotiation core only ever sees a [`Communicator`]; this module owns
//! the sockets. It accepts connections, runs one host session per
//! connection in its own task, and hands the stream to whichever handler
//! was selected.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Host<StreamHandler>            │
//! │         (Transport-Agnostic)            │
//! └──────────────────┬──────────────────────┘
//!                    │ accept() per connection
//!                    ▼
//!          ┌─────────────────┐
//!          │  TcpTransport   │──> handler(protocol, stream)
//!          └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use multistream::protocol::Host;
//! use multistream::transport::{stream_handler, TcpTransport, Transport};
//!
//! let host = Host::new();
//! host.add_handler("/echo/1.0.0".parse()?, stream_handler(|_, stream| async move {
//!     echo(stream).await
//! }))?;
//! TcpTransport::localhost(4001).serve(host).await?;
//! ```
//!
//! [`Communicator`]: crate::protocol::Communicator

mod tcp;

pub use tcp::{connect, dial, TcpTransport};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::net::TcpStream;

use crate::error::Result;
use crate::protocol::{Host, ProtocolId};

/// Application logic for one negotiated protocol.
///
/// Invoked with the selected id and the stream, positioned right after the
/// host's acknowledgement.
pub type StreamHandler =
    Arc<dyn Fn(ProtocolId, TcpStream) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Box an async closure as a [`StreamHandler`].
pub fn stream_handler<F, Fut>(f: F) -> StreamHandler
where
    F: Fn(ProtocolId, TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |protocol, stream| f(protocol, stream).boxed())
}

/// Transport trait for pluggable network backends.
///
/// Implementations accept connections and negotiate each one against the
/// given host; the host stays transport-agnostic.
pub trait Transport: Send + Sync {
    /// Serve connections for `host` until an unrecoverable listener error.
    fn serve(
        &self,
        host: Host<StreamHandler>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;

    /// Get the listen address as a string.
    fn listen_addr(&self) -> String;
}
