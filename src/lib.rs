//! # multistream-select
//!
//! Protocol negotiation run once at the start of a byte-stream connection,
//! so that two peers with possibly different sets of supported protocols can
//! agree on one (or fail explicitly) before any application data flows.
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                                  Host
//!    |------- /multistream/1.0.0 --------->|
//!    |<------ /multistream/1.0.0 ----------|
//!    |------- /rock/1.0.0 ---------------->|
//!    |<------ na --------------------------|
//!    |------- /foo/1.0.0 ----------------->|
//!    |<------ /foo/1.0.0 ------------------|
//!    |======= /foo/1.0.0 traffic =========>|
//! ```
//!
//! ### Wire Format
//!
//! Every message, in both directions:
//!
//! ```text
//! <unsigned LEB128 payload length><UTF-8 payload><'\n'>
//! ```
//!
//! ### Reserved Messages
//!
//! | Message              | Sent by | Meaning                                   |
//! |----------------------|---------|-------------------------------------------|
//! | `/multistream/1.0.0` | both    | Handshake                                 |
//! | `ls`                 | client  | List the host's protocols                 |
//! | `na`                 | host    | Last proposal not available               |
//! | `debug-sigkill`      | client  | End the session (debug hosts only)        |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use multistream::protocol::{Client, Host};
//!
//! let (a, b) = tokio::io::duplex(1024);
//!
//! let host: Host<()> = Host::new();
//! host.add_handler("/foo/1.0.0".parse()?, ())?;
//!
//! let mut client = Client::from_stream(b);
//! let candidates = ["/rock/1.0.0", "/foo/1.0.0"];
//! let (hosted, selected) = tokio::join!(
//!     host.negotiate_stream(a),
//!     client.select_one_of(&candidates),
//! );
//! assert_eq!(selected?, "/foo/1.0.0");
//! assert_eq!(hosted?.protocol, "/foo/1.0.0");
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Framing, handshake, host and client state machines
//! - [`transport`]: TCP listener/dialer that drive negotiation
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use config::Config;
pub use error::{
    CommunicatorError, Error, HandshakeError, MultiselectClientError, MultiselectError, Result,
};
pub use protocol::{Client, Communicator, Host, HostConfig, ProtocolId, HANDSHAKE_ID};
pub use transport::{StreamHandler, TcpTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
